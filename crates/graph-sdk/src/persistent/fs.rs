use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{SDKError, SDKResult};
use crate::persistent::{MemoryPersistentData, PersistentDataHandler};

const STATE_FILE_NAME: &str = "graph-sdk-state.json";
pub const FS_HANDLER_NAME: &str = "fs";

/// File-backed store: the in-memory map, rewritten atomically after each change.
#[derive(Clone, Debug)]
pub struct FsPersistentData {
    state_file: PathBuf,
    inner: MemoryPersistentData,
}

impl FsPersistentData {
    pub fn new<P: AsRef<Path>>(root: P) -> SDKResult<Self> {
        fs::create_dir_all(root.as_ref())
            .map_err(|err| SDKError::Storage(format!("create store root failed: {err}")))?;
        let state_file = root.as_ref().join(STATE_FILE_NAME);
        let entries = if state_file.exists() {
            let raw = fs::read(&state_file)
                .map_err(|err| SDKError::Storage(format!("read state file failed: {err}")))?;
            serde_json::from_slice::<BTreeMap<String, String>>(&raw)
                .map_err(|err| SDKError::Storage(format!("decode state file failed: {err}")))?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            state_file,
            inner: MemoryPersistentData::from_entries(entries),
        })
    }

    fn persist(&self) -> SDKResult<()> {
        let snapshot = self.inner.snapshot()?;
        let raw = serde_json::to_vec_pretty(&snapshot)
            .map_err(|err| SDKError::Storage(format!("encode state failed: {err}")))?;
        let tmp = self.state_file.with_extension("json.tmp");
        fs::write(&tmp, raw)
            .map_err(|err| SDKError::Storage(format!("write state file failed: {err}")))?;
        fs::rename(&tmp, &self.state_file)
            .map_err(|err| SDKError::Storage(format!("rename state file failed: {err}")))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl PersistentDataHandler for FsPersistentData {
    fn name(&self) -> &str {
        FS_HANDLER_NAME
    }

    async fn get(&self, key: &str) -> SDKResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> SDKResult<()> {
        self.inner.set(key, value).await?;
        self.persist()
    }

    async fn clear(&self, key: &str) -> SDKResult<()> {
        self.inner.clear(key).await?;
        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "current_thread")]
    async fn fs_store_reopen_restores_previous_values() {
        let tmp = tempfile::tempdir().expect("tempdir should be created");
        let store = FsPersistentData::new(tmp.path()).expect("fs store should initialize");
        store
            .set("FBRLH_state", "abc")
            .await
            .expect("set should succeed");
        drop(store);

        let reopened = FsPersistentData::new(tmp.path()).expect("fs store should reopen");
        assert_eq!(
            reopened
                .get("FBRLH_state")
                .await
                .expect("get should succeed")
                .as_deref(),
            Some("abc")
        );

        reopened
            .clear("FBRLH_state")
            .await
            .expect("clear should succeed");
        let again = FsPersistentData::new(tmp.path()).expect("fs store should reopen");
        assert_eq!(again.get("FBRLH_state").await.expect("get"), None);
    }
}
