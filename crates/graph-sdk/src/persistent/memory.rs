use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::errors::{SDKError, SDKResult};
use crate::persistent::{MEMORY_HANDLER_NAME, PersistentDataHandler};

#[derive(Clone, Debug, Default)]
pub struct MemoryPersistentData {
    inner: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryPersistentData {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_entries(entries: BTreeMap<String, String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(entries)),
        }
    }

    pub(crate) fn snapshot(&self) -> SDKResult<BTreeMap<String, String>> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> SDKResult<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.inner
            .lock()
            .map_err(|_| SDKError::Storage("memory store mutex poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl PersistentDataHandler for MemoryPersistentData {
    fn name(&self) -> &str {
        MEMORY_HANDLER_NAME
    }

    async fn get(&self, key: &str) -> SDKResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> SDKResult<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn clear(&self, key: &str) -> SDKResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}
