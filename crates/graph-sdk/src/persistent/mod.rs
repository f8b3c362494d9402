//! Persistent key-value storage capability used by the login flow.

pub mod fs;
pub mod memory;

pub use fs::FsPersistentData;
pub use memory::MemoryPersistentData;

use crate::errors::SDKResult;

pub const MEMORY_HANDLER_NAME: &str = "memory";

#[async_trait::async_trait]
pub trait PersistentDataHandler: Send + Sync {
    fn name(&self) -> &str;

    async fn get(&self, key: &str) -> SDKResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> SDKResult<()>;

    async fn clear(&self, key: &str) -> SDKResult<()>;
}
