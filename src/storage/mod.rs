//! Key-value storage for permission rules
//!
//! The permission manager treats the store as the single source of truth and
//! re-reads it on every evaluation. Values are plain JSON so the same data
//! can live in extension storage, a file, or memory.

mod file;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::PermissionResult;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Async get/set store of JSON values
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any
    async fn get(&self, key: &str) -> PermissionResult<Option<Value>>;

    /// Store `value` under `key`, replacing any previous value
    ///
    /// The write is complete when the returned future resolves.
    async fn set(&self, key: &str, value: Value) -> PermissionResult<()>;
}

#[async_trait]
impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    async fn get(&self, key: &str) -> PermissionResult<Option<Value>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> PermissionResult<()> {
        (**self).set(key, value).await
    }
}
