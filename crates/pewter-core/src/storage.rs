//! Key-value storage capability.
//!
//! The runtime pings storage once at start-up and hands it to the user store.
//! Only the hash and string operations the framework needs are modelled.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{StorageError, StorageResult};

/// An async key-value store with hash support.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Checks that the store is reachable.
    ///
    /// Must fail with [`StorageError::Connection`] when it is not.
    async fn ping(&self) -> StorageResult<()>;

    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// All fields of the hash at `key`, empty if absent.
    async fn hgetall(&self, key: &str) -> StorageResult<HashMap<String, String>>;

    async fn hset(&self, key: &str, field: &str, value: &str) -> StorageResult<()>;

    async fn hdel(&self, key: &str, field: &str) -> StorageResult<()>;

    /// Removes `key` of any type.
    async fn del(&self, key: &str) -> StorageResult<()>;
}

/// A shared storage trait object.
pub type BoxedStorage = Arc<dyn Storage>;

#[derive(Debug, Clone)]
enum Entry {
    String(String),
    Hash(HashMap<String, String>),
}

/// In-process storage.
///
/// [`MemoryStorage::unreachable`] builds a store whose every call fails with
/// a connection error.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Entry>>,
    unreachable: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that behaves like a server that refuses connections.
    pub fn unreachable() -> Self {
        Self {
            entries: Mutex::default(),
            unreachable: true,
        }
    }

    fn check(&self) -> StorageResult<()> {
        if self.unreachable {
            Err(StorageError::Connection("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

fn wrong_type(key: &str) -> StorageError {
    StorageError::Operation(format!("wrong kind of value at key '{key}'"))
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn ping(&self) -> StorageResult<()> {
        self.check()
    }

    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.check()?;
        match self.entries.lock().get(key) {
            None => Ok(None),
            Some(Entry::String(value)) => Ok(Some(value.clone())),
            Some(Entry::Hash(_)) => Err(wrong_type(key)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.check()?;
        self.entries
            .lock()
            .insert(key.to_string(), Entry::String(value.to_string()));
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> StorageResult<HashMap<String, String>> {
        self.check()?;
        match self.entries.lock().get(key) {
            None => Ok(HashMap::new()),
            Some(Entry::Hash(fields)) => Ok(fields.clone()),
            Some(Entry::String(_)) => Err(wrong_type(key)),
        }
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> StorageResult<()> {
        self.check()?;
        let mut entries = self.entries.lock();
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Hash(HashMap::new()));
        match entry {
            Entry::Hash(fields) => {
                fields.insert(field.to_string(), value.to_string());
                Ok(())
            }
            Entry::String(_) => Err(wrong_type(key)),
        }
    }

    async fn hdel(&self, key: &str, field: &str) -> StorageResult<()> {
        self.check()?;
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            None => Ok(()),
            Some(Entry::Hash(fields)) => {
                fields.remove(field);
                if fields.is_empty() {
                    entries.remove(key);
                }
                Ok(())
            }
            Some(Entry::String(_)) => Err(wrong_type(key)),
        }
    }

    async fn del(&self, key: &str) -> StorageResult<()> {
        self.check()?;
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Prefixes every key with `<namespace>:` before delegating.
#[derive(Clone)]
pub struct Namespaced {
    inner: BoxedStorage,
    namespace: String,
}

impl Namespaced {
    pub fn new(inner: BoxedStorage, namespace: impl Into<String>) -> Self {
        Self {
            inner,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{key}", self.namespace)
    }
}

#[async_trait]
impl Storage for Namespaced {
    async fn ping(&self) -> StorageResult<()> {
        self.inner.ping().await
    }

    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.inner.get(&self.key(key)).await
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.inner.set(&self.key(key), value).await
    }

    async fn hgetall(&self, key: &str) -> StorageResult<HashMap<String, String>> {
        self.inner.hgetall(&self.key(key)).await
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> StorageResult<()> {
        self.inner.hset(&self.key(key), field, value).await
    }

    async fn hdel(&self, key: &str, field: &str) -> StorageResult<()> {
        self.inner.hdel(&self.key(key), field).await
    }

    async fn del(&self, key: &str) -> StorageResult<()> {
        self.inner.del(&self.key(key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_operations() {
        let storage = MemoryStorage::new();
        storage.hset("users:id:1", "information", "blue").await.unwrap();
        storage.hset("users:id:1", "color", "red").await.unwrap();

        let fields = storage.hgetall("users:id:1").await.unwrap();
        assert_eq!(fields.get("information").map(String::as_str), Some("blue"));
        assert_eq!(fields.len(), 2);

        storage.hdel("users:id:1", "color").await.unwrap();
        assert_eq!(storage.hgetall("users:id:1").await.unwrap().len(), 1);

        storage.del("users:id:1").await.unwrap();
        assert!(storage.hgetall("users:id:1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_kind_is_an_operation_error() {
        let storage = MemoryStorage::new();
        storage.set("name", "pewter").await.unwrap();
        assert!(matches!(
            storage.hgetall("name").await,
            Err(StorageError::Operation(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_reports_connection_errors() {
        let storage = MemoryStorage::unreachable();
        assert!(matches!(storage.ping().await, Err(StorageError::Connection(_))));
        assert!(matches!(
            storage.get("anything").await,
            Err(StorageError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn test_namespaced_prefixes_keys() {
        let memory = Arc::new(MemoryStorage::new());
        let namespaced = Namespaced::new(memory.clone(), "pewter");
        namespaced.set("users:name:Carl", "1").await.unwrap();

        assert_eq!(
            memory.get("pewter:users:name:Carl").await.unwrap().as_deref(),
            Some("1")
        );
        assert_eq!(namespaced.get("users:name:Carl").await.unwrap().as_deref(), Some("1"));
    }
}
