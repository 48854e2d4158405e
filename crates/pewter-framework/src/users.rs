//! Persistence of [`User`] metadata through the storage capability.
//!
//! Layout:
//!
//! | Key | Kind | Contents |
//! |-----|------|----------|
//! | `users:id:<id>` | hash | `name` plus every metadata entry |
//! | `users:name:<name>` | string | user id |
//! | `users:mention_name:<mention>` | string | user id |

use std::fmt;

use pewter_core::{BoxedStorage, StorageError, StorageResult, User};
use tracing::debug;

const NAME_FIELD: &str = "name";

/// Reads and writes users.
#[derive(Clone)]
pub struct UserStore {
    storage: BoxedStorage,
}

impl UserStore {
    pub fn new(storage: BoxedStorage) -> Self {
        Self { storage }
    }

    /// Loads the user with `id`, or `None` if nothing was saved.
    pub async fn find_by_id(&self, id: &str) -> StorageResult<Option<User>> {
        let mut fields = self.storage.hgetall(&format!("users:id:{id}")).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        let name = fields.remove(NAME_FIELD).unwrap_or_else(|| id.to_string());
        Ok(Some(User {
            id: id.to_string(),
            name,
            metadata: fields,
        }))
    }

    /// Loads a user by display name.
    pub async fn find_by_name(&self, name: &str) -> StorageResult<Option<User>> {
        match self.storage.get(&format!("users:name:{name}")).await? {
            Some(id) => self.find_by_id(&id).await,
            None => Ok(None),
        }
    }

    /// Loads a user by mention name.
    pub async fn find_by_mention_name(&self, mention_name: &str) -> StorageResult<Option<User>> {
        match self
            .storage
            .get(&format!("users:mention_name:{mention_name}"))
            .await?
        {
            Some(id) => self.find_by_id(&id).await,
            None => Ok(None),
        }
    }

    /// Writes `user`, replacing whatever was stored for its id.
    ///
    /// Metadata keys missing from `user` are removed from storage. A
    /// metadata key named `name` is rejected before anything is written.
    pub async fn save(&self, user: &User) -> StorageResult<()> {
        if user.metadata.contains_key(NAME_FIELD) {
            return Err(StorageError::Operation(format!(
                "metadata key `{NAME_FIELD}` is reserved for the display name"
            )));
        }
        let key = format!("users:id:{}", user.id);

        let stored = self.storage.hgetall(&key).await?;
        for field in stored.keys() {
            if field != NAME_FIELD && !user.metadata.contains_key(field) {
                self.storage.hdel(&key, field).await?;
            }
        }

        self.storage.hset(&key, NAME_FIELD, &user.name).await?;
        for (field, value) in &user.metadata {
            self.storage.hset(&key, field, value).await?;
        }

        self.storage
            .set(&format!("users:name:{}", user.name), &user.id)
            .await?;
        if let Some(mention_name) = user.metadata.get("mention_name") {
            self.storage
                .set(&format!("users:mention_name:{mention_name}"), &user.id)
                .await?;
        }

        debug!(user_id = %user.id, fields = user.metadata.len(), "User saved");
        Ok(())
    }
}

impl fmt::Debug for UserStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserStore").finish_non_exhaustive()
    }
}
