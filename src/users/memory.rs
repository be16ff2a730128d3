use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::{new_user_id, Identity, NewUser, StoredUser, UserLookup, UserStore};
use crate::error::{AppError, DatabaseError};

/// Process-local user store, keyed by id. Used by the test suite and for
/// running the service without PostgreSQL.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, StoredUser>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a user outright
    pub fn remove(&self, id: &str) -> Option<StoredUser> {
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    fn read<T>(&self, f: impl FnOnce(&HashMap<String, StoredUser>) -> T) -> T {
        f(&self.users.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write<T>(&self, f: impl FnOnce(&mut HashMap<String, StoredUser>) -> T) -> T {
        f(&mut self.users.write().unwrap_or_else(PoisonError::into_inner))
    }
}

fn not_found(id: &str) -> AppError {
    DatabaseError::NotFound(format!("user {}", id)).into()
}

#[async_trait]
impl UserLookup for InMemoryUserStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Identity>, AppError> {
        Ok(self.read(|users| users.get(id).map(|u| u.identity.clone())))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, AppError> {
        Ok(self.find_credentials(email).await?.map(|u| u.identity))
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_credentials(&self, email: &str) -> Result<Option<StoredUser>, AppError> {
        Ok(self.read(|users| {
            users
                .values()
                .find(|u| u.identity.email == email)
                .cloned()
        }))
    }

    async fn create(&self, user: NewUser) -> Result<Identity, AppError> {
        self.write(|users| {
            if users.values().any(|u| u.identity.email == user.email) {
                return Err(DatabaseError::UniqueConstraintViolation(
                    "Email already registered".to_string(),
                )
                .into());
            }

            let identity = Identity {
                id: new_user_id(),
                email: user.email,
                name: user.name,
                created_at: Utc::now(),
                preferences: Value::Object(Default::default()),
            };
            users.insert(
                identity.id.clone(),
                StoredUser {
                    identity: identity.clone(),
                    password_hash: user.password_hash,
                },
            );
            Ok(identity)
        })
    }

    async fn password_hash(&self, id: &str) -> Result<Option<String>, AppError> {
        Ok(self.read(|users| users.get(id).map(|u| u.password_hash.clone())))
    }

    async fn update_preferences(&self, id: &str, preferences: Value) -> Result<Identity, AppError> {
        self.write(|users| {
            let user = users.get_mut(id).ok_or_else(|| not_found(id))?;
            user.identity.preferences = preferences;
            Ok(user.identity.clone())
        })
    }

    async fn update_password_hash(&self, id: &str, password_hash: &str) -> Result<(), AppError> {
        self.write(|users| {
            let user = users.get_mut(id).ok_or_else(|| not_found(id))?;
            user.password_hash = password_hash.to_string();
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            name: Some("Test".to_string()),
            password_hash: "$2b$04$hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let store = InMemoryUserStore::new();
        let created = store.create(new_user("a@example.com")).await.unwrap();

        let by_id = store.find_by_id(&created.id).await.unwrap().unwrap();
        let by_email = store.find_by_email("a@example.com").await.unwrap().unwrap();
        assert_eq!(by_id, created);
        assert_eq!(by_email, created);
        assert_eq!(created.preferences, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = InMemoryUserStore::new();
        store.create(new_user("a@example.com")).await.unwrap();

        let err = store.create(new_user("a@example.com")).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Database(DatabaseError::UniqueConstraintViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_updates() {
        let store = InMemoryUserStore::new();
        let created = store.create(new_user("a@example.com")).await.unwrap();

        let updated = store
            .update_preferences(&created.id, serde_json::json!({"servings": 4}))
            .await
            .unwrap();
        assert_eq!(updated.preferences["servings"], 4);

        store.update_password_hash(&created.id, "new-hash").await.unwrap();
        assert_eq!(
            store.password_hash(&created.id).await.unwrap().as_deref(),
            Some("new-hash")
        );
    }

    #[tokio::test]
    async fn test_missing_user() {
        let store = InMemoryUserStore::new();

        assert!(store.find_by_id("nope").await.unwrap().is_none());
        assert!(store.update_password_hash("nope", "x").await.is_err());
        assert!(store.remove("nope").is_none());
    }
}
