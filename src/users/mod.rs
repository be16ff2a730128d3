/// User records
///
/// The auth core only ever reads users through `UserLookup`. Handlers that
/// register users or change their data use the wider `UserStore`.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;

pub use memory::InMemoryUserStore;
pub use postgres::PgUserStore;

/// The authenticated subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Always a JSON object
    pub preferences: Value,
}

/// An identity together with its stored password hash
#[derive(Debug, Clone)]
pub struct StoredUser {
    pub identity: Identity,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
}

#[async_trait]
pub trait UserLookup: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Identity>, AppError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, AppError>;
}

#[async_trait]
pub trait UserStore: UserLookup {
    async fn find_credentials(&self, email: &str) -> Result<Option<StoredUser>, AppError>;
    async fn create(&self, user: NewUser) -> Result<Identity, AppError>;
    async fn password_hash(&self, id: &str) -> Result<Option<String>, AppError>;
    async fn update_preferences(&self, id: &str, preferences: Value) -> Result<Identity, AppError>;
    async fn update_password_hash(&self, id: &str, password_hash: &str) -> Result<(), AppError>;
}

fn new_user_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
