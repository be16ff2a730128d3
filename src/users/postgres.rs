use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use super::{new_user_id, Identity, NewUser, StoredUser, UserLookup, UserStore};
use crate::error::{AppError, DatabaseError};

const USER_COLUMNS: &str = "id, email, name, password_hash, created_at, preferences";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    name: Option<String>,
    password_hash: String,
    created_at: DateTime<Utc>,
    preferences: Value,
}

impl From<UserRow> for StoredUser {
    fn from(row: UserRow) -> Self {
        StoredUser {
            identity: Identity {
                id: row.id,
                email: row.email,
                name: row.name,
                created_at: row.created_at,
                preferences: row.preferences,
            },
            password_hash: row.password_hash,
        }
    }
}

/// `users` table in PostgreSQL
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_where(&self, column: &str, value: &str) -> Result<Option<StoredUser>, AppError> {
        let query = format!("SELECT {} FROM users WHERE {} = $1", USER_COLUMNS, column);
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(StoredUser::from))
    }
}

#[async_trait]
impl UserLookup for PgUserStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Identity>, AppError> {
        Ok(self.fetch_where("id", id).await?.map(|u| u.identity))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, AppError> {
        Ok(self.fetch_where("email", email).await?.map(|u| u.identity))
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_credentials(&self, email: &str) -> Result<Option<StoredUser>, AppError> {
        self.fetch_where("email", email).await
    }

    async fn create(&self, user: NewUser) -> Result<Identity, AppError> {
        let query = format!(
            r#"
            INSERT INTO users (id, email, name, password_hash, created_at, preferences)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(new_user_id())
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.password_hash)
            .bind(Utc::now())
            .bind(Value::Object(Default::default()))
            .fetch_one(&self.pool)
            .await?;
        Ok(StoredUser::from(row).identity)
    }

    async fn password_hash(&self, id: &str) -> Result<Option<String>, AppError> {
        Ok(self.fetch_where("id", id).await?.map(|u| u.password_hash))
    }

    async fn update_preferences(&self, id: &str, preferences: Value) -> Result<Identity, AppError> {
        let query = format!(
            "UPDATE users SET preferences = $2 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(id)
            .bind(preferences)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("user {}", id)))?;
        Ok(StoredUser::from(row).identity)
    }

    async fn update_password_hash(&self, id: &str, password_hash: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("user {}", id)).into());
        }
        Ok(())
    }
}
