use async_trait::async_trait;
use sqlx::{PgPool, Row};
use thiserror::Error;

use crate::auth::hash_password;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}

/// Credential checks and actor lookup backed by `m_user` and `m_role`.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Authorities (role codes) of the account matching the credentials.
    async fn authenticate(&self, username: &str, password: &str) -> Result<Vec<String>, AccountError>;

    /// Id of the user whose email is `email`, used to stamp audit columns.
    async fn find_user_id(&self, email: &str) -> Result<Option<i64>, AccountError>;
}

pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn authenticate(&self, username: &str, password: &str) -> Result<Vec<String>, AccountError> {
        let row = sqlx::query(
            "SELECT r.code FROM m_user u JOIN m_role r ON r.id = u.role_id \
             WHERE u.email = $1 AND u.password = $2 LIMIT 1",
        )
        .bind(username)
        .bind(hash_password(password))
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or(AccountError::InvalidCredentials)?;
        let code: Option<String> = row.try_get("code")?;
        Ok(code.into_iter().collect())
    }

    async fn find_user_id(&self, email: &str) -> Result<Option<i64>, AccountError> {
        let row = sqlx::query("SELECT id FROM m_user WHERE email = $1 LIMIT 1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.try_get::<i64, _>("id")).transpose()?)
    }
}
