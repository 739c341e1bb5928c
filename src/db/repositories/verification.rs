//! Email verification token repository

use crate::db::{on_pool, DynDatabasePool};
use crate::models::EmailVerification;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[async_trait]
pub trait VerificationRepository: Send + Sync {
    async fn create(&self, verification: &EmailVerification) -> Result<()>;

    async fn get(&self, token: &str) -> Result<Option<EmailVerification>>;

    /// Remove every token issued to a user
    async fn delete_by_user(&self, user_id: i64) -> Result<()>;

    async fn delete_expired(&self) -> Result<u64>;
}

pub struct SqlxVerificationRepository {
    pool: DynDatabasePool,
}

impl SqlxVerificationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn VerificationRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl VerificationRepository for SqlxVerificationRepository {
    async fn create(&self, verification: &EmailVerification) -> Result<()> {
        on_pool!(self.pool, |p| {
            sqlx::query("INSERT INTO email_verifications (token, user_id, expires_at) VALUES (?, ?, ?)")
                .bind(&verification.token)
                .bind(verification.user_id)
                .bind(verification.expires_at)
                .execute(p)
                .await
                .map(|_| ())
        })
        .context("Failed to store verification token")
    }

    async fn get(&self, token: &str) -> Result<Option<EmailVerification>> {
        let row = on_pool!(self.pool, |p| {
            sqlx::query_as::<_, (String, i64, DateTime<Utc>)>(
                "SELECT token, user_id, expires_at FROM email_verifications WHERE token = ?",
            )
            .bind(token)
            .fetch_optional(p)
            .await
        })
        .context("Failed to get verification token")?;

        Ok(row.map(|(token, user_id, expires_at)| EmailVerification {
            token,
            user_id,
            expires_at,
        }))
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<()> {
        on_pool!(self.pool, |p| {
            sqlx::query("DELETE FROM email_verifications WHERE user_id = ?")
                .bind(user_id)
                .execute(p)
                .await
                .map(|_| ())
        })
        .context("Failed to delete verification tokens")
    }

    async fn delete_expired(&self) -> Result<u64> {
        let now = Utc::now();
        on_pool!(self.pool, |p| {
            sqlx::query("DELETE FROM email_verifications WHERE expires_at < ?")
                .bind(now)
                .execute(p)
                .await
                .map(|r| r.rows_affected())
        })
        .context("Failed to delete expired verification tokens")
    }
}
