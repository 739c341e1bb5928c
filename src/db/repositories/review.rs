//! Review repository

use crate::db::{on_pool, DynDatabasePool, InsertedId};
use crate::models::{Review, ReviewWithAuthor};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn create(&self, user_id: i64, review: &str, stars: i64) -> Result<Review>;

    async fn get(&self, id: i64) -> Result<Option<Review>>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// A user's reviews, newest first
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Review>>;

    /// Every review with its author, newest first
    async fn list_with_author(&self, showcased_only: bool) -> Result<Vec<ReviewWithAuthor>>;

    async fn set_showcased(&self, id: i64, showcased: bool) -> Result<bool>;
}

pub struct SqlxReviewRepository {
    pool: DynDatabasePool,
}

impl SqlxReviewRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ReviewRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_REVIEW: &str =
    "SELECT id, user_id, review, stars, review_type, showcased, created_at FROM reviews";

#[async_trait]
impl ReviewRepository for SqlxReviewRepository {
    async fn create(&self, user_id: i64, review: &str, stars: i64) -> Result<Review> {
        let now = Utc::now();
        let id = on_pool!(self.pool, |p| {
            sqlx::query(
                "INSERT INTO reviews (user_id, review, stars, review_type, showcased, created_at) \
                 VALUES (?, ?, ?, 'APP', ?, ?)",
            )
            .bind(user_id)
            .bind(review)
            .bind(stars)
            .bind(false)
            .bind(now)
            .execute(p)
            .await
            .map(|r| r.inserted_id())
        })
        .context("Failed to create review")?;

        Ok(Review {
            id,
            user_id,
            review: review.to_string(),
            stars,
            review_type: "APP".to_string(),
            showcased: false,
            created_at: now,
        })
    }

    async fn get(&self, id: i64) -> Result<Option<Review>> {
        let sql = format!("{SELECT_REVIEW} WHERE id = ?");
        on_pool!(self.pool, |p| {
            sqlx::query_as::<_, Review>(&sql).bind(id).fetch_optional(p).await
        })
        .context("Failed to get review")
    }

    async fn delete(&self, id: i64) -> Result<()> {
        on_pool!(self.pool, |p| {
            sqlx::query("DELETE FROM reviews WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .map(|_| ())
        })
        .context("Failed to delete review")
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Review>> {
        let sql = format!("{SELECT_REVIEW} WHERE user_id = ? ORDER BY created_at DESC, id DESC");
        on_pool!(self.pool, |p| {
            sqlx::query_as::<_, Review>(&sql).bind(user_id).fetch_all(p).await
        })
        .context("Failed to list reviews")
    }

    async fn list_with_author(&self, showcased_only: bool) -> Result<Vec<ReviewWithAuthor>> {
        let filter = if showcased_only { "WHERE r.showcased = 1" } else { "" };
        let sql = format!(
            "SELECT r.id, r.user_id, u.username, r.review, r.stars, r.review_type, r.showcased, \
             r.created_at FROM reviews r INNER JOIN users u ON u.id = r.user_id \
             {filter} ORDER BY r.created_at DESC, r.id DESC"
        );
        on_pool!(self.pool, |p| {
            sqlx::query_as::<_, ReviewWithAuthor>(&sql).fetch_all(p).await
        })
        .context("Failed to list reviews with authors")
    }

    async fn set_showcased(&self, id: i64, showcased: bool) -> Result<bool> {
        let affected = on_pool!(self.pool, |p| {
            sqlx::query("UPDATE reviews SET showcased = ? WHERE id = ?")
                .bind(showcased)
                .bind(id)
                .execute(p)
                .await
                .map(|r| r.rows_affected())
        })
        .context("Failed to update review")?;
        Ok(affected > 0)
    }
}
