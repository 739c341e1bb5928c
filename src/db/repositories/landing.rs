//! Landing page content repository

use crate::db::{on_pool, DynDatabasePool};
use crate::models::LandingBlock;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait LandingRepository: Send + Sync {
    /// All blocks ordered by type then sort order
    async fn list(&self) -> Result<Vec<LandingBlock>>;

    async fn get(&self, id: i64) -> Result<Option<LandingBlock>>;

    async fn update_text(&self, id: i64, display_text: &str) -> Result<()>;
}

pub struct SqlxLandingRepository {
    pool: DynDatabasePool,
}

impl SqlxLandingRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn LandingRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_BLOCK: &str = "SELECT id, display_type, title, grouping_key, display_text, \
     sort_order, updated_at FROM landing_page_content";

#[async_trait]
impl LandingRepository for SqlxLandingRepository {
    async fn list(&self) -> Result<Vec<LandingBlock>> {
        let sql = format!("{SELECT_BLOCK} ORDER BY display_type, sort_order, id");
        on_pool!(self.pool, |p| {
            sqlx::query_as::<_, LandingBlock>(&sql).fetch_all(p).await
        })
        .context("Failed to list landing page content")
    }

    async fn get(&self, id: i64) -> Result<Option<LandingBlock>> {
        let sql = format!("{SELECT_BLOCK} WHERE id = ?");
        on_pool!(self.pool, |p| {
            sqlx::query_as::<_, LandingBlock>(&sql).bind(id).fetch_optional(p).await
        })
        .context("Failed to get landing page block")
    }

    async fn update_text(&self, id: i64, display_text: &str) -> Result<()> {
        on_pool!(self.pool, |p| {
            sqlx::query("UPDATE landing_page_content SET display_text = ?, updated_at = ? WHERE id = ?")
                .bind(display_text)
                .bind(Utc::now())
                .bind(id)
                .execute(p)
                .await
                .map(|_| ())
        })
        .context("Failed to update landing page block")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    #[tokio::test]
    async fn test_list_and_update() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let repo = SqlxLandingRepository::new(pool);

        let blocks = repo.list().await.unwrap();
        assert_eq!(blocks.len(), 14);
        assert_eq!(blocks[0].display_type, "FEATURE");

        let intro = blocks.iter().find(|b| b.display_type == "INTRODUCTION").unwrap();
        repo.update_text(intro.id, "Hello families").await.unwrap();

        let updated = repo.get(intro.id).await.unwrap().unwrap();
        assert_eq!(updated.display_text, "Hello families");
        assert!(repo.get(999).await.unwrap().is_none());
    }
}
