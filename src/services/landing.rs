//! Landing page content
//!
//! Public, cached read of the editable landing-page blocks and the
//! admin edit that invalidates it.

use crate::cache::{self, keys, Cache};
use crate::db::repositories::LandingRepository;
use crate::models::{LandingBlock, MAX_DISPLAY_TEXT_LEN};
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum LandingError {
    #[error("{0}")]
    ValidationError(String),

    #[error("Content not found")]
    NotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct LandingService {
    landing_repo: Arc<dyn LandingRepository>,
    cache: Arc<Cache>,
}

impl LandingService {
    pub fn new(landing_repo: Arc<dyn LandingRepository>, cache: Arc<Cache>) -> Self {
        Self { landing_repo, cache }
    }

    /// All blocks ordered by type, then sort order
    pub async fn content(&self) -> Result<Vec<LandingBlock>, LandingError> {
        cache::get_or_load(&self.cache, keys::LANDING_CONTENT, || async {
            self.landing_repo
                .list()
                .await
                .context("Failed to load landing page content")
                .map_err(LandingError::from)
        })
        .await
    }

    pub async fn update_text(&self, id: i64, display_text: &str) -> Result<LandingBlock, LandingError> {
        let text = display_text.trim();
        if text.is_empty() {
            return Err(LandingError::ValidationError(
                "Display text cannot be empty".to_string(),
            ));
        }
        if text.chars().count() > MAX_DISPLAY_TEXT_LEN {
            return Err(LandingError::ValidationError(format!(
                "Display text must be at most {} characters",
                MAX_DISPLAY_TEXT_LEN
            )));
        }

        if self
            .landing_repo
            .get(id)
            .await
            .context("Failed to get landing content")?
            .is_none()
        {
            return Err(LandingError::NotFound);
        }

        self.landing_repo
            .update_text(id, text)
            .await
            .context("Failed to update landing content")?;
        cache::invalidate(&self.cache, keys::LANDING_CONTENT).await;

        self.landing_repo
            .get(id)
            .await
            .context("Failed to reload landing content")?
            .ok_or(LandingError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::SqlxLandingRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> LandingService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        LandingService::new(
            SqlxLandingRepository::boxed(pool),
            create_cache(&CacheConfig::default()),
        )
    }

    #[tokio::test]
    async fn test_content_is_seeded_and_ordered() {
        let service = setup().await;
        let blocks = service.content().await.unwrap();

        assert_eq!(blocks.len(), 14);
        let types: Vec<&str> = blocks.iter().map(|b| b.display_type.as_str()).collect();
        let mut sorted = types.clone();
        sorted.sort();
        assert_eq!(types, sorted);
    }

    #[tokio::test]
    async fn test_update_is_visible_through_cache() {
        let service = setup().await;
        let first = service.content().await.unwrap().remove(0);

        let updated = service.update_text(first.id, "  Fresh words  ").await.unwrap();
        assert_eq!(updated.display_text, "Fresh words");

        let reloaded = service.content().await.unwrap();
        let block = reloaded.iter().find(|b| b.id == first.id).unwrap();
        assert_eq!(block.display_text, "Fresh words");
    }

    #[tokio::test]
    async fn test_update_validation() {
        let service = setup().await;
        let id = service.content().await.unwrap()[0].id;

        assert!(matches!(
            service.update_text(id, "   ").await,
            Err(LandingError::ValidationError(_))
        ));
        assert!(matches!(
            service.update_text(id, &"x".repeat(MAX_DISPLAY_TEXT_LEN + 1)).await,
            Err(LandingError::ValidationError(_))
        ));
        assert!(service.update_text(id, &"x".repeat(MAX_DISPLAY_TEXT_LEN)).await.is_ok());
        assert!(matches!(
            service.update_text(9999, "text").await,
            Err(LandingError::NotFound)
        ));
    }
}
