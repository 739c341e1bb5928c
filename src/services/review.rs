//! Review service
//!
//! App reviews written by signed-in users, and the admin's pick of
//! reviews shown on the landing page.

use crate::cache::{self, keys, Cache};
use crate::db::repositories::ReviewRepository;
use crate::models::{CreateReviewInput, Review, ReviewWithAuthor, User, STARS_RANGE};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Longest accepted review text
pub const MAX_REVIEW_LEN: usize = 2000;

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("{0}")]
    ValidationError(String),

    #[error("Review not found")]
    NotFound,

    #[error("You are not authorized to delete this review.")]
    NotOwner,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// A review as shown on the public landing page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowcasedReview {
    pub review_id: i64,
    pub username: String,
    pub review: String,
    pub stars: i64,
}

impl From<ReviewWithAuthor> for ShowcasedReview {
    fn from(r: ReviewWithAuthor) -> Self {
        Self {
            review_id: r.id,
            username: r.username,
            review: r.review,
            stars: r.stars,
        }
    }
}

pub struct ReviewService {
    review_repo: Arc<dyn ReviewRepository>,
    cache: Arc<Cache>,
}

impl ReviewService {
    pub fn new(review_repo: Arc<dyn ReviewRepository>, cache: Arc<Cache>) -> Self {
        Self { review_repo, cache }
    }

    pub async fn create(&self, author: &User, input: CreateReviewInput) -> Result<Review, ReviewError> {
        let text = input.review.trim();
        if text.is_empty() {
            return Err(ReviewError::ValidationError("Review cannot be empty".to_string()));
        }
        if text.chars().count() > MAX_REVIEW_LEN {
            return Err(ReviewError::ValidationError(format!(
                "Review must be at most {} characters",
                MAX_REVIEW_LEN
            )));
        }
        if !STARS_RANGE.contains(&input.stars) {
            return Err(ReviewError::ValidationError(
                "Stars must be between 1 and 5".to_string(),
            ));
        }

        let review = self
            .review_repo
            .create(author.id, text, input.stars)
            .await
            .context("Failed to create review")?;
        Ok(review)
    }

    /// The author's reviews, newest first
    pub async fn mine(&self, author: &User) -> Result<Vec<Review>, ReviewError> {
        let reviews = self
            .review_repo
            .list_by_user(author.id)
            .await
            .context("Failed to list reviews")?;
        Ok(reviews)
    }

    /// Delete a review; only its author may do so
    pub async fn delete(&self, actor: &User, review_id: i64) -> Result<(), ReviewError> {
        let review = self
            .review_repo
            .get(review_id)
            .await
            .context("Failed to get review")?
            .ok_or(ReviewError::NotFound)?;

        if review.user_id != actor.id {
            return Err(ReviewError::NotOwner);
        }

        self.review_repo
            .delete(review_id)
            .await
            .context("Failed to delete review")?;

        if review.showcased {
            cache::invalidate(&self.cache, keys::SHOWCASED_REVIEWS).await;
        }
        Ok(())
    }

    /// Every review with its author, for the admin dashboard
    pub async fn all(&self) -> Result<Vec<ReviewWithAuthor>, ReviewError> {
        let reviews = self
            .review_repo
            .list_with_author(false)
            .await
            .context("Failed to list reviews")?;
        Ok(reviews)
    }

    pub async fn set_showcased(&self, review_id: i64, showcased: bool) -> Result<(), ReviewError> {
        let found = self
            .review_repo
            .set_showcased(review_id, showcased)
            .await
            .context("Failed to update review")?;
        if !found {
            return Err(ReviewError::NotFound);
        }
        cache::invalidate(&self.cache, keys::SHOWCASED_REVIEWS).await;
        Ok(())
    }

    /// Reviews picked for the landing page
    pub async fn showcased(&self) -> Result<Vec<ShowcasedReview>, ReviewError> {
        cache::get_or_load(&self.cache, keys::SHOWCASED_REVIEWS, || async {
            let reviews = self
                .review_repo
                .list_with_author(true)
                .await
                .context("Failed to list showcased reviews")?;
            Ok::<_, ReviewError>(reviews.into_iter().map(ShowcasedReview::from).collect())
        })
        .await
    }
}
