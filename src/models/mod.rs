//! Data models
//!
//! Entities stored by the repositories and the inputs the services accept.

mod chat;
mod interest;
mod landing;
mod media;
mod review;
mod session;
mod user;

pub use chat::{ChatMessage, NewChatMessage, RecommendedRef};
pub use interest::{Interest, InterestKind, MIN_CHILD_INTERESTS};
pub use landing::{LandingBlock, MAX_DISPLAY_TEXT_LEN};
pub use media::{
    AgeRange, MediaItem, MediaKind, MediaPatch, MediaQuery, MediaStatus, NewMedia, Paged,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use review::{CreateReviewInput, Review, ReviewWithAuthor, STARS_RANGE};
pub use session::{EmailVerification, Session};
pub use user::{ProfileInput, SubscriptionTier, UpdateProfileInput, User, UserRole};
