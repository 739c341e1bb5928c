//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for one entity.

pub mod chat;
pub mod interest;
pub mod landing;
pub mod media;
pub mod review;
pub mod session;
pub mod user;
pub mod verification;

pub use chat::{ChatRepository, SqlxChatRepository};
pub use interest::{InterestRepository, SqlxInterestRepository};
pub use landing::{LandingRepository, SqlxLandingRepository};
pub use media::{MediaRepository, SqlxMediaRepository};
pub use review::{ReviewRepository, SqlxReviewRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
pub use verification::{SqlxVerificationRepository, VerificationRepository};
