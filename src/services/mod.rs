//! Services layer - Business logic
//!
//! Services implement the library's rules on top of the repositories and
//! the cache. Each one has its own error enum that the API layer maps to
//! HTTP responses.

pub mod admin;
pub mod catalog;
pub mod chat;
pub mod email;
pub mod family;
pub mod landing;
pub mod password;
pub mod rate_limiter;
pub mod review;
pub mod user;

pub use admin::{AdminError, AdminService, FamilyOverview, ManagedUser, UserCounts};
pub use catalog::{CatalogError, CatalogService};
pub use chat::{ChatError, ChatReply, ChatRequest, ChatService, MediaCard};
pub use email::EmailService;
pub use family::{ChildProfile, CreateChildInput, FamilyError, FamilyService, UpdateChildInput};
pub use landing::{LandingError, LandingService};
pub use password::{check_password_policy, hash_password, verify_password};
pub use rate_limiter::LoginRateLimiter;
pub use review::{ReviewError, ReviewService, ShowcasedReview};
pub use user::{RegisterInput, UserService, UserServiceError, VerifyOutcome};
