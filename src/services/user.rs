//! User service
//!
//! Account lifecycle for parents, librarians and the bootstrap admin:
//! - registration with email verification
//! - login/logout with server-side sessions
//! - profile and password changes
//!
//! Children are created by their parent, see `services::family`.

use crate::config::{AuthConfig, BootstrapAdmin};
use crate::db::repositories::{SessionRepository, UserRepository, VerificationRepository};
use crate::models::{EmailVerification, ProfileInput, Session, UpdateProfileInput, User, UserRole};
use crate::services::email::EmailService;
use crate::services::password::{check_password_policy, hash_password, verify_password};
use anyhow::{Context, Result};
use chrono::Duration;
use serde::Deserialize;
use std::sync::Arc;

/// Longest accepted username
pub const MAX_USERNAME_LEN: usize = 50;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Authentication failed (invalid credentials)
    #[error("{0}")]
    AuthenticationError(String),

    /// Validation error (invalid input)
    #[error("{0}")]
    ValidationError(String),

    /// Username or email already taken
    #[error("{0}")]
    UserExists(String),

    /// Login attempted before the email link was followed
    #[error("Please verify your email before logging in.")]
    EmailNotVerified,

    /// Verification token unknown or expired
    #[error("Invalid or expired verification link")]
    InvalidToken,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Registration payload shared by parents and librarians
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(flatten)]
    pub profile: ProfileInput,
}

impl RegisterInput {
    pub fn new(username: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            profile: ProfileInput::default(),
        }
    }

    pub fn with_name(mut self, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        self.profile.first_name = first_name.into();
        self.profile.last_name = last_name.into();
        self
    }
}

/// Result of following a verification link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    AlreadyVerified,
}

/// User service for managing accounts and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    verification_repo: Arc<dyn VerificationRepository>,
    email: Arc<EmailService>,
    auth: AuthConfig,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        verification_repo: Arc<dyn VerificationRepository>,
        email: Arc<EmailService>,
        auth: AuthConfig,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            verification_repo,
            email,
            auth,
        }
    }

    /// Register a parent on the free tier
    pub async fn register_parent(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        self.register(input, UserRole::Parent).await
    }

    /// Register a librarian awaiting admin approval
    pub async fn register_librarian(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        self.register(input, UserRole::Librarian).await
    }

    async fn register(&self, input: RegisterInput, role: UserRole) -> Result<User, UserServiceError> {
        validate_register_input(&input)?;

        let username = input.username.trim().to_string();
        let email = input.email.trim().to_string();

        if self
            .user_repo
            .get_by_username(&username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(
                "Username already registered".to_string(),
            ));
        }

        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(
                "Email already registered".to_string(),
            ));
        }

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;

        let mut user = User::new(username, password_hash, role, input.profile);
        user.email = Some(email.clone());
        user.is_verified = !self.auth.require_email_verification;

        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create user")?;

        tracing::info!("Registered {} account '{}'", created.role, created.username);

        if !created.is_verified {
            let verification = EmailVerification::issue(
                created.id,
                Duration::minutes(self.auth.verification_ttl_minutes),
            );
            self.verification_repo
                .create(&verification)
                .await
                .context("Failed to store verification token")?;
            self.email
                .dispatch_verification(email, created.username.clone(), verification.token);
        }

        Ok(created)
    }

    /// Mark the owner of `token` as verified.
    ///
    /// The token stays valid until it expires so that following the link
    /// twice reports `AlreadyVerified` instead of an error.
    pub async fn verify_email(&self, token: &str) -> Result<VerifyOutcome, UserServiceError> {
        let verification = self
            .verification_repo
            .get(token)
            .await
            .context("Failed to look up verification token")?
            .ok_or(UserServiceError::InvalidToken)?;

        if verification.is_expired() {
            return Err(UserServiceError::InvalidToken);
        }

        let user = self
            .user_repo
            .get_by_id(verification.user_id)
            .await
            .context("Failed to get user")?
            .ok_or_else(|| UserServiceError::NotFound("User not found".to_string()))?;

        if user.is_verified {
            return Ok(VerifyOutcome::AlreadyVerified);
        }

        self.user_repo
            .set_verified(user.id)
            .await
            .context("Failed to mark user verified")?;

        tracing::info!("Email verified for '{}'", user.username);
        Ok(VerifyOutcome::Verified)
    }

    /// Check credentials and open a session.
    ///
    /// `username` may also be an email address.
    pub async fn login(&self, username: &str, password: &str) -> Result<(Session, User), UserServiceError> {
        let invalid = || UserServiceError::AuthenticationError("Incorrect username or password".to_string());

        let user = self
            .find_user_by_username_or_email(username.trim())
            .await?
            .ok_or_else(invalid)?;

        let password_valid =
            verify_password(password, &user.password_hash).context("Failed to verify password")?;
        if !password_valid {
            return Err(invalid());
        }

        if self.auth.require_email_verification && !user.is_verified {
            return Err(UserServiceError::EmailNotVerified);
        }

        let session = self.create_session(user.id).await?;
        tracing::debug!("User '{}' logged in", user.username);

        Ok((session, user))
    }

    /// Invalidate a session token
    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a bearer token to its user; `None` when unknown or expired
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to delete expired session: {}", e);
            }
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        let user = self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?;
        Ok(user)
    }

    /// Apply a partial profile update to `user`
    pub async fn update_profile(
        &self,
        user: &User,
        input: UpdateProfileInput,
    ) -> Result<User, UserServiceError> {
        for (field, value) in [("First name", &input.first_name), ("Last name", &input.last_name)] {
            if matches!(value, Some(v) if v.trim().is_empty()) {
                return Err(UserServiceError::ValidationError(format!(
                    "{} cannot be empty",
                    field
                )));
            }
        }

        let mut updated = user.clone();
        updated.apply_profile(&input);

        if let Some(ref email) = input.email {
            let email = email.trim();
            if user.is_child() {
                return Err(UserServiceError::ValidationError(
                    "Child accounts do not have an email address".to_string(),
                ));
            }
            validate_email(email)?;

            let unchanged = user
                .email
                .as_deref()
                .is_some_and(|current| current.eq_ignore_ascii_case(email));
            if !unchanged {
                let taken = self
                    .user_repo
                    .get_by_email(email)
                    .await
                    .context("Failed to check email")?
                    .is_some_and(|other| other.id != user.id);
                if taken {
                    return Err(UserServiceError::UserExists(
                        "Email already registered".to_string(),
                    ));
                }
            }
            updated.email = Some(email.to_string());
        }

        let saved = self
            .user_repo
            .update(&updated)
            .await
            .context("Failed to update user")?;
        Ok(saved)
    }

    /// Change the password of `user_id`; only the account owner may do so
    pub async fn change_password(
        &self,
        actor: &User,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), UserServiceError> {
        if actor.id != user_id {
            return Err(UserServiceError::Forbidden(
                "You can only change your own password".to_string(),
            ));
        }

        let valid = verify_password(current_password, &actor.password_hash)
            .context("Failed to verify password")?;
        if !valid {
            return Err(UserServiceError::ValidationError(
                "Current password is incorrect".to_string(),
            ));
        }

        check_password_policy(new_password).map_err(UserServiceError::ValidationError)?;

        let mut updated = actor.clone();
        updated.password_hash = hash_password(new_password).context("Failed to hash password")?;
        self.user_repo
            .update(&updated)
            .await
            .context("Failed to update password")?;

        tracing::info!("Password changed for '{}'", actor.username);
        Ok(())
    }

    /// Create the configured admin account if it does not exist yet
    pub async fn ensure_bootstrap_admin(&self, admin: &BootstrapAdmin) -> Result<Option<User>> {
        if self.user_repo.get_by_username(&admin.username).await?.is_some() {
            return Ok(None);
        }

        let password_hash = hash_password(&admin.password)?;
        let profile = ProfileInput {
            first_name: "Admin".to_string(),
            last_name: String::new(),
            ..Default::default()
        };
        let mut user = User::new(admin.username.clone(), password_hash, UserRole::Admin, profile);
        user.email = admin.email.clone();
        user.is_verified = true;

        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create bootstrap admin")?;
        tracing::info!("Created admin account '{}'", created.username);
        Ok(Some(created))
    }

    /// Delete expired sessions and verification tokens, returning the count removed
    pub async fn cleanup_expired(&self) -> Result<u64, UserServiceError> {
        let sessions = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?;
        let tokens = self
            .verification_repo
            .delete_expired()
            .await
            .context("Failed to delete expired verification tokens")?;

        Ok(sessions.max(0) as u64 + tokens)
    }

    async fn find_user_by_username_or_email(
        &self,
        username_or_email: &str,
    ) -> Result<Option<User>, UserServiceError> {
        if let Some(user) = self
            .user_repo
            .get_by_username(username_or_email)
            .await
            .context("Failed to get user by username")?
        {
            return Ok(Some(user));
        }

        if !username_or_email.contains('@') {
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_email(username_or_email)
            .await
            .context("Failed to get user by email")?;
        Ok(user)
    }

    async fn create_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let session = Session::issue(user_id, Duration::minutes(self.auth.session_ttl_minutes));
        let created = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;
        Ok(created)
    }
}

/// Username rules shared with child accounts
pub fn validate_username(username: &str) -> Result<(), UserServiceError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(UserServiceError::ValidationError(
            "Username cannot be empty".to_string(),
        ));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(UserServiceError::ValidationError(format!(
            "Username must be at most {} characters",
            MAX_USERNAME_LEN
        )));
    }
    if username.contains(char::is_whitespace) {
        return Err(UserServiceError::ValidationError(
            "Username cannot contain spaces".to_string(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), UserServiceError> {
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'));
    if !valid {
        return Err(UserServiceError::ValidationError(
            "Invalid email format".to_string(),
        ));
    }
    Ok(())
}

fn validate_register_input(input: &RegisterInput) -> Result<(), UserServiceError> {
    validate_username(&input.username)?;
    validate_email(input.email.trim())?;
    check_password_policy(&input.password).map_err(UserServiceError::ValidationError)?;

    if input.profile.first_name.trim().is_empty() || input.profile.last_name.trim().is_empty() {
        return Err(UserServiceError::ValidationError(
            "First and last name are required".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmailConfig;
    use crate::db::repositories::{
        SqlxSessionRepository, SqlxUserRepository, SqlxVerificationRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use chrono::Utc;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    async fn setup_with(auth: AuthConfig) -> (DynDatabasePool, UserService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let service = UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            SqlxVerificationRepository::boxed(pool.clone()),
            Arc::new(EmailService::new(EmailConfig::default())),
            auth,
        );
        (pool, service)
    }

    async fn setup_test_service() -> (DynDatabasePool, UserService) {
        setup_with(AuthConfig::default()).await
    }

    fn parent_input(username: &str) -> RegisterInput {
        RegisterInput::new(username, format!("{}@example.com", username), "secret123")
            .with_name("Pat", "Parent")
    }

    async fn token_for(pool: &DynDatabasePool, user_id: i64) -> String {
        let verification = EmailVerification::issue(user_id, Duration::minutes(5));
        SqlxVerificationRepository::new(pool.clone())
            .create(&verification)
            .await
            .unwrap();
        verification.token
    }

    #[tokio::test]
    async fn test_register_parent_defaults() {
        let (_pool, service) = setup_test_service().await;

        let user = service.register_parent(parent_input("pat")).await.unwrap();

        assert_eq!(user.role, UserRole::Parent);
        assert_eq!(user.email.as_deref(), Some("pat@example.com"));
        assert_eq!(user.tier, Some(crate::models::SubscriptionTier::Free));
        assert!(!user.is_verified);
        assert_ne!(user.password_hash, "secret123");
    }

    #[tokio::test]
    async fn test_register_librarian_unapproved() {
        let (_pool, service) = setup_test_service().await;

        let user = service.register_librarian(parent_input("lib")).await.unwrap();

        assert_eq!(user.role, UserRole::Librarian);
        assert!(user.tier.is_none());
        assert!(!user.is_approved);
    }

    #[tokio::test]
    async fn test_register_duplicates_rejected() {
        let (_pool, service) = setup_test_service().await;
        service.register_parent(parent_input("pat")).await.unwrap();

        let result = service.register_parent(parent_input("pat")).await;
        assert!(matches!(result, Err(UserServiceError::UserExists(_))));

        let same_email = RegisterInput::new("other", "PAT@example.com", "secret123").with_name("O", "T");
        let result = service.register_parent(same_email).await;
        assert!(matches!(result, Err(UserServiceError::UserExists(_))));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let (_pool, service) = setup_test_service().await;

        let cases = [
            RegisterInput::new("", "a@example.com", "secret123").with_name("A", "B"),
            RegisterInput::new("has space", "a@example.com", "secret123").with_name("A", "B"),
            RegisterInput::new("a", "not-an-email", "secret123").with_name("A", "B"),
            RegisterInput::new("a", "a@example.com", "123").with_name("A", "B"),
            RegisterInput::new("a", "a@example.com", "secret123"),
        ];
        for input in cases {
            let result = service.register_parent(input).await;
            assert!(matches!(result, Err(UserServiceError::ValidationError(_))));
        }
    }

    #[tokio::test]
    async fn test_login_requires_verification() {
        let (pool, service) = setup_test_service().await;
        let user = service.register_parent(parent_input("pat")).await.unwrap();

        let result = service.login("pat", "secret123").await;
        assert!(matches!(result, Err(UserServiceError::EmailNotVerified)));

        let token = token_for(&pool, user.id).await;
        assert_eq!(service.verify_email(&token).await.unwrap(), VerifyOutcome::Verified);
        assert_eq!(
            service.verify_email(&token).await.unwrap(),
            VerifyOutcome::AlreadyVerified
        );

        let (session, logged_in) = service.login("pat", "secret123").await.unwrap();
        assert_eq!(logged_in.id, user.id);

        let validated = service.validate_session(&session.id).await.unwrap().unwrap();
        assert_eq!(validated.id, user.id);
    }

    #[tokio::test]
    async fn test_login_without_required_verification() {
        let auth = AuthConfig {
            require_email_verification: false,
            ..Default::default()
        };
        let (_pool, service) = setup_with(auth).await;
        let user = service.register_parent(parent_input("pat")).await.unwrap();
        assert!(user.is_verified);

        // Email works in place of the username
        assert!(service.login("pat@example.com", "secret123").await.is_ok());
    }

    #[tokio::test]
    async fn test_login_wrong_password_fails() {
        let (_pool, service) = setup_with(AuthConfig {
            require_email_verification: false,
            ..Default::default()
        })
        .await;
        service.register_parent(parent_input("pat")).await.unwrap();

        let result = service.login("pat", "wrong-password").await;
        assert!(matches!(result, Err(UserServiceError::AuthenticationError(_))));

        let result = service.login("nobody", "secret123").await;
        assert!(matches!(result, Err(UserServiceError::AuthenticationError(_))));
    }

    #[tokio::test]
    async fn test_verify_invalid_and_expired_tokens() {
        let (pool, service) = setup_test_service().await;
        let user = service.register_parent(parent_input("pat")).await.unwrap();

        let result = service.verify_email("nope").await;
        assert!(matches!(result, Err(UserServiceError::InvalidToken)));

        let expired = EmailVerification {
            token: "expired-token".to_string(),
            user_id: user.id,
            expires_at: Utc::now() - Duration::minutes(1),
        };
        SqlxVerificationRepository::new(pool.clone())
            .create(&expired)
            .await
            .unwrap();
        let result = service.verify_email("expired-token").await;
        assert!(matches!(result, Err(UserServiceError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_logout_and_expired_session() {
        let (pool, service) = setup_with(AuthConfig {
            require_email_verification: false,
            ..Default::default()
        })
        .await;
        let user = service.register_parent(parent_input("pat")).await.unwrap();

        let (session, _) = service.login("pat", "secret123").await.unwrap();
        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());

        let stale = Session {
            id: "stale".to_string(),
            user_id: user.id,
            expires_at: Utc::now() - Duration::minutes(1),
            created_at: Utc::now() - Duration::minutes(31),
        };
        SqlxSessionRepository::new(pool.clone()).create(&stale).await.unwrap();
        assert!(service.validate_session("stale").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_profile_email_uniqueness() {
        let (_pool, service) = setup_test_service().await;
        let pat = service.register_parent(parent_input("pat")).await.unwrap();
        service.register_parent(parent_input("sam")).await.unwrap();

        let taken = UpdateProfileInput {
            email: Some("sam@example.com".to_string()),
            ..Default::default()
        };
        let result = service.update_profile(&pat, taken).await;
        assert!(matches!(result, Err(UserServiceError::UserExists(_))));

        let update = UpdateProfileInput {
            first_name: Some("Patricia".to_string()),
            email: Some("PAT@example.com".to_string()),
            country: Some("Singapore".to_string()),
            ..Default::default()
        };
        let updated = service.update_profile(&pat, update).await.unwrap();
        assert_eq!(updated.first_name, "Patricia");
        assert_eq!(updated.country.as_deref(), Some("Singapore"));
        assert_eq!(updated.last_name, "Parent");
    }

    #[tokio::test]
    async fn test_change_password_only_for_self() {
        let (_pool, service) = setup_with(AuthConfig {
            require_email_verification: false,
            ..Default::default()
        })
        .await;
        let pat = service.register_parent(parent_input("pat")).await.unwrap();

        let result = service.change_password(&pat, pat.id + 1, "secret123", "newsecret").await;
        assert!(matches!(result, Err(UserServiceError::Forbidden(_))));

        let result = service.change_password(&pat, pat.id, "wrong", "newsecret").await;
        assert!(matches!(result, Err(UserServiceError::ValidationError(_))));

        service
            .change_password(&pat, pat.id, "secret123", "newsecret")
            .await
            .unwrap();
        assert!(service.login("pat", "secret123").await.is_err());
        assert!(service.login("pat", "newsecret").await.is_ok());
    }

    #[tokio::test]
    async fn test_bootstrap_admin_created_once() {
        let (_pool, service) = setup_test_service().await;
        let admin = BootstrapAdmin {
            username: "admin".to_string(),
            password: "adminpass".to_string(),
            email: None,
        };

        let created = service.ensure_bootstrap_admin(&admin).await.unwrap().unwrap();
        assert!(created.is_admin());
        assert!(created.is_verified);
        assert!(service.ensure_bootstrap_admin(&admin).await.unwrap().is_none());

        assert!(service.login("admin", "adminpass").await.is_ok());
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let (pool, service) = setup_test_service().await;
        let user = service.register_parent(parent_input("pat")).await.unwrap();

        let stale = Session {
            id: "stale".to_string(),
            user_id: user.id,
            expires_at: Utc::now() - Duration::minutes(1),
            created_at: Utc::now() - Duration::minutes(31),
        };
        SqlxSessionRepository::new(pool.clone()).create(&stale).await.unwrap();

        assert!(service.cleanup_expired().await.unwrap() >= 1);
    }

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(10))]

        /// Any verified registration can log in and its token resolves to the same user
        #[test]
        fn prop_login_roundtrip(
            username in "[a-z]{3,10}",
            password in "[a-zA-Z0-9!@#$%^&*]{6,20}"
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result: Result<(), TestCaseError> = rt.block_on(async {
                let (_pool, service) = setup_with(AuthConfig {
                    require_email_verification: false,
                    ..Default::default()
                }).await;
                let username = format!("{}{}", username, TEST_COUNTER.fetch_add(1, Ordering::SeqCst));

                let input = RegisterInput::new(username.clone(), format!("{}@example.com", username), password.clone())
                    .with_name("Prop", "Test");
                let registered = service.register_parent(input).await.unwrap();
                let (session, _) = service.login(&username, &password).await.unwrap();
                let validated = service.validate_session(&session.id).await.unwrap().unwrap();

                prop_assert_eq!(validated.id, registered.id);
                Ok(())
            });
            result?;
        }
    }
}
