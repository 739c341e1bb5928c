//! Session and email verification models

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Bearer token issued by `/auth/token`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session ID (the token itself)
    pub id: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Create a session with a fresh random token
    pub fn issue(user_id: i64, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + ttl,
            created_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// One-time token mailed to a new parent or librarian
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailVerification {
    pub token: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

impl EmailVerification {
    pub fn issue(user_id: i64, ttl: Duration) -> Self {
        Self {
            token: uuid::Uuid::new_v4().simple().to_string(),
            user_id,
            expires_at: Utc::now() + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_session() {
        let session = Session::issue(7, Duration::minutes(30));
        assert_eq!(session.user_id, 7);
        assert!(!session.is_expired());
        assert!(uuid::Uuid::parse_str(&session.id).is_ok());
    }

    #[test]
    fn test_expired_verification() {
        let token = EmailVerification::issue(1, Duration::minutes(-1));
        assert!(token.is_expired());
        assert_eq!(token.token.len(), 32);
    }
}
