//! User model
//!
//! One table holds all four roles. Children carry a `primary_parent_id` and
//! no email; librarians need admin approval before they can curate media.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Email address (unique). Children have none.
    pub email: Option<String>,
    /// Password hash (argon2)
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub country: Option<String>,
    pub gender: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub race: Option<String>,
    /// Subscription tier, parents and children only
    pub tier: Option<SubscriptionTier>,
    pub role: UserRole,
    /// Email verified
    pub is_verified: bool,
    /// Approved by an admin; only ever false for librarians
    pub is_approved: bool,
    pub primary_parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new, unsaved user.
    ///
    /// The password must already be hashed, see `services::password::hash_password()`.
    pub fn new(username: String, password_hash: String, role: UserRole, profile: ProfileInput) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            username,
            email: None,
            password_hash,
            first_name: profile.first_name,
            last_name: profile.last_name,
            country: profile.country,
            gender: profile.gender,
            birthday: profile.birthday,
            race: profile.race,
            tier: match role {
                UserRole::Parent | UserRole::Child => Some(SubscriptionTier::Free),
                UserRole::Admin | UserRole::Librarian => None,
            },
            role,
            is_verified: false,
            is_approved: role != UserRole::Librarian,
            primary_parent_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn is_parent(&self) -> bool {
        self.role == UserRole::Parent
    }

    pub fn is_child(&self) -> bool {
        self.role == UserRole::Child
    }

    /// An approved librarian may curate the catalog
    pub fn can_curate(&self) -> bool {
        self.role == UserRole::Librarian && self.is_approved
    }

    /// Whether `child` belongs to this parent
    pub fn is_parent_of(&self, child: &User) -> bool {
        child.is_child() && child.primary_parent_id == Some(self.id)
    }

    /// Age in whole years on `today`, if the birthday is known
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        let birthday = self.birthday?;
        let mut years = today.year() - birthday.year();
        if (today.month(), today.day()) < (birthday.month(), birthday.day()) {
            years -= 1;
        }
        u32::try_from(years).ok()
    }

    /// Apply a partial profile update
    pub fn apply_profile(&mut self, update: &UpdateProfileInput) {
        if let Some(ref v) = update.first_name {
            self.first_name = v.clone();
        }
        if let Some(ref v) = update.last_name {
            self.last_name = v.clone();
        }
        if let Some(ref v) = update.country {
            self.country = Some(v.clone());
        }
        if let Some(ref v) = update.gender {
            self.gender = Some(v.clone());
        }
        if let Some(v) = update.birthday {
            self.birthday = Some(v);
        }
        if let Some(ref v) = update.race {
            self.race = Some(v.clone());
        }
    }
}

/// User role, stored and serialized in upper case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    Admin,
    Parent,
    Child,
    Librarian,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::Parent => "PARENT",
            UserRole::Child => "CHILD",
            UserRole::Librarian => "LIBRARIAN",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ADMIN" => Ok(UserRole::Admin),
            "PARENT" => Ok(UserRole::Parent),
            "CHILD" => Ok(UserRole::Child),
            "LIBRARIAN" => Ok(UserRole::Librarian),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// Subscription tier shared by a parent and their children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubscriptionTier {
    Free,
    Pro,
}

impl SubscriptionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "FREE",
            SubscriptionTier::Pro => "PRO",
        }
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionTier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "FREE" => Ok(SubscriptionTier::Free),
            "PRO" => Ok(SubscriptionTier::Pro),
            _ => Err(anyhow::anyhow!("Invalid subscription tier: {}", s)),
        }
    }
}

/// Personal details collected at registration and child creation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileInput {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub birthday: Option<NaiveDate>,
    #[serde(default)]
    pub race: Option<String>,
}

/// Partial profile update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
    pub gender: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub race: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> ProfileInput {
        ProfileInput {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            birthday: NaiveDate::from_ymd_opt(2017, 6, 15),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_parent_defaults() {
        let user = User::new("ada".to_string(), "hash".to_string(), UserRole::Parent, profile());

        assert_eq!(user.id, 0);
        assert_eq!(user.tier, Some(SubscriptionTier::Free));
        assert!(!user.is_verified);
        assert!(user.is_approved);
        assert!(user.email.is_none());
    }

    #[test]
    fn test_new_librarian_needs_approval() {
        let user = User::new("lib".to_string(), "hash".to_string(), UserRole::Librarian, profile());

        assert!(user.tier.is_none());
        assert!(!user.is_approved);
        assert!(!user.can_curate());
    }

    #[test]
    fn test_age_on_respects_birthday_not_yet_reached() {
        let user = User::new("kid".to_string(), "hash".to_string(), UserRole::Child, profile());

        let before = NaiveDate::from_ymd_opt(2025, 6, 14).unwrap();
        let on = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        assert_eq!(user.age_on(before), Some(7));
        assert_eq!(user.age_on(on), Some(8));
    }

    #[test]
    fn test_age_unknown_without_birthday() {
        let mut user = User::new("kid".to_string(), "hash".to_string(), UserRole::Child, profile());
        user.birthday = None;
        assert_eq!(user.age_on(Utc::now().date_naive()), None);
    }

    #[test]
    fn test_is_parent_of() {
        let mut parent = User::new("mum".to_string(), "h".to_string(), UserRole::Parent, profile());
        parent.id = 1;
        let mut child = User::new("kid".to_string(), "h".to_string(), UserRole::Child, profile());
        child.primary_parent_id = Some(1);
        let mut other = child.clone();
        other.primary_parent_id = Some(2);

        assert!(parent.is_parent_of(&child));
        assert!(!parent.is_parent_of(&other));
    }

    #[test]
    fn test_apply_profile_only_touches_given_fields() {
        let mut user = User::new("ada".to_string(), "hash".to_string(), UserRole::Parent, profile());
        user.apply_profile(&UpdateProfileInput {
            country: Some("UK".to_string()),
            ..Default::default()
        });

        assert_eq!(user.country.as_deref(), Some("UK"));
        assert_eq!(user.first_name, "Ada");
    }

    #[test]
    fn test_role_round_trips_through_strings() {
        assert_eq!(UserRole::from_str("parent").unwrap(), UserRole::Parent);
        assert_eq!(UserRole::Librarian.to_string(), "LIBRARIAN");
        assert!(UserRole::from_str("editor").is_err());
        assert_eq!(
            serde_json::to_string(&UserRole::Child).unwrap(),
            "\"CHILD\""
        );
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new("ada".to_string(), "secret-hash".to_string(), UserRole::Parent, profile());
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(!json.contains("password_hash"));
    }
}
