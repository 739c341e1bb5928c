//! Family service
//!
//! Parents manage child accounts: creation, interests, updates, deletion
//! and the subscription tier the whole family shares.

use crate::db::repositories::{InterestRepository, UserRepository};
use crate::models::{
    Interest, ProfileInput, SubscriptionTier, UpdateProfileInput, User, UserRole,
    MIN_CHILD_INTERESTS,
};
use crate::services::password::{check_password_policy, hash_password};
use crate::services::user::{validate_username, UserServiceError};
use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum FamilyError {
    #[error("{0}")]
    ValidationError(String),

    #[error("{0}")]
    UserExists(String),

    #[error("Child not found")]
    ChildNotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<UserServiceError> for FamilyError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::ValidationError(msg) => FamilyError::ValidationError(msg),
            UserServiceError::UserExists(msg) => FamilyError::UserExists(msg),
            UserServiceError::InternalError(e) => FamilyError::InternalError(e),
            other => FamilyError::InternalError(anyhow::anyhow!(other.to_string())),
        }
    }
}

/// Payload of `POST /parent/create-child`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateChildInput {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(flatten)]
    pub profile: ProfileInput,
    /// Interest names, e.g. `["SCIENCE", "ANIMALS", "ART"]`
    #[serde(default)]
    pub interests: Vec<String>,
}

/// Payload of `PATCH /parent/update-child/{child_id}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateChildInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub country: Option<String>,
    pub gender: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub race: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
    pub interests: Option<Vec<String>>,
}

/// A child account together with its interests
#[derive(Debug, Clone, Serialize)]
pub struct ChildProfile {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub country: Option<String>,
    pub gender: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub race: Option<String>,
    pub tier: Option<SubscriptionTier>,
    pub primary_parent_id: Option<i64>,
    pub interests: Vec<Interest>,
}

impl ChildProfile {
    fn new(child: User, interests: Vec<Interest>) -> Self {
        Self {
            id: child.id,
            username: child.username,
            first_name: child.first_name,
            last_name: child.last_name,
            country: child.country,
            gender: child.gender,
            birthday: child.birthday,
            race: child.race,
            tier: child.tier,
            primary_parent_id: child.primary_parent_id,
            interests,
        }
    }
}

pub struct FamilyService {
    user_repo: Arc<dyn UserRepository>,
    interest_repo: Arc<dyn InterestRepository>,
}

impl FamilyService {
    pub fn new(user_repo: Arc<dyn UserRepository>, interest_repo: Arc<dyn InterestRepository>) -> Self {
        Self {
            user_repo,
            interest_repo,
        }
    }

    pub async fn list_interests(&self) -> Result<Vec<Interest>, FamilyError> {
        let interests = self
            .interest_repo
            .list()
            .await
            .context("Failed to list interests")?;
        Ok(interests)
    }

    /// Create a child account linked to `parent`
    pub async fn create_child(
        &self,
        parent: &User,
        input: CreateChildInput,
    ) -> Result<ChildProfile, FamilyError> {
        ensure_parent(parent)?;
        validate_username(&input.username)?;
        check_passwords(&input.password, Some(&input.confirm_password))?;

        if input.profile.first_name.trim().is_empty() || input.profile.last_name.trim().is_empty() {
            return Err(FamilyError::ValidationError(
                "First and last name are required".to_string(),
            ));
        }

        let interest_ids = self.resolve_interests(&input.interests).await?;

        let username = input.username.trim().to_string();
        if self
            .user_repo
            .get_by_username(&username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(FamilyError::UserExists(
                "Username already registered.".to_string(),
            ));
        }

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let mut child = User::new(username, password_hash, UserRole::Child, input.profile);
        child.tier = parent.tier;
        child.is_verified = true;
        child.primary_parent_id = Some(parent.id);

        let child = self
            .user_repo
            .create_child(&child, &interest_ids)
            .await
            .context("Failed to create child")?;

        tracing::info!("Parent '{}' created child '{}'", parent.username, child.username);
        self.profile_of(child).await
    }

    /// Children of `parent` with their interests, oldest account first
    pub async fn my_children(&self, parent: &User) -> Result<Vec<ChildProfile>, FamilyError> {
        ensure_parent(parent)?;

        let children = self
            .user_repo
            .list_children(parent.id)
            .await
            .context("Failed to list children")?;
        let ids: Vec<i64> = children.iter().map(|c| c.id).collect();
        let mut interests = self
            .interest_repo
            .list_for_users(&ids)
            .await
            .context("Failed to list interests")?;

        Ok(children
            .into_iter()
            .map(|child| {
                let own = interests.remove(&child.id).unwrap_or_default();
                ChildProfile::new(child, own)
            })
            .collect())
    }

    pub async fn update_child(
        &self,
        parent: &User,
        child_id: i64,
        input: UpdateChildInput,
    ) -> Result<ChildProfile, FamilyError> {
        let mut child = self.owned_child(parent, child_id).await?;

        for (field, value) in [("First name", &input.first_name), ("Last name", &input.last_name)] {
            if matches!(value, Some(v) if v.trim().is_empty()) {
                return Err(FamilyError::ValidationError(format!("{} cannot be empty", field)));
            }
        }

        let interest_ids = match input.interests {
            Some(ref names) => Some(self.resolve_interests(names).await?),
            None => None,
        };

        if let Some(ref password) = input.password {
            check_passwords(password, input.confirm_password.as_deref())?;
            child.password_hash = hash_password(password).context("Failed to hash password")?;
        }

        child.apply_profile(&UpdateProfileInput {
            first_name: input.first_name,
            last_name: input.last_name,
            email: None,
            country: input.country,
            gender: input.gender,
            birthday: input.birthday,
            race: input.race,
        });

        let child = self
            .user_repo
            .update_child(&child, interest_ids.as_deref())
            .await
            .context("Failed to update child")?;

        self.profile_of(child).await
    }

    pub async fn delete_child(&self, parent: &User, child_id: i64) -> Result<(), FamilyError> {
        let child = self.owned_child(parent, child_id).await?;
        self.user_repo
            .delete(child.id)
            .await
            .context("Failed to delete child")?;
        tracing::info!("Parent '{}' deleted child '{}'", parent.username, child.username);
        Ok(())
    }

    /// Set the family's tier; children always follow their parent
    pub async fn set_subscription(
        &self,
        parent: &User,
        tier: SubscriptionTier,
    ) -> Result<User, FamilyError> {
        ensure_parent(parent)?;
        self.user_repo
            .set_family_tier(parent.id, tier)
            .await
            .context("Failed to update subscription")?;

        let mut updated = parent.clone();
        updated.tier = Some(tier);
        Ok(updated)
    }

    async fn owned_child(&self, parent: &User, child_id: i64) -> Result<User, FamilyError> {
        ensure_parent(parent)?;
        let child = self
            .user_repo
            .get_by_id(child_id)
            .await
            .context("Failed to get child")?
            .filter(User::is_child)
            .ok_or(FamilyError::ChildNotFound)?;

        if !parent.is_parent_of(&child) {
            return Err(FamilyError::Forbidden(
                "This child does not belong to you".to_string(),
            ));
        }
        Ok(child)
    }

    async fn profile_of(&self, child: User) -> Result<ChildProfile, FamilyError> {
        let interests = self
            .interest_repo
            .list_for_user(child.id)
            .await
            .context("Failed to list interests")?;
        Ok(ChildProfile::new(child, interests))
    }

    /// Map interest names to ids, rejecting unknown names and short lists
    async fn resolve_interests(&self, names: &[String]) -> Result<Vec<i64>, FamilyError> {
        let known = self.list_interests().await?;

        let mut ids = Vec::new();
        for name in names {
            let interest = known
                .iter()
                .find(|i| i.name.eq_ignore_ascii_case(name.trim()))
                .ok_or_else(|| FamilyError::ValidationError(format!("Unknown interest: {}", name)))?;
            if !ids.contains(&interest.id) {
                ids.push(interest.id);
            }
        }

        if ids.len() < MIN_CHILD_INTERESTS {
            return Err(FamilyError::ValidationError(format!(
                "Please choose at least {} interests",
                MIN_CHILD_INTERESTS
            )));
        }
        Ok(ids)
    }
}

fn ensure_parent(user: &User) -> Result<(), FamilyError> {
    if !user.is_parent() {
        return Err(FamilyError::Forbidden(
            "Only parents can manage child accounts".to_string(),
        ));
    }
    Ok(())
}

fn check_passwords(password: &str, confirm: Option<&str>) -> Result<(), FamilyError> {
    check_password_policy(password).map_err(FamilyError::ValidationError)?;
    if confirm != Some(password) {
        return Err(FamilyError::ValidationError(
            "Passwords do not match".to_string(),
        ));
    }
    Ok(())
}
