//! Admin service
//!
//! User oversight for the admin dashboard: family and librarian listings,
//! librarian approval, account removal and headline counts.

use crate::db::repositories::UserRepository;
use crate::models::{SubscriptionTier, User, UserRole};
use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Role wrapped the way the dashboard reads it (`user.role.name`)
#[derive(Debug, Clone, Serialize)]
pub struct RoleName {
    pub name: UserRole,
}

/// One row of the admin user table
#[derive(Debug, Clone, Serialize)]
pub struct ManagedUser {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub role: RoleName,
    pub is_verified: bool,
    pub is_approved: bool,
    pub tier: Option<SubscriptionTier>,
    pub primary_parent_id: Option<i64>,
}

impl From<User> for ManagedUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            role: RoleName { name: user.role },
            is_verified: user.is_verified,
            is_approved: user.is_approved,
            tier: user.tier,
            primary_parent_id: user.primary_parent_id,
        }
    }
}

/// Parents and children with totals
#[derive(Debug, Clone, Serialize)]
pub struct FamilyOverview {
    pub parent_and_kid_users: Vec<ManagedUser>,
    pub total_users: usize,
    pub total_parents: usize,
    pub total_kids: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct UserCounts {
    pub admins: i64,
    pub parents: i64,
    pub children: i64,
    pub librarians: i64,
}

pub struct AdminService {
    user_repo: Arc<dyn UserRepository>,
}

impl AdminService {
    pub fn new(user_repo: Arc<dyn UserRepository>) -> Self {
        Self { user_repo }
    }

    pub async fn families(&self) -> Result<FamilyOverview, AdminError> {
        let parents = self
            .user_repo
            .list_by_role(UserRole::Parent)
            .await
            .context("Failed to list parents")?;
        let kids = self
            .user_repo
            .list_by_role(UserRole::Child)
            .await
            .context("Failed to list children")?;

        let total_parents = parents.len();
        let total_kids = kids.len();
        let mut users: Vec<ManagedUser> = parents.into_iter().chain(kids).map(ManagedUser::from).collect();
        users.sort_by_key(|u| u.id);

        Ok(FamilyOverview {
            total_users: users.len(),
            parent_and_kid_users: users,
            total_parents,
            total_kids,
        })
    }

    pub async fn librarians(&self) -> Result<Vec<ManagedUser>, AdminError> {
        let librarians = self
            .user_repo
            .list_by_role(UserRole::Librarian)
            .await
            .context("Failed to list librarians")?;
        Ok(librarians.into_iter().map(ManagedUser::from).collect())
    }

    pub async fn librarian(&self, id: i64) -> Result<User, AdminError> {
        self.with_role(id, UserRole::Librarian, "Librarian").await
    }

    pub async fn approve_librarian(&self, id: i64) -> Result<User, AdminError> {
        let mut librarian = self.librarian(id).await?;
        self.user_repo
            .set_approved(id, true)
            .await
            .context("Failed to approve librarian")?;
        librarian.is_approved = true;
        tracing::info!("Approved librarian '{}'", librarian.username);
        Ok(librarian)
    }

    /// Remove a librarian account; the media they added stays in the catalog
    pub async fn delete_librarian(&self, id: i64) -> Result<(), AdminError> {
        let librarian = self.librarian(id).await?;
        self.user_repo
            .delete(id)
            .await
            .context("Failed to delete librarian")?;
        tracing::info!("Deleted librarian '{}'", librarian.username);
        Ok(())
    }

    /// Remove a parent together with their children
    pub async fn delete_parent(&self, id: i64) -> Result<u64, AdminError> {
        let parent = self.with_role(id, UserRole::Parent, "Parent").await?;
        let removed = self
            .user_repo
            .delete_family(id)
            .await
            .context("Failed to delete parent")?;
        tracing::info!("Deleted parent '{}' and {} child account(s)", parent.username, removed.saturating_sub(1));
        Ok(removed)
    }

    pub async fn delete_child(&self, id: i64) -> Result<(), AdminError> {
        let child = self.with_role(id, UserRole::Child, "Child").await?;
        self.user_repo
            .delete(id)
            .await
            .context("Failed to delete child")?;
        tracing::info!("Deleted child '{}'", child.username);
        Ok(())
    }

    pub async fn user_counts(&self) -> Result<UserCounts, AdminError> {
        let count = |role| async move {
            self.user_repo
                .count_by_role(role)
                .await
                .with_context(|| format!("Failed to count {} users", role))
        };
        Ok(UserCounts {
            admins: count(UserRole::Admin).await?,
            parents: count(UserRole::Parent).await?,
            children: count(UserRole::Child).await?,
            librarians: count(UserRole::Librarian).await?,
        })
    }

    async fn with_role(&self, id: i64, role: UserRole, what: &'static str) -> Result<User, AdminError> {
        self.user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user")?
            .filter(|u| u.role == role)
            .ok_or(AdminError::NotFound(what))
    }
}
