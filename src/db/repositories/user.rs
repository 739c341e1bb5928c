//! User repository
//!
//! Database operations for accounts of every role.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use crate::db::{on_pool, DynDatabasePool, InsertedId};
use crate::models::{SubscriptionTier, User, UserRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::str::FromStr;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user and return it with its id
    async fn create(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Persist profile fields, role flags and password hash
    async fn update(&self, user: &User) -> Result<User>;

    /// Insert a child and link its interests; nothing is stored if either fails
    async fn create_child(&self, child: &User, interest_ids: &[i64]) -> Result<User>;

    /// Persist a child and, when given, replace its interests in the same
    /// transaction
    async fn update_child(&self, child: &User, interest_ids: Option<&[i64]>) -> Result<User>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Delete a parent together with all of their children
    async fn delete_family(&self, parent_id: i64) -> Result<u64>;

    /// Users with the given role, oldest first
    async fn list_by_role(&self, role: UserRole) -> Result<Vec<User>>;

    /// Children whose primary parent is `parent_id`
    async fn list_children(&self, parent_id: i64) -> Result<Vec<User>>;

    async fn count_by_role(&self, role: UserRole) -> Result<i64>;

    async fn set_verified(&self, id: i64) -> Result<()>;

    async fn set_approved(&self, id: i64, approved: bool) -> Result<()>;

    /// Set the tier of a parent and all of their children
    async fn set_family_tier(&self, parent_id: i64, tier: SubscriptionTier) -> Result<()>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }

    async fn fetch_one_where(&self, clause: &str, value: UserKey<'_>) -> Result<Option<User>> {
        let sql = format!("{SELECT_USER} WHERE {clause}");
        let row: Option<UserRow> = on_pool!(self.pool, |p| {
            let query = sqlx::query_as::<_, UserRow>(&sql);
            let query = match value {
                UserKey::Id(id) => query.bind(id),
                UserKey::Text(text) => query.bind(text),
            };
            query.fetch_optional(p).await
        })
        .with_context(|| format!("Failed to get user where {}", clause))?;

        row.map(User::try_from).transpose()
    }

    async fn fetch_all_where(&self, clause: &str, value: UserKey<'_>) -> Result<Vec<User>> {
        let sql = format!("{SELECT_USER} WHERE {clause} ORDER BY id");
        let rows: Vec<UserRow> = on_pool!(self.pool, |p| {
            let query = sqlx::query_as::<_, UserRow>(&sql);
            let query = match value {
                UserKey::Id(id) => query.bind(id),
                UserKey::Text(text) => query.bind(text),
            };
            query.fetch_all(p).await
        })
        .with_context(|| format!("Failed to list users where {}", clause))?;

        rows.into_iter().map(User::try_from).collect()
    }
}

#[derive(Clone, Copy)]
enum UserKey<'a> {
    Id(i64),
    Text(&'a str),
}

const SELECT_USER: &str = "SELECT id, username, email, password_hash, first_name, last_name, \
     country, gender, birthday, race, tier, role, is_verified, is_approved, \
     primary_parent_id, created_at, updated_at FROM users";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: Option<String>,
    password_hash: String,
    first_name: String,
    last_name: String,
    country: Option<String>,
    gender: Option<String>,
    birthday: Option<NaiveDate>,
    race: Option<String>,
    tier: Option<String>,
    role: String,
    is_verified: bool,
    is_approved: bool,
    primary_parent_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const LINK_INTEREST: &str = "INSERT INTO child_interests (user_id, interest_id) VALUES (?, ?)";

/// `INSERT` of every column of `$user`; the backend follows the executor
macro_rules! insert_user {
    ($user:expr, $tier:expr) => {
        sqlx::query(
            "INSERT INTO users (username, email, password_hash, first_name, last_name, country, \
             gender, birthday, race, tier, role, is_verified, is_approved, primary_parent_id, \
             created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&$user.username)
        .bind(&$user.email)
        .bind(&$user.password_hash)
        .bind(&$user.first_name)
        .bind(&$user.last_name)
        .bind(&$user.country)
        .bind(&$user.gender)
        .bind($user.birthday)
        .bind(&$user.race)
        .bind($tier)
        .bind($user.role.as_str())
        .bind($user.is_verified)
        .bind($user.is_approved)
        .bind($user.primary_parent_id)
        .bind($user.created_at)
        .bind($user.updated_at)
    };
}

macro_rules! update_user {
    ($user:expr, $tier:expr, $now:expr) => {
        sqlx::query(
            "UPDATE users SET email = ?, password_hash = ?, first_name = ?, last_name = ?, \
             country = ?, gender = ?, birthday = ?, race = ?, tier = ?, is_verified = ?, \
             is_approved = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&$user.email)
        .bind(&$user.password_hash)
        .bind(&$user.first_name)
        .bind(&$user.last_name)
        .bind(&$user.country)
        .bind(&$user.gender)
        .bind($user.birthday)
        .bind(&$user.race)
        .bind($tier)
        .bind($user.is_verified)
        .bind($user.is_approved)
        .bind($now)
        .bind($user.id)
    };
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            first_name: row.first_name,
            last_name: row.last_name,
            country: row.country,
            gender: row.gender,
            birthday: row.birthday,
            race: row.race,
            tier: row.tier.as_deref().map(SubscriptionTier::from_str).transpose()?,
            role: UserRole::from_str(&row.role)?,
            is_verified: row.is_verified,
            is_approved: row.is_approved,
            primary_parent_id: row.primary_parent_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let tier = user.tier.map(|t| t.as_str());
        let id = on_pool!(self.pool, |p| {
            insert_user!(user, tier)
                .execute(p)
                .await
                .map(|r| r.inserted_id())
        })
        .context("Failed to create user")?;

        let mut created = user.clone();
        created.id = id;
        Ok(created)
    }

    async fn create_child(&self, child: &User, interest_ids: &[i64]) -> Result<User> {
        let tier = child.tier.map(|t| t.as_str());
        let id = on_pool!(self.pool, |p| {
            let mut tx = p.begin().await.context("Failed to begin transaction")?;
            let id = insert_user!(child, tier)
                .execute(&mut *tx)
                .await
                .context("Failed to create child")?
                .inserted_id();
            for interest_id in interest_ids {
                sqlx::query(LINK_INTEREST)
                    .bind(id)
                    .bind(*interest_id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to link child interest")?;
            }
            tx.commit().await.context("Failed to commit child")?;
            Ok::<_, anyhow::Error>(id)
        })?;

        let mut created = child.clone();
        created.id = id;
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        self.fetch_one_where("id = ?", UserKey::Id(id)).await
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        self.fetch_one_where("username = ?", UserKey::Text(username)).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        self.fetch_one_where("LOWER(email) = LOWER(?)", UserKey::Text(email)).await
    }

    async fn update(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        let tier = user.tier.map(|t| t.as_str());
        on_pool!(self.pool, |p| {
            update_user!(user, tier, now).execute(p).await.map(|_| ())
        })
        .context("Failed to update user")?;

        let mut updated = user.clone();
        updated.updated_at = now;
        Ok(updated)
    }

    async fn update_child(&self, child: &User, interest_ids: Option<&[i64]>) -> Result<User> {
        let now = Utc::now();
        let tier = child.tier.map(|t| t.as_str());
        on_pool!(self.pool, |p| {
            let mut tx = p.begin().await.context("Failed to begin transaction")?;
            update_user!(child, tier, now)
                .execute(&mut *tx)
                .await
                .context("Failed to update child")?;
            if let Some(ids) = interest_ids {
                sqlx::query("DELETE FROM child_interests WHERE user_id = ?")
                    .bind(child.id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to clear child interests")?;
                for interest_id in ids {
                    sqlx::query(LINK_INTEREST)
                        .bind(child.id)
                        .bind(*interest_id)
                        .execute(&mut *tx)
                        .await
                        .context("Failed to link child interest")?;
                }
            }
            tx.commit().await.context("Failed to commit child update")?;
            Ok::<_, anyhow::Error>(())
        })?;

        let mut updated = child.clone();
        updated.updated_at = now;
        Ok(updated)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        on_pool!(self.pool, |p| {
            sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .map(|_| ())
        })
        .context("Failed to delete user")
    }

    async fn delete_family(&self, parent_id: i64) -> Result<u64> {
        on_pool!(self.pool, |p| {
            let mut tx = p.begin().await.context("Failed to begin transaction")?;
            let children = sqlx::query("DELETE FROM users WHERE primary_parent_id = ?")
                .bind(parent_id)
                .execute(&mut *tx)
                .await
                .context("Failed to delete children")?
                .rows_affected();
            let parent = sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(parent_id)
                .execute(&mut *tx)
                .await
                .context("Failed to delete parent")?
                .rows_affected();
            tx.commit().await.context("Failed to commit family delete")?;
            Ok(children + parent)
        })
    }

    async fn list_by_role(&self, role: UserRole) -> Result<Vec<User>> {
        self.fetch_all_where("role = ?", UserKey::Text(role.as_str())).await
    }

    async fn list_children(&self, parent_id: i64) -> Result<Vec<User>> {
        self.fetch_all_where("primary_parent_id = ?", UserKey::Id(parent_id)).await
    }

    async fn count_by_role(&self, role: UserRole) -> Result<i64> {
        let (count,): (i64,) = on_pool!(self.pool, |p| {
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = ?")
                .bind(role.as_str())
                .fetch_one(p)
                .await
        })
        .context("Failed to count users")?;
        Ok(count)
    }

    async fn set_verified(&self, id: i64) -> Result<()> {
        on_pool!(self.pool, |p| {
            sqlx::query("UPDATE users SET is_verified = ?, updated_at = ? WHERE id = ?")
                .bind(true)
                .bind(Utc::now())
                .bind(id)
                .execute(p)
                .await
                .map(|_| ())
        })
        .context("Failed to mark user verified")
    }

    async fn set_approved(&self, id: i64, approved: bool) -> Result<()> {
        on_pool!(self.pool, |p| {
            sqlx::query("UPDATE users SET is_approved = ?, updated_at = ? WHERE id = ?")
                .bind(approved)
                .bind(Utc::now())
                .bind(id)
                .execute(p)
                .await
                .map(|_| ())
        })
        .context("Failed to update approval")
    }

    async fn set_family_tier(&self, parent_id: i64, tier: SubscriptionTier) -> Result<()> {
        on_pool!(self.pool, |p| {
            sqlx::query(
                "UPDATE users SET tier = ?, updated_at = ? WHERE id = ? OR primary_parent_id = ?",
            )
            .bind(tier.as_str())
            .bind(Utc::now())
            .bind(parent_id)
            .bind(parent_id)
            .execute(p)
            .await
            .map(|_| ())
        })
        .context("Failed to update subscription tier")
    }
}
