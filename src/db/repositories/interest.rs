//! Interest repository
//!
//! The interest list is seeded by migrations. Child links are written by the
//! user repository together with the child row.

use crate::db::{on_pool, DynDatabasePool};
use crate::models::Interest;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait InterestRepository: Send + Sync {
    /// All interests ordered by id
    async fn list(&self) -> Result<Vec<Interest>>;

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Interest>>;

    /// Interests for several children at once, keyed by child id
    async fn list_for_users(&self, user_ids: &[i64]) -> Result<HashMap<i64, Vec<Interest>>>;
}

pub struct SqlxInterestRepository {
    pool: DynDatabasePool,
}

impl SqlxInterestRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn InterestRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl InterestRepository for SqlxInterestRepository {
    async fn list(&self) -> Result<Vec<Interest>> {
        on_pool!(self.pool, |p| {
            sqlx::query_as::<_, Interest>("SELECT id, name FROM interests ORDER BY id")
                .fetch_all(p)
                .await
        })
        .context("Failed to list interests")
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Interest>> {
        on_pool!(self.pool, |p| {
            sqlx::query_as::<_, Interest>(
                r#"
                SELECT i.id, i.name FROM interests i
                INNER JOIN child_interests ci ON ci.interest_id = i.id
                WHERE ci.user_id = ?
                ORDER BY i.id
                "#,
            )
            .bind(user_id)
            .fetch_all(p)
            .await
        })
        .context("Failed to list child interests")
    }

    async fn list_for_users(&self, user_ids: &[i64]) -> Result<HashMap<i64, Vec<Interest>>> {
        let mut grouped: HashMap<i64, Vec<Interest>> =
            user_ids.iter().map(|id| (*id, Vec::new())).collect();
        if user_ids.is_empty() {
            return Ok(grouped);
        }

        let placeholders = vec!["?"; user_ids.len()].join(", ");
        let sql = format!(
            "SELECT ci.user_id, i.id, i.name FROM interests i \
             INNER JOIN child_interests ci ON ci.interest_id = i.id \
             WHERE ci.user_id IN ({placeholders}) ORDER BY ci.user_id, i.id"
        );
        let rows: Vec<(i64, i64, String)> = on_pool!(self.pool, |p| {
            let mut query = sqlx::query_as::<_, (i64, i64, String)>(&sql);
            for id in user_ids {
                query = query.bind(*id);
            }
            query.fetch_all(p).await
        })
        .context("Failed to list interests for children")?;

        for (user_id, id, name) in rows {
            grouped.entry(user_id).or_default().push(Interest { id, name });
        }
        Ok(grouped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{ProfileInput, User, UserRole};

    async fn setup() -> (SqlxInterestRepository, SqlxUserRepository) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        (SqlxInterestRepository::new(pool.clone()), SqlxUserRepository::new(pool))
    }

    async fn child(users: &SqlxUserRepository, name: &str, interest_ids: &[i64]) -> User {
        users
            .create_child(
                &User::new(name.to_string(), "h".to_string(), UserRole::Child, ProfileInput::default()),
                interest_ids,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_list_seeded_interests() {
        let (repo, _) = setup().await;
        let all = repo.list().await.unwrap();
        assert_eq!(all.len(), 12);
        assert_eq!(all[5].name, "SCIENCE");
    }

    #[tokio::test]
    async fn test_child_interests_are_replaced() {
        let (repo, users) = setup().await;
        let kid = child(&users, "kid", &[1, 2, 3]).await;
        assert_eq!(repo.list_for_user(kid.id).await.unwrap().len(), 3);

        users.update_child(&kid, Some(&[7, 9, 10, 11][..])).await.unwrap();
        let names: Vec<String> = repo
            .list_for_user(kid.id)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["ANIMALS", "FANTASY", "TECHNOLOGY", "SPORTS"]);
    }

    #[tokio::test]
    async fn test_list_for_users_groups_by_child() {
        let (repo, users) = setup().await;
        let a = child(&users, "a", &[1, 2, 3]).await.id;
        let b = child(&users, "b", &[4, 5, 6]).await.id;
        let c = child(&users, "c", &[]).await.id;

        let grouped = repo.list_for_users(&[a, b, c]).await.unwrap();

        assert_eq!(grouped[&a].len(), 3);
        assert_eq!(grouped[&b][0].name, "ART");
        assert!(grouped[&c].is_empty());
    }
}
