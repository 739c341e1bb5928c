//! Chat history repository

use crate::db::{on_pool, DynDatabasePool, InsertedId};
use crate::models::{ChatMessage, NewChatMessage, RecommendedRef};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn append(&self, message: &NewChatMessage) -> Result<ChatMessage>;

    /// Turns of one session owned by `user_id`, oldest first
    async fn history(&self, session_id: &str, user_id: i64) -> Result<Vec<ChatMessage>>;
}

pub struct SqlxChatRepository {
    pool: DynDatabasePool,
}

impl SqlxChatRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ChatRepository> {
        Arc::new(Self::new(pool))
    }
}

#[derive(sqlx::FromRow)]
struct ChatRow {
    id: i64,
    session_id: String,
    user_id: i64,
    message: String,
    reply: String,
    items: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ChatRow> for ChatMessage {
    type Error = anyhow::Error;

    fn try_from(row: ChatRow) -> Result<Self> {
        let items: Vec<RecommendedRef> =
            serde_json::from_str(&row.items).context("Corrupt chat item list")?;
        Ok(ChatMessage {
            id: row.id,
            session_id: row.session_id,
            user_id: row.user_id,
            message: row.message,
            reply: row.reply,
            items,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl ChatRepository for SqlxChatRepository {
    async fn append(&self, message: &NewChatMessage) -> Result<ChatMessage> {
        let items = serde_json::to_string(&message.items)?;
        let now = Utc::now();
        let id = on_pool!(self.pool, |p| {
            sqlx::query(
                "INSERT INTO chat_messages (session_id, user_id, message, reply, items, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&message.session_id)
            .bind(message.user_id)
            .bind(&message.message)
            .bind(&message.reply)
            .bind(&items)
            .bind(now)
            .execute(p)
            .await
            .map(|r| r.inserted_id())
        })
        .context("Failed to store chat message")?;

        Ok(ChatMessage {
            id,
            session_id: message.session_id.clone(),
            user_id: message.user_id,
            message: message.message.clone(),
            reply: message.reply.clone(),
            items: message.items.clone(),
            created_at: now,
        })
    }

    async fn history(&self, session_id: &str, user_id: i64) -> Result<Vec<ChatMessage>> {
        let rows: Vec<ChatRow> = on_pool!(self.pool, |p| {
            sqlx::query_as::<_, ChatRow>(
                "SELECT id, session_id, user_id, message, reply, items, created_at \
                 FROM chat_messages WHERE session_id = ? AND user_id = ? ORDER BY id",
            )
            .bind(session_id)
            .bind(user_id)
            .fetch_all(p)
            .await
        })
        .context("Failed to load chat history")?;

        rows.into_iter().map(ChatMessage::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{MediaKind, ProfileInput, User, UserRole};

    #[tokio::test]
    async fn test_append_and_history_scoped_to_user() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let users = SqlxUserRepository::new(pool.clone());
        let kid = users
            .create(&User::new("kid".to_string(), "h".to_string(), UserRole::Child, ProfileInput::default()))
            .await
            .unwrap();
        let other = users
            .create(&User::new("other".to_string(), "h".to_string(), UserRole::Child, ProfileInput::default()))
            .await
            .unwrap();
        let repo = SqlxChatRepository::new(pool);

        for (user, text) in [(kid.id, "hi"), (kid.id, "dinosaurs"), (other.id, "hello")] {
            repo.append(&NewChatMessage {
                session_id: "s1".to_string(),
                user_id: user,
                message: text.to_string(),
                reply: "ok".to_string(),
                items: vec![RecommendedRef { kind: MediaKind::Book, id: 1, title: "T".to_string() }],
            })
            .await
            .unwrap();
        }

        let history = repo.history("s1", kid.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].message, "hi");
        assert_eq!(history[1].items[0].kind, MediaKind::Book);
        assert!(repo.history("s2", kid.id).await.unwrap().is_empty());
    }
}
