//! Chat session tracker
//!
//! Keeps per-conversation state in memory: recent turns, the last topic
//! and which items were already shown. Sessions expire after a period of
//! inactivity.
//!
//! A resolved session is held behind its own lock until the guard is
//! dropped, so exchanges on one conversation run one after another.

use crate::models::{MediaKind, RecommendedRef};
use moka::future::Cache;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub message: String,
    pub reply: String,
}

#[derive(Debug, Clone)]
pub struct ChatSession {
    pub id: String,
    pub user_id: i64,
    pub turns: VecDeque<Turn>,
    /// Terms of the last search, reused by "more"
    pub last_terms: Vec<String>,
    pub last_kind: Option<MediaKind>,
    /// Items shown so far, most recent last
    pub shown: Vec<RecommendedRef>,
}

impl ChatSession {
    fn new(user_id: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            turns: VecDeque::new(),
            last_terms: Vec::new(),
            last_kind: None,
            shown: Vec::new(),
        }
    }

    pub fn shown_keys(&self) -> HashSet<(MediaKind, i64)> {
        self.shown.iter().map(|r| (r.kind, r.id)).collect()
    }

    /// A previously shown item whose title matches, most recent first
    pub fn find_shown(&self, title: &str) -> Option<&RecommendedRef> {
        self.shown
            .iter()
            .rev()
            .find(|r| r.title.trim().eq_ignore_ascii_case(title.trim()))
    }

    /// Record a turn, keeping at most `limit` of them
    pub fn push_turn(&mut self, turn: Turn, limit: usize) {
        self.turns.push_back(turn);
        while self.turns.len() > limit.max(1) {
            self.turns.pop_front();
        }
    }

    pub fn remember_shown(&mut self, items: impl IntoIterator<Item = RecommendedRef>) {
        for item in items {
            if !self.shown.iter().any(|r| r.kind == item.kind && r.id == item.id) {
                self.shown.push(item);
            }
        }
    }
}

#[derive(Clone)]
struct Entry {
    user_id: i64,
    session: Arc<Mutex<ChatSession>>,
}

pub struct ChatSessionTracker {
    sessions: Cache<String, Entry>,
}

impl ChatSessionTracker {
    pub fn new(idle: Duration) -> Self {
        let sessions = Cache::builder()
            .max_capacity(100_000)
            .time_to_idle(idle)
            .build();
        Self { sessions }
    }

    /// Lock the caller's session for `id`, or start a fresh one.
    ///
    /// Unknown, expired and foreign ids all start a new session. Changes
    /// made through the guard are kept.
    pub async fn resolve(&self, user_id: i64, id: Option<&str>) -> OwnedMutexGuard<ChatSession> {
        if let Some(id) = id.map(str::trim).filter(|id| !id.is_empty()) {
            match self.sessions.get(id).await {
                Some(entry) if entry.user_id == user_id => return entry.session.lock_owned().await,
                Some(_) => tracing::debug!("Chat session {} belongs to another user", id),
                None => tracing::debug!("Chat session {} unknown or expired", id),
            }
        }

        let session = ChatSession::new(user_id);
        let id = session.id.clone();
        let entry = Entry {
            user_id,
            session: Arc::new(Mutex::new(session)),
        };
        let guard = entry.session.clone().lock_owned().await;
        self.sessions.insert(id, entry).await;
        guard
    }

    pub async fn count(&self) -> u64 {
        self.sessions.run_pending_tasks().await;
        self.sessions.entry_count()
    }
}
