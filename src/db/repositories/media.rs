//! Media repository
//!
//! Books and videos live in separate tables with the same layout. Every
//! operation takes a `MediaKind` to pick the table and the creator column.

use crate::db::{on_pool, DynDatabasePool, InsertedId};
use crate::models::{MediaItem, MediaKind, MediaQuery, MediaStatus, NewMedia, Paged};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::str::FromStr;
use std::sync::Arc;

/// Media repository trait
#[async_trait]
pub trait MediaRepository: Send + Sync {
    /// Insert a new entry credited to `source`
    async fn create(&self, kind: MediaKind, input: &NewMedia, source: &str) -> Result<MediaItem>;

    async fn get(&self, kind: MediaKind, id: i64) -> Result<Option<MediaItem>>;

    /// Persist every editable field of `item`
    async fn update(&self, item: &MediaItem) -> Result<()>;

    /// Returns false when nothing was deleted
    async fn delete(&self, kind: MediaKind, id: i64) -> Result<bool>;

    async fn set_status(&self, kind: MediaKind, id: i64, status: MediaStatus) -> Result<()>;

    /// Paginated listing filtered by title substring and source, newest first
    async fn search(&self, kind: MediaKind, query: &MediaQuery) -> Result<Paged<MediaItem>>;

    /// Entry using `link` in either table
    async fn find_by_link(&self, link: &str) -> Result<Option<MediaItem>>;

    /// Distinct non-empty sources across both tables, sorted
    async fn sources(&self) -> Result<Vec<String>>;

    /// Available entries whose title, creator, category or description
    /// contains any of `terms`, best rated first, one page at a time
    async fn find_candidates(
        &self,
        kind: MediaKind,
        terms: &[String],
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MediaItem>>;

    /// Highest rated available entries, one page at a time
    async fn top_rated(&self, kind: MediaKind, limit: i64, offset: i64) -> Result<Vec<MediaItem>>;

    async fn count(&self, kind: MediaKind) -> Result<i64>;
}

/// SQLx-based media repository implementation
pub struct SqlxMediaRepository {
    pool: DynDatabasePool,
}

impl SqlxMediaRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn MediaRepository> {
        Arc::new(Self::new(pool))
    }

    async fn fetch_all(&self, kind: MediaKind, sql: &str, binds: &[Bind]) -> Result<Vec<MediaItem>> {
        let rows: Vec<MediaRow> = on_pool!(self.pool, |p| {
            let mut query = sqlx::query_as::<_, MediaRow>(sql);
            for bind in binds {
                query = match bind {
                    Bind::Text(s) => query.bind(s.as_str()),
                    Bind::Int(n) => query.bind(*n),
                };
            }
            query.fetch_all(p).await
        })
        .with_context(|| format!("Failed to list {}s", kind))?;

        rows.into_iter().map(|row| row.into_item(kind)).collect()
    }
}

enum Bind {
    Text(String),
    Int(i64),
}

fn select_media(kind: MediaKind) -> String {
    format!(
        "SELECT id, title, {creator} AS creator, link, age_group, category, description, \
         rating, source, status, created_at FROM {table}",
        creator = kind.creator_column(),
        table = kind.table(),
    )
}

/// Lower-case `LIKE` pattern matching `text` anywhere, with `!` as escape
fn contains_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '!') {
            pattern.push('!');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[derive(sqlx::FromRow)]
struct MediaRow {
    id: i64,
    title: String,
    creator: String,
    link: String,
    age_group: String,
    category: String,
    description: String,
    rating: f64,
    source: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl MediaRow {
    fn into_item(self, kind: MediaKind) -> Result<MediaItem> {
        Ok(MediaItem {
            kind,
            id: self.id,
            title: self.title,
            creator: self.creator,
            link: self.link,
            age_group: self.age_group,
            category: self.category,
            description: self.description,
            rating: self.rating,
            source: self.source,
            status: MediaStatus::from_str(&self.status)?,
            created_at: self.created_at,
        })
    }
}

#[async_trait]
impl MediaRepository for SqlxMediaRepository {
    async fn create(&self, kind: MediaKind, input: &NewMedia, source: &str) -> Result<MediaItem> {
        let sql = format!(
            "INSERT INTO {table} (title, {creator}, link, age_group, category, description, \
             rating, source, status, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            table = kind.table(),
            creator = kind.creator_column(),
        );
        let now = Utc::now();
        let id = on_pool!(self.pool, |p| {
            sqlx::query(&sql)
                .bind(&input.title)
                .bind(&input.creator)
                .bind(&input.link)
                .bind(&input.age_group)
                .bind(&input.category)
                .bind(&input.description)
                .bind(input.rating)
                .bind(source)
                .bind(MediaStatus::Available.as_str())
                .bind(now)
                .execute(p)
                .await
                .map(|r| r.inserted_id())
        })
        .with_context(|| format!("Failed to create {}", kind))?;

        Ok(MediaItem {
            kind,
            id,
            title: input.title.clone(),
            creator: input.creator.clone(),
            link: input.link.clone(),
            age_group: input.age_group.clone(),
            category: input.category.clone(),
            description: input.description.clone(),
            rating: input.rating,
            source: source.to_string(),
            status: MediaStatus::Available,
            created_at: now,
        })
    }

    async fn get(&self, kind: MediaKind, id: i64) -> Result<Option<MediaItem>> {
        let sql = format!("{} WHERE id = ?", select_media(kind));
        Ok(self.fetch_all(kind, &sql, &[Bind::Int(id)]).await?.pop())
    }

    async fn update(&self, item: &MediaItem) -> Result<()> {
        let sql = format!(
            "UPDATE {table} SET title = ?, {creator} = ?, link = ?, age_group = ?, category = ?, \
             description = ?, rating = ? WHERE id = ?",
            table = item.kind.table(),
            creator = item.kind.creator_column(),
        );
        on_pool!(self.pool, |p| {
            sqlx::query(&sql)
                .bind(&item.title)
                .bind(&item.creator)
                .bind(&item.link)
                .bind(&item.age_group)
                .bind(&item.category)
                .bind(&item.description)
                .bind(item.rating)
                .bind(item.id)
                .execute(p)
                .await
                .map(|_| ())
        })
        .with_context(|| format!("Failed to update {}", item.kind))
    }

    async fn delete(&self, kind: MediaKind, id: i64) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE id = ?", kind.table());
        let affected = on_pool!(self.pool, |p| {
            sqlx::query(&sql)
                .bind(id)
                .execute(p)
                .await
                .map(|r| r.rows_affected())
        })
        .with_context(|| format!("Failed to delete {}", kind))?;
        Ok(affected > 0)
    }

    async fn set_status(&self, kind: MediaKind, id: i64, status: MediaStatus) -> Result<()> {
        let sql = format!("UPDATE {} SET status = ? WHERE id = ?", kind.table());
        on_pool!(self.pool, |p| {
            sqlx::query(&sql)
                .bind(status.as_str())
                .bind(id)
                .execute(p)
                .await
                .map(|_| ())
        })
        .with_context(|| format!("Failed to set {} status", kind))
    }

    async fn search(&self, kind: MediaKind, query: &MediaQuery) -> Result<Paged<MediaItem>> {
        let mut clauses = Vec::new();
        let mut binds = Vec::new();
        if let Some(search) = query.search_text() {
            clauses.push("LOWER(title) LIKE ? ESCAPE '!'");
            binds.push(Bind::Text(contains_pattern(search)));
        }
        if let Some(source) = query.source_filter() {
            clauses.push("source = ?");
            binds.push(Bind::Text(source.to_string()));
        }
        let filter = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM {}{}", kind.table(), filter);
        let (total,): (i64,) = on_pool!(self.pool, |p| {
            let mut q = sqlx::query_as::<_, (i64,)>(&count_sql);
            for bind in &binds {
                q = match bind {
                    Bind::Text(s) => q.bind(s.as_str()),
                    Bind::Int(n) => q.bind(*n),
                };
            }
            q.fetch_one(p).await
        })
        .with_context(|| format!("Failed to count {}s", kind))?;

        let list_sql = format!("{}{} ORDER BY id DESC LIMIT ? OFFSET ?", select_media(kind), filter);
        binds.push(Bind::Int(query.size()));
        binds.push(Bind::Int(query.offset()));
        let items = self.fetch_all(kind, &list_sql, &binds).await?;

        Ok(Paged { total, items })
    }

    async fn find_by_link(&self, link: &str) -> Result<Option<MediaItem>> {
        for kind in MediaKind::ALL {
            let sql = format!("{} WHERE link = ?", select_media(kind));
            if let Some(item) = self
                .fetch_all(kind, &sql, &[Bind::Text(link.to_string())])
                .await?
                .pop()
            {
                return Ok(Some(item));
            }
        }
        Ok(None)
    }

    async fn sources(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = on_pool!(self.pool, |p| {
            sqlx::query_as(
                "SELECT source FROM books WHERE source <> '' \
                 UNION SELECT source FROM videos WHERE source <> '' ORDER BY source",
            )
            .fetch_all(p)
            .await
        })
        .context("Failed to list media sources")?;
        Ok(rows.into_iter().map(|(s,)| s).collect())
    }

    async fn find_candidates(
        &self,
        kind: MediaKind,
        terms: &[String],
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MediaItem>> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let creator = kind.creator_column();
        let mut matches = Vec::with_capacity(terms.len());
        let mut binds = Vec::with_capacity(terms.len() * 4 + 2);
        for term in terms {
            matches.push(format!(
                "LOWER(title) LIKE ? ESCAPE '!' OR LOWER(category) LIKE ? ESCAPE '!' \
                 OR LOWER({creator}) LIKE ? ESCAPE '!' OR LOWER(description) LIKE ? ESCAPE '!'"
            ));
            let pattern = contains_pattern(term);
            for _ in 0..4 {
                binds.push(Bind::Text(pattern.clone()));
            }
        }
        binds.push(Bind::Text(MediaStatus::Available.as_str().to_string()));
        binds.push(Bind::Int(limit));
        binds.push(Bind::Int(offset));

        let sql = format!(
            "{} WHERE ({}) AND status = ? ORDER BY rating DESC, id DESC LIMIT ? OFFSET ?",
            select_media(kind),
            matches.join(" OR "),
        );
        self.fetch_all(kind, &sql, &binds).await
    }

    async fn top_rated(&self, kind: MediaKind, limit: i64, offset: i64) -> Result<Vec<MediaItem>> {
        let sql = format!(
            "{} WHERE status = ? ORDER BY rating DESC, id DESC LIMIT ? OFFSET ?",
            select_media(kind)
        );
        let binds = [
            Bind::Text(MediaStatus::Available.as_str().to_string()),
            Bind::Int(limit),
            Bind::Int(offset),
        ];
        self.fetch_all(kind, &sql, &binds).await
    }

    async fn count(&self, kind: MediaKind) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", kind.table());
        let (count,): (i64,) = on_pool!(self.pool, |p| {
            sqlx::query_as::<_, (i64,)>(&sql).fetch_one(p).await
        })
        .with_context(|| format!("Failed to count {}s", kind))?;
        Ok(count)
    }
}
