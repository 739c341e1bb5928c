//! Database migrations
//!
//! Migrations are embedded in the binary as SQL strings, one variant per
//! backend. Applied versions are tracked in the `_migrations` table so each
//! migration runs once.
//!
//! ```ignore
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::{on_pool, DynDatabasePool};
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username VARCHAR(50) NOT NULL UNIQUE,
                email VARCHAR(255) UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                first_name VARCHAR(100) NOT NULL DEFAULT '',
                last_name VARCHAR(100) NOT NULL DEFAULT '',
                country VARCHAR(100),
                gender VARCHAR(20),
                birthday DATE,
                race VARCHAR(50),
                tier VARCHAR(10),
                role VARCHAR(20) NOT NULL,
                is_verified BOOLEAN NOT NULL DEFAULT 0,
                is_approved BOOLEAN NOT NULL DEFAULT 1,
                primary_parent_id INTEGER,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (primary_parent_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);
            CREATE INDEX IF NOT EXISTS idx_users_parent ON users(primary_parent_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                username VARCHAR(50) NOT NULL UNIQUE,
                email VARCHAR(255) UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                first_name VARCHAR(100) NOT NULL DEFAULT '',
                last_name VARCHAR(100) NOT NULL DEFAULT '',
                country VARCHAR(100),
                gender VARCHAR(20),
                birthday DATE,
                race VARCHAR(50),
                tier VARCHAR(10),
                role VARCHAR(20) NOT NULL,
                is_verified BOOLEAN NOT NULL DEFAULT FALSE,
                is_approved BOOLEAN NOT NULL DEFAULT TRUE,
                primary_parent_id BIGINT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                FOREIGN KEY (primary_parent_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_users_role ON users(role);
        "#,
    },
    Migration {
        version: 2,
        name: "create_sessions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id INTEGER NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id BIGINT NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_sessions_expires_at ON sessions(expires_at);
        "#,
    },
    Migration {
        version: 3,
        name: "create_email_verifications",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS email_verifications (
                token VARCHAR(64) PRIMARY KEY,
                user_id INTEGER NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS email_verifications (
                token VARCHAR(64) PRIMARY KEY,
                user_id BIGINT NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
        "#,
    },
    Migration {
        version: 4,
        name: "create_interests",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS interests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(30) NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS child_interests (
                user_id INTEGER NOT NULL,
                interest_id INTEGER NOT NULL,
                PRIMARY KEY (user_id, interest_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (interest_id) REFERENCES interests(id) ON DELETE CASCADE
            );
            INSERT INTO interests (name) VALUES
                ('FICTION'), ('NONFICTION'), ('COMIC'), ('ART'), ('GEOGRAPHY'), ('SCIENCE'),
                ('ANIMALS'), ('HISTORY'), ('FANTASY'), ('TECHNOLOGY'), ('SPORTS'), ('COOKING');
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS interests (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                name VARCHAR(30) NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS child_interests (
                user_id BIGINT NOT NULL,
                interest_id BIGINT NOT NULL,
                PRIMARY KEY (user_id, interest_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (interest_id) REFERENCES interests(id) ON DELETE CASCADE
            );
            INSERT INTO interests (name) VALUES
                ('FICTION'), ('NONFICTION'), ('COMIC'), ('ART'), ('GEOGRAPHY'), ('SCIENCE'),
                ('ANIMALS'), ('HISTORY'), ('FANTASY'), ('TECHNOLOGY'), ('SPORTS'), ('COOKING');
        "#,
    },
    Migration {
        version: 5,
        name: "create_books",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS books (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(255) NOT NULL,
                author VARCHAR(255) NOT NULL DEFAULT '',
                link VARCHAR(500) NOT NULL UNIQUE,
                age_group VARCHAR(50) NOT NULL DEFAULT '',
                category VARCHAR(100) NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                rating REAL NOT NULL DEFAULT 0,
                source VARCHAR(100) NOT NULL DEFAULT '',
                status VARCHAR(20) NOT NULL DEFAULT 'available',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_books_source ON books(source);
            CREATE INDEX IF NOT EXISTS idx_books_status ON books(status);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS books (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(255) NOT NULL,
                author VARCHAR(255) NOT NULL DEFAULT '',
                link VARCHAR(500) NOT NULL UNIQUE,
                age_group VARCHAR(50) NOT NULL DEFAULT '',
                category VARCHAR(100) NOT NULL DEFAULT '',
                description TEXT NOT NULL,
                rating DOUBLE NOT NULL DEFAULT 0,
                source VARCHAR(100) NOT NULL DEFAULT '',
                status VARCHAR(20) NOT NULL DEFAULT 'available',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX idx_books_source ON books(source);
            CREATE INDEX idx_books_status ON books(status);
        "#,
    },
    Migration {
        version: 6,
        name: "create_videos",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS videos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(255) NOT NULL,
                creator VARCHAR(255) NOT NULL DEFAULT '',
                link VARCHAR(500) NOT NULL UNIQUE,
                age_group VARCHAR(50) NOT NULL DEFAULT '',
                category VARCHAR(100) NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                rating REAL NOT NULL DEFAULT 0,
                source VARCHAR(100) NOT NULL DEFAULT '',
                status VARCHAR(20) NOT NULL DEFAULT 'available',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_videos_source ON videos(source);
            CREATE INDEX IF NOT EXISTS idx_videos_status ON videos(status);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS videos (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(255) NOT NULL,
                creator VARCHAR(255) NOT NULL DEFAULT '',
                link VARCHAR(500) NOT NULL UNIQUE,
                age_group VARCHAR(50) NOT NULL DEFAULT '',
                category VARCHAR(100) NOT NULL DEFAULT '',
                description TEXT NOT NULL,
                rating DOUBLE NOT NULL DEFAULT 0,
                source VARCHAR(100) NOT NULL DEFAULT '',
                status VARCHAR(20) NOT NULL DEFAULT 'available',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX idx_videos_source ON videos(source);
            CREATE INDEX idx_videos_status ON videos(status);
        "#,
    },
    Migration {
        version: 7,
        name: "create_reviews",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS reviews (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                review TEXT NOT NULL,
                stars INTEGER NOT NULL,
                review_type VARCHAR(20) NOT NULL DEFAULT 'APP',
                showcased BOOLEAN NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_reviews_user_id ON reviews(user_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS reviews (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                user_id BIGINT NOT NULL,
                review TEXT NOT NULL,
                stars INT NOT NULL,
                review_type VARCHAR(20) NOT NULL DEFAULT 'APP',
                showcased BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
        "#,
    },
    Migration {
        version: 8,
        name: "create_landing_page_content",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS landing_page_content (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                display_type VARCHAR(50) NOT NULL,
                title VARCHAR(100),
                grouping_key VARCHAR(30),
                display_text VARCHAR(255) NOT NULL,
                sort_order INTEGER NOT NULL DEFAULT 0,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            INSERT INTO landing_page_content (display_type, title, grouping_key, display_text, sort_order) VALUES
                ('INTRODUCTION', 'Welcome to DD-bot', NULL, 'A safe place where children discover books and videos picked for their age and interests.', 0),
                ('FEATURE', 'Chat to discover', NULL, 'Children ask the DD-bot for stories and videos in their own words.', 0),
                ('FEATURE', 'Age appropriate', NULL, 'Every recommendation respects the age range set by our librarians.', 1),
                ('FEATURE', 'Curated by librarians', NULL, 'Our catalog is reviewed and maintained by approved librarians.', 2),
                ('FEATURE', 'Built around interests', NULL, 'Pick at least three interests per child and recommendations follow them.', 3),
                ('FEATURE', 'Parent controls', NULL, 'Parents create and manage child accounts from one dashboard.', 4),
                ('FEATURE', 'Books and videos', NULL, 'Reading and watching suggestions side by side.', 5),
                ('HOW_IT_WORKS', 'Sign up', NULL, 'Create a parent account and verify your email.', 0),
                ('HOW_IT_WORKS', 'Add your children', NULL, 'Set up a profile for each child with their interests.', 1),
                ('HOW_IT_WORKS', 'Start chatting', NULL, 'Your child logs in and asks the DD-bot for something to read or watch.', 2),
                ('PRICING', NULL, 'FREE_PLAN', 'Chat recommendations for books and videos', 0),
                ('PRICING', NULL, 'FREE_PLAN', 'Up to three child profiles', 1),
                ('PRICING', NULL, 'PRO_PLAN', 'Everything in the free plan', 2),
                ('PRICING', NULL, 'PRO_PLAN', 'Unlimited child profiles and priority support', 3);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS landing_page_content (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                display_type VARCHAR(50) NOT NULL,
                title VARCHAR(100),
                grouping_key VARCHAR(30),
                display_text VARCHAR(255) NOT NULL,
                sort_order INT NOT NULL DEFAULT 0,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP
            );
            INSERT INTO landing_page_content (display_type, title, grouping_key, display_text, sort_order) VALUES
                ('INTRODUCTION', 'Welcome to DD-bot', NULL, 'A safe place where children discover books and videos picked for their age and interests.', 0),
                ('FEATURE', 'Chat to discover', NULL, 'Children ask the DD-bot for stories and videos in their own words.', 0),
                ('FEATURE', 'Age appropriate', NULL, 'Every recommendation respects the age range set by our librarians.', 1),
                ('FEATURE', 'Curated by librarians', NULL, 'Our catalog is reviewed and maintained by approved librarians.', 2),
                ('FEATURE', 'Built around interests', NULL, 'Pick at least three interests per child and recommendations follow them.', 3),
                ('FEATURE', 'Parent controls', NULL, 'Parents create and manage child accounts from one dashboard.', 4),
                ('FEATURE', 'Books and videos', NULL, 'Reading and watching suggestions side by side.', 5),
                ('HOW_IT_WORKS', 'Sign up', NULL, 'Create a parent account and verify your email.', 0),
                ('HOW_IT_WORKS', 'Add your children', NULL, 'Set up a profile for each child with their interests.', 1),
                ('HOW_IT_WORKS', 'Start chatting', NULL, 'Your child logs in and asks the DD-bot for something to read or watch.', 2),
                ('PRICING', NULL, 'FREE_PLAN', 'Chat recommendations for books and videos', 0),
                ('PRICING', NULL, 'FREE_PLAN', 'Up to three child profiles', 1),
                ('PRICING', NULL, 'PRO_PLAN', 'Everything in the free plan', 2),
                ('PRICING', NULL, 'PRO_PLAN', 'Unlimited child profiles and priority support', 3);
        "#,
    },
    Migration {
        version: 9,
        name: "create_chat_messages",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS chat_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id VARCHAR(64) NOT NULL,
                user_id INTEGER NOT NULL,
                message TEXT NOT NULL,
                reply TEXT NOT NULL,
                items TEXT NOT NULL DEFAULT '[]',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_chat_messages_session ON chat_messages(session_id, user_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS chat_messages (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                session_id VARCHAR(64) NOT NULL,
                user_id BIGINT NOT NULL,
                message TEXT NOT NULL,
                reply TEXT NOT NULL,
                items TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_chat_messages_session ON chat_messages(session_id, user_id);
        "#,
    },
];

/// Run all pending migrations in version order.
///
/// Returns the number of migrations applied.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i32> = applied.iter().map(|m| m.version as i32).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&migration.version) {
            tracing::info!(
                "Applying migration {}: {}",
                migration.version,
                migration.name
            );
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

/// Create the migrations tracking table if it doesn't exist
async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    let sql = "SELECT version, name, applied_at FROM _migrations ORDER BY version";
    let records: Vec<MigrationRecord> = on_pool!(pool, |p| {
        sqlx::query(sql)
            .fetch_all(p)
            .await?
            .iter()
            .map(|row| MigrationRecord {
                version: row.get("version"),
                name: row.get("name"),
                applied_at: row.get("applied_at"),
            })
            .collect()
    });
    Ok(records)
}

async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => migration.up_sqlite,
        DatabaseDriver::Mysql => migration.up_mysql,
    };

    for statement in split_sql_statements(sql) {
        pool.execute(statement)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    on_pool!(pool, |p| {
        sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
            .bind(migration.version)
            .bind(migration.name)
            .execute(p)
            .await
            .map(|_| ())?
    });

    Ok(())
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split SQL into individual statements, skipping comment-only fragments.
///
/// Semicolons inside single-quoted literals do not end a statement.
fn split_sql_statements(sql: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut current_start = 0;
    let mut in_statement = false;
    let mut in_quote = false;

    for (i, c) in sql.char_indices() {
        match c {
            '\'' if in_statement => in_quote = !in_quote,
            ';' if !in_quote => {
                if in_statement {
                    let stmt = sql[current_start..i].trim();
                    if !stmt.is_empty() && !is_comment_only(stmt) {
                        statements.push(stmt);
                    }
                    in_statement = false;
                }
                current_start = i + 1;
            }
            _ if !c.is_whitespace() && !in_statement => {
                current_start = i;
                in_statement = true;
            }
            _ => {}
        }
    }

    if in_statement {
        let stmt = sql[current_start..].trim();
        if !stmt.is_empty() && !is_comment_only(stmt) {
            statements.push(stmt);
        }
    }

    statements
}

/// Check if a string contains only SQL comments
fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

/// Check if migrations are up to date
pub async fn is_up_to_date(pool: &DynDatabasePool) -> Result<bool> {
    create_migrations_table(pool).await?;
    let applied = get_applied_migrations(pool).await?;
    Ok(applied.len() == MIGRATIONS.len())
}

/// Get migration by version
pub fn get_migration(version: i32) -> Option<&'static Migration> {
    MIGRATIONS.iter().find(|m| m.version == version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, PoolRef};
    use sqlx::SqlitePool;

    async fn migrated() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        pool
    }

    fn sqlite(pool: &DynDatabasePool) -> &SqlitePool {
        match pool.backend() {
            PoolRef::Sqlite(p) => p,
            PoolRef::Mysql(_) => panic!("expected sqlite"),
        }
    }

    #[tokio::test]
    async fn test_run_migrations_is_idempotent() {
        let pool = create_test_pool().await.unwrap();
        let applied = run_migrations(&pool).await.unwrap();
        assert_eq!(applied, MIGRATIONS.len());

        let applied_again = run_migrations(&pool).await.unwrap();
        assert_eq!(applied_again, 0);
        assert!(is_up_to_date(&pool).await.unwrap());
    }

    #[tokio::test]
    async fn test_interests_seeded() {
        let pool = migrated().await;
        let rows = sqlx::query("SELECT name FROM interests ORDER BY id")
            .fetch_all(sqlite(&pool))
            .await
            .unwrap();
        let names: Vec<String> = rows.iter().map(|r| r.get("name")).collect();
        assert_eq!(names.len(), 12);
        assert_eq!(names[0], "FICTION");
        assert_eq!(names[11], "COOKING");
    }

    #[tokio::test]
    async fn test_landing_content_seeded() {
        let pool = migrated().await;
        let rows = sqlx::query(
            "SELECT display_type, COUNT(*) AS n FROM landing_page_content GROUP BY display_type",
        )
        .fetch_all(sqlite(&pool))
        .await
        .unwrap();

        let count = |kind: &str| -> i64 {
            rows.iter()
                .find(|r| r.get::<String, _>("display_type") == kind)
                .map(|r| r.get("n"))
                .unwrap_or(0)
        };
        assert_eq!(count("INTRODUCTION"), 1);
        assert_eq!(count("FEATURE"), 6);
        assert_eq!(count("HOW_IT_WORKS"), 3);
        assert_eq!(count("PRICING"), 4);
    }

    #[tokio::test]
    async fn test_deleting_parent_cascades_to_children() {
        let pool = migrated().await;
        let p = sqlite(&pool);

        sqlx::query("INSERT INTO users (username, password_hash, role) VALUES ('mum', 'h', 'PARENT')")
            .execute(p)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO users (username, password_hash, role, primary_parent_id) VALUES ('kid', 'h', 'CHILD', 1)",
        )
        .execute(p)
        .await
        .unwrap();

        sqlx::query("DELETE FROM users WHERE id = 1").execute(p).await.unwrap();

        let (left,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(p)
            .await
            .unwrap();
        assert_eq!(left, 0);
    }

    #[tokio::test]
    async fn test_book_link_unique() {
        let pool = migrated().await;
        let p = sqlite(&pool);

        let insert = "INSERT INTO books (title, link) VALUES (?, 'https://example.com/a')";
        sqlx::query(insert).bind("One").execute(p).await.unwrap();
        assert!(sqlx::query(insert).bind("Two").execute(p).await.is_err());
    }

    #[tokio::test]
    async fn test_session_requires_existing_user() {
        let pool = migrated().await;
        let result = sqlx::query(
            "INSERT INTO sessions (id, user_id, expires_at) VALUES ('s', 999, datetime('now', '+1 day'))",
        )
        .execute(sqlite(&pool))
        .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_get_migration() {
        assert_eq!(get_migration(1).map(|m| m.name), Some("create_users"));
        assert!(get_migration(999).is_none());
    }

    #[test]
    fn test_split_sql_statements() {
        let sql = "CREATE TABLE a (id INT); CREATE TABLE b (id INT);";
        assert_eq!(split_sql_statements(sql).len(), 2);

        let sql_with_comments = "-- Comment\nCREATE TABLE a (id INT);";
        assert_eq!(split_sql_statements(sql_with_comments).len(), 1);

        let quoted = "INSERT INTO t VALUES ('a; b'); SELECT 1";
        let statements = split_sql_statements(quoted);
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0], "INSERT INTO t VALUES ('a; b')");
    }

    #[test]
    fn test_is_comment_only() {
        assert!(is_comment_only("-- This is a comment"));
        assert!(is_comment_only("-- Line 1\n-- Line 2"));
        assert!(!is_comment_only("CREATE TABLE test"));
        assert!(!is_comment_only("-- Comment\nCREATE TABLE test"));
    }
}
