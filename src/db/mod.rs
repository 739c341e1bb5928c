//! Database layer
//!
//! Storage for the DD-bot backend. Two backends are supported:
//! - SQLite (default, single-file deployment and tests)
//! - MySQL (the hosted deployment)
//!
//! The driver is selected from configuration. Repositories receive a
//! `DynDatabasePool` and dispatch on `DatabasePool::backend()`; most queries
//! are written once with `?` placeholders and run against either pool through
//! [`on_pool!`].
//!
//! ```ignore
//! use ddbot::config::DatabaseConfig;
//! use ddbot::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

/// Run the same sqlx expression against whichever backend `$pool` holds.
///
/// The body is expanded once per backend, so it may use backend-specific
/// row and result types as long as the code is valid for both.
macro_rules! on_pool {
    ($pool:expr, |$p:ident| $body:expr) => {
        match $pool.backend() {
            $crate::db::PoolRef::Sqlite($p) => $body,
            $crate::db::PoolRef::Mysql($p) => $body,
        }
    };
}

pub(crate) use on_pool;

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, PoolRef,
    SqliteDatabase,
};

/// Auto-increment id of the row created by an `INSERT`.
pub trait InsertedId {
    fn inserted_id(&self) -> i64;
}

impl InsertedId for sqlx::sqlite::SqliteQueryResult {
    fn inserted_id(&self) -> i64 {
        self.last_insert_rowid()
    }
}

impl InsertedId for sqlx::mysql::MySqlQueryResult {
    fn inserted_id(&self) -> i64 {
        self.last_insert_id() as i64
    }
}
