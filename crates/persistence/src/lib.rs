//! # VeilCredit Persistence
//!
//! Persistence layer for VeilCredit - SQLite via sqlx.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       Database                           │
//! │  ┌─────────────┐   ┌──────────────┐   ┌───────────────┐  │
//! │  │   SQLite    │   │  audit_log   │   │    Repos      │  │
//! │  │  (state)    │   │ (hash chain) │   │  (queries)    │  │
//! │  └─────────────┘   └──────────────┘   └───────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use veilcredit_persistence::{Database, LoanRepo};
//!
//! let db = Database::open("veilcredit.db").await?;
//! let loans = LoanRepo::list_all(db.pool()).await?;
//! ```

pub mod error;
pub mod sqlite;

pub use error::{PersistenceError, PersistenceResult};
pub use sqlite::schema::{
    AuditEntryRow, CoprocessorStatusRow, CreditScoreRow, LoanRow, SubmissionRow, UserRow,
};
pub use sqlite::{
    connect_in_memory, create_pool, init_database, run_migrations, AuditRepo, CoprocessorRepo,
    CreditScoreRepo, LoanChanges, LoanRepo, SubmissionRepo, UserRepo,
};

use sqlx::SqlitePool;
use std::path::Path;
use tracing::debug;

/// Database facade
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) a database file and apply migrations
    pub async fn open<P: AsRef<Path>>(path: P) -> PersistenceResult<Self> {
        let url = format!("sqlite:{}", path.as_ref().display());
        Self::connect(&url).await
    }

    /// Connect by URL (e.g. "sqlite:veilcredit.db") and apply migrations
    pub async fn connect(db_url: &str) -> PersistenceResult<Self> {
        debug!(url = db_url, "Opening database");
        let pool = init_database(db_url).await?;
        Ok(Self { pool })
    }

    /// Private in-memory database, used by tests and dry runs
    pub async fn in_memory() -> PersistenceResult<Self> {
        let pool = connect_in_memory().await?;
        Ok(Self { pool })
    }

    /// Get SQLite connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
