//! Shared service context
//!
//! Holds the pool and configuration every service borrows, plus the caller
//! lookups used for permission checks.

use crate::config::LendingConfig;
use crate::error::{BusinessError, BusinessResult};
use sqlx::{Sqlite, SqlitePool, Transaction};
use veilcredit_core::{Role, User};
use veilcredit_persistence::{Database, PersistenceError, UserRepo};

/// Context for business operations - contains database access
#[derive(Clone)]
pub struct ServiceContext {
    pool: SqlitePool,
    config: LendingConfig,
}

impl ServiceContext {
    /// Create new service context from database with default config
    pub fn new(db: &Database) -> Self {
        Self::with_config(db, LendingConfig::default())
    }

    pub fn with_config(db: &Database, config: LendingConfig) -> Self {
        Self {
            pool: db.pool().clone(),
            config,
        }
    }

    /// Create from pool directly
    pub fn from_pool(pool: SqlitePool, config: LendingConfig) -> Self {
        Self { pool, config }
    }

    /// Get database pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn config(&self) -> &LendingConfig {
        &self.config
    }

    /// Start a unit of work. Reads happen before this call; inside the
    /// transaction the first statement must be a write so SQLite takes the
    /// write lock up front.
    pub async fn begin(&self) -> BusinessResult<Transaction<'static, Sqlite>> {
        let tx = self.pool.begin().await.map_err(PersistenceError::from)?;
        Ok(tx)
    }

    pub async fn commit(&self, tx: Transaction<'static, Sqlite>) -> BusinessResult<()> {
        tx.commit().await.map_err(PersistenceError::from)?;
        Ok(())
    }

    /// Unknown ids resolve to `None`
    pub async fn load_user(&self, user_id: &str) -> BusinessResult<Option<User>> {
        match UserRepo::find_by_id(&self.pool, user_id).await? {
            Some(row) => Ok(Some(User::try_from(row)?)),
            None => Ok(None),
        }
    }

    /// Load the caller and check its role. Unknown callers are rejected
    /// with a permission error, not a lookup error.
    pub async fn require_role(
        &self,
        user_id: &str,
        operation: &str,
        allowed: fn(&Role) -> bool,
    ) -> BusinessResult<User> {
        let user = self
            .load_user(user_id)
            .await?
            .ok_or_else(|| BusinessError::permission("unknown", operation))?;

        if !allowed(&user.role) {
            return Err(BusinessError::permission(user.role.as_str(), operation));
        }
        Ok(user)
    }
}
