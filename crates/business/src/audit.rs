//! Audit trail operations
//!
//! AuditService appends to and reads the hash-chained audit log. Other
//! services call `record_in` inside their own transaction so the entry
//! commits or rolls back with the mutation it describes.

use crate::error::{BusinessError, BusinessResult};
use crate::services::ServiceContext;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};
use veilcredit_core::{verify_chain, AuditEntry, ChainError, NewAuditEntry};
use veilcredit_persistence::AuditRepo;

/// Result of re-walking the chain
#[derive(Debug, Clone, Serialize)]
pub struct ChainReport {
    pub entries: usize,
    /// Hash of the last entry, `None` on an empty log
    pub head_hash: Option<String>,
    pub error: Option<ChainError>,
}

impl ChainReport {
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

/// Audit Service - append-only log access
pub struct AuditService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> AuditService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Append inside the caller's transaction
    pub async fn record_in(
        conn: &mut SqliteConnection,
        draft: NewAuditEntry,
    ) -> BusinessResult<AuditEntry> {
        let entry = AuditRepo::append(conn, draft).await?;
        debug!(seq = entry.seq, action = %entry.action, "Audit entry appended");
        Ok(entry)
    }

    /// Append one entry in its own transaction
    pub async fn record(&self, draft: NewAuditEntry) -> BusinessResult<AuditEntry> {
        let mut tx = self.ctx.begin().await?;
        let entry = Self::record_in(&mut tx, draft).await?;
        self.ctx.commit(tx).await?;

        info!(seq = entry.seq, action = %entry.action, user_id = ?entry.user_id, "Audit entry recorded");
        Ok(entry)
    }

    /// Most recent first. `None` uses the configured default limit.
    pub async fn query(&self, limit: Option<i64>) -> BusinessResult<Vec<AuditEntry>> {
        let limit = limit.unwrap_or(self.ctx.config().audit_query_limit);
        if limit <= 0 {
            return Err(BusinessError::Validation(format!(
                "Audit query limit must be positive: {}",
                limit
            )));
        }

        let rows = AuditRepo::recent(self.ctx.pool(), limit).await?;
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(AuditEntry::try_from(row)?);
        }
        Ok(entries)
    }

    pub async fn count(&self) -> BusinessResult<i64> {
        Ok(AuditRepo::count(self.ctx.pool()).await?)
    }

    /// Re-walk the whole chain from genesis
    pub async fn verify(&self) -> BusinessResult<ChainReport> {
        let rows = AuditRepo::all_ascending(self.ctx.pool()).await?;
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(AuditEntry::try_from(row)?);
        }

        let error = verify_chain(&entries).err();
        if let Some(ref err) = error {
            warn!(error = %err, "Audit chain verification failed");
        }

        Ok(ChainReport {
            entries: entries.len(),
            head_hash: entries.last().map(|e| e.hash.clone()),
            error,
        })
    }
}
