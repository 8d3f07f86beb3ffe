//! Coprocessor status operations
//!
//! Reads and admin-only writes of the singleton telemetry record. The
//! computation counter and running latency are only moved by scoring.

use crate::audit::AuditService;
use crate::error::{BusinessError, BusinessResult};
use crate::services::ServiceContext;
use chrono::Utc;
use tracing::info;
use veilcredit_core::{
    AuditAction, CoprocessorPatch, CoprocessorSnapshot, CoprocessorStatus, NewAuditEntry, Role,
};
use veilcredit_persistence::CoprocessorRepo;

/// Coprocessor Service - operational status bookkeeping
pub struct CoprocessorService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> CoprocessorService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn read(&self) -> BusinessResult<CoprocessorSnapshot> {
        match CoprocessorRepo::get(self.ctx.pool()).await? {
            Some(row) => Ok(CoprocessorSnapshot::Initialized(CoprocessorStatus::try_from(row)?)),
            None => Ok(CoprocessorSnapshot::Uninitialized),
        }
    }

    /// Merge-patch the record. Admin only; creates the record if missing.
    pub async fn update(
        &self,
        caller_id: &str,
        patch: CoprocessorPatch,
    ) -> BusinessResult<CoprocessorStatus> {
        let admin = self
            .ctx
            .require_role(caller_id, "update coprocessor status", Role::can_administer)
            .await?;

        if let Some(latency) = patch.average_latency_ms {
            if !latency.is_finite() || latency < 0.0 {
                return Err(BusinessError::Validation(format!(
                    "Average latency must be a non-negative number: {}",
                    latency
                )));
            }
        }

        let metadata = serde_json::to_value(&patch)
            .map_err(|e| BusinessError::Validation(e.to_string()))?;

        let mut tx = self.ctx.begin().await?;
        let row = CoprocessorRepo::apply_patch(&mut *tx, &patch, Utc::now()).await?;
        AuditService::record_in(
            &mut tx,
            NewAuditEntry::new(AuditAction::CoprocessorStatusUpdated)
                .with_user(&admin.id)
                .with_entity("coprocessor", "1")
                .with_metadata(metadata),
        )
        .await?;
        self.ctx.commit(tx).await?;

        let status = CoprocessorStatus::try_from(row)?;
        info!(admin_id = %admin.id, status = %status.status, "Coprocessor status updated");
        Ok(status)
    }

    /// Record a key rotation. Existing handles stay decodable.
    pub async fn rotate(&self, caller_id: &str) -> BusinessResult<CoprocessorStatus> {
        let admin = self
            .ctx
            .require_role(caller_id, "rotate keys", Role::can_administer)
            .await?;

        let now = Utc::now();
        let patch = CoprocessorPatch::new().with_key_rotation(now);

        let mut tx = self.ctx.begin().await?;
        let row = CoprocessorRepo::apply_patch(&mut *tx, &patch, now).await?;
        AuditService::record_in(
            &mut tx,
            NewAuditEntry::new(AuditAction::KeyRotated)
                .with_user(&admin.id)
                .with_entity("coprocessor", "1"),
        )
        .await?;
        self.ctx.commit(tx).await?;

        info!(admin_id = %admin.id, "Coprocessor keys rotated");
        Ok(CoprocessorStatus::try_from(row)?)
    }
}
