//! Scoring operations - encrypted submissions and credit scores
//!
//! ScoringService runs the score engine over submitted handles. Plaintext
//! scores never reach logs or audit metadata; only the owner can reveal one.

use crate::audit::AuditService;
use crate::error::{BusinessError, BusinessResult};
use crate::services::ServiceContext;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::time::Instant;
use tracing::info;
use veilcredit_core::{
    AuditAction, CreditScore, EncryptedSubmission, Handle, NewAuditEntry, RiskClassifier,
    RiskTier, Role, ScoreEngine, ScoreStatus,
};
use veilcredit_persistence::{CoprocessorRepo, CreditScoreRepo, SubmissionRepo};

/// Result of `submit_data`
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionResult {
    pub submission: EncryptedSubmission,
    pub score: CreditScore,
    pub audit_seq: i64,
}

/// A score revealed to its owner
#[derive(Debug, Clone, Serialize)]
pub struct DecryptedScore {
    pub score_id: String,
    pub value: u64,
    pub tier: RiskTier,
}

/// Scoring Service - confidential score computation
pub struct ScoringService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ScoringService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Score three handles without storing a submission. Counts towards
    /// coprocessor telemetry and is audited.
    pub async fn compute_score(
        &self,
        caller_id: &str,
        salary: &Handle,
        debts: &Handle,
        expenses: &Handle,
    ) -> BusinessResult<Handle> {
        let caller = self
            .ctx
            .require_role(caller_id, "compute_score", |_| true)
            .await?;

        let started = Instant::now();
        let (score_handle, _) = ScoreEngine::evaluate(salary, debts, expenses);
        let latency_ms = elapsed_ms(started);

        let mut tx = self.ctx.begin().await?;
        CoprocessorRepo::record_computation(&mut *tx, latency_ms, Utc::now()).await?;
        AuditService::record_in(
            &mut tx,
            NewAuditEntry::new(AuditAction::ScoreComputed)
                .with_user(&caller.id)
                .with_metadata(json!({ "stored": false })),
        )
        .await?;
        self.ctx.commit(tx).await?;

        info!(user_id = %caller.id, latency_ms, "Score computed");
        Ok(score_handle)
    }

    /// Store a borrower's encrypted indicators and score them.
    pub async fn submit_data(
        &self,
        user_id: &str,
        salary: Handle,
        debts: Handle,
        expenses: Handle,
    ) -> BusinessResult<SubmissionResult> {
        let user = self
            .ctx
            .require_role(user_id, "submit_data", Role::can_borrow)
            .await?;

        let submission = EncryptedSubmission::new(&user.id, salary, debts, expenses);

        let started = Instant::now();
        let (score_handle, _) = ScoreEngine::evaluate(
            &submission.salary_handle,
            &submission.debts_handle,
            &submission.expenses_handle,
        );
        let latency_ms = elapsed_ms(started);
        let score = CreditScore::computed(&user.id, Some(&submission.id), score_handle);

        let mut tx = self.ctx.begin().await?;
        SubmissionRepo::insert(&mut *tx, &submission).await?;
        CreditScoreRepo::insert(&mut *tx, &score).await?;
        CoprocessorRepo::record_computation(&mut *tx, latency_ms, Utc::now()).await?;
        let entry = AuditService::record_in(
            &mut tx,
            NewAuditEntry::new(AuditAction::ScoreComputed)
                .with_user(&user.id)
                .with_entity("credit_score", &score.id)
                .with_metadata(json!({
                    "submission_id": submission.id,
                    "score_id": score.id,
                })),
        )
        .await?;
        self.ctx.commit(tx).await?;

        info!(user_id = %user.id, score_id = %score.id, "Financial data submitted");
        Ok(SubmissionResult {
            submission,
            score,
            audit_seq: entry.seq,
        })
    }

    /// Latest score of `user_id`. Readable by its owner and by admins.
    pub async fn current_score(&self, caller_id: &str, user_id: &str) -> BusinessResult<CreditScore> {
        let caller = self
            .ctx
            .load_user(caller_id)
            .await?
            .ok_or_else(|| BusinessError::permission("unknown", "current_score"))?;

        if caller.id != user_id && !caller.role.can_administer() {
            return Err(BusinessError::permission(caller.role.as_str(), "current_score"));
        }

        self.latest(user_id)
            .await?
            .ok_or_else(|| BusinessError::not_found("CreditScore", user_id))
    }

    /// Reveal the caller's own current score and mark it decrypted.
    pub async fn decrypt_score(&self, caller_id: &str) -> BusinessResult<DecryptedScore> {
        let caller = self
            .ctx
            .require_role(caller_id, "decrypt_score", |_| true)
            .await?;

        let score = self
            .latest(&caller.id)
            .await?
            .ok_or_else(|| BusinessError::NoScore(caller.id.clone()))?;

        let mut tx = self.ctx.begin().await?;
        CreditScoreRepo::update_status(&mut *tx, &score.id, ScoreStatus::Decrypted).await?;
        AuditService::record_in(
            &mut tx,
            NewAuditEntry::new(AuditAction::ScoreDecrypted)
                .with_user(&caller.id)
                .with_entity("credit_score", &score.id),
        )
        .await?;
        self.ctx.commit(tx).await?;

        info!(user_id = %caller.id, score_id = %score.id, "Score decrypted by owner");
        Ok(DecryptedScore {
            score_id: score.id,
            value: score.score_handle.decode(),
            tier: RiskClassifier::classify(&score.score_handle),
        })
    }

    /// Caller's scores, most recent first. Unknown callers get nothing.
    pub async fn score_history(&self, caller_id: &str) -> BusinessResult<Vec<CreditScore>> {
        let rows = CreditScoreRepo::list_for_user(self.ctx.pool(), caller_id).await?;
        let mut scores = Vec::with_capacity(rows.len());
        for row in rows {
            scores.push(CreditScore::try_from(row)?);
        }
        Ok(scores)
    }

    /// Current score without a permission check, for other services
    pub(crate) async fn latest(&self, user_id: &str) -> BusinessResult<Option<CreditScore>> {
        match CreditScoreRepo::latest_for_user(self.ctx.pool(), user_id).await? {
            Some(row) => Ok(Some(CreditScore::try_from(row)?)),
            None => Ok(None),
        }
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1_000.0
}
