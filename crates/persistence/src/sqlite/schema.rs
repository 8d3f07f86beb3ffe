//! Database schema definitions
//!
//! Row types for sqlx mapping from SQLite tables.
//! The schema lives in migrations/20261019000000_init.sql

use crate::error::{PersistenceError, PersistenceResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use veilcredit_core::{
    AuditAction, AuditEntry, CoprocessorState, CoprocessorStatus, CreditScore,
    EncryptedSubmission, Handle, Loan, LoanStatus, RiskTier, Role, ScoreStatus, User,
};

/// Row type for table `users`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct UserRow {
    pub id: String,
    pub wallet_address: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// Row type for table `encrypted_submissions`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct SubmissionRow {
    pub id: String,
    pub user_id: String,
    pub salary_handle: String,
    pub debts_handle: String,
    pub expenses_handle: String,
    pub submitted_at: DateTime<Utc>,
}

/// Row type for table `credit_scores`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct CreditScoreRow {
    pub id: String,
    pub user_id: String,
    pub submission_id: Option<String>,
    pub score_handle: String,
    pub status: String,
    pub computed_at: DateTime<Utc>,
}

/// Row type for table `loans`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct LoanRow {
    pub id: String,
    pub borrower_id: String,
    pub lender_id: Option<String>,
    pub requested_amount: i64, // minor units
    pub approved_amount: Option<i64>,
    pub term_days: i64,
    pub risk_tier: String,
    pub status: String,
    pub decision_handle: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row type for table `audit_log`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct AuditEntryRow {
    pub id: String,
    pub seq: i64,
    pub user_id: Option<String>,
    pub action: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub metadata: Option<String>, // JSON stored as TEXT
    pub timestamp: DateTime<Utc>,
    pub prev_hash: String,
    pub hash: String,
}

/// Row type for table `coprocessor_status`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct CoprocessorStatusRow {
    pub id: i64,
    pub status: String,
    pub last_key_rotation: Option<DateTime<Utc>>,
    pub total_computations: i64,
    pub average_latency_ms: f64,
    pub updated_at: DateTime<Utc>,
}

// === Conversion implementations ===

impl From<&User> for UserRow {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            wallet_address: user.wallet_address.clone(),
            role: user.role.as_str().to_string(),
            created_at: user.created_at,
        }
    }
}

impl TryFrom<UserRow> for User {
    type Error = PersistenceError;

    fn try_from(row: UserRow) -> PersistenceResult<Self> {
        let role =
            Role::from_str(&row.role).ok_or_else(|| PersistenceError::invalid_enum("users.role", &row.role))?;
        Ok(User {
            id: row.id,
            wallet_address: row.wallet_address,
            role,
            created_at: row.created_at,
        })
    }
}

impl From<&EncryptedSubmission> for SubmissionRow {
    fn from(sub: &EncryptedSubmission) -> Self {
        Self {
            id: sub.id.clone(),
            user_id: sub.user_id.clone(),
            salary_handle: sub.salary_handle.as_str().to_string(),
            debts_handle: sub.debts_handle.as_str().to_string(),
            expenses_handle: sub.expenses_handle.as_str().to_string(),
            submitted_at: sub.submitted_at,
        }
    }
}

impl From<SubmissionRow> for EncryptedSubmission {
    fn from(row: SubmissionRow) -> Self {
        EncryptedSubmission {
            id: row.id,
            user_id: row.user_id,
            salary_handle: Handle::from_raw(row.salary_handle),
            debts_handle: Handle::from_raw(row.debts_handle),
            expenses_handle: Handle::from_raw(row.expenses_handle),
            submitted_at: row.submitted_at,
        }
    }
}

impl From<&CreditScore> for CreditScoreRow {
    fn from(score: &CreditScore) -> Self {
        Self {
            id: score.id.clone(),
            user_id: score.user_id.clone(),
            submission_id: score.submission_id.clone(),
            score_handle: score.score_handle.as_str().to_string(),
            status: score.status.as_str().to_string(),
            computed_at: score.computed_at,
        }
    }
}

impl TryFrom<CreditScoreRow> for CreditScore {
    type Error = PersistenceError;

    fn try_from(row: CreditScoreRow) -> PersistenceResult<Self> {
        let status = ScoreStatus::from_str(&row.status)
            .ok_or_else(|| PersistenceError::invalid_enum("credit_scores.status", &row.status))?;
        Ok(CreditScore {
            id: row.id,
            user_id: row.user_id,
            submission_id: row.submission_id,
            score_handle: Handle::from_raw(row.score_handle),
            status,
            computed_at: row.computed_at,
        })
    }
}

impl From<&Loan> for LoanRow {
    fn from(loan: &Loan) -> Self {
        Self {
            id: loan.id.clone(),
            borrower_id: loan.borrower_id.clone(),
            lender_id: loan.lender_id.clone(),
            requested_amount: loan.requested_amount,
            approved_amount: loan.approved_amount,
            term_days: loan.term_days,
            risk_tier: loan.risk_tier.as_str().to_string(),
            status: loan.status.as_str().to_string(),
            decision_handle: loan.decision_handle.as_ref().map(|h| h.as_str().to_string()),
            created_at: loan.created_at,
            updated_at: loan.updated_at,
        }
    }
}

impl TryFrom<LoanRow> for Loan {
    type Error = PersistenceError;

    fn try_from(row: LoanRow) -> PersistenceResult<Self> {
        let risk_tier = RiskTier::from_str(&row.risk_tier)
            .ok_or_else(|| PersistenceError::invalid_enum("loans.risk_tier", &row.risk_tier))?;
        let status = LoanStatus::from_str(&row.status)
            .ok_or_else(|| PersistenceError::invalid_enum("loans.status", &row.status))?;
        Ok(Loan {
            id: row.id,
            borrower_id: row.borrower_id,
            lender_id: row.lender_id,
            requested_amount: row.requested_amount,
            approved_amount: row.approved_amount,
            term_days: row.term_days,
            risk_tier,
            status,
            decision_handle: row.decision_handle.map(Handle::from),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<&AuditEntry> for AuditEntryRow {
    type Error = PersistenceError;

    fn try_from(entry: &AuditEntry) -> PersistenceResult<Self> {
        let metadata = entry
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        Ok(Self {
            id: entry.id.clone(),
            seq: entry.seq,
            user_id: entry.user_id.clone(),
            action: entry.action.as_str().to_string(),
            entity_type: entry.entity_type.clone(),
            entity_id: entry.entity_id.clone(),
            metadata,
            timestamp: entry.timestamp,
            prev_hash: entry.prev_hash.clone(),
            hash: entry.hash.clone(),
        })
    }
}

impl TryFrom<AuditEntryRow> for AuditEntry {
    type Error = PersistenceError;

    fn try_from(row: AuditEntryRow) -> PersistenceResult<Self> {
        let action = AuditAction::from_str(&row.action)
            .ok_or_else(|| PersistenceError::invalid_enum("audit_log.action", &row.action))?;
        let metadata = row
            .metadata
            .as_deref()
            .map(serde_json::from_str::<serde_json::Value>)
            .transpose()?;
        Ok(AuditEntry {
            id: row.id,
            seq: row.seq,
            user_id: row.user_id,
            action,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            metadata,
            timestamp: row.timestamp,
            prev_hash: row.prev_hash,
            hash: row.hash,
        })
    }
}

impl TryFrom<CoprocessorStatusRow> for CoprocessorStatus {
    type Error = PersistenceError;

    fn try_from(row: CoprocessorStatusRow) -> PersistenceResult<Self> {
        let status = CoprocessorState::from_str(&row.status)
            .ok_or_else(|| PersistenceError::invalid_enum("coprocessor_status.status", &row.status))?;
        Ok(CoprocessorStatus {
            status,
            last_key_rotation: row.last_key_rotation,
            total_computations: row.total_computations,
            average_latency_ms: row.average_latency_ms,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veilcredit_core::{HandleCodec, NewAuditEntry};

    #[test]
    fn test_loan_row_round_trip() {
        let mut loan = Loan::new("USR-1", 500_000, 30, RiskTier::Low).unwrap();
        loan.decision_handle = Some(HandleCodec::encode(1));

        let row = LoanRow::from(&loan);
        assert_eq!(row.status, "pending");
        assert_eq!(row.risk_tier, "low");

        let back = Loan::try_from(row).unwrap();
        assert_eq!(back, loan);
    }

    #[test]
    fn test_invalid_enum_rejected() {
        let row = UserRow {
            id: "USR-1".to_string(),
            wallet_address: "0xabc".to_string(),
            role: "auditor".to_string(),
            created_at: Utc::now(),
        };
        let err = User::try_from(row).unwrap_err();
        assert!(matches!(err, PersistenceError::InvalidEnumValue { .. }));
    }

    #[test]
    fn test_audit_row_keeps_hash_valid() {
        let entry = NewAuditEntry::new(AuditAction::LoanRequested)
            .with_user("USR-1")
            .with_metadata(serde_json::json!({ "amount": 500000, "tier": "low" }))
            .seal(1, veilcredit_core::GENESIS_HASH, Utc::now());

        let row = AuditEntryRow::try_from(&entry).unwrap();
        let back = AuditEntry::try_from(row).unwrap();

        assert_eq!(back, entry);
        assert!(veilcredit_core::verify_chain(&[back]).is_ok());
    }
}
