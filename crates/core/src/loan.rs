//! # Loan Module
//!
//! Loan record and its state machine:
//!
//! ```text
//! pending ──approve──► approved ──fund──► active ──repay──► repaid
//!    │
//!    └──deny──► denied
//! ```
//!
//! `denied` and `repaid` are terminal. No transition skips a state.

use crate::audit::AuditAction;
use crate::error::{CoreError, CoreResult};
use crate::handle::Handle;
use crate::risk::RiskTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Pending,
    Approved,
    Denied,
    Active,
    Repaid,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Pending => "pending",
            LoanStatus::Approved => "approved",
            LoanStatus::Denied => "denied",
            LoanStatus::Active => "active",
            LoanStatus::Repaid => "repaid",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(LoanStatus::Pending),
            "approved" => Some(LoanStatus::Approved),
            "denied" => Some(LoanStatus::Denied),
            "active" => Some(LoanStatus::Active),
            "repaid" => Some(LoanStatus::Repaid),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Denied | LoanStatus::Repaid)
    }

    pub fn can_transition_to(&self, next: LoanStatus) -> bool {
        matches!(
            (self, next),
            (LoanStatus::Pending, LoanStatus::Approved)
                | (LoanStatus::Pending, LoanStatus::Denied)
                | (LoanStatus::Approved, LoanStatus::Active)
                | (LoanStatus::Active, LoanStatus::Repaid)
        )
    }

    pub fn transition(self, next: LoanStatus) -> CoreResult<LoanStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The four edges of the state machine, each with its guard state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanTransition {
    Approve,
    Deny,
    Fund,
    Repay,
}

impl LoanTransition {
    /// Status the loan must currently hold.
    pub fn from_status(&self) -> LoanStatus {
        match self {
            LoanTransition::Approve | LoanTransition::Deny => LoanStatus::Pending,
            LoanTransition::Fund => LoanStatus::Approved,
            LoanTransition::Repay => LoanStatus::Active,
        }
    }

    pub fn to_status(&self) -> LoanStatus {
        match self {
            LoanTransition::Approve => LoanStatus::Approved,
            LoanTransition::Deny => LoanStatus::Denied,
            LoanTransition::Fund => LoanStatus::Active,
            LoanTransition::Repay => LoanStatus::Repaid,
        }
    }

    pub fn audit_action(&self) -> AuditAction {
        match self {
            LoanTransition::Approve => AuditAction::LoanApproved,
            LoanTransition::Deny => AuditAction::LoanDenied,
            LoanTransition::Fund => AuditAction::LoanFunded,
            LoanTransition::Repay => AuditAction::LoanRepaid,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoanTransition::Approve => "approve",
            LoanTransition::Deny => "deny",
            LoanTransition::Fund => "fund",
            LoanTransition::Repay => "repay",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: String,
    pub borrower_id: String,
    pub lender_id: Option<String>,
    /// Minor units.
    pub requested_amount: i64,
    /// Minor units; set on approval.
    pub approved_amount: Option<i64>,
    pub term_days: i64,
    /// Frozen at creation.
    pub risk_tier: RiskTier,
    pub status: LoanStatus,
    /// Encoded approve (1) / deny (0) decision.
    pub decision_handle: Option<Handle>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    /// New `pending` loan. Amount and term must be positive.
    pub fn new(
        borrower_id: &str,
        requested_amount: i64,
        term_days: i64,
        risk_tier: RiskTier,
    ) -> CoreResult<Self> {
        if requested_amount <= 0 {
            return Err(CoreError::InvalidAmount(format!(
                "Requested amount must be positive: {}",
                requested_amount
            )));
        }
        if term_days <= 0 {
            return Err(CoreError::InvalidTerm(term_days));
        }

        let now = Utc::now();
        Ok(Self {
            id: crate::new_id("LOAN"),
            borrower_id: borrower_id.to_string(),
            lender_id: None,
            requested_amount,
            approved_amount: None,
            term_days,
            risk_tier,
            status: LoanStatus::Pending,
            decision_handle: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Validate an approved amount against this loan: `0 < amount <= requested`.
    pub fn check_approved_amount(&self, amount: i64) -> CoreResult<i64> {
        if amount <= 0 || amount > self.requested_amount {
            return Err(CoreError::InvalidAmount(format!(
                "Approved amount {} must be in (0, {}]",
                amount, self.requested_amount
            )));
        }
        Ok(amount)
    }

    /// Funded loans count towards lender exposure.
    pub fn is_funded(&self) -> bool {
        matches!(self.status, LoanStatus::Active | LoanStatus::Repaid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let status = LoanStatus::Pending;
        let status = status.transition(LoanStatus::Approved).unwrap();
        let status = status.transition(LoanStatus::Active).unwrap();
        let status = status.transition(LoanStatus::Repaid).unwrap();
        assert!(status.is_terminal());
    }

    #[test]
    fn test_no_skipping_states() {
        assert!(!LoanStatus::Pending.can_transition_to(LoanStatus::Active));
        assert!(!LoanStatus::Pending.can_transition_to(LoanStatus::Repaid));
        assert!(!LoanStatus::Approved.can_transition_to(LoanStatus::Repaid));
        assert!(!LoanStatus::Approved.can_transition_to(LoanStatus::Approved));
    }

    #[test]
    fn test_terminal_states() {
        for next in [
            LoanStatus::Pending,
            LoanStatus::Approved,
            LoanStatus::Denied,
            LoanStatus::Active,
            LoanStatus::Repaid,
        ] {
            assert!(!LoanStatus::Denied.can_transition_to(next));
            assert!(!LoanStatus::Repaid.can_transition_to(next));
        }

        let err = LoanStatus::Denied.transition(LoanStatus::Approved).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
    }

    #[test]
    fn test_transition_edges_match_machine() {
        for t in [
            LoanTransition::Approve,
            LoanTransition::Deny,
            LoanTransition::Fund,
            LoanTransition::Repay,
        ] {
            assert!(t.from_status().can_transition_to(t.to_status()));
        }
        assert_eq!(LoanTransition::Fund.audit_action(), AuditAction::LoanFunded);
    }

    #[test]
    fn test_new_loan_validation() {
        let loan = Loan::new("USR-1", 500_000, 30, RiskTier::Low).unwrap();
        assert_eq!(loan.status, LoanStatus::Pending);
        assert!(loan.lender_id.is_none());
        assert!(loan.id.starts_with("LOAN-"));

        assert!(matches!(
            Loan::new("USR-1", 0, 30, RiskTier::Low),
            Err(CoreError::InvalidAmount(_))
        ));
        assert_eq!(
            Loan::new("USR-1", 100, 0, RiskTier::Low).unwrap_err(),
            CoreError::InvalidTerm(0)
        );
    }

    #[test]
    fn test_check_approved_amount() {
        let loan = Loan::new("USR-1", 1_000, 30, RiskTier::Medium).unwrap();
        assert_eq!(loan.check_approved_amount(1_000), Ok(1_000));
        assert_eq!(loan.check_approved_amount(250), Ok(250));
        assert!(loan.check_approved_amount(0).is_err());
        assert!(loan.check_approved_amount(1_001).is_err());
    }
}
