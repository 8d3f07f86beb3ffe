//! # VeilCredit Core
//!
//! Pure domain types for confidential credit scoring and the loan lifecycle.
//!
//! ```text
//! EncryptedSubmission ──► ScoreEngine ──► CreditScore ──► RiskClassifier ──► Loan
//!        (handles)       (HandleCodec)     (handle)        (low/med/high)    (state machine)
//! ```
//!
//! Nothing in this crate touches storage. Persistence lives in
//! `veilcredit-persistence`, orchestration in `veilcredit-business`.

pub mod audit;
pub mod coprocessor;
pub mod error;
pub mod handle;
pub mod loan;
pub mod risk;
pub mod score;
pub mod user;

pub use audit::{verify_chain, AuditAction, AuditEntry, ChainError, NewAuditEntry, GENESIS_HASH};
pub use coprocessor::{CoprocessorPatch, CoprocessorSnapshot, CoprocessorState, CoprocessorStatus};
pub use error::{CoreError, CoreResult};
pub use handle::{Handle, HandleCodec};
pub use loan::{Loan, LoanStatus, LoanTransition};
pub use risk::{RiskClassifier, RiskTier};
pub use score::{CreditScore, EncryptedSubmission, Ratio, ScoreBreakdown, ScoreEngine, ScoreStatus};
pub use user::{normalize_wallet_address, Role, User};

/// Generate a prefixed entity id (`LOAN-3f2a...`).
pub fn new_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}
