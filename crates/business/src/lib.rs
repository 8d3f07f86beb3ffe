//! # VeilCredit Business
//!
//! Business logic layer - users, scoring, loan lifecycle, audit trail and
//! coprocessor telemetry.
//!
//! Every mutating operation runs in one SQLite transaction together with its
//! audit entry; a rejected call leaves no trace.

pub mod audit;
pub mod config;
pub mod coprocessor;
pub mod error;
pub mod loan;
pub mod scoring;
pub mod services;
pub mod user;

pub use audit::{AuditService, ChainReport};
pub use config::{LendingConfig, TierRates};
pub use coprocessor::CoprocessorService;
pub use error::{BusinessError, BusinessResult};
pub use loan::{LenderStats, LoanService};
pub use scoring::{DecryptedScore, ScoringService, SubmissionResult};
pub use services::ServiceContext;
pub use user::{ConnectOutcome, UserService};
