//! SQLite persistence module
//!
//! Repository pattern for SQLite database access.

pub mod repos;
pub mod schema;

pub use repos::{
    connect_in_memory, create_pool, init_database, run_migrations, AuditRepo, CoprocessorRepo,
    CreditScoreRepo, LoanChanges, LoanRepo, SubmissionRepo, UserRepo,
};
pub use schema::{
    AuditEntryRow, CoprocessorStatusRow, CreditScoreRow, LoanRow, SubmissionRow, UserRow,
};
