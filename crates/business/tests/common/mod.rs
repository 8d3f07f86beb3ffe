//! Shared fixtures for the business integration tests
#![allow(dead_code)]

use veilcredit_business::{LoanService, ScoringService, ServiceContext, UserService};
use veilcredit_core::{HandleCodec, Loan, Role, User};
use veilcredit_persistence::Database;

pub const BORROWER: &str = "0x00000000000000000000000000000000000000b1";
pub const OTHER_BORROWER: &str = "0x00000000000000000000000000000000000000b2";
pub const LENDER: &str = "0x00000000000000000000000000000000000000c1";
pub const OTHER_LENDER: &str = "0x00000000000000000000000000000000000000c2";
pub const ADMIN: &str = "0x00000000000000000000000000000000000000a1";

/// Fresh in-memory database with the schema applied
pub async fn setup() -> ServiceContext {
    let db = Database::in_memory().await.unwrap();
    ServiceContext::new(&db)
}

pub async fn register(ctx: &ServiceContext, wallet: &str, role: Role) -> User {
    let code = ctx.config().demo_access_code.clone();
    UserService::new(ctx)
        .connect(wallet, Some(role), Some(&code))
        .await
        .unwrap()
        .user
}

/// Borrower with one submission scored from plaintext indicators
pub async fn scored_borrower(
    ctx: &ServiceContext,
    wallet: &str,
    salary: u64,
    debts: u64,
    expenses: u64,
) -> User {
    let user = register(ctx, wallet, Role::Borrower).await;
    ScoringService::new(ctx)
        .submit_data(
            &user.id,
            HandleCodec::encode(salary),
            HandleCodec::encode(debts),
            HandleCodec::encode(expenses),
        )
        .await
        .unwrap();
    user
}

/// Borrower (score 800), lender and one pending loan of 500000 over 30 days
pub async fn pending_loan(ctx: &ServiceContext) -> (User, User, Loan) {
    let borrower = scored_borrower(ctx, BORROWER, 75_000, 15_000, 3_500).await;
    let lender = register(ctx, LENDER, Role::Lender).await;
    let loan = LoanService::new(ctx)
        .apply(&borrower.id, 500_000, 30)
        .await
        .unwrap();
    (borrower, lender, loan)
}

pub async fn audit_count(ctx: &ServiceContext) -> i64 {
    veilcredit_business::AuditService::new(ctx).count().await.unwrap()
}
