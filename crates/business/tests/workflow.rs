//! End-to-end scoring and lending flows

mod common;

use common::*;
use veilcredit_business::{
    AuditService, CoprocessorService, LoanService, ScoringService, ServiceContext,
};
use veilcredit_core::{
    AuditAction, Handle, HandleCodec, LoanStatus, RiskClassifier, RiskTier, Role, ScoreStatus,
};
use veilcredit_persistence::Database;

/// Submit → score 800 → low tier → apply → approve → fund → repay
#[tokio::test]
async fn test_full_lending_workflow() {
    let ctx = setup().await;
    let scoring = ScoringService::new(&ctx);
    let loans = LoanService::new(&ctx);

    // 1. Borrower submits encrypted indicators
    let borrower = register(&ctx, BORROWER, Role::Borrower).await;
    let submitted = scoring
        .submit_data(
            &borrower.id,
            HandleCodec::encode(75_000),
            HandleCodec::encode(15_000),
            HandleCodec::encode(3_500),
        )
        .await
        .unwrap();
    assert_eq!(submitted.score.submission_id.as_deref(), Some(submitted.submission.id.as_str()));
    assert_eq!(submitted.score.status, ScoreStatus::Computed);

    // 2. The stored score decodes to 800, low risk
    let current = scoring.current_score(&borrower.id, &borrower.id).await.unwrap();
    assert_eq!(current.score_handle.decode(), 800);
    assert_eq!(RiskClassifier::classify(&current.score_handle), RiskTier::Low);

    // 3. Apply
    let loan = loans.apply(&borrower.id, 500_000, 30).await.unwrap();
    assert_eq!(loan.status, LoanStatus::Pending);
    assert_eq!(loan.risk_tier, RiskTier::Low);
    assert!(loan.lender_id.is_none());

    // 4. Lender approves
    let lender = register(&ctx, LENDER, Role::Lender).await;
    let approved = loans.approve(&loan.id, &lender.id, None).await.unwrap();
    assert_eq!(approved.status, LoanStatus::Approved);
    assert_eq!(approved.lender_id.as_deref(), Some(lender.id.as_str()));
    assert_eq!(approved.approved_amount, Some(500_000));
    assert_eq!(approved.decision_handle.as_ref().map(Handle::decode), Some(1));

    // 5. Fund and repay
    let active = loans.fund(&loan.id, &lender.id).await.unwrap();
    assert_eq!(active.status, LoanStatus::Active);
    let repaid = loans.repay(&loan.id, &borrower.id).await.unwrap();
    assert_eq!(repaid.status, LoanStatus::Repaid);

    // 6. Stats reflect the funded loan
    let stats = loans.lender_stats(&lender.id).await.unwrap();
    assert_eq!(stats.total_funded, 500_000);
    assert_eq!(stats.repaid_count, 1);
    assert_eq!(stats.active_count, 0);

    // 7. Audit: 2 registrations, score, apply, approve, fund, repay
    let audit = AuditService::new(&ctx);
    assert_eq!(audit.count().await.unwrap(), 7);
    let report = audit.verify().await.unwrap();
    assert!(report.is_valid());
    assert_eq!(report.entries, 7);

    let latest = audit.query(Some(1)).await.unwrap();
    assert_eq!(latest[0].action, AuditAction::LoanRepaid);
}

#[tokio::test]
async fn test_apply_without_score() {
    let ctx = setup().await;
    let borrower = register(&ctx, BORROWER, Role::Borrower).await;
    let before = audit_count(&ctx).await;

    let err = LoanService::new(&ctx)
        .apply(&borrower.id, 1_000, 30)
        .await
        .unwrap_err();

    assert!(err.is_no_score());
    assert_eq!(audit_count(&ctx).await, before);
}

#[tokio::test]
async fn test_apply_validation() {
    let ctx = setup().await;
    let borrower = scored_borrower(&ctx, BORROWER, 75_000, 15_000, 3_500).await;
    let loans = LoanService::new(&ctx);

    assert!(loans.apply(&borrower.id, 0, 30).await.unwrap_err().is_validation());
    assert!(loans.apply(&borrower.id, -5, 30).await.unwrap_err().is_validation());
    assert!(loans.apply(&borrower.id, 1_000, 0).await.unwrap_err().is_validation());
}

#[tokio::test]
async fn test_only_borrowers_apply() {
    let ctx = setup().await;
    let lender = register(&ctx, LENDER, Role::Lender).await;
    let loans = LoanService::new(&ctx);

    assert!(loans.apply(&lender.id, 1_000, 30).await.unwrap_err().is_permission());
    assert!(loans.apply("USR-nobody", 1_000, 30).await.unwrap_err().is_permission());
}

/// A newer score does not change the tier of an existing loan
#[tokio::test]
async fn test_risk_tier_frozen_at_application() {
    let ctx = setup().await;
    let (borrower, _lender, loan) = pending_loan(&ctx).await;
    assert_eq!(loan.risk_tier, RiskTier::Low);

    // salary 0 scores 500
    ScoringService::new(&ctx)
        .submit_data(
            &borrower.id,
            HandleCodec::encode(0),
            HandleCodec::encode(0),
            HandleCodec::encode(0),
        )
        .await
        .unwrap();

    let loans = LoanService::new(&ctx);
    let reloaded = loans.get_loan(&borrower.id, &loan.id).await.unwrap();
    assert_eq!(reloaded.risk_tier, RiskTier::Low);

    let second = loans.apply(&borrower.id, 1_000, 10).await.unwrap();
    assert_eq!(second.risk_tier, RiskTier::High);
}

#[tokio::test]
async fn test_latest_score_is_current() {
    let ctx = setup().await;
    let borrower = scored_borrower(&ctx, BORROWER, 100, 50, 60).await;
    let scoring = ScoringService::new(&ctx);

    scoring
        .submit_data(
            &borrower.id,
            HandleCodec::encode(100),
            HandleCodec::encode(10),
            HandleCodec::encode(10),
        )
        .await
        .unwrap();

    let current = scoring.current_score(&borrower.id, &borrower.id).await.unwrap();
    assert_eq!(current.score_handle.decode(), 850);

    let history = scoring.score_history(&borrower.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, current.id);
}

#[tokio::test]
async fn test_current_score_access() {
    let ctx = setup().await;
    let owner = scored_borrower(&ctx, BORROWER, 75_000, 15_000, 3_500).await;
    let other = register(&ctx, OTHER_BORROWER, Role::Borrower).await;
    let lender = register(&ctx, LENDER, Role::Lender).await;
    let admin = register(&ctx, ADMIN, Role::Admin).await;
    let scoring = ScoringService::new(&ctx);

    assert!(scoring.current_score(&owner.id, &owner.id).await.is_ok());
    assert!(scoring.current_score(&admin.id, &owner.id).await.is_ok());
    assert!(scoring.current_score(&other.id, &owner.id).await.unwrap_err().is_permission());
    assert!(scoring.current_score(&lender.id, &owner.id).await.unwrap_err().is_permission());
    assert!(scoring.current_score("USR-nobody", &owner.id).await.unwrap_err().is_permission());

    // no score yet
    assert!(scoring.current_score(&other.id, &other.id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_decrypt_score() {
    let ctx = setup().await;
    let borrower = scored_borrower(&ctx, BORROWER, 75_000, 15_000, 3_500).await;
    let scoring = ScoringService::new(&ctx);

    let revealed = scoring.decrypt_score(&borrower.id).await.unwrap();
    assert_eq!(revealed.value, 800);
    assert_eq!(revealed.tier, RiskTier::Low);

    let current = scoring.current_score(&borrower.id, &borrower.id).await.unwrap();
    assert_eq!(current.status, ScoreStatus::Decrypted);

    let entries = AuditService::new(&ctx).query(Some(1)).await.unwrap();
    assert_eq!(entries[0].action, AuditAction::ScoreDecrypted);
    // the plaintext never lands in the log
    assert!(entries[0].metadata.is_none());

    let newcomer = register(&ctx, OTHER_BORROWER, Role::Borrower).await;
    assert!(scoring.decrypt_score(&newcomer.id).await.unwrap_err().is_no_score());
}

#[tokio::test]
async fn test_compute_score_updates_telemetry() {
    let ctx = setup().await;
    let borrower = register(&ctx, BORROWER, Role::Borrower).await;
    let scoring = ScoringService::new(&ctx);
    let before = audit_count(&ctx).await;

    let handle = scoring
        .compute_score(
            &borrower.id,
            &HandleCodec::encode(75_000),
            &HandleCodec::encode(15_000),
            &HandleCodec::encode(3_500),
        )
        .await
        .unwrap();
    assert_eq!(handle.decode(), 800);

    let garbage = Handle::from_raw("garbage");
    let handle = scoring
        .compute_score(&borrower.id, &garbage, &garbage, &garbage)
        .await
        .unwrap();
    assert_eq!(handle.decode(), 500);

    let snapshot = CoprocessorService::new(&ctx).read().await.unwrap();
    let status = snapshot.status().unwrap();
    assert_eq!(status.total_computations, 2);
    assert!(status.average_latency_ms >= 0.0);
    assert_eq!(audit_count(&ctx).await, before + 2);

    // no stored score from a bare computation
    assert!(scoring.score_history(&borrower.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_garbage_submission_is_high_risk() {
    let ctx = setup().await;
    let borrower = register(&ctx, BORROWER, Role::Borrower).await;
    ScoringService::new(&ctx)
        .submit_data(
            &borrower.id,
            Handle::from_raw("not-a-handle"),
            Handle::from_raw("0x"),
            Handle::from_raw(""),
        )
        .await
        .unwrap();

    let loan = LoanService::new(&ctx)
        .apply(&borrower.id, 2_500, 14)
        .await
        .unwrap();
    assert_eq!(loan.risk_tier, RiskTier::High);
}

/// Same flow against a database file that is reopened midway
#[tokio::test]
async fn test_file_backed_workflow_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("veilcredit.db");

    let loan_id = {
        let db = Database::open(&path).await.unwrap();
        let ctx = ServiceContext::new(&db);
        let (_, _, loan) = pending_loan(&ctx).await;
        db.close().await;
        loan.id
    };

    let db = Database::open(&path).await.unwrap();
    let ctx = ServiceContext::new(&db);
    let admin = register(&ctx, ADMIN, Role::Admin).await;

    let loan = LoanService::new(&ctx).get_loan(&admin.id, &loan_id).await.unwrap();
    assert_eq!(loan.status, LoanStatus::Pending);
    assert!(AuditService::new(&ctx).verify().await.unwrap().is_valid());
}
