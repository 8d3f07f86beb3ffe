//! Coprocessor status tracker

mod common;

use common::*;
use veilcredit_business::{CoprocessorService, ScoringService, ServiceContext};
use veilcredit_core::{
    AuditAction, CoprocessorPatch, CoprocessorSnapshot, CoprocessorState, HandleCodec, Role,
};
use veilcredit_persistence::Database;

#[tokio::test]
async fn test_uninitialized_until_first_write() {
    let ctx = setup().await;
    let snapshot = CoprocessorService::new(&ctx).read().await.unwrap();
    assert_eq!(snapshot, CoprocessorSnapshot::Uninitialized);
}

#[tokio::test]
async fn test_writes_are_admin_only() {
    let ctx = setup().await;
    let borrower = register(&ctx, BORROWER, Role::Borrower).await;
    let lender = register(&ctx, LENDER, Role::Lender).await;
    let service = CoprocessorService::new(&ctx);
    let patch = CoprocessorPatch::new().with_status(CoprocessorState::Offline);

    assert!(service.update(&borrower.id, patch.clone()).await.unwrap_err().is_permission());
    assert!(service.update(&lender.id, patch).await.unwrap_err().is_permission());
    assert!(service.rotate(&lender.id).await.unwrap_err().is_permission());
    assert!(service.rotate("USR-nobody").await.unwrap_err().is_permission());

    assert!(!service.read().await.unwrap().is_initialized());
}

#[tokio::test]
async fn test_merge_patch_keeps_unspecified_fields() {
    let ctx = setup().await;
    let borrower = scored_borrower(&ctx, BORROWER, 75_000, 15_000, 3_500).await;
    let admin = register(&ctx, ADMIN, Role::Admin).await;
    let service = CoprocessorService::new(&ctx);

    let before = service.read().await.unwrap().status().cloned().unwrap();
    assert_eq!(before.total_computations, 1);

    let updated = service
        .update(&admin.id, CoprocessorPatch::new().with_status(CoprocessorState::Degraded))
        .await
        .unwrap();
    assert_eq!(updated.status, CoprocessorState::Degraded);
    assert_eq!(updated.total_computations, 1);
    assert_eq!(updated.average_latency_ms, before.average_latency_ms);
    assert!(updated.updated_at >= before.updated_at);

    let updated = service
        .update(&admin.id, CoprocessorPatch::new().with_average_latency(12.5))
        .await
        .unwrap();
    assert_eq!(updated.status, CoprocessorState::Degraded);
    assert_eq!(updated.average_latency_ms, 12.5);

    // scoring keeps counting on top of the patched values
    ScoringService::new(&ctx)
        .submit_data(
            &borrower.id,
            HandleCodec::encode(1),
            HandleCodec::encode(1),
            HandleCodec::encode(1),
        )
        .await
        .unwrap();
    let status = service.read().await.unwrap().status().cloned().unwrap();
    assert_eq!(status.total_computations, 2);
}

#[tokio::test]
async fn test_update_creates_missing_record() {
    let ctx = setup().await;
    let admin = register(&ctx, ADMIN, Role::Admin).await;

    let status = CoprocessorService::new(&ctx)
        .update(&admin.id, CoprocessorPatch::new().with_status(CoprocessorState::Offline))
        .await
        .unwrap();
    assert_eq!(status.status, CoprocessorState::Offline);
    assert_eq!(status.total_computations, 0);
    assert_eq!(status.average_latency_ms, 0.0);
}

#[tokio::test]
async fn test_invalid_latency_rejected() {
    let ctx = setup().await;
    let admin = register(&ctx, ADMIN, Role::Admin).await;
    let before = audit_count(&ctx).await;

    let err = CoprocessorService::new(&ctx)
        .update(&admin.id, CoprocessorPatch::new().with_average_latency(-1.0))
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(audit_count(&ctx).await, before);
}

#[tokio::test]
async fn test_rotate_keeps_handles_decodable() {
    let ctx = setup().await;
    let admin = register(&ctx, ADMIN, Role::Admin).await;
    let handle = HandleCodec::encode(742);
    let service = CoprocessorService::new(&ctx);

    let status = service.rotate(&admin.id).await.unwrap();
    assert!(status.last_key_rotation.is_some());
    assert_eq!(status.status, CoprocessorState::Active);
    assert_eq!(handle.decode(), 742);

    let entries = veilcredit_business::AuditService::new(&ctx)
        .query(Some(1))
        .await
        .unwrap();
    assert_eq!(entries[0].action, AuditAction::KeyRotated);
}

/// Scoring calls on separate pooled connections all land in the counter
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_scoring_counts_every_computation() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("telemetry.db")).await.unwrap();
    let ctx = ServiceContext::new(&db);
    let borrower = register(&ctx, BORROWER, Role::Borrower).await;

    const SUBMITS: u64 = 24;
    const COMPUTES: u64 = 16;

    let mut handles = Vec::new();
    for i in 0..SUBMITS {
        let ctx = ctx.clone();
        let user_id = borrower.id.clone();
        handles.push(tokio::spawn(async move {
            ScoringService::new(&ctx)
                .submit_data(
                    &user_id,
                    HandleCodec::encode(50_000 + i),
                    HandleCodec::encode(10_000),
                    HandleCodec::encode(2_000),
                )
                .await
                .map(|_| ())
        }));
    }
    for i in 0..COMPUTES {
        let ctx = ctx.clone();
        let user_id = borrower.id.clone();
        handles.push(tokio::spawn(async move {
            let (salary, debts, expenses) = (
                HandleCodec::encode(60_000 + i),
                HandleCodec::encode(5_000),
                HandleCodec::encode(1_000),
            );
            ScoringService::new(&ctx)
                .compute_score(&user_id, &salary, &debts, &expenses)
                .await
                .map(|_| ())
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let status = CoprocessorService::new(&ctx)
        .read()
        .await
        .unwrap()
        .status()
        .cloned()
        .unwrap();
    assert_eq!(status.total_computations as u64, SUBMITS + COMPUTES);
    assert_eq!(
        ScoringService::new(&ctx).score_history(&borrower.id).await.unwrap().len() as u64,
        SUBMITS
    );
}
