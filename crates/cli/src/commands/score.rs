//! Scoring commands and handle utilities

use anyhow::Result;
use veilcredit_business::{ScoringService, ServiceContext};
use veilcredit_core::{CreditScore, Handle, HandleCodec, RiskClassifier};

use super::{caller_id, require_user_id};

/// Encrypt indicators client-side and submit them
pub async fn submit(
    ctx: &ServiceContext,
    caller: Option<&str>,
    salary: u64,
    debts: u64,
    expenses: u64,
) -> Result<()> {
    let user_id = caller_id(ctx, caller).await?;
    let result = ScoringService::new(ctx)
        .submit_data(
            &user_id,
            HandleCodec::encode(salary),
            HandleCodec::encode(debts),
            HandleCodec::encode(expenses),
        )
        .await?;

    println!("✅ Submission recorded: {}", result.submission.id);
    println!("   Score ID:     {}", result.score.id);
    println!("   Score handle: {}", result.score.score_handle);
    println!("   Audit seq:    {}", result.audit_seq);
    Ok(())
}

/// Score without storing; prints only the encrypted result
pub async fn compute(
    ctx: &ServiceContext,
    caller: Option<&str>,
    salary: u64,
    debts: u64,
    expenses: u64,
) -> Result<()> {
    let user_id = caller_id(ctx, caller).await?;
    let handle = ScoringService::new(ctx)
        .compute_score(
            &user_id,
            &HandleCodec::encode(salary),
            &HandleCodec::encode(debts),
            &HandleCodec::encode(expenses),
        )
        .await?;

    println!("🔐 Score handle: {}", handle);
    Ok(())
}

/// Show the current score (or history) of the caller or another user
pub async fn show(
    ctx: &ServiceContext,
    caller: Option<&str>,
    user: Option<&str>,
    history: bool,
) -> Result<()> {
    let scoring = ScoringService::new(ctx);

    if history {
        let user_id = require_user_id(ctx, caller).await?;
        let scores = scoring.score_history(&user_id).await?;
        if scores.is_empty() {
            println!("No scores found");
            return Ok(());
        }
        println!("{:<40} {:<10} {}", "Score ID", "Status", "Computed At");
        println!("{}", "-".repeat(80));
        for score in &scores {
            println!(
                "{:<40} {:<10} {}",
                score.id,
                score.status,
                score.computed_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
        return Ok(());
    }

    let viewer_id = caller_id(ctx, caller).await?;
    let owner_id = match user {
        Some(wallet) => require_user_id(ctx, Some(wallet)).await?,
        None => viewer_id.clone(),
    };

    let score = scoring.current_score(&viewer_id, &owner_id).await?;
    print_score(&score);
    Ok(())
}

/// Reveal the caller's own score
pub async fn decrypt(ctx: &ServiceContext, caller: Option<&str>) -> Result<()> {
    let user_id = caller_id(ctx, caller).await?;
    let revealed = ScoringService::new(ctx).decrypt_score(&user_id).await?;

    println!("🔓 Score {}: {}", revealed.score_id, revealed.value);
    println!("   Risk tier: {}", revealed.tier);
    Ok(())
}

pub fn encode(value: u64) {
    println!("{}", HandleCodec::encode(value));
}

pub fn decode(handle: &str) {
    let handle = Handle::from_raw(handle);
    if !handle.is_well_formed() {
        eprintln!("⚠️  Malformed handle, decoding as 0");
    }
    println!("{}", handle.decode());
    println!("Risk tier if used as a score: {}", RiskClassifier::classify(&handle));
}

fn print_score(score: &CreditScore) {
    println!("📄 Credit Score: {}", score.id);
    println!("   User ID:     {}", score.user_id);
    println!("   Status:      {}", score.status);
    println!("   Handle:      {}", score.score_handle);
    if let Some(ref submission_id) = score.submission_id {
        println!("   Submission:  {}", submission_id);
    }
    println!("   Computed At: {}", score.computed_at.format("%Y-%m-%d %H:%M:%S"));
}
