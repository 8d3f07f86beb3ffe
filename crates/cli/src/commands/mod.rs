//! Command handlers

pub mod audit;
pub mod coprocessor;
pub mod loan;
pub mod score;
pub mod user;

use anyhow::Result;
use veilcredit_business::{ServiceContext, UserService};

/// Resolve `--as <wallet>` to a user id. Unknown or missing callers map to
/// an empty id, which every service treats as "no user".
pub async fn caller_id(ctx: &ServiceContext, wallet: Option<&str>) -> Result<String> {
    let Some(wallet) = wallet else {
        return Ok(String::new());
    };
    let user = UserService::new(ctx).resolve(wallet).await?;
    Ok(user.map(|u| u.id).unwrap_or_default())
}

/// Like `caller_id`, but unknown wallets are an error
pub async fn require_user_id(ctx: &ServiceContext, wallet: Option<&str>) -> Result<String> {
    let wallet = wallet.ok_or_else(|| anyhow::anyhow!("This command needs --as <wallet>"))?;
    UserService::new(ctx)
        .resolve(wallet)
        .await?
        .map(|u| u.id)
        .ok_or_else(|| anyhow::anyhow!("Wallet {} is not connected. Run 'veilcredit connect' first.", wallet))
}
