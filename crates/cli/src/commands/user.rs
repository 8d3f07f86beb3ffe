//! Wallet connect command

use anyhow::Result;
use veilcredit_business::{ServiceContext, UserService};

use crate::RoleArg;

/// Connect a wallet, optionally requesting a role
pub async fn connect(
    ctx: &ServiceContext,
    wallet: &str,
    role: Option<RoleArg>,
    access_code: Option<&str>,
) -> Result<()> {
    let outcome = UserService::new(ctx)
        .connect(wallet, role.map(RoleArg::to_core), access_code)
        .await?;
    let user = &outcome.user;

    if outcome.registered {
        println!("✅ Registered {}", user.wallet_address);
    } else if let Some(previous) = outcome.previous_role {
        println!("🔁 Role changed: {} → {}", previous, user.role);
    } else {
        println!("👋 Welcome back");
    }
    println!("   User ID: {}", user.id);
    println!("   Wallet:  {}", user.wallet_address);
    println!("   Role:    {}", user.role);

    Ok(())
}
