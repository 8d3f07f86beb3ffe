//! Coprocessor status commands

use anyhow::Result;
use veilcredit_business::{CoprocessorService, ServiceContext};
use veilcredit_core::{CoprocessorPatch, CoprocessorSnapshot, CoprocessorStatus};

use super::caller_id;
use crate::CoprocessorAction;

/// Handle coprocessor subcommands
pub async fn handle(
    ctx: &ServiceContext,
    caller: Option<&str>,
    action: CoprocessorAction,
) -> Result<()> {
    let service = CoprocessorService::new(ctx);

    match action {
        CoprocessorAction::Status => match service.read().await? {
            CoprocessorSnapshot::Uninitialized => {
                println!("⚪ Coprocessor status not initialized yet");
            }
            CoprocessorSnapshot::Initialized(status) => print_status(&status),
        },

        CoprocessorAction::Update { status, latency_ms } => {
            let mut patch = CoprocessorPatch::new();
            if let Some(state) = status {
                patch = patch.with_status(state.to_core());
            }
            if let Some(latency) = latency_ms {
                patch = patch.with_average_latency(latency);
            }

            let user_id = caller_id(ctx, caller).await?;
            let updated = service.update(&user_id, patch).await?;
            println!("✅ Coprocessor status updated");
            print_status(&updated);
        }

        CoprocessorAction::Rotate => {
            let user_id = caller_id(ctx, caller).await?;
            let updated = service.rotate(&user_id).await?;
            println!("🔑 Keys rotated");
            print_status(&updated);
        }
    }

    Ok(())
}

fn print_status(status: &CoprocessorStatus) {
    println!("🖥️  Coprocessor");
    println!("   Status:         {}", status.status);
    println!("   Computations:   {}", status.total_computations);
    println!("   Avg latency:    {:.3} ms", status.average_latency_ms);
    match status.last_key_rotation {
        Some(at) => println!("   Last rotation:  {}", at.format("%Y-%m-%d %H:%M:%S")),
        None => println!("   Last rotation:  never"),
    }
    println!("   Updated:        {}", status.updated_at.format("%Y-%m-%d %H:%M:%S"));
}
