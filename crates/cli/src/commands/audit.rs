//! Audit trail commands

use anyhow::{Context, Result};
use veilcredit_business::{AuditService, ServiceContext};
use veilcredit_core::{AuditAction as Action, NewAuditEntry};

use super::caller_id;
use crate::AuditAction;

/// Handle audit subcommands
pub async fn handle(ctx: &ServiceContext, caller: Option<&str>, action: AuditAction) -> Result<()> {
    let audit = AuditService::new(ctx);

    match action {
        AuditAction::List { limit } => {
            let entries = audit.query(limit).await?;
            if entries.is_empty() {
                println!("Audit log is empty");
                return Ok(());
            }

            println!(
                "{:>5} {:<20} {:<28} {:<38} {}",
                "Seq", "Timestamp", "Action", "User", "Entity"
            );
            println!("{}", "-".repeat(110));
            for entry in &entries {
                let entity = match (&entry.entity_type, &entry.entity_id) {
                    (Some(t), Some(id)) => format!("{}:{}", t, id),
                    (Some(t), None) => t.clone(),
                    _ => "-".to_string(),
                };
                println!(
                    "{:>5} {:<20} {:<28} {:<38} {}",
                    entry.seq,
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.action,
                    entry.user_id.as_deref().unwrap_or("system"),
                    entity
                );
            }
        }

        AuditAction::Append {
            action,
            entity_type,
            entity_id,
            metadata,
        } => {
            let action = Action::from_str(&action)
                .ok_or_else(|| anyhow::anyhow!("Unknown audit action: {}", action))?;

            let mut draft = NewAuditEntry::new(action);
            let user_id = caller_id(ctx, caller).await?;
            if !user_id.is_empty() {
                draft = draft.with_user(&user_id);
            }
            draft.entity_type = entity_type;
            draft.entity_id = entity_id;
            if let Some(raw) = metadata {
                let value: serde_json::Value =
                    serde_json::from_str(&raw).context("Metadata must be valid JSON")?;
                draft = draft.with_metadata(value);
            }

            let entry = audit.record(draft).await?;
            println!("✅ Appended entry #{} ({})", entry.seq, entry.action);
            println!("   Hash: {}", entry.hash);
        }

        AuditAction::Verify => {
            let report = audit.verify().await?;
            match report.error {
                None => {
                    println!("✅ Audit chain intact ({} entries)", report.entries);
                    if let Some(head) = report.head_hash {
                        println!("   Head: {}", head);
                    }
                }
                Some(err) => {
                    println!("❌ Audit chain broken: {}", err);
                    anyhow::bail!("audit chain verification failed");
                }
            }
        }
    }

    Ok(())
}
