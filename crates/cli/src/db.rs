//! Database initialization, status and service context

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;
use veilcredit_business::{LendingConfig, ServiceContext};
use veilcredit_persistence::Database;

/// Initialize the database with schema
pub async fn init_database(db_path: &Path, force: bool) -> Result<()> {
    if force && db_path.exists() {
        std::fs::remove_file(db_path).context("Failed to remove existing database")?;
        println!("🗑️  Removed existing database");
    }

    let db = Database::open(db_path)
        .await
        .context("Failed to create database")?;
    db.close().await;
    Ok(())
}

/// Show database status
pub async fn show_status(db_path: &Path) -> Result<()> {
    if !db_path.exists() {
        println!("❌ Database not found at {:?}", db_path);
        println!("   Run 'veilcredit init' to create the database");
        return Ok(());
    }

    let db = Database::open(db_path).await?;
    let pool = db.pool();

    println!("📊 Database Status");
    println!("   Path: {:?}", db_path);
    println!();

    for (label, table) in [
        ("Users", "users"),
        ("Submissions", "encrypted_submissions"),
        ("Scores", "credit_scores"),
        ("Loans", "loans"),
        ("Audit entries", "audit_log"),
    ] {
        let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await
            .unwrap_or((0,));
        println!("   {:<14} {}", format!("{}:", label), count.0);
    }

    db.close().await;
    Ok(())
}

/// Open the database and build the service context
pub async fn open(db_path: &Path, config_path: Option<&Path>) -> Result<ServiceContext> {
    let config = match config_path {
        Some(path) => LendingConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => LendingConfig::default(),
    }
    .with_env();

    debug!(db = ?db_path, "Opening database");
    let db = Database::open(db_path)
        .await
        .context("Failed to open database. Run 'veilcredit init' first.")?;

    Ok(ServiceContext::with_config(&db, config))
}
