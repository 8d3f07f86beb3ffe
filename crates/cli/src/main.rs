//! VeilCredit CLI - confidential credit scoring from the command line
//!
//! Every invocation names its caller explicitly with `--as <wallet>`;
//! there is no session.
//!
//! Usage:
//! ```bash
//! veilcredit init
//! veilcredit connect 0xb1...b1
//! veilcredit --as 0xb1...b1 submit 75000 15000 3500
//! veilcredit --as 0xb1...b1 loan apply 500000 30
//! veilcredit --as 0xc1...c1 loan approve LOAN-3f2a...
//! veilcredit audit verify
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod commands;
mod db;

use commands::{audit, coprocessor, loan, score, user};

/// VeilCredit - confidential credit scoring and lending on SQLite
#[derive(Parser)]
#[command(name = "veilcredit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Database file path
    #[arg(long, default_value = "data/veilcredit.db", global = true)]
    pub db: PathBuf,

    /// Lending config (JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Caller wallet address
    #[arg(long = "as", value_name = "WALLET", global = true)]
    pub caller: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize database schema
    Init {
        /// Remove an existing database first
        #[arg(long)]
        force: bool,
    },

    /// Show database status
    Status,

    /// Connect a wallet (registers it on first use)
    Connect {
        /// Wallet address (0x + 40 hex)
        wallet: String,
        /// Requested role
        #[arg(long)]
        role: Option<RoleArg>,
        /// Demo access code for lender/admin
        #[arg(long)]
        access_code: Option<String>,
    },

    /// Encrypt and submit financial indicators (minor units)
    Submit {
        salary: u64,
        debts: u64,
        expenses: u64,
    },

    /// Score indicators without storing them
    Compute {
        salary: u64,
        debts: u64,
        expenses: u64,
    },

    /// Show a current score handle
    Score {
        /// Owner wallet (defaults to the caller)
        #[arg(long)]
        user: Option<String>,
        /// List every score, most recent first
        #[arg(long)]
        history: bool,
    },

    /// Reveal the caller's current score
    Decrypt,

    /// Loan lifecycle
    Loan {
        #[command(subcommand)]
        action: LoanAction,
    },

    /// Audit trail
    Audit {
        #[command(subcommand)]
        action: AuditAction,
    },

    /// Coprocessor status
    Coprocessor {
        #[command(subcommand)]
        action: CoprocessorAction,
    },

    /// Encode a value into a handle
    Encode { value: u64 },

    /// Decode a handle (malformed handles decode to 0)
    Decode { handle: String },
}

#[derive(Subcommand)]
pub enum LoanAction {
    /// Request a loan (borrower)
    Apply {
        /// Amount in minor units
        amount: i64,
        /// Term in days
        term_days: i64,
    },
    /// Approve a pending loan (lender)
    Approve {
        loan_id: String,
        /// Approved amount, defaults to the requested amount
        #[arg(long)]
        amount: Option<i64>,
    },
    /// Deny a pending loan (lender)
    Deny { loan_id: String },
    /// Fund an approved loan (approving lender)
    Fund { loan_id: String },
    /// Repay an active loan (borrower)
    Repay { loan_id: String },
    /// List loans visible to the caller
    List,
    /// Show one loan
    Show { loan_id: String },
    /// Lender statistics
    Stats {
        /// Lender wallet (defaults to the caller)
        #[arg(long)]
        lender: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AuditAction {
    /// Most recent entries first
    List {
        #[arg(long, short)]
        limit: Option<i64>,
    },
    /// Append an entry
    Append {
        /// Action name (e.g. AUDIT_APPENDED)
        #[arg(long, default_value = "AUDIT_APPENDED")]
        action: String,
        #[arg(long)]
        entity_type: Option<String>,
        #[arg(long)]
        entity_id: Option<String>,
        /// JSON metadata
        #[arg(long)]
        metadata: Option<String>,
    },
    /// Verify the hash chain
    Verify,
}

#[derive(Subcommand)]
pub enum CoprocessorAction {
    /// Show the status record
    Status,
    /// Merge-patch the status record (admin)
    Update {
        #[arg(long)]
        status: Option<CoprocessorStateArg>,
        #[arg(long)]
        latency_ms: Option<f64>,
    },
    /// Record a key rotation (admin)
    Rotate,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum RoleArg {
    Borrower,
    Lender,
    Admin,
}

impl RoleArg {
    pub fn to_core(self) -> veilcredit_core::Role {
        match self {
            RoleArg::Borrower => veilcredit_core::Role::Borrower,
            RoleArg::Lender => veilcredit_core::Role::Lender,
            RoleArg::Admin => veilcredit_core::Role::Admin,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum CoprocessorStateArg {
    Active,
    Degraded,
    Offline,
}

impl CoprocessorStateArg {
    pub fn to_core(self) -> veilcredit_core::CoprocessorState {
        match self {
            CoprocessorStateArg::Active => veilcredit_core::CoprocessorState::Active,
            CoprocessorStateArg::Degraded => veilcredit_core::CoprocessorState::Degraded,
            CoprocessorStateArg::Offline => veilcredit_core::CoprocessorState::Offline,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    // Ensure data directory exists
    if let Some(parent) = cli.db.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    match cli.command {
        Commands::Init { force } => {
            db::init_database(&cli.db, force).await?;
            println!("✅ Database initialized at {:?}", cli.db);
        }

        Commands::Status => {
            db::show_status(&cli.db).await?;
        }

        Commands::Encode { value } => {
            score::encode(value);
        }

        Commands::Decode { handle } => {
            score::decode(&handle);
        }

        command => {
            let ctx = db::open(&cli.db, cli.config.as_deref()).await?;
            let caller = cli.caller.as_deref();

            match command {
                Commands::Connect {
                    wallet,
                    role,
                    access_code,
                } => {
                    user::connect(&ctx, &wallet, role, access_code.as_deref()).await?;
                }
                Commands::Submit {
                    salary,
                    debts,
                    expenses,
                } => {
                    score::submit(&ctx, caller, salary, debts, expenses).await?;
                }
                Commands::Compute {
                    salary,
                    debts,
                    expenses,
                } => {
                    score::compute(&ctx, caller, salary, debts, expenses).await?;
                }
                Commands::Score { user, history } => {
                    score::show(&ctx, caller, user.as_deref(), history).await?;
                }
                Commands::Decrypt => {
                    score::decrypt(&ctx, caller).await?;
                }
                Commands::Loan { action } => {
                    loan::handle(&ctx, caller, action).await?;
                }
                Commands::Audit { action } => {
                    audit::handle(&ctx, caller, action).await?;
                }
                Commands::Coprocessor { action } => {
                    coprocessor::handle(&ctx, caller, action).await?;
                }
                Commands::Init { .. }
                | Commands::Status
                | Commands::Encode { .. }
                | Commands::Decode { .. } => {}
            }

            ctx.pool().close().await;
        }
    }

    Ok(())
}
