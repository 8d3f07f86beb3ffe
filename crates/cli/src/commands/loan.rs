//! Loan lifecycle commands

use anyhow::Result;
use veilcredit_business::{LoanService, ServiceContext};
use veilcredit_core::Loan;

use super::{caller_id, require_user_id};
use crate::LoanAction;

/// Handle loan subcommands
pub async fn handle(ctx: &ServiceContext, caller: Option<&str>, action: LoanAction) -> Result<()> {
    let loans = LoanService::new(ctx);
    let user_id = caller_id(ctx, caller).await?;

    match action {
        LoanAction::Apply { amount, term_days } => {
            let loan = loans.apply(&user_id, amount, term_days).await?;
            println!("✅ Loan requested: {}", loan.id);
            print_loan(&loan);
        }
        LoanAction::Approve { loan_id, amount } => {
            let loan = loans.approve(&loan_id, &user_id, amount).await?;
            println!("✅ Loan approved");
            print_loan(&loan);
        }
        LoanAction::Deny { loan_id } => {
            let loan = loans.deny(&loan_id, &user_id).await?;
            println!("🚫 Loan denied");
            print_loan(&loan);
        }
        LoanAction::Fund { loan_id } => {
            let loan = loans.fund(&loan_id, &user_id).await?;
            println!("💸 Loan funded");
            print_loan(&loan);
        }
        LoanAction::Repay { loan_id } => {
            let loan = loans.repay(&loan_id, &user_id).await?;
            println!("✅ Loan repaid");
            print_loan(&loan);
        }
        LoanAction::List => {
            list_loans(&loans.list_loans(&user_id).await?);
        }
        LoanAction::Show { loan_id } => {
            print_loan(&loans.get_loan(&user_id, &loan_id).await?);
        }
        LoanAction::Stats { lender } => {
            let lender_id = match lender {
                Some(wallet) => require_user_id(ctx, Some(wallet.as_str())).await?,
                None => require_user_id(ctx, caller).await?,
            };
            let stats = loans.lender_stats(&lender_id).await?;

            println!("📊 Lender Stats: {}", stats.lender_id);
            println!("   Total funded:       {}", stats.total_funded);
            println!("   Active:             {}", stats.active_count);
            println!("   Repaid:             {}", stats.repaid_count);
            println!("   Approved (unfunded): {}", stats.approved_count);
            println!("   Denied:             {}", stats.denied_count);
            println!("   Yield proxy:        {}%", stats.yield_proxy);
            println!("   Default rate proxy: {}%", stats.default_rate_proxy);
        }
    }

    Ok(())
}

fn list_loans(loans: &[Loan]) {
    if loans.is_empty() {
        println!("No loans found");
        return;
    }

    println!(
        "{:<38} {:<10} {:>14} {:>6} {:<7}",
        "Loan ID", "Status", "Amount", "Days", "Tier"
    );
    println!("{}", "-".repeat(80));
    for loan in loans {
        println!(
            "{:<38} {:<10} {:>14} {:>6} {:<7}",
            loan.id, loan.status, loan.requested_amount, loan.term_days, loan.risk_tier
        );
    }
}

fn print_loan(loan: &Loan) {
    println!("📄 Loan: {}", loan.id);
    println!("   Borrower:  {}", loan.borrower_id);
    if let Some(ref lender_id) = loan.lender_id {
        println!("   Lender:    {}", lender_id);
    }
    println!("   Requested: {}", loan.requested_amount);
    if let Some(approved) = loan.approved_amount {
        println!("   Approved:  {}", approved);
    }
    println!("   Term:      {} days", loan.term_days);
    println!("   Risk tier: {}", loan.risk_tier);
    println!("   Status:    {}", loan.status);
    println!("   Updated:   {}", loan.updated_at.format("%Y-%m-%d %H:%M:%S"));
}
