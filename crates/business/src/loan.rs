//! Loan lifecycle operations
//!
//! LoanService drives `pending → approved/denied → active → repaid`. Each
//! transition is one conditional UPDATE keyed on the expected status, so of
//! two racing calls exactly one wins; the loser sees `InvalidState`.

use crate::audit::AuditService;
use crate::config::LendingConfig;
use crate::error::{BusinessError, BusinessResult};
use crate::scoring::ScoringService;
use crate::services::ServiceContext;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use veilcredit_core::{
    AuditAction, HandleCodec, Loan, LoanStatus, LoanTransition, NewAuditEntry, RiskClassifier,
    RiskTier, Role, User,
};
use veilcredit_persistence::{LoanChanges, LoanRepo, LoanRow};

/// Per-lender projection over its decided loans. Never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LenderStats {
    pub lender_id: String,
    /// Minor units, over active and repaid loans; saturates at `i64::MAX`
    pub total_funded: i64,
    pub active_count: usize,
    pub repaid_count: usize,
    pub approved_count: usize,
    pub denied_count: usize,
    /// Amount-weighted tier yield, percent
    pub yield_proxy: Decimal,
    /// Amount-weighted tier default rate, percent
    pub default_rate_proxy: Decimal,
}

impl LenderStats {
    pub fn from_loans(lender_id: &str, loans: &[Loan], config: &LendingConfig) -> Self {
        let mut stats = LenderStats {
            lender_id: lender_id.to_string(),
            total_funded: 0,
            active_count: 0,
            repaid_count: 0,
            approved_count: 0,
            denied_count: 0,
            yield_proxy: Decimal::ZERO,
            default_rate_proxy: Decimal::ZERO,
        };

        let mut funded = Decimal::ZERO;
        let mut weighted_yield = Decimal::ZERO;
        let mut weighted_default = Decimal::ZERO;

        for loan in loans.iter().filter(|l| l.lender_id.as_deref() == Some(lender_id)) {
            match loan.status {
                LoanStatus::Approved => stats.approved_count += 1,
                LoanStatus::Denied => stats.denied_count += 1,
                LoanStatus::Active => stats.active_count += 1,
                LoanStatus::Repaid => stats.repaid_count += 1,
                LoanStatus::Pending => {}
            }

            if !loan.is_funded() {
                continue;
            }

            let amount = loan.approved_amount.unwrap_or(loan.requested_amount);
            stats.total_funded = stats.total_funded.saturating_add(amount);

            let weight = Decimal::from(amount);
            funded += weight;
            weighted_yield += weight * config.yield_pct.for_tier(loan.risk_tier);
            weighted_default += weight * config.default_rate_pct.for_tier(loan.risk_tier);
        }

        if funded > Decimal::ZERO {
            stats.yield_proxy = (weighted_yield / funded).round_dp(2);
            stats.default_rate_proxy = (weighted_default / funded).round_dp(2);
        }

        stats
    }
}

/// Loan Service - apply, review, fund, repay
pub struct LoanService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> LoanService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Borrower requests a loan. The risk tier is taken from the current
    /// score now and never recomputed.
    pub async fn apply(
        &self,
        borrower_id: &str,
        requested_amount: i64,
        term_days: i64,
    ) -> BusinessResult<Loan> {
        let borrower = self
            .ctx
            .require_role(borrower_id, "apply", Role::can_borrow)
            .await?;

        // Validate before looking at the score; the tier is filled in below.
        let mut loan = Loan::new(&borrower.id, requested_amount, term_days, RiskTier::High)?;

        let score = ScoringService::new(self.ctx)
            .latest(&borrower.id)
            .await?
            .ok_or_else(|| BusinessError::NoScore(borrower.id.clone()))?;
        loan.risk_tier = RiskClassifier::classify(&score.score_handle);

        let mut tx = self.ctx.begin().await?;
        LoanRepo::insert(&mut *tx, &loan).await?;
        AuditService::record_in(
            &mut tx,
            NewAuditEntry::new(AuditAction::LoanRequested)
                .with_user(&borrower.id)
                .with_entity("loan", &loan.id)
                .with_metadata(json!({
                    "amount": loan.requested_amount,
                    "term_days": loan.term_days,
                    "risk_tier": loan.risk_tier.as_str(),
                })),
        )
        .await?;
        self.ctx.commit(tx).await?;

        info!(loan_id = %loan.id, borrower_id = %borrower.id, tier = %loan.risk_tier, "Loan requested");
        Ok(loan)
    }

    /// Lender approves a pending loan. `approved_amount` defaults to the
    /// requested amount and may not exceed it.
    pub async fn approve(
        &self,
        loan_id: &str,
        lender_id: &str,
        approved_amount: Option<i64>,
    ) -> BusinessResult<Loan> {
        let lender = self
            .ctx
            .require_role(lender_id, "approve", Role::can_review_loans)
            .await?;
        let loan = self.load(loan_id).await?;
        expect_status(&loan, LoanStatus::Pending)?;

        let amount = loan.check_approved_amount(approved_amount.unwrap_or(loan.requested_amount))?;
        let changes = LoanChanges::new()
            .with_lender(&lender.id)
            .with_approved_amount(amount)
            .with_decision(HandleCodec::encode(1).as_str());

        self.apply_transition(
            &lender,
            loan_id,
            LoanTransition::Approve,
            &changes,
            json!({ "approved_amount": amount }),
        )
        .await
    }

    /// Lender denies a pending loan.
    pub async fn deny(&self, loan_id: &str, lender_id: &str) -> BusinessResult<Loan> {
        let lender = self
            .ctx
            .require_role(lender_id, "deny", Role::can_review_loans)
            .await?;
        let loan = self.load(loan_id).await?;
        expect_status(&loan, LoanStatus::Pending)?;

        let changes = LoanChanges::new()
            .with_lender(&lender.id)
            .with_decision(HandleCodec::encode(0).as_str());

        self.apply_transition(&lender, loan_id, LoanTransition::Deny, &changes, Value::Null)
            .await
    }

    /// The approving lender disburses an approved loan.
    pub async fn fund(&self, loan_id: &str, lender_id: &str) -> BusinessResult<Loan> {
        let lender = self
            .ctx
            .require_role(lender_id, "fund", Role::can_review_loans)
            .await?;
        let loan = self.load(loan_id).await?;
        expect_status(&loan, LoanStatus::Approved)?;

        if loan.lender_id.as_deref() != Some(lender.id.as_str()) {
            return Err(BusinessError::permission(
                lender.role.as_str(),
                "fund a loan approved by another lender",
            ));
        }

        self.apply_transition(
            &lender,
            loan_id,
            LoanTransition::Fund,
            &LoanChanges::new(),
            json!({ "amount": loan.approved_amount }),
        )
        .await
    }

    /// The owning borrower repays an active loan.
    pub async fn repay(&self, loan_id: &str, borrower_id: &str) -> BusinessResult<Loan> {
        let borrower = self
            .ctx
            .require_role(borrower_id, "repay", Role::can_borrow)
            .await?;
        let loan = self.load(loan_id).await?;

        if loan.borrower_id != borrower.id {
            return Err(BusinessError::permission(
                borrower.role.as_str(),
                "repay another borrower's loan",
            ));
        }
        expect_status(&loan, LoanStatus::Active)?;

        self.apply_transition(
            &borrower,
            loan_id,
            LoanTransition::Repay,
            &LoanChanges::new(),
            Value::Null,
        )
        .await
    }

    /// Loans visible to the caller, most recent first.
    ///
    /// Borrowers see their own, lenders see every pending loan plus the
    /// ones they decided, admins see all, unknown callers see nothing.
    pub async fn list_loans(&self, caller_id: &str) -> BusinessResult<Vec<Loan>> {
        let Some(caller) = self.ctx.load_user(caller_id).await? else {
            return Ok(Vec::new());
        };

        let pool = self.ctx.pool();
        let rows = match caller.role {
            Role::Borrower => LoanRepo::list_by_borrower(pool, &caller.id).await?,
            Role::Lender => LoanRepo::list_visible_to_lender(pool, &caller.id).await?,
            Role::Admin => LoanRepo::list_all(pool).await?,
        };
        to_loans(rows)
    }

    /// One loan, if the caller may see it. Invisible loans are reported
    /// as not found.
    pub async fn get_loan(&self, caller_id: &str, loan_id: &str) -> BusinessResult<Loan> {
        let loan = self.load(loan_id).await?;
        let caller = self.ctx.load_user(caller_id).await?;

        match caller {
            Some(ref user) if is_visible(user, &loan) => Ok(loan),
            _ => Err(BusinessError::not_found("Loan", loan_id)),
        }
    }

    /// Recomputed from the lender's loans on every call
    pub async fn lender_stats(&self, lender_id: &str) -> BusinessResult<LenderStats> {
        if self.ctx.load_user(lender_id).await?.is_none() {
            return Err(BusinessError::not_found("User", lender_id));
        }

        let loans = to_loans(LoanRepo::list_by_lender(self.ctx.pool(), lender_id).await?)?;
        Ok(LenderStats::from_loans(lender_id, &loans, self.ctx.config()))
    }

    // === Internals ===

    async fn load(&self, loan_id: &str) -> BusinessResult<Loan> {
        let row = LoanRepo::find_by_id(self.ctx.pool(), loan_id)
            .await?
            .ok_or_else(|| BusinessError::not_found("Loan", loan_id))?;
        Ok(Loan::try_from(row)?)
    }

    /// CAS the status, then audit in the same transaction
    async fn apply_transition(
        &self,
        actor: &User,
        loan_id: &str,
        transition: LoanTransition,
        changes: &LoanChanges,
        metadata: Value,
    ) -> BusinessResult<Loan> {
        let from = transition.from_status();
        let to = transition.to_status();

        let mut tx = self.ctx.begin().await?;
        let swapped = LoanRepo::transition(&mut *tx, loan_id, from, to, changes).await?;

        if !swapped {
            tx.rollback()
                .await
                .map_err(veilcredit_persistence::PersistenceError::from)?;
            let err = self.transition_miss(loan_id, from).await;
            warn!(loan_id, transition = transition.as_str(), error = %err, "Loan transition rejected");
            return Err(err);
        }

        let mut draft = NewAuditEntry::new(transition.audit_action())
            .with_user(&actor.id)
            .with_entity("loan", loan_id);
        if !metadata.is_null() {
            draft = draft.with_metadata(metadata);
        }
        AuditService::record_in(&mut tx, draft).await?;
        self.ctx.commit(tx).await?;

        info!(loan_id, actor_id = %actor.id, status = %to, "Loan transitioned");
        self.load(loan_id).await
    }

    /// Explain a lost compare-and-swap
    async fn transition_miss(&self, loan_id: &str, expected: LoanStatus) -> BusinessError {
        match LoanRepo::find_by_id(self.ctx.pool(), loan_id).await {
            Ok(Some(row)) => {
                BusinessError::invalid_state("Loan", loan_id, expected.as_str(), &row.status)
            }
            Ok(None) => BusinessError::not_found("Loan", loan_id),
            Err(e) => e.into(),
        }
    }
}

fn expect_status(loan: &Loan, expected: LoanStatus) -> BusinessResult<()> {
    if loan.status != expected {
        return Err(BusinessError::invalid_state(
            "Loan",
            &loan.id,
            expected.as_str(),
            loan.status.as_str(),
        ));
    }
    Ok(())
}

fn is_visible(user: &User, loan: &Loan) -> bool {
    match user.role {
        Role::Admin => true,
        Role::Borrower => loan.borrower_id == user.id,
        Role::Lender => {
            loan.status == LoanStatus::Pending || loan.lender_id.as_deref() == Some(user.id.as_str())
        }
    }
}

fn to_loans(rows: Vec<LoanRow>) -> BusinessResult<Vec<Loan>> {
    let mut loans = Vec::with_capacity(rows.len());
    for row in rows {
        loans.push(Loan::try_from(row)?);
    }
    Ok(loans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn funded(lender: &str, amount: i64, tier: RiskTier, status: LoanStatus) -> Loan {
        let mut loan = Loan::new("USR-b", amount, 30, tier).unwrap();
        loan.lender_id = Some(lender.to_string());
        loan.approved_amount = Some(amount);
        loan.status = status;
        loan
    }

    #[test]
    fn test_stats_empty() {
        let stats = LenderStats::from_loans("USR-l", &[], &LendingConfig::default());
        assert_eq!(stats.total_funded, 0);
        assert_eq!(stats.yield_proxy, Decimal::ZERO);
        assert_eq!(stats.default_rate_proxy, Decimal::ZERO);
    }

    #[test]
    fn test_stats_weighting() {
        let config = LendingConfig::default();
        let loans = vec![
            funded("USR-l", 3_000, RiskTier::Low, LoanStatus::Active),
            funded("USR-l", 1_000, RiskTier::High, LoanStatus::Repaid),
            // approved but not funded: counted, not weighted
            funded("USR-l", 9_000, RiskTier::High, LoanStatus::Approved),
        ];

        let stats = LenderStats::from_loans("USR-l", &loans, &config);

        assert_eq!(stats.total_funded, 4_000);
        assert_eq!(stats.active_count, 1);
        assert_eq!(stats.repaid_count, 1);
        assert_eq!(stats.approved_count, 1);
        // (3000*5 + 1000*15) / 4000
        assert_eq!(stats.yield_proxy, dec!(7.5));
        // (3000*1 + 1000*10) / 4000
        assert_eq!(stats.default_rate_proxy, dec!(3.25));
    }

    #[test]
    fn test_stats_total_saturates() {
        let loans = vec![
            funded("USR-l", i64::MAX, RiskTier::Low, LoanStatus::Active),
            funded("USR-l", i64::MAX, RiskTier::High, LoanStatus::Repaid),
        ];

        let stats = LenderStats::from_loans("USR-l", &loans, &LendingConfig::default());

        assert_eq!(stats.total_funded, i64::MAX);
        // equal weights: (5 + 15) / 2 and (1 + 10) / 2
        assert_eq!(stats.yield_proxy, dec!(10));
        assert_eq!(stats.default_rate_proxy, dec!(5.5));
    }

    #[test]
    fn test_stats_ignore_other_lenders() {
        let loans = vec![funded("USR-other", 5_000, RiskTier::Low, LoanStatus::Active)];
        let stats = LenderStats::from_loans("USR-l", &loans, &LendingConfig::default());
        assert_eq!(stats.total_funded, 0);
        assert_eq!(stats.active_count, 0);
    }

    #[test]
    fn test_visibility() {
        let borrower = User::new("0x00000000000000000000000000000000000000b1", Role::Borrower).unwrap();
        let lender = User::new("0x00000000000000000000000000000000000000c1", Role::Lender).unwrap();

        let mut loan = Loan::new(&borrower.id, 100, 30, RiskTier::Low).unwrap();
        assert!(is_visible(&borrower, &loan));
        assert!(is_visible(&lender, &loan));

        loan.status = LoanStatus::Approved;
        loan.lender_id = Some("USR-someone-else".to_string());
        assert!(!is_visible(&lender, &loan));
        assert!(is_visible(&borrower, &loan));
    }
}
