//! # Score Module
//!
//! Deterministic credit scoring over decoded financial indicators, plus the
//! `EncryptedSubmission` and `CreditScore` records it produces.
//!
//! Ratios are compared exactly in integer arithmetic; amounts are minor
//! units and never pass through floating point.

use crate::handle::{Handle, HandleCodec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Starting point before adjustments.
pub const BASE_SCORE: u32 = 600;
pub const MIN_SCORE: u32 = 300;
pub const MAX_SCORE: u32 = 850;

/// An exact `part / whole` ratio. A zero `whole` is treated as ratio 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ratio {
    num: u128,
    den: u128,
}

impl Ratio {
    pub fn of(part: u64, whole: u64) -> Self {
        if whole == 0 {
            return Self { num: 1, den: 1 };
        }
        Self {
            num: part as u128,
            den: whole as u128,
        }
    }

    /// `ratio < percent / 100`
    pub fn below_percent(&self, percent: u128) -> bool {
        self.num * 100 < percent * self.den
    }

    /// `ratio > percent / 100`
    pub fn above_percent(&self, percent: u128) -> bool {
        self.num * 100 > percent * self.den
    }

    /// Ratio in basis points, rounded down and saturated at `u64::MAX`.
    pub fn basis_points(&self) -> u64 {
        let bps = self.num.saturating_mul(10_000) / self.den;
        u64::try_from(bps).unwrap_or(u64::MAX)
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}bps", self.basis_points())
    }
}

/// Result of one scoring run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub score: u32,
    pub debt_to_income: Ratio,
    pub expense_ratio: Ratio,
    pub debt_adjustment: i32,
    pub expense_adjustment: i32,
}

/// The scoring function.
pub struct ScoreEngine;

impl ScoreEngine {
    /// Score plaintext indicators.
    pub fn compute(salary: u64, debts: u64, expenses: u64) -> ScoreBreakdown {
        let debt_to_income = Ratio::of(debts, salary);
        let expense_ratio = Ratio::of(expenses, salary);

        let debt_adjustment = if debt_to_income.below_percent(20) {
            150
        } else if debt_to_income.below_percent(40) {
            100
        } else if debt_to_income.below_percent(60) {
            50
        } else {
            -50
        };

        let expense_adjustment = if expense_ratio.below_percent(30) {
            100
        } else if expense_ratio.below_percent(50) {
            50
        } else if expense_ratio.above_percent(70) {
            -50
        } else {
            0
        };

        let raw = BASE_SCORE as i64 + debt_adjustment as i64 + expense_adjustment as i64;
        let score = raw.clamp(MIN_SCORE as i64, MAX_SCORE as i64) as u32;

        ScoreBreakdown {
            score,
            debt_to_income,
            expense_ratio,
            debt_adjustment,
            expense_adjustment,
        }
    }

    /// Decode the three handles, score them, and re-encode the result.
    pub fn evaluate(salary: &Handle, debts: &Handle, expenses: &Handle) -> (Handle, ScoreBreakdown) {
        let breakdown = Self::compute(salary.decode(), debts.decode(), expenses.decode());
        (HandleCodec::encode(breakdown.score as u64), breakdown)
    }
}

/// Lifecycle of a stored credit score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreStatus {
    Pending,
    Computed,
    /// Owner has revealed the plaintext.
    Decrypted,
}

impl ScoreStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreStatus::Pending => "pending",
            ScoreStatus::Computed => "computed",
            ScoreStatus::Decrypted => "decrypted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ScoreStatus::Pending),
            "computed" => Some(ScoreStatus::Computed),
            "decrypted" => Some(ScoreStatus::Decrypted),
            _ => None,
        }
    }
}

impl fmt::Display for ScoreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Encrypted financial indicators submitted by their owner. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptedSubmission {
    pub id: String,
    pub user_id: String,
    pub salary_handle: Handle,
    pub debts_handle: Handle,
    pub expenses_handle: Handle,
    pub submitted_at: DateTime<Utc>,
}

impl EncryptedSubmission {
    pub fn new(user_id: &str, salary: Handle, debts: Handle, expenses: Handle) -> Self {
        Self {
            id: crate::new_id("SUB"),
            user_id: user_id.to_string(),
            salary_handle: salary,
            debts_handle: debts,
            expenses_handle: expenses,
            submitted_at: Utc::now(),
        }
    }
}

/// A computed score. Newer scores supersede older ones; none are deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditScore {
    pub id: String,
    pub user_id: String,
    pub submission_id: Option<String>,
    pub score_handle: Handle,
    pub status: ScoreStatus,
    pub computed_at: DateTime<Utc>,
}

impl CreditScore {
    pub fn computed(user_id: &str, submission_id: Option<&str>, score_handle: Handle) -> Self {
        Self {
            id: crate::new_id("SCORE"),
            user_id: user_id.to_string(),
            submission_id: submission_id.map(str::to_string),
            score_handle,
            status: ScoreStatus::Computed,
            computed_at: Utc::now(),
        }
    }
}
