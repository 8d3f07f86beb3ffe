//! # Risk Module
//!
//! Maps a credit score onto a coarse tier. The tier is the only
//! score-derived signal a lender ever sees.

use crate::handle::Handle;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scores at or above this are `low` risk.
pub const LOW_RISK_FLOOR: u64 = 700;
/// Scores at or above this (and below `LOW_RISK_FLOOR`) are `medium` risk.
pub const MEDIUM_RISK_FLOOR: u64 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(RiskTier::Low),
            "medium" => Some(RiskTier::Medium),
            "high" => Some(RiskTier::High),
            _ => None,
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Total classifier: every input maps to a tier, malformed input to `High`.
pub struct RiskClassifier;

impl RiskClassifier {
    pub fn classify(handle: &Handle) -> RiskTier {
        Self::classify_score(handle.decode())
    }

    pub fn classify_score(score: u64) -> RiskTier {
        if score >= LOW_RISK_FLOOR {
            RiskTier::Low
        } else if score >= MEDIUM_RISK_FLOOR {
            RiskTier::Medium
        } else {
            RiskTier::High
        }
    }
}
