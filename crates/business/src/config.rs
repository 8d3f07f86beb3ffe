//! Lending configuration
//!
//! Loaded from a JSON file; every field has a default so partial files work.
//! `VEILCREDIT_ACCESS_CODE` overrides the demo access code.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use veilcredit_core::RiskTier;

/// Environment variable overriding `demo_access_code`
pub const ACCESS_CODE_ENV: &str = "VEILCREDIT_ACCESS_CODE";

/// Configuration for the lending services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LendingConfig {
    // === Identity ===
    /// Shared code granting lender/admin on connect.
    /// Demo/reviewer backdoor; NOT production authentication.
    #[serde(default = "default_demo_access_code")]
    pub demo_access_code: String,

    // === Audit ===
    /// Default page size for audit queries
    #[serde(default = "default_audit_query_limit")]
    pub audit_query_limit: i64,

    // === Lender stats ===
    /// Annual yield per tier, in percent
    #[serde(default = "default_yield_pct")]
    pub yield_pct: TierRates,

    /// Expected default rate per tier, in percent
    #[serde(default = "default_default_rate_pct")]
    pub default_rate_pct: TierRates,
}

/// One rate per risk tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierRates {
    pub low: Decimal,
    pub medium: Decimal,
    pub high: Decimal,
}

impl TierRates {
    pub fn for_tier(&self, tier: RiskTier) -> Decimal {
        match tier {
            RiskTier::Low => self.low,
            RiskTier::Medium => self.medium,
            RiskTier::High => self.high,
        }
    }
}

// Default value functions for serde
fn default_demo_access_code() -> String {
    "VEIL-DEMO".to_string()
}

fn default_audit_query_limit() -> i64 {
    100
}

fn default_yield_pct() -> TierRates {
    TierRates {
        low: Decimal::new(5, 0),
        medium: Decimal::new(9, 0),
        high: Decimal::new(15, 0),
    }
}

fn default_default_rate_pct() -> TierRates {
    TierRates {
        low: Decimal::new(1, 0),
        medium: Decimal::new(35, 1), // 3.5
        high: Decimal::new(10, 0),
    }
}

impl Default for LendingConfig {
    fn default() -> Self {
        Self {
            demo_access_code: default_demo_access_code(),
            audit_query_limit: default_audit_query_limit(),
            yield_pct: default_yield_pct(),
            default_rate_pct: default_default_rate_pct(),
        }
    }
}

impl LendingConfig {
    /// Load configuration from JSON file
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Apply environment overrides
    pub fn with_env(mut self) -> Self {
        if let Ok(code) = std::env::var(ACCESS_CODE_ENV) {
            if !code.trim().is_empty() {
                self.demo_access_code = code.trim().to_string();
            }
        }
        self
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Self {
        Self::default().with_env()
    }
}
