//! # User Module
//!
//! Wallet-keyed identities and their role. Roles are a closed enum with
//! explicit capability checks per operation:
//! - Borrower: submits data, applies for and repays loans
//! - Lender: reviews pending loans, funds the ones it approved
//! - Admin: unrestricted reads, operates the coprocessor

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Borrower,
    Lender,
    Admin,
}

impl Role {
    /// Code string stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Borrower => "borrower",
            Role::Lender => "lender",
            Role::Admin => "admin",
        }
    }

    /// Parse from the stored code
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "borrower" => Some(Role::Borrower),
            "lender" => Some(Role::Lender),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn can_borrow(&self) -> bool {
        matches!(self, Role::Borrower)
    }

    /// Approve / deny / fund.
    pub fn can_review_loans(&self) -> bool {
        matches!(self, Role::Lender)
    }

    pub fn can_administer(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Roles that need more than a wallet connection to obtain.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Lender | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Lowercase `0x` + 40 hex; unique.
    pub wallet_address: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(wallet_address: &str, role: Role) -> CoreResult<Self> {
        Ok(Self {
            id: crate::new_id("USR"),
            wallet_address: normalize_wallet_address(wallet_address)?,
            role,
            created_at: Utc::now(),
        })
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} - {})", self.wallet_address, self.id, self.role)
    }
}

/// Validate an EVM-style address and lowercase it.
pub fn normalize_wallet_address(raw: &str) -> CoreResult<String> {
    let trimmed = raw.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| CoreError::InvalidWalletAddress(raw.to_string()))?;

    if hex_part.len() != 40 || !hex_part.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CoreError::InvalidWalletAddress(raw.to_string()));
    }

    Ok(format!("0x{}", hex_part.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "0xAbCdEf0123456789abcdef0123456789ABCDEF01";

    #[test]
    fn test_role_str() {
        assert_eq!(Role::Lender.as_str(), "lender");
        assert_eq!(Role::from_str("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::from_str("auditor"), None);
    }

    #[test]
    fn test_role_capabilities() {
        assert!(Role::Borrower.can_borrow());
        assert!(!Role::Lender.can_borrow());

        assert!(Role::Lender.can_review_loans());
        assert!(!Role::Admin.can_review_loans());
        assert!(!Role::Borrower.can_review_loans());

        assert!(Role::Admin.can_administer());
        assert!(Role::Admin.is_privileged());
        assert!(!Role::Borrower.is_privileged());
    }

    #[test]
    fn test_normalize_wallet_address() {
        assert_eq!(
            normalize_wallet_address(ALICE).unwrap(),
            "0xabcdef0123456789abcdef0123456789abcdef01"
        );
        assert!(normalize_wallet_address("abcdef").is_err());
        assert!(normalize_wallet_address("0x1234").is_err());
        assert!(normalize_wallet_address("0xZZcdef0123456789abcdef0123456789abcdef01").is_err());
    }

    #[test]
    fn test_user_creation() {
        let user = User::new(ALICE, Role::Borrower).unwrap();
        assert!(user.id.starts_with("USR-"));
        assert_eq!(user.wallet_address, "0xabcdef0123456789abcdef0123456789abcdef01");
        assert_eq!(user.role, Role::Borrower);
    }
}
