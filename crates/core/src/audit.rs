//! # Audit Module
//!
//! Append-only, hash-chained audit entries. Each entry commits to its own
//! content and to the previous entry's hash, so editing or dropping a stored
//! entry breaks the chain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// `prev_hash` of the first entry.
pub const GENESIS_HASH: &str = "GENESIS";

/// Enumerated audit action names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    // === Identity ===
    UserRegistered,
    RoleChanged,

    // === Scoring ===
    ScoreComputed,
    ScoreDecrypted,

    // === Loan lifecycle ===
    LoanRequested,
    LoanApproved,
    LoanDenied,
    LoanFunded,
    LoanRepaid,

    // === Coprocessor ===
    KeyRotated,
    CoprocessorStatusUpdated,

    /// Appended directly through the inbound surface.
    AuditAppended,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::UserRegistered => "USER_REGISTERED",
            AuditAction::RoleChanged => "ROLE_CHANGED",
            AuditAction::ScoreComputed => "SCORE_COMPUTED",
            AuditAction::ScoreDecrypted => "SCORE_DECRYPTED",
            AuditAction::LoanRequested => "LOAN_REQUESTED",
            AuditAction::LoanApproved => "LOAN_APPROVED",
            AuditAction::LoanDenied => "LOAN_DENIED",
            AuditAction::LoanFunded => "LOAN_FUNDED",
            AuditAction::LoanRepaid => "LOAN_REPAID",
            AuditAction::KeyRotated => "KEY_ROTATED",
            AuditAction::CoprocessorStatusUpdated => "COPROCESSOR_STATUS_UPDATED",
            AuditAction::AuditAppended => "AUDIT_APPENDED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "USER_REGISTERED" => Some(AuditAction::UserRegistered),
            "ROLE_CHANGED" => Some(AuditAction::RoleChanged),
            "SCORE_COMPUTED" => Some(AuditAction::ScoreComputed),
            "SCORE_DECRYPTED" => Some(AuditAction::ScoreDecrypted),
            "LOAN_REQUESTED" => Some(AuditAction::LoanRequested),
            "LOAN_APPROVED" => Some(AuditAction::LoanApproved),
            "LOAN_DENIED" => Some(AuditAction::LoanDenied),
            "LOAN_FUNDED" => Some(AuditAction::LoanFunded),
            "LOAN_REPAID" => Some(AuditAction::LoanRepaid),
            "KEY_ROTATED" => Some(AuditAction::KeyRotated),
            "COPROCESSOR_STATUS_UPDATED" => Some(AuditAction::CoprocessorStatusUpdated),
            "AUDIT_APPENDED" => Some(AuditAction::AuditAppended),
            _ => None,
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An entry about to be appended. Only `action` is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAuditEntry {
    pub action: AuditAction,
    /// `None` for system-initiated actions.
    pub user_id: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl NewAuditEntry {
    pub fn new(action: AuditAction) -> Self {
        Self {
            action,
            user_id: None,
            entity_type: None,
            entity_id: None,
            metadata: None,
        }
    }

    // === Builder methods ===

    pub fn with_user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn with_entity(mut self, entity_type: &str, entity_id: &str) -> Self {
        self.entity_type = Some(entity_type.to_string());
        self.entity_id = Some(entity_id.to_string());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Fix position in the chain and compute the hash.
    pub fn seal(self, seq: i64, prev_hash: &str, timestamp: DateTime<Utc>) -> AuditEntry {
        let mut entry = AuditEntry {
            id: crate::new_id("AUD"),
            seq,
            user_id: self.user_id,
            action: self.action,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            metadata: self.metadata,
            timestamp,
            prev_hash: prev_hash.to_string(),
            hash: String::new(),
        };
        entry.hash = calculate_entry_hash(&entry);
        entry
    }
}

/// A stored, immutable audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    /// Position in the chain, starting at 1.
    pub seq: i64,
    pub user_id: Option<String>,
    pub action: AuditAction,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    pub prev_hash: String,
    pub hash: String,
}

impl AuditEntry {
    pub fn is_system(&self) -> bool {
        self.user_id.is_none()
    }
}

/// SHA256 over every field except `hash`.
pub fn calculate_entry_hash(entry: &AuditEntry) -> String {
    let mut hasher = Sha256::new();

    hasher.update(entry.seq.to_le_bytes());
    hasher.update(entry.prev_hash.as_bytes());
    hasher.update(entry.id.as_bytes());
    hasher.update(entry.action.as_str().as_bytes());
    // Microseconds survive every storage round trip.
    hasher.update(entry.timestamp.timestamp_micros().to_le_bytes());

    for field in [&entry.user_id, &entry.entity_type, &entry.entity_id] {
        match field {
            Some(value) => {
                hasher.update([1u8]);
                hasher.update((value.len() as u64).to_le_bytes());
                hasher.update(value.as_bytes());
            }
            None => hasher.update([0u8]),
        }
    }

    if let Some(ref metadata) = entry.metadata {
        // serde_json maps are ordered by key, so this is canonical.
        hasher.update(metadata.to_string().as_bytes());
    }

    hex::encode(hasher.finalize())
}

/// Verify an ascending run of entries starting at the genesis entry.
pub fn verify_chain(entries: &[AuditEntry]) -> Result<(), ChainError> {
    let mut prev_hash = GENESIS_HASH.to_string();

    for (i, entry) in entries.iter().enumerate() {
        let expected_seq = i as i64 + 1;
        if entry.seq != expected_seq {
            return Err(ChainError::InvalidSequence {
                expected: expected_seq,
                actual: entry.seq,
            });
        }

        if entry.prev_hash != prev_hash {
            return Err(ChainError::BrokenLink {
                seq: entry.seq,
                expected: prev_hash,
                actual: entry.prev_hash.clone(),
            });
        }

        let calculated = calculate_entry_hash(entry);
        if entry.hash != calculated {
            return Err(ChainError::InvalidHash {
                seq: entry.seq,
                expected: calculated,
                actual: entry.hash.clone(),
            });
        }

        prev_hash = entry.hash.clone();
    }

    Ok(())
}

/// First inconsistency found while walking the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainError {
    BrokenLink {
        seq: i64,
        expected: String,
        actual: String,
    },
    InvalidHash {
        seq: i64,
        expected: String,
        actual: String,
    },
    InvalidSequence {
        expected: i64,
        actual: i64,
    },
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::BrokenLink {
                seq,
                expected,
                actual,
            } => write!(
                f,
                "Broken link at seq {}: expected prev_hash '{}', got '{}'",
                seq, expected, actual
            ),
            ChainError::InvalidHash {
                seq,
                expected,
                actual,
            } => write!(
                f,
                "Invalid hash at seq {}: expected '{}', got '{}'",
                seq, expected, actual
            ),
            ChainError::InvalidSequence { expected, actual } => {
                write!(f, "Invalid sequence: expected {}, got {}", expected, actual)
            }
        }
    }
}

impl std::error::Error for ChainError {}
