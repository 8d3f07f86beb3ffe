//! # Coprocessor Module
//!
//! Operational telemetry for the (simulated) confidential-compute
//! coprocessor. There is exactly one status record; it is created lazily on
//! the first write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CoprocessorState {
    #[default]
    Active,
    Degraded,
    Offline,
}

impl CoprocessorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoprocessorState::Active => "active",
            CoprocessorState::Degraded => "degraded",
            CoprocessorState::Offline => "offline",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(CoprocessorState::Active),
            "degraded" => Some(CoprocessorState::Degraded),
            "offline" => Some(CoprocessorState::Offline),
            _ => None,
        }
    }
}

impl fmt::Display for CoprocessorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The singleton status record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoprocessorStatus {
    pub status: CoprocessorState,
    /// Observational only; rotating does not invalidate handles.
    pub last_key_rotation: Option<DateTime<Utc>>,
    /// Monotonic.
    pub total_computations: i64,
    pub average_latency_ms: f64,
    pub updated_at: DateTime<Utc>,
}

/// What `read()` returns before the first write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum CoprocessorSnapshot {
    Uninitialized,
    Initialized(CoprocessorStatus),
}

impl CoprocessorSnapshot {
    pub fn is_initialized(&self) -> bool {
        matches!(self, CoprocessorSnapshot::Initialized(_))
    }

    pub fn status(&self) -> Option<&CoprocessorStatus> {
        match self {
            CoprocessorSnapshot::Initialized(status) => Some(status),
            CoprocessorSnapshot::Uninitialized => None,
        }
    }
}

/// Merge-patch: `None` fields keep their stored value.
///
/// `total_computations` is absent; it only moves through
/// recorded computations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoprocessorPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CoprocessorState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_key_rotation: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_latency_ms: Option<f64>,
}

impl CoprocessorPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: CoprocessorState) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_key_rotation(mut self, at: DateTime<Utc>) -> Self {
        self.last_key_rotation = Some(at);
        self
    }

    pub fn with_average_latency(mut self, latency_ms: f64) -> Self {
        self.average_latency_ms = Some(latency_ms);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.last_key_rotation.is_none() && self.average_latency_ms.is_none()
    }
}
