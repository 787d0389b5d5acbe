//! Health report types.
//!
//! # Severity
//! ```text
//! active < unknown < impaired < failure
//! ```
//! A parent report is never less severe than its most severe direct child.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Operational status of a subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Active,
    Unknown,
    Impaired,
    Failure,
}

impl HealthStatus {
    /// Rank used when rolling statuses up into a parent.
    pub fn severity(self) -> u8 {
        match self {
            HealthStatus::Active => 0,
            HealthStatus::Unknown => 1,
            HealthStatus::Impaired => 2,
            HealthStatus::Failure => 3,
        }
    }

    /// The more severe of two statuses.
    pub fn worst(self, other: HealthStatus) -> HealthStatus {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Active => "active",
            HealthStatus::Unknown => "unknown",
            HealthStatus::Impaired => "impaired",
            HealthStatus::Failure => "failure",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node in a health report tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemHealth {
    /// Identifier of the probed subsystem.
    pub name: String,
    pub status: HealthStatus,
    /// Nested reports, in probe order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subsystems: Option<Vec<SystemHealth>>,
    /// Human-readable diagnostic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    /// When the report was produced (milliseconds since the Unix epoch).
    #[serde(default)]
    pub time_stamp: u64,
}

impl SystemHealth {
    /// Create a report stamped with the current time.
    pub fn new(name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            status,
            subsystems: None,
            status_message: None,
            time_stamp: now_millis(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.status_message = Some(message.into());
        self
    }

    pub fn with_subsystems(mut self, subsystems: Vec<SystemHealth>) -> Self {
        self.subsystems = Some(subsystems);
        self
    }

    /// Re-stamp the report with the current time.
    pub fn stamped(mut self) -> Self {
        self.time_stamp = now_millis();
        self
    }

    /// Status after escalating over direct children.
    pub fn rolled_up_status(&self) -> HealthStatus {
        self.subsystems
            .iter()
            .flatten()
            .fold(self.status, |acc, child| acc.worst(child.status))
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
