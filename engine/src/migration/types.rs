//! Core result types for a migration run. No transport or process concerns
//! here; the orchestrator fills these in and the CLI renders them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State-machine phase of one vault migration. Phases advance strictly
/// forward; progress events carry the phase they were emitted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VaultPhase {
    Pending,
    CreatingDestinationVault,
    EnumeratingItems,
    MigratingItems,
    Reconciling,
}

impl VaultPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            VaultPhase::Pending => "pending",
            VaultPhase::CreatingDestinationVault => "creating-destination-vault",
            VaultPhase::EnumeratingItems => "enumerating-items",
            VaultPhase::MigratingItems => "migrating-items",
            VaultPhase::Reconciling => "reconciling",
        }
    }
}

impl fmt::Display for VaultPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Where one vault ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VaultStatus {
    InProgress,
    /// Every item made it and the destination count matches the source.
    Completed,
    /// The vault finished but at least one item failed or the counts differ.
    CompletedWithFailures,
    /// Cancellation observed; processed items are kept, the rest untouched.
    Cancelled,
    /// Vault-level failure (creation or enumeration); no items were written.
    Failed,
}

impl VaultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VaultStatus::InProgress => "in-progress",
            VaultStatus::Completed => "completed",
            VaultStatus::CompletedWithFailures => "completed-with-failures",
            VaultStatus::Cancelled => "cancelled",
            VaultStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for VaultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Per-item result. `progress_percent` is the position of this item over
/// the vault's total at the moment it finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// Source item id
    pub id: String,
    pub title: String,
    pub success: bool,
    pub error: Option<String>,
    pub progress_percent: f64,
}

impl ItemOutcome {
    /// Record a successful migration
    pub fn migrated(id: &str, title: &str, progress_percent: f64) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            success: true,
            error: None,
            progress_percent,
        }
    }

    /// Record a failed migration with the operator-facing message
    pub fn failed(id: &str, title: &str, error: String, progress_percent: f64) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            success: false,
            error: Some(error),
            progress_percent,
        }
    }
}

/// Aggregate for one vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultMigrationSummary {
    /// Destination vault id, absent when creation failed
    pub vault_id: Option<String>,
    pub vault_name: String,
    pub source_item_count: Option<u32>,
    pub dest_item_count: Option<u32>,
    pub success_count: u32,
    pub failure_count: u32,
    pub status: VaultStatus,
    pub outcomes: Vec<ItemOutcome>,
    /// Vault-level error when `status == Failed`
    pub error: Option<String>,
}

impl VaultMigrationSummary {
    /// Fresh summary for a vault that has not started yet
    pub fn pending(vault_name: &str) -> Self {
        Self {
            vault_id: None,
            vault_name: vault_name.to_string(),
            source_item_count: None,
            dest_item_count: None,
            success_count: 0,
            failure_count: 0,
            status: VaultStatus::InProgress,
            outcomes: Vec::new(),
            error: None,
        }
    }

    /// Vault that failed before any item was attempted
    pub fn failed(vault_name: &str, error: String) -> Self {
        Self {
            status: VaultStatus::Failed,
            error: Some(error),
            ..Self::pending(vault_name)
        }
    }

    pub fn record(&mut self, outcome: ItemOutcome) {
        if outcome.success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        self.outcomes.push(outcome);
    }

    pub fn items_processed(&self) -> u32 {
        self.success_count + self.failure_count
    }
}

/// Aggregate for one whole run, carried by the terminal progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub vaults: Vec<VaultMigrationSummary>,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn total_success_count(&self) -> u32 {
        self.vaults.iter().map(|v| v.success_count).sum()
    }

    pub fn total_failure_count(&self) -> u32 {
        self.vaults.iter().map(|v| v.failure_count).sum()
    }

    /// True only when every vault completed cleanly.
    pub fn is_clean(&self) -> bool {
        !self.cancelled
            && self
                .vaults
                .iter()
                .all(|v| v.status == VaultStatus::Completed)
    }
}
