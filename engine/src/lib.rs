//! Credential-vault migration engine: copies vaults and items between two
//! tenants, transcoding each item for the destination and falling back to
//! the external credential CLI for custom items.

pub mod migration;
pub mod services;

pub use migration::{
    ItemOutcome, MigrationOrchestrator, ProgressEvent, RunLog, RunSummary,
    VaultMigrationSummary, VaultStatus,
};
pub use services::bridge::{CliItemBridge, ItemBridge};
pub use services::client::{HttpVaultAccount, VaultAccount};
pub use services::config::MigrationConfig;
pub use services::errors::{RunError, RunResult};
