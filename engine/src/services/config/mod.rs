//! Configuration for a migration run.
//!
//! One `MigrationConfig` is built by the caller and handed to the
//! orchestrator by value; there is no global configuration state.

use serde::{Deserialize, Serialize};

/// Configuration for the entire migration engine
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MigrationConfig {
    /// Concurrency limits for vault- and item-level work
    pub concurrency: ConcurrencyConfig,

    /// Retry behavior for transient tenant-API failures
    pub retry: RetryConfig,

    /// Network settings for the tenant HTTP clients
    pub network: NetworkConfig,

    /// External credential-CLI bridge settings
    pub bridge: BridgeConfig,
}

/// Concurrency limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Maximum number of vaults migrated simultaneously
    pub max_concurrent_vaults: usize,

    /// Maximum number of items in flight within any single vault
    pub max_concurrent_items: usize,
}

/// Retry behavior for transient failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per operation (first try included)
    pub max_attempts: u32,

    /// Base delay in milliseconds; attempt n waits base * 2^(n-1)
    pub base_delay_ms: u64,
}

/// Network settings for tenant HTTP clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,

    /// User agent string sent to both tenants
    pub user_agent: String,
}

/// External credential-CLI bridge settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Program name or path of the credential CLI
    pub program: String,

    /// Destination template id for custom items; when absent the bridge
    /// discovers one from `item template list`
    pub template_id: Option<String>,

    /// Timeout in milliseconds for one CLI invocation
    pub invocation_timeout_ms: u64,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_vaults: 2,
            max_concurrent_items: 1, // item order within a vault is preserved
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000, // 1s, 2s, 4s
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            user_agent: "vault-migrate/0.1".to_string(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            program: "vault-cli".to_string(),
            template_id: None,
            invocation_timeout_ms: 60_000,
        }
    }
}

impl MigrationConfig {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.concurrency.max_concurrent_vaults == 0 {
            errors.push("max_concurrent_vaults must be greater than 0".to_string());
        }

        if self.concurrency.max_concurrent_items == 0 {
            errors.push("max_concurrent_items must be greater than 0".to_string());
        }

        if self.retry.max_attempts == 0 {
            errors.push("retry max_attempts must be greater than 0".to_string());
        }

        if self.network.request_timeout_ms == 0 {
            errors.push("request_timeout_ms must be greater than 0".to_string());
        }

        if self.bridge.program.is_empty() {
            errors.push("bridge program must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
