//! The per-tenant account seam.
//!
//! One implementor holds one authenticated session against one tenant. The
//! orchestrator drives a source account and a destination account through
//! this trait only, which is also what lets tests run against an in-memory
//! tenant.

use async_trait::async_trait;

use crate::services::client::errors::AccountResult;
use crate::services::client::types::{Item, ItemSummary, Vault};

/// Operations the migration engine needs from one authenticated tenant
/// session.
#[async_trait]
pub trait VaultAccount: Send + Sync {
    /// All vaults visible to this session.
    async fn list_vaults(&self) -> AccountResult<Vec<Vault>>;

    /// Active-item summaries for one vault, in the tenant's enumeration
    /// order.
    async fn list_item_summaries(&self, vault_id: &str) -> AccountResult<Vec<ItemSummary>>;

    /// One full item with file payloads resolved to content.
    async fn get_item(&self, vault_id: &str, item_id: &str) -> AccountResult<Item>;

    /// Create a destination vault. A name collision is a hard failure, not
    /// an invitation to reuse the existing vault.
    async fn create_vault(&self, name: &str) -> AccountResult<Vault>;

    /// Write one item, returning the id the tenant assigned.
    async fn create_item(&self, item: &Item) -> AccountResult<String>;

    /// Item count for reconciliation. The archived leg never fails the
    /// count; it degrades to the active count with a warning.
    async fn count_items(&self, vault_id: &str, include_archived: bool) -> AccountResult<u32>;
}
