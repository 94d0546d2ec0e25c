// Tenant-facing client functionality for the vault migration engine.
//
// This module provides everything the engine needs from one tenant:
// - Wire types for vaults, items, fields, and files
// - The VaultAccount seam the orchestrator drives
// - The HTTP implementation (bearer-session reqwest client)
// - Per-area API call implementations

pub mod account;
pub mod api;
pub mod errors;
pub mod http;
pub mod types;


// Re-export core types for easy access
pub use types::{
    AddressDetails,
    ApiErrorBody,
    Category,
    CreateItemResponse,
    CreateVaultRequest,
    Field,
    FieldType,
    FileAttachment,
    Item,
    ItemListResponse,
    ItemSummary,
    KeyPairDetails,
    Section,
    Vault,
    VaultListResponse,
    Website,
    WhoamiResponse,
};

// Re-export error types
pub use errors::{AccountError, AccountResult, CreateErrorKind};

// Re-export the account seam and its HTTP implementation
pub use account::VaultAccount;
pub use http::HttpVaultAccount;
