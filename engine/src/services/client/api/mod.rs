//! API operations against one tenant.
//!
//! This module contains the tenant REST call implementations:
//! - Vault operations (list, create)
//! - Item operations (list, get, create, count)
//! - File operations (raw content read)
//!
//! All functions take the account client as first parameter; the
//! `VaultAccount` impl on `HttpVaultAccount` wraps them.

pub mod vaults;
pub use vaults::*;

pub mod items;
pub use items::*;

pub mod files;
pub use files::*;

use crate::services::client::types::ApiErrorBody;

/// Fold a non-success response into one human-readable message, preferring
/// the API's own `{message}` body and always keeping the HTTP status (the
/// retry predicate reads status codes out of rendered messages).
pub(crate) async fn response_error_message(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ApiErrorBody>(&body)
        .ok()
        .and_then(|parsed| parsed.message)
        .unwrap_or(body);

    if detail.trim().is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, detail.trim())
    }
}
