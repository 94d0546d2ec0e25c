//! Vault operations for one tenant.
//!
//! All functions take the account client as first parameter.

use tracing::{error, info, instrument};

use crate::services::client::api::response_error_message;
use crate::services::client::errors::{AccountError, AccountResult};
use crate::services::client::http::HttpVaultAccount;
use crate::services::client::types::{CreateVaultRequest, Vault, VaultListResponse};

/// List every vault visible to the session, following cursors until the
/// tenant stops returning one.
#[instrument(skip(client), err)]
pub async fn list_vaults_impl(client: &HttpVaultAccount) -> AccountResult<Vec<Vault>> {
    let mut all_vaults = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let mut url = format!("{}/v1/vaults", client.base_url());
        if let Some(cursor) = &cursor {
            url.push_str(&format!("?cursor={}", cursor));
        }

        let response = client
            .http()
            .get(&url)
            .send()
            .await
            .map_err(|e| AccountError::Network {
                message: format!("Failed to list vaults: {}", e),
            })?;

        if !response.status().is_success() {
            let message = response_error_message(response).await;
            error!("Vault listing failed: {}", message);
            return Err(AccountError::Network {
                message: format!("Failed to list vaults: {}", message),
            });
        }

        let page: VaultListResponse =
            response.json().await.map_err(|e| AccountError::InvalidResponse {
                message: format!("Failed to parse vault list: {}", e),
            })?;

        all_vaults.extend(page.vaults);

        cursor = match page.cursor {
            Some(next_cursor) if !next_cursor.is_empty() => Some(next_cursor),
            _ => break, // No cursor means no more pages
        };
    }

    info!("Found {} vaults", all_vaults.len());
    Ok(all_vaults)
}

/// Create a destination vault.
///
/// Any failure here is a hard vault failure: a name collision (HTTP 409) is
/// reported with guidance instead of silently reusing the existing vault.
#[instrument(skip(client), err)]
pub async fn create_vault_impl(client: &HttpVaultAccount, name: &str) -> AccountResult<Vault> {
    info!("Creating destination vault '{}'", name);

    let url = format!("{}/v1/vaults", client.base_url());
    let request = CreateVaultRequest {
        name: name.to_string(),
    };

    let response = client
        .http()
        .post(&url)
        .json(&request)
        .send()
        .await
        .map_err(|e| AccountError::VaultCreate {
            name: name.to_string(),
            message: format!("request failed: {}", e),
        })?;

    let status = response.status();
    if status.is_success() {
        let vault: Vault = response.json().await.map_err(|e| AccountError::InvalidResponse {
            message: format!("Failed to parse created vault: {}", e),
        })?;
        info!("Created vault '{}' with id {}", vault.name, vault.id);
        return Ok(vault);
    }

    let message = response_error_message(response).await;
    error!("Vault creation failed for '{}': {}", name, message);

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(AccountError::Auth { message });
    }

    let message = if status == reqwest::StatusCode::CONFLICT {
        format!(
            "{} - a vault with this name already exists; rename or remove it and re-run",
            message
        )
    } else {
        message
    };

    Err(AccountError::VaultCreate {
        name: name.to_string(),
        message,
    })
}
