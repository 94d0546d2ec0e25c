//! Item operations for one tenant.
//!
//! All functions take the account client as first parameter.

use base64::Engine;
use tracing::{error, info, instrument, warn};

use crate::services::client::api::files::read_file_content_impl;
use crate::services::client::api::response_error_message;
use crate::services::client::errors::{AccountError, AccountResult, CreateErrorKind};
use crate::services::client::http::HttpVaultAccount;
use crate::services::client::types::{CreateItemResponse, Item, ItemListResponse, ItemSummary};

/// List item summaries in a vault, following cursors. `archived` selects the
/// archived page instead of the active one.
#[instrument(skip(client), err)]
pub async fn list_item_summaries_impl(
    client: &HttpVaultAccount,
    vault_id: &str,
    archived: bool,
) -> AccountResult<Vec<ItemSummary>> {
    let mut all_items = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let mut url = format!("{}/v1/vaults/{}/items", client.base_url(), vault_id);
        let mut query_params = Vec::new();

        if archived {
            query_params.push("archived=true".to_string());
        }
        if let Some(cursor) = &cursor {
            query_params.push(format!("cursor={}", cursor));
        }
        if !query_params.is_empty() {
            url.push('?');
            url.push_str(&query_params.join("&"));
        }

        let response = client
            .http()
            .get(&url)
            .send()
            .await
            .map_err(|e| AccountError::Network {
                message: format!("Failed to list items in vault {}: {}", vault_id, e),
            })?;

        if !response.status().is_success() {
            let message = response_error_message(response).await;
            error!("Item listing failed for vault {}: {}", vault_id, message);
            return Err(AccountError::Network {
                message: format!("Failed to list items in vault {}: {}", vault_id, message),
            });
        }

        let page: ItemListResponse =
            response.json().await.map_err(|e| AccountError::InvalidResponse {
                message: format!("Failed to parse item list: {}", e),
            })?;

        all_items.extend(page.items);

        cursor = match page.cursor {
            Some(next_cursor) if !next_cursor.is_empty() => Some(next_cursor),
            _ => break, // No cursor means no more pages
        };
    }

    info!(
        "Found {} {} items in vault {}",
        all_items.len(),
        if archived { "archived" } else { "active" },
        vault_id
    );
    Ok(all_items)
}

/// Fetch one full item, resolving every file attachment to raw bytes.
///
/// A payload read failure downgrades to a warning and the attachment is
/// carried without content; the transcoder decides what that means for the
/// item. Only the item read itself can fail here.
#[instrument(skip(client), err)]
pub async fn get_item_impl(
    client: &HttpVaultAccount,
    vault_id: &str,
    item_id: &str,
) -> AccountResult<Item> {
    let url = format!(
        "{}/v1/vaults/{}/items/{}",
        client.base_url(),
        vault_id,
        item_id
    );

    let response = client
        .http()
        .get(&url)
        .send()
        .await
        .map_err(|e| AccountError::ItemFetch {
            item_id: item_id.to_string(),
            message: format!("request failed: {}", e),
            transient: false,
        })?;

    let status = response.status();
    if !status.is_success() {
        let message = response_error_message(response).await;
        error!("Item fetch failed for {}: {}", item_id, message);
        return Err(AccountError::ItemFetch {
            item_id: item_id.to_string(),
            message,
            transient: is_transient_status(status),
        });
    }

    let mut item: Item = response.json().await.map_err(|e| AccountError::ItemFetch {
        item_id: item_id.to_string(),
        message: format!("failed to parse item: {}", e),
        transient: false,
    })?;

    // Resolve attachment payloads while we still hold the source ids.
    for file in &mut item.files {
        if file.content.is_some() {
            continue;
        }
        let Some(file_id) = file.id.clone() else {
            warn!(
                "[Client] File '{}' on item {} has no id; carrying without content",
                file.name, item_id
            );
            continue;
        };
        match read_file_content_impl(client, vault_id, item_id, &file_id).await {
            Ok(bytes) => {
                file.size = Some(bytes.len() as u64);
                file.content = Some(base64::engine::general_purpose::STANDARD.encode(bytes));
            }
            Err(e) => {
                warn!(
                    "[Client] Failed to read content of file '{}' on item {}: {}",
                    file.name, item_id, e
                );
            }
        }
    }

    Ok(item)
}

/// Write one transcoded item into its destination vault, returning the id
/// the destination assigned.
#[instrument(skip(client, item), err)]
pub async fn create_item_impl(client: &HttpVaultAccount, item: &Item) -> AccountResult<String> {
    let url = format!("{}/v1/vaults/{}/items", client.base_url(), item.vault_id);

    let response = client
        .http()
        .post(&url)
        .json(item)
        .send()
        .await
        .map_err(|e| AccountError::ItemCreate {
            message: format!("request failed: {}", e),
            kind: CreateErrorKind::Transient,
        })?;

    let status = response.status();
    if status.is_success() {
        let created: CreateItemResponse =
            response.json().await.map_err(|e| AccountError::InvalidResponse {
                message: format!("Failed to parse created item: {}", e),
            })?;
        return Ok(created.id);
    }

    let message = response_error_message(response).await;
    error!("Item creation failed in vault {}: {}", item.vault_id, message);

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(AccountError::Auth { message });
    }

    // 400 means the destination rejected the payload itself; everything else
    // on the write path is worth a retry.
    let kind = if status == reqwest::StatusCode::BAD_REQUEST {
        CreateErrorKind::Validation
    } else {
        CreateErrorKind::Transient
    };

    Err(AccountError::ItemCreate { message, kind })
}

/// Count items in a vault for reconciliation. The archived leg is
/// best-effort: a failure there is logged as a warning and the active count
/// stands.
#[instrument(skip(client), err)]
pub async fn count_items_impl(
    client: &HttpVaultAccount,
    vault_id: &str,
    include_archived: bool,
) -> AccountResult<u32> {
    let active = list_item_summaries_impl(client, vault_id, false).await?;
    let mut count = active.len() as u32;

    if include_archived {
        match list_item_summaries_impl(client, vault_id, true).await {
            Ok(archived) => count += archived.len() as u32,
            Err(e) => {
                warn!(
                    "[Client] Failed to count archived items in vault {}: {}; using active count only",
                    vault_id, e
                );
            }
        }
    }

    Ok(count)
}

fn is_transient_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::CONFLICT
        || status.is_server_error()
}
