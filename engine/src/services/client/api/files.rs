//! File-content operations for one tenant.
//!
//! All functions take the account client as first parameter.

use reqwest::header;
use tracing::instrument;

use crate::services::client::api::response_error_message;
use crate::services::client::errors::{AccountError, AccountResult};
use crate::services::client::http::HttpVaultAccount;

/// Read the raw bytes of one file attachment.
#[instrument(skip(client), err)]
pub async fn read_file_content_impl(
    client: &HttpVaultAccount,
    vault_id: &str,
    item_id: &str,
    file_id: &str,
) -> AccountResult<Vec<u8>> {
    let url = format!(
        "{}/v1/vaults/{}/items/{}/files/{}/content",
        client.base_url(),
        vault_id,
        item_id,
        file_id
    );

    let response = client
        .http()
        .get(&url)
        // Tell the server we accept compressed payloads; reqwest
        // transparently decompresses them.
        .header(header::ACCEPT_ENCODING, "gzip, deflate")
        .send()
        .await
        .map_err(|e| AccountError::Network {
            message: format!("Failed to read file {}: {}", file_id, e),
        })?;

    if !response.status().is_success() {
        let message = response_error_message(response).await;
        return Err(AccountError::Network {
            message: format!("Failed to read file {}: {}", file_id, message),
        });
    }

    let bytes = response.bytes().await.map_err(|e| AccountError::Network {
        message: format!("Failed to read file {} body: {}", file_id, e),
    })?;

    Ok(bytes.to_vec())
}
