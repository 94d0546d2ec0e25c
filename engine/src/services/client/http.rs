//! HTTP implementation of the tenant account seam.
//!
//! `authenticate` builds the one reqwest client (bearer token as a default
//! header) that every subsequent call on this account reuses, and verifies
//! the token against the tenant before handing the account out.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;
use tracing::{info, instrument};

use crate::services::client::account::VaultAccount;
use crate::services::client::api;
use crate::services::client::errors::{AccountError, AccountResult};
use crate::services::client::types::{Item, ItemSummary, Vault, WhoamiResponse};
use crate::services::config::NetworkConfig;

/// One authenticated session against one tenant.
pub struct HttpVaultAccount {
    http_client: reqwest::Client,
    base_url: String,
    account_id: String,
}

impl HttpVaultAccount {
    /// Authenticate against a tenant.
    ///
    /// Fails with `AccountError::Auth` when the token is empty or the
    /// tenant rejects it; the probe is the cheapest authenticated read the
    /// API offers.
    #[instrument(skip(token, network), err)]
    pub async fn authenticate(
        base_url: &str,
        token: &str,
        network: &NetworkConfig,
    ) -> AccountResult<Self> {
        if token.trim().is_empty() {
            return Err(AccountError::Auth {
                message: "token is empty".to_string(),
            });
        }

        let mut auth_value = header::HeaderValue::from_str(&format!("Bearer {}", token.trim()))
            .map_err(|_| AccountError::Auth {
                message: "token contains characters not usable in a header".to_string(),
            })?;
        auth_value.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth_value);

        let http_client = reqwest::Client::builder()
            .user_agent(&network.user_agent)
            .default_headers(headers)
            .connect_timeout(Duration::from_millis(network.connect_timeout_ms))
            .timeout(Duration::from_millis(network.request_timeout_ms))
            .build()
            .map_err(|e| AccountError::Network {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        let mut account = Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            account_id: String::new(),
        };

        let identity = account.whoami().await?;
        info!(
            "Authenticated against {} as account {}",
            account.base_url, identity.account_id
        );
        account.account_id = identity.account_id;

        Ok(account)
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Token probe used by `authenticate`.
    async fn whoami(&self) -> AccountResult<WhoamiResponse> {
        let url = format!("{}/v1/whoami", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| AccountError::Network {
                message: format!("Failed to reach tenant: {}", e),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            let message = api::response_error_message(response).await;
            return Err(AccountError::Auth { message });
        }
        if !status.is_success() {
            let message = api::response_error_message(response).await;
            return Err(AccountError::Network { message });
        }

        response.json().await.map_err(|e| AccountError::InvalidResponse {
            message: format!("Failed to parse whoami response: {}", e),
        })
    }
}

#[async_trait]
impl VaultAccount for HttpVaultAccount {
    async fn list_vaults(&self) -> AccountResult<Vec<Vault>> {
        api::list_vaults_impl(self).await
    }

    async fn list_item_summaries(&self, vault_id: &str) -> AccountResult<Vec<ItemSummary>> {
        api::list_item_summaries_impl(self, vault_id, false).await
    }

    async fn get_item(&self, vault_id: &str, item_id: &str) -> AccountResult<Item> {
        api::get_item_impl(self, vault_id, item_id).await
    }

    async fn create_vault(&self, name: &str) -> AccountResult<Vault> {
        api::create_vault_impl(self, name).await
    }

    async fn create_item(&self, item: &Item) -> AccountResult<String> {
        api::create_item_impl(self, item).await
    }

    async fn count_items(&self, vault_id: &str, include_archived: bool) -> AccountResult<u32> {
        api::count_items_impl(self, vault_id, include_archived).await
    }
}
