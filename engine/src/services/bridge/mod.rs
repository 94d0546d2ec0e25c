//! External credential-CLI bridge for custom items.
//!
//! Items carrying the canonical custom tag cannot be created through the
//! primary API; this module drives the tenant's command-line tool instead:
//! fetch the raw item JSON from the source, rewrite it for the destination,
//! and feed it back through `item create --template <file>`. Each
//! invocation authenticates through the token the tool reads from its
//! environment.

use std::io::Write;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

use crate::services::client::errors::{AccountError, AccountResult};
use crate::services::config::BridgeConfig;

/// Environment variable the credential CLI reads its tenant token from.
pub const SERVICE_TOKEN_ENV: &str = "VAULT_SERVICE_TOKEN";

/// Fallback path for items the primary API cannot express. Implementors are
/// item-scoped: a failure here fails one item, never the vault.
#[async_trait]
pub trait ItemBridge: Send + Sync {
    /// Copy one custom item from a source vault into the destination vault,
    /// returning the created item's id.
    async fn migrate_item(
        &self,
        source_vault_id: &str,
        item_id: &str,
        dest_vault_id: &str,
    ) -> AccountResult<String>;
}

/// Bridge implementation over the external credential CLI.
pub struct CliItemBridge {
    config: BridgeConfig,
    source_token: String,
    dest_token: String,
    discovered_template: OnceCell<String>,
}

impl CliItemBridge {
    pub fn new(
        config: BridgeConfig,
        source_token: impl Into<String>,
        dest_token: impl Into<String>,
    ) -> Self {
        Self {
            config,
            source_token: source_token.into(),
            dest_token: dest_token.into(),
            discovered_template: OnceCell::new(),
        }
    }

    /// Run one CLI invocation to completion, bounded by the configured
    /// timeout. `kill_on_drop` reaps the child if the timeout fires.
    async fn run_cli(&self, token: &str, args: &[&str]) -> AccountResult<String> {
        let mut command = Command::new(&self.config.program);
        command
            .args(args)
            .env(SERVICE_TOKEN_ENV, token)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("[Bridge] Running {} {}", self.config.program, args.join(" "));

        let timeout = Duration::from_millis(self.config.invocation_timeout_ms);
        let output = tokio::time::timeout(timeout, command.output())
            .await
            .map_err(|_| AccountError::Bridge {
                message: format!(
                    "'{} {}' timed out after {}ms",
                    self.config.program,
                    args.join(" "),
                    self.config.invocation_timeout_ms
                ),
            })?
            .map_err(|e| AccountError::Bridge {
                message: format!("failed to run '{}': {}", self.config.program, e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AccountError::Bridge {
                message: format!(
                    "'{} {}' exited with {}: {}",
                    self.config.program,
                    args.join(" "),
                    output.status,
                    stderr.trim()
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Raw item JSON as the source tenant's CLI sees it.
    async fn fetch_raw_item(
        &self,
        vault_id: &str,
        item_id: &str,
    ) -> AccountResult<serde_json::Value> {
        let stdout = self
            .run_cli(
                &self.source_token,
                &["item", "get", item_id, "--vault", vault_id, "--format", "json"],
            )
            .await?;

        serde_json::from_str(&stdout).map_err(|e| AccountError::Bridge {
            message: format!("unparseable item JSON from CLI: {}", e),
        })
    }

    /// Destination template id for custom items: the operator-supplied one,
    /// or a lazily discovered (and cached) one from `item template list`.
    async fn template_id(&self) -> AccountResult<String> {
        if let Some(id) = &self.config.template_id {
            return Ok(id.clone());
        }

        self.discovered_template
            .get_or_try_init(|| async {
                let stdout = self
                    .run_cli(&self.dest_token, &["item", "template", "list", "--format", "json"])
                    .await?;
                let templates: serde_json::Value =
                    serde_json::from_str(&stdout).map_err(|e| AccountError::Bridge {
                        message: format!("unparseable template list from CLI: {}", e),
                    })?;

                pick_custom_template(&templates).ok_or_else(|| AccountError::Bridge {
                    message: "no custom item template available on the destination; \
                              supply the template id explicitly (bridge.template_id) and re-run"
                        .to_string(),
                })
            })
            .await
            .cloned()
    }

    /// Serialize the rewritten payload to a temp file and create from it.
    /// The temp file is removed on drop, on every path out of this function.
    async fn create_from_template(&self, payload: &serde_json::Value) -> AccountResult<String> {
        let mut template_file = NamedTempFile::new().map_err(|e| AccountError::Bridge {
            message: format!("failed to create template file: {}", e),
        })?;
        serde_json::to_writer(&mut template_file, payload).map_err(|e| AccountError::Bridge {
            message: format!("failed to write template file: {}", e),
        })?;
        template_file.flush().map_err(|e| AccountError::Bridge {
            message: format!("failed to write template file: {}", e),
        })?;

        let path = template_file.path().to_string_lossy().into_owned();
        let stdout = self
            .run_cli(&self.dest_token, &["item", "create", "--template", &path])
            .await?;

        let created: serde_json::Value =
            serde_json::from_str(&stdout).map_err(|e| AccountError::Bridge {
                message: format!("unparseable create response from CLI: {}", e),
            })?;

        created
            .get("id")
            .and_then(|id| id.as_str())
            .map(|id| id.to_string())
            .ok_or_else(|| AccountError::Bridge {
                message: "create response from CLI carries no item id".to_string(),
            })
    }
}

#[async_trait]
impl ItemBridge for CliItemBridge {
    #[instrument(skip(self), err)]
    async fn migrate_item(
        &self,
        source_vault_id: &str,
        item_id: &str,
        dest_vault_id: &str,
    ) -> AccountResult<String> {
        info!(
            "[Bridge] Migrating custom item {} via '{}'",
            item_id, self.config.program
        );

        let raw = self.fetch_raw_item(source_vault_id, item_id).await?;
        let template_id = self.template_id().await?;
        let payload = rewrite_raw_item(raw, dest_vault_id, &template_id);
        let created_id = self.create_from_template(&payload).await?;

        info!(
            "[Bridge] Created custom item {} from source item {}",
            created_id, item_id
        );
        Ok(created_id)
    }
}

/// Pick the destination's custom template out of `item template list`
/// output: the first entry flagged custom, or named "custom".
fn pick_custom_template(templates: &serde_json::Value) -> Option<String> {
    let entries = templates.as_array()?;
    entries
        .iter()
        .find(|entry| {
            entry
                .get("custom")
                .and_then(|flag| flag.as_bool())
                .unwrap_or(false)
                || entry
                    .get("name")
                    .and_then(|name| name.as_str())
                    .is_some_and(|name| name.eq_ignore_ascii_case("custom"))
        })
        .and_then(|entry| entry.get("id"))
        .and_then(|id| id.as_str())
        .map(|id| id.to_string())
}

/// Rewrite a raw source item for creation on the destination.
///
/// Strips the source identity (item id, version, audit metadata), strips
/// per-field ids and reference markers (the destination regenerates both),
/// preserves section ids so field order survives, and binds the generic
/// custom category, the template id, and the destination vault.
fn rewrite_raw_item(
    mut raw: serde_json::Value,
    dest_vault_id: &str,
    template_id: &str,
) -> serde_json::Value {
    if let Some(item) = raw.as_object_mut() {
        item.remove("id");
        item.remove("version");
        item.remove("createdAt");
        item.remove("updatedAt");
        item.remove("lastEditedBy");

        item.insert("category".to_string(), serde_json::json!("CUSTOM"));
        item.insert("templateId".to_string(), serde_json::json!(template_id));
        item.insert("vaultId".to_string(), serde_json::json!(dest_vault_id));

        if let Some(fields) = item.get_mut("fields").and_then(|f| f.as_array_mut()) {
            for field in fields {
                if let Some(field) = field.as_object_mut() {
                    field.remove("id");
                    field.remove("reference");
                    // sectionId stays: the destination keeps field order by
                    // section.
                }
            }
        }
    }
    raw
}
