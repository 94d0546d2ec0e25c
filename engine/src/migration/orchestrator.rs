//! Drives a migration run end to end: vault-level state machine, bounded
//! concurrency at both levels, cooperative cancellation, reconciliation.
//!
//! Failure containment is the whole design: an item failure is data in the
//! vault summary, a vault failure is data in the run summary, and only
//! authentication (or setup) errors escape `migrate_vaults` as `Err`.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::future::ready;
use futures::pin_mut;
use futures::stream::{self, StreamExt};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::migration::progress::{ProgressEvent, ProgressSink};
use crate::migration::run_log::RunLog;
use crate::migration::transcode::transcode;
use crate::migration::types::{
    ItemOutcome, RunSummary, VaultMigrationSummary, VaultPhase, VaultStatus,
};
use crate::services::bridge::ItemBridge;
use crate::services::client::{AccountError, ItemSummary, Vault, VaultAccount};
use crate::services::config::MigrationConfig;
use crate::services::errors::{RunError, RunResult, TenantRole};
use crate::services::retry::RetryExecutor;

/// One run's worth of collaborators and knobs.
pub struct MigrationOrchestrator {
    source: Arc<dyn VaultAccount>,
    dest: Arc<dyn VaultAccount>,
    bridge: Arc<dyn ItemBridge>,
    config: MigrationConfig,
    retry: RetryExecutor,
    run_log: Arc<RunLog>,
    progress: ProgressSink,
    cancel: CancellationToken,
    auth_abort: Arc<AuthAbort>,
}

impl MigrationOrchestrator {
    /// Build an orchestrator for one run. The progress sender is optional;
    /// without it the run log is the only record.
    pub fn new(
        source: Arc<dyn VaultAccount>,
        dest: Arc<dyn VaultAccount>,
        bridge: Arc<dyn ItemBridge>,
        config: MigrationConfig,
        run_log: Arc<RunLog>,
        progress_sender: Option<UnboundedSender<ProgressEvent>>,
        cancel: CancellationToken,
    ) -> RunResult<Self> {
        config.validate().map_err(RunError::invalid_config)?;
        let retry = RetryExecutor::new(config.retry.clone());
        let progress = ProgressSink::new(Arc::clone(&run_log), progress_sender);
        Ok(Self {
            source,
            dest,
            bridge,
            config,
            retry,
            run_log,
            progress,
            cancel,
            auth_abort: Arc::new(AuthAbort::default()),
        })
    }

    /// Migrate every selected vault (all source vaults when `selection` is
    /// `None`). Vault- and item-level failures land in the returned
    /// summary; only authentication and setup failures return `Err`.
    pub async fn migrate_vaults(&self, selection: Option<Vec<String>>) -> RunResult<RunSummary> {
        let started_at = Utc::now();

        let source_vaults = self
            .source
            .list_vaults()
            .await
            .map_err(|e| RunError::from_account(TenantRole::Source, e))?;
        let selected = resolve_selection(source_vaults, selection)?;

        info!("[Orchestrator] Migrating {} vault(s)", selected.len());
        self.run_log.info(
            None,
            None,
            format!("run started: {} vault(s) selected", selected.len()),
        );
        self.progress.begin_run(selected.len() as u32);

        let summaries: Vec<VaultMigrationSummary> = stream::iter(selected)
            .take_while(|_| ready(!self.cancel.is_cancelled()))
            .map(|vault| async move { self.migrate_vault(&vault).await })
            .buffered(self.config.concurrency.max_concurrent_vaults)
            .collect()
            .await;

        // In-flight work has drained by this point; a token rejection
        // recorded anywhere during the run escapes here as the run error.
        if let Some(auth) = self.auth_abort.take() {
            return Err(auth);
        }

        let summary = RunSummary {
            started_at,
            finished_at: Utc::now(),
            vaults: summaries,
            cancelled: self.cancel.is_cancelled(),
        };
        self.progress.finished(summary.clone());
        Ok(summary)
    }

    /// Migrate one vault through the full state machine. Never fails; the
    /// terminal status and any vault-level error are in the summary.
    pub async fn migrate_vault(&self, source_vault: &Vault) -> VaultMigrationSummary {
        let vault_name = source_vault.name.clone();
        let mut summary = VaultMigrationSummary::pending(&vault_name);

        if self.cancel.is_cancelled() {
            summary.status = VaultStatus::Cancelled;
            self.run_log
                .info(Some(&vault_name), None, "cancelled before starting");
            self.progress
                .vault_done(None, &vault_name, VaultStatus::Cancelled, 0, 0);
            return summary;
        }

        info!(
            "[Orchestrator] Migrating vault '{}' ({})",
            vault_name, source_vault.id
        );
        self.progress
            .vault_phase(None, &vault_name, VaultPhase::Pending, "queued");

        self.progress.vault_phase(
            None,
            &vault_name,
            VaultPhase::CreatingDestinationVault,
            format!("creating destination vault '{}'", vault_name),
        );
        let dest_vault = match self.dest.create_vault(&vault_name).await {
            Ok(vault) => vault,
            Err(e) => {
                self.note_auth(TenantRole::Destination, &e);
                return self.fail_vault(summary, &vault_name, e.to_string());
            }
        };
        summary.vault_id = Some(dest_vault.id.clone());

        self.progress.vault_phase(
            Some(&dest_vault.id),
            &vault_name,
            VaultPhase::EnumeratingItems,
            "listing source items",
        );
        let item_summaries = match self.source.list_item_summaries(&source_vault.id).await {
            Ok(items) => items,
            Err(e) => {
                self.note_auth(TenantRole::Source, &e);
                return self.fail_vault(summary, &vault_name, e.to_string());
            }
        };
        let total = item_summaries.len();
        summary.source_item_count = Some(total as u32);

        self.progress.vault_phase(
            Some(&dest_vault.id),
            &vault_name,
            VaultPhase::MigratingItems,
            format!("migrating {} item(s)", total),
        );

        // Items dispatch in enumeration order; the token is checked before
        // each dispatch, so cancellation drains in-flight work and keeps
        // every processed result.
        let item_stream = stream::iter(item_summaries.into_iter().enumerate())
            .take_while(|_| ready(!self.cancel.is_cancelled()))
            .map(|(index, item)| {
                let job = ItemJob {
                    source: Arc::clone(&self.source),
                    dest: Arc::clone(&self.dest),
                    bridge: Arc::clone(&self.bridge),
                    retry: self.retry.clone(),
                    run_log: Arc::clone(&self.run_log),
                    cancel: self.cancel.clone(),
                    auth_abort: Arc::clone(&self.auth_abort),
                    source_vault_id: source_vault.id.clone(),
                    dest_vault_id: dest_vault.id.clone(),
                    vault_name: vault_name.clone(),
                    item,
                    index,
                    total,
                };
                let run_log = Arc::clone(&self.run_log);
                let vault_name = vault_name.clone();
                async move {
                    let item_id = job.item.id.clone();
                    let title = job.item.title.clone();
                    let progress_percent = job.progress_percent();
                    // The guard that keeps a panicking item task from
                    // taking the run down: a join error becomes a failed
                    // outcome.
                    match tokio::spawn(run_item_job(job)).await {
                        Ok(outcome) => outcome,
                        Err(join_error) => {
                            let message = format!("item task panicked: {}", join_error);
                            error!("[Orchestrator] {}", message);
                            run_log.error(Some(&vault_name), Some(&item_id), message.clone());
                            ItemOutcome::failed(&item_id, &title, message, progress_percent)
                        }
                    }
                }
            })
            .buffered(self.config.concurrency.max_concurrent_items);
        pin_mut!(item_stream);

        while let Some(outcome) = item_stream.next().await {
            summary.record(outcome.clone());
            let message = if outcome.success {
                format!("migrated '{}'", outcome.title)
            } else {
                format!("failed '{}'", outcome.title)
            };
            self.progress.item_progress(
                Some(&dest_vault.id),
                &vault_name,
                message,
                summary.items_processed(),
                total as u32,
                summary.success_count,
                summary.failure_count,
            );
        }

        if self.cancel.is_cancelled() && (summary.items_processed() as usize) < total {
            info!(
                "[Orchestrator] Vault '{}' cancelled after {} of {} item(s)",
                vault_name,
                summary.items_processed(),
                total
            );
            summary.status = VaultStatus::Cancelled;
            self.progress.vault_done(
                Some(&dest_vault.id),
                &vault_name,
                VaultStatus::Cancelled,
                summary.success_count,
                summary.failure_count,
            );
            return summary;
        }

        self.progress.vault_phase(
            Some(&dest_vault.id),
            &vault_name,
            VaultPhase::Reconciling,
            "comparing source and destination item counts",
        );
        let dest_count = match self.dest.count_items(&dest_vault.id, false).await {
            Ok(count) => count,
            Err(e) => {
                self.note_auth(TenantRole::Destination, &e);
                warn!(
                    "[Orchestrator] Destination count for '{}' failed, using tracked successes: {}",
                    vault_name, e
                );
                self.run_log.warn(
                    Some(&vault_name),
                    None,
                    format!("destination re-count failed ({}); using tracked success count", e),
                );
                summary.success_count
            }
        };
        summary.dest_item_count = Some(dest_count);

        let counts_match = summary.dest_item_count == summary.source_item_count;
        summary.status = if summary.failure_count == 0 && counts_match {
            VaultStatus::Completed
        } else {
            VaultStatus::CompletedWithFailures
        };
        if !counts_match {
            self.run_log.warn(
                Some(&vault_name),
                None,
                format!(
                    "count mismatch after migration: source {:?}, destination {:?}",
                    summary.source_item_count, summary.dest_item_count
                ),
            );
        }

        info!(
            "[Orchestrator] Vault '{}' {}: {} migrated, {} failed",
            vault_name, summary.status, summary.success_count, summary.failure_count
        );
        self.progress.vault_done(
            Some(&dest_vault.id),
            &vault_name,
            summary.status,
            summary.success_count,
            summary.failure_count,
        );
        summary
    }

    /// A mid-run `Auth` failure is run-fatal for the owning tenant: the
    /// first one recorded cancels dispatch, and `migrate_vaults` returns
    /// it once in-flight work drains.
    fn note_auth(&self, role: TenantRole, error: &AccountError) {
        note_auth_failure(&self.auth_abort, &self.cancel, &self.run_log, role, error);
    }

    fn fail_vault(
        &self,
        mut summary: VaultMigrationSummary,
        vault_name: &str,
        message: String,
    ) -> VaultMigrationSummary {
        error!("[Orchestrator] Vault '{}' failed: {}", vault_name, message);
        self.run_log.error(Some(vault_name), None, message.clone());
        summary.status = VaultStatus::Failed;
        summary.error = Some(message);
        self.progress.vault_done(
            summary.vault_id.as_deref(),
            vault_name,
            VaultStatus::Failed,
            0,
            0,
        );
        summary
    }
}

/// The selected vault set: everything, or the vaults matching the
/// operator's ids/names. An entry matching nothing is a setup error.
fn resolve_selection(
    source_vaults: Vec<Vault>,
    selection: Option<Vec<String>>,
) -> RunResult<Vec<Vault>> {
    let Some(wanted) = selection else {
        return Ok(source_vaults);
    };

    let mut selected: Vec<Vault> = Vec::with_capacity(wanted.len());
    for key in &wanted {
        let vault = source_vaults
            .iter()
            .find(|vault| vault.id == *key || vault.name == *key)
            .ok_or_else(|| RunError::Configuration {
                message: format!("no source vault matches '{}'", key),
            })?;
        if !selected.iter().any(|chosen| chosen.id == vault.id) {
            selected.push(vault.clone());
        }
    }
    Ok(selected)
}

/// First authentication failure seen mid-run, shared between the vault
/// state machine and spawned item tasks.
#[derive(Default)]
struct AuthAbort {
    failure: Mutex<Option<(TenantRole, String)>>,
}

impl AuthAbort {
    /// Records the failure if none is held yet. True on the first call.
    fn record(&self, role: TenantRole, message: &str) -> bool {
        let mut slot = self
            .failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if slot.is_some() {
            return false;
        }
        *slot = Some((role, message.to_string()));
        true
    }

    fn take(&self) -> Option<RunError> {
        self.failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .map(|(role, message)| RunError::Authentication { role, message })
    }
}

/// Routes an `Auth` error into the shared abort slot. The first one
/// cancels dispatch; work already in flight drains normally.
fn note_auth_failure(
    abort: &AuthAbort,
    cancel: &CancellationToken,
    run_log: &RunLog,
    role: TenantRole,
    error: &AccountError,
) {
    if !matches!(error, AccountError::Auth { .. }) {
        return;
    }
    if abort.record(role, &error.to_string()) {
        error!(
            "[Orchestrator] {} tenant rejected its token; aborting the run: {}",
            role, error
        );
        run_log.error(
            None,
            None,
            format!("{} tenant rejected its token; run aborted: {}", role, error),
        );
        cancel.cancel();
    }
}

/// Everything one item task needs, owned, so the task is spawnable.
struct ItemJob {
    source: Arc<dyn VaultAccount>,
    dest: Arc<dyn VaultAccount>,
    bridge: Arc<dyn ItemBridge>,
    retry: RetryExecutor,
    run_log: Arc<RunLog>,
    cancel: CancellationToken,
    auth_abort: Arc<AuthAbort>,
    source_vault_id: String,
    dest_vault_id: String,
    vault_name: String,
    item: ItemSummary,
    index: usize,
    total: usize,
}

impl ItemJob {
    /// Position of this item over the vault total, as a percentage, at the
    /// moment it finishes.
    fn progress_percent(&self) -> f64 {
        ((self.index + 1) as f64 / self.total.max(1) as f64) * 100.0
    }
}

async fn run_item_job(job: ItemJob) -> ItemOutcome {
    let progress_percent = job.progress_percent();
    let item_id = job.item.id.clone();
    let title = job.item.title.clone();

    let result: Result<String, (TenantRole, AccountError)> =
        if job.item.effective_category().is_custom() {
            info!(
                "[Orchestrator] Item '{}' is custom; routing through the bridge",
                title
            );
            job.bridge
                .migrate_item(&job.source_vault_id, &item_id, &job.dest_vault_id)
                .await
                .map_err(|e| (TenantRole::Destination, e))
        } else {
            migrate_standard_item(&job).await
        };

    match result {
        Ok(created_id) => {
            job.run_log.info(
                Some(&job.vault_name),
                Some(&item_id),
                format!("migrated '{}' as {}", title, created_id),
            );
            ItemOutcome::migrated(&item_id, &title, progress_percent)
        }
        Err((role, e)) => {
            note_auth_failure(&job.auth_abort, &job.cancel, &job.run_log, role, &e);
            let message = e.to_string();
            job.run_log.error(
                Some(&job.vault_name),
                Some(&item_id),
                format!("failed to migrate '{}': {}", title, message),
            );
            ItemOutcome::failed(&item_id, &title, message, progress_percent)
        }
    }
}

/// Standard path: fetch, transcode, create, with both remote legs behind
/// the retry executor. Failures carry the tenant they came from.
async fn migrate_standard_item(job: &ItemJob) -> Result<String, (TenantRole, AccountError)> {
    let full_item = job
        .retry
        .execute("fetch item", || {
            job.source.get_item(&job.source_vault_id, &job.item.id)
        })
        .await
        .map_err(|e| (TenantRole::Source, e))?;

    let transcoded = transcode(&full_item, &job.dest_vault_id);
    for warning in &transcoded.warnings {
        warn!("[Orchestrator] '{}': {}", job.item.title, warning);
        job.run_log
            .warn(Some(&job.vault_name), Some(&job.item.id), warning.clone());
    }

    job.retry
        .execute("create item", || job.dest.create_item(&transcoded.item))
        .await
        .map_err(|e| (TenantRole::Destination, e))
}
