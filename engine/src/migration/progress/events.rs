//! Progress events and the sink that fans them out.
//!
//! One run has at most one external consumer; the sink holds an optional
//! unbounded sender towards it and mirrors every event into the run log so
//! the log stays complete even when nobody is listening.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::migration::run_log::RunLog;
use crate::migration::types::{RunSummary, VaultPhase, VaultStatus};

/// Events pushed to the run's consumer.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Vault-level progress: a phase transition or, with the count fields
    /// set, one item finishing inside the vault.
    Vault {
        /// Destination vault id once it exists
        vault_id: Option<String>,
        vault_name: String,
        phase: VaultPhase,
        message: String,
        items_processed: Option<u32>,
        total_items: Option<u32>,
        success_count: Option<u32>,
        failure_count: Option<u32>,
        /// Whole-run percent: completed vaults plus the current vault's
        /// fraction, over the total vault count.
        overall_percent: Option<f64>,
    },
    /// Terminal event, exactly once per run.
    Finished { summary: RunSummary },
}

/// Fan-out point for progress. Emitting never fails: a missing or departed
/// consumer makes this a silent sink, and the run log copy is kept either
/// way.
pub struct ProgressSink {
    sender: Option<UnboundedSender<ProgressEvent>>,
    run_log: Arc<RunLog>,
    total_vaults: AtomicU32,
    completed_vaults: AtomicU32,
}

impl ProgressSink {
    pub fn new(run_log: Arc<RunLog>, sender: Option<UnboundedSender<ProgressEvent>>) -> Self {
        Self {
            sender,
            run_log,
            total_vaults: AtomicU32::new(0),
            completed_vaults: AtomicU32::new(0),
        }
    }

    /// Sink that only feeds the run log.
    pub fn silent(run_log: Arc<RunLog>) -> Self {
        Self::new(run_log, None)
    }

    /// Fix the denominator for overall-percent computation.
    pub fn begin_run(&self, total_vaults: u32) {
        self.total_vaults.store(total_vaults, Ordering::Relaxed);
        self.completed_vaults.store(0, Ordering::Relaxed);
    }

    /// Overall run percent given how far through the current vault we are,
    /// `current_vault_fraction` in `0.0..=1.0`.
    pub fn overall_percent(&self, current_vault_fraction: f64) -> f64 {
        let total = self.total_vaults.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        let completed = self.completed_vaults.load(Ordering::Relaxed) as f64;
        (((completed + current_vault_fraction.clamp(0.0, 1.0)) / total as f64) * 100.0).min(100.0)
    }

    /// Phase transition for one vault.
    pub fn vault_phase(
        &self,
        vault_id: Option<&str>,
        vault_name: &str,
        phase: VaultPhase,
        message: impl Into<String>,
    ) {
        let message = message.into();
        self.run_log.info(
            Some(vault_name),
            None,
            format!("[{}] {}", phase, message),
        );
        self.send(ProgressEvent::Vault {
            vault_id: vault_id.map(|id| id.to_string()),
            vault_name: vault_name.to_string(),
            phase,
            message,
            items_processed: None,
            total_items: None,
            success_count: None,
            failure_count: None,
            overall_percent: None,
        });
    }

    /// One item finished inside a vault.
    #[allow(clippy::too_many_arguments)]
    pub fn item_progress(
        &self,
        vault_id: Option<&str>,
        vault_name: &str,
        message: impl Into<String>,
        items_processed: u32,
        total_items: u32,
        success_count: u32,
        failure_count: u32,
    ) {
        let message = message.into();
        let fraction = if total_items == 0 {
            1.0
        } else {
            items_processed as f64 / total_items as f64
        };
        self.run_log.info(
            Some(vault_name),
            None,
            format!(
                "[{}] {} ({}/{} items)",
                VaultPhase::MigratingItems,
                message,
                items_processed,
                total_items
            ),
        );
        self.send(ProgressEvent::Vault {
            vault_id: vault_id.map(|id| id.to_string()),
            vault_name: vault_name.to_string(),
            phase: VaultPhase::MigratingItems,
            message,
            items_processed: Some(items_processed),
            total_items: Some(total_items),
            success_count: Some(success_count),
            failure_count: Some(failure_count),
            overall_percent: Some(self.overall_percent(fraction)),
        });
    }

    /// One vault reached a terminal status. Bumps the completed counter
    /// first so the emitted overall percent includes this vault.
    pub fn vault_done(
        &self,
        vault_id: Option<&str>,
        vault_name: &str,
        status: VaultStatus,
        success_count: u32,
        failure_count: u32,
    ) {
        self.completed_vaults.fetch_add(1, Ordering::Relaxed);
        let message = format!(
            "vault finished: {} ({} migrated, {} failed)",
            status, success_count, failure_count
        );
        self.run_log.info(Some(vault_name), None, message.clone());
        self.send(ProgressEvent::Vault {
            vault_id: vault_id.map(|id| id.to_string()),
            vault_name: vault_name.to_string(),
            phase: VaultPhase::Reconciling,
            message,
            items_processed: Some(success_count + failure_count),
            total_items: None,
            success_count: Some(success_count),
            failure_count: Some(failure_count),
            overall_percent: Some(self.overall_percent(0.0)),
        });
    }

    /// Terminal event carrying the whole run's summary.
    pub fn finished(&self, summary: RunSummary) {
        self.run_log.info(
            None,
            None,
            format!(
                "run finished: {} migrated, {} failed across {} vault(s){}",
                summary.total_success_count(),
                summary.total_failure_count(),
                summary.vaults.len(),
                if summary.cancelled { " (cancelled)" } else { "" }
            ),
        );
        self.send(ProgressEvent::Finished { summary });
    }

    fn send(&self, event: ProgressEvent) {
        if let Some(sender) = &self.sender {
            // Consumer gone means nobody wants events any more; the run
            // log already has the mirror copy.
            let _ = sender.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink_with_receiver() -> (
        ProgressSink,
        tokio::sync::mpsc::UnboundedReceiver<ProgressEvent>,
        Arc<RunLog>,
    ) {
        let run_log = Arc::new(RunLog::new());
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (ProgressSink::new(run_log.clone(), Some(tx)), rx, run_log)
    }

    #[test]
    fn test_overall_percent_blends_completed_vaults_with_the_current_fraction() {
        let sink = ProgressSink::silent(Arc::new(RunLog::new()));
        sink.begin_run(4);

        assert_eq!(sink.overall_percent(0.0), 0.0);
        assert_eq!(sink.overall_percent(0.5), 12.5);

        sink.vault_done(Some("dv1"), "A", VaultStatus::Completed, 3, 0);
        assert_eq!(sink.overall_percent(0.0), 25.0);
        assert_eq!(sink.overall_percent(1.0), 50.0);
    }

    #[test]
    fn test_events_are_mirrored_into_the_run_log() {
        let (sink, mut rx, run_log) = sink_with_receiver();
        sink.begin_run(1);
        sink.vault_phase(None, "Personal", VaultPhase::EnumeratingItems, "listing items");

        match rx.try_recv() {
            Ok(ProgressEvent::Vault { phase, vault_name, .. }) => {
                assert_eq!(phase, VaultPhase::EnumeratingItems);
                assert_eq!(vault_name, "Personal");
            }
            other => panic!("expected vault event, got {:?}", other),
        }
        let entries = run_log.snapshot();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].message.contains("enumerating-items"));
    }

    #[test]
    fn test_a_departed_consumer_does_not_break_emission() {
        let (sink, rx, run_log) = sink_with_receiver();
        drop(rx);

        sink.vault_phase(None, "Personal", VaultPhase::Pending, "queued");
        assert_eq!(run_log.snapshot().len(), 1);
    }

    #[test]
    fn test_item_progress_carries_counts_and_percent() {
        let (sink, mut rx, _log) = sink_with_receiver();
        sink.begin_run(2);
        sink.item_progress(Some("dv1"), "Personal", "migrated 'Email'", 5, 10, 4, 1);

        match rx.try_recv() {
            Ok(ProgressEvent::Vault {
                items_processed,
                total_items,
                success_count,
                failure_count,
                overall_percent,
                ..
            }) => {
                assert_eq!(items_processed, Some(5));
                assert_eq!(total_items, Some(10));
                assert_eq!(success_count, Some(4));
                assert_eq!(failure_count, Some(1));
                assert_eq!(overall_percent, Some(25.0));
            }
            other => panic!("expected vault event, got {:?}", other),
        }
    }
}
