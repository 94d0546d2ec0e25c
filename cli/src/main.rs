//! `vault-migrate`: command-line shell around the migration engine.
//!
//! All migration behavior lives in the `engine` crate; this binary only
//! parses arguments, authenticates the two tenants, prints progress events
//! and decides the process exit code.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use engine::{
    CliItemBridge, HttpVaultAccount, MigrationConfig, MigrationOrchestrator, ProgressEvent,
    RunLog, RunSummary, VaultStatus,
};

/// Copy vaults and their items from one tenant to another.
#[derive(Parser, Debug)]
#[command(name = "vault-migrate", version, about)]
struct Cli {
    /// Base URL of the source tenant API
    #[arg(long)]
    source_url: String,

    /// Base URL of the destination tenant API
    #[arg(long)]
    dest_url: String,

    /// Source tenant service token
    #[arg(long, env = "VAULT_MIGRATE_SOURCE_TOKEN", hide_env_values = true)]
    source_token: String,

    /// Destination tenant service token
    #[arg(long, env = "VAULT_MIGRATE_DEST_TOKEN", hide_env_values = true)]
    dest_token: String,

    /// Vault to migrate, by id or name; repeat for several.
    /// Omitted means every vault in the source tenant.
    #[arg(long = "vault", value_name = "ID_OR_NAME")]
    vaults: Vec<String>,

    /// How many vaults to migrate at the same time
    #[arg(long, value_name = "N")]
    max_concurrent_vaults: Option<usize>,

    /// How many items to migrate at the same time within one vault
    #[arg(long, value_name = "N")]
    max_concurrent_items: Option<usize>,

    /// Name or path of the external credential CLI used for custom items
    #[arg(long, value_name = "PROGRAM")]
    bridge_program: Option<String>,

    /// Destination template id for custom items; discovered from the
    /// external CLI when omitted
    #[arg(long, value_name = "TEMPLATE_ID")]
    bridge_template_id: Option<String>,

    /// Write the plain-text run log to this file after the run
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn build_config(&self) -> MigrationConfig {
        let mut config = MigrationConfig::default();
        if let Some(n) = self.max_concurrent_vaults {
            config.concurrency.max_concurrent_vaults = n;
        }
        if let Some(n) = self.max_concurrent_items {
            config.concurrency.max_concurrent_items = n;
        }
        if let Some(program) = &self.bridge_program {
            config.bridge.program = program.clone();
        }
        if let Some(template_id) = &self.bridge_template_id {
            config.bridge.template_id = Some(template_id.clone());
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.build_config();

    info!(
        "[Cli] Migrating from {} to {}",
        cli.source_url, cli.dest_url
    );

    let source = HttpVaultAccount::authenticate(&cli.source_url, &cli.source_token, &config.network)
        .await
        .context("source tenant authentication failed")?;
    let dest = HttpVaultAccount::authenticate(&cli.dest_url, &cli.dest_token, &config.network)
        .await
        .context("destination tenant authentication failed")?;
    let bridge = CliItemBridge::new(
        config.bridge.clone(),
        cli.source_token.clone(),
        cli.dest_token.clone(),
    );

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let run_log = Arc::new(RunLog::new());
    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = progress_rx.recv().await {
            print_event(event);
        }
    });

    let orchestrator = MigrationOrchestrator::new(
        Arc::new(source),
        Arc::new(dest),
        Arc::new(bridge),
        config,
        Arc::clone(&run_log),
        Some(progress_tx),
        cancel,
    )?;

    let selection = if cli.vaults.is_empty() {
        None
    } else {
        Some(cli.vaults.clone())
    };
    let run = orchestrator.migrate_vaults(selection).await?;

    // Dropping the orchestrator closes the progress channel, so the
    // printer drains the remaining events and ends.
    drop(orchestrator);
    let _ = printer.await;

    if let Some(path) = &cli.log_file {
        std::fs::write(path, run_log.render_text())
            .with_context(|| format!("failed to write run log to {}", path.display()))?;
        info!("[Cli] Run log written to {}", path.display());
    }

    if run_failed(&run) {
        std::process::exit(1);
    }
    Ok(())
}

/// First ctrl-c cancels cooperatively; a second one exits immediately.
fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("[Cli] Cancellation requested; waiting for in-flight items to finish");
            cancel.cancel();
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("[Cli] Forced exit");
                std::process::exit(130);
            }
        }
    });
}

fn print_event(event: ProgressEvent) {
    match event {
        ProgressEvent::Vault {
            vault_name,
            message,
            items_processed,
            total_items,
            overall_percent,
            ..
        } => {
            let percent = overall_percent.unwrap_or(0.0);
            match (items_processed, total_items) {
                (Some(done), Some(total)) => {
                    println!("[{percent:>5.1}%] {vault_name}: {message} ({done}/{total})")
                }
                _ => println!("[{percent:>5.1}%] {vault_name}: {message}"),
            }
        }
        ProgressEvent::Finished { summary } => print_run_summary(&summary),
    }
}

fn print_run_summary(summary: &RunSummary) {
    println!();
    for vault in &summary.vaults {
        let marker = match vault.status {
            VaultStatus::Completed => "✅",
            VaultStatus::CompletedWithFailures => "⚠️",
            VaultStatus::Cancelled => "🛑",
            VaultStatus::Failed | VaultStatus::InProgress => "❌",
        };
        println!(
            "{} {} ({}): {} migrated, {} failed",
            marker, vault.vault_name, vault.status, vault.success_count, vault.failure_count
        );
        if let Some(error) = &vault.error {
            println!("   vault error: {error}");
        }
        for outcome in vault.outcomes.iter().filter(|outcome| !outcome.success) {
            println!(
                "   ❌ {}: {}",
                outcome.title,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    println!();
    println!(
        "{} item(s) migrated, {} failed across {} vault(s){}",
        summary.total_success_count(),
        summary.total_failure_count(),
        summary.vaults.len(),
        if summary.cancelled { " (cancelled)" } else { "" }
    );
}

fn run_failed(run: &RunSummary) -> bool {
    run.vaults.iter().any(|vault| {
        matches!(
            vault.status,
            VaultStatus::Failed | VaultStatus::CompletedWithFailures
        )
    })
}
