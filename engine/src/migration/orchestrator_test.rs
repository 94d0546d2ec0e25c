//! Orchestrator behavior against in-memory tenants: failure containment,
//! cancellation, reconciliation, bridge routing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::migration::orchestrator::MigrationOrchestrator;
use crate::migration::progress::ProgressEvent;
use crate::migration::run_log::RunLog;
use crate::migration::types::{RunSummary, VaultMigrationSummary, VaultStatus};
use crate::services::bridge::ItemBridge;
use crate::services::client::{
    AccountError, AccountResult, Category, CreateErrorKind, Field, FieldType, Item, ItemSummary,
    Vault, VaultAccount,
};
use crate::services::config::MigrationConfig;
use crate::services::errors::{RunError, TenantRole};

/// In-memory tenant usable as either side of a migration.
#[derive(Default)]
struct FakeAccount {
    vaults: Mutex<Vec<Vault>>,
    items: Mutex<HashMap<String, Vec<Item>>>,
    vault_seq: AtomicU32,
    item_seq: AtomicU32,
    vault_create_calls: AtomicU32,
    item_create_calls: AtomicU32,
    /// Vault names whose creation is rejected with a collision
    fail_vault_names: Vec<String>,
    /// Item titles whose creation is rejected with a validation error
    fail_item_titles: Vec<String>,
    /// Reject every vault creation with an auth failure
    auth_reject_vault_creates: bool,
    /// Reject every item creation with an auth failure
    auth_reject_item_creates: bool,
    /// Item ids whose fetch panics, to exercise the task guard
    panic_on_get: Vec<String>,
    /// Fire this token once the n-th item creation lands
    cancel_after_creates: Option<(CancellationToken, u32)>,
}

impl FakeAccount {
    fn with_vault(vault_id: &str, vault_name: &str, items: Vec<Item>) -> Self {
        let account = FakeAccount::default();
        account.vaults.lock().unwrap().push(Vault {
            id: vault_id.to_string(),
            name: vault_name.to_string(),
            item_count: Some(items.len() as u32),
        });
        account
            .items
            .lock()
            .unwrap()
            .insert(vault_id.to_string(), items);
        account
    }

    fn stored_items(&self, vault_id: &str) -> Vec<Item> {
        self.items
            .lock()
            .unwrap()
            .get(vault_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl VaultAccount for FakeAccount {
    async fn list_vaults(&self) -> AccountResult<Vec<Vault>> {
        Ok(self.vaults.lock().unwrap().clone())
    }

    async fn list_item_summaries(&self, vault_id: &str) -> AccountResult<Vec<ItemSummary>> {
        Ok(self
            .stored_items(vault_id)
            .iter()
            .map(|item| ItemSummary {
                id: item.id.clone().unwrap_or_default(),
                title: item.title.clone(),
                category: item.category.clone(),
            })
            .collect())
    }

    async fn get_item(&self, vault_id: &str, item_id: &str) -> AccountResult<Item> {
        if self.panic_on_get.iter().any(|id| id == item_id) {
            panic!("fake explosion fetching {}", item_id);
        }
        self.stored_items(vault_id)
            .into_iter()
            .find(|item| item.id.as_deref() == Some(item_id))
            .ok_or_else(|| AccountError::ItemFetch {
                item_id: item_id.to_string(),
                message: "not found".to_string(),
                transient: false,
            })
    }

    async fn create_vault(&self, name: &str) -> AccountResult<Vault> {
        self.vault_create_calls.fetch_add(1, Ordering::SeqCst);
        if self.auth_reject_vault_creates {
            return Err(AccountError::Auth {
                message: "HTTP 401: token expired".to_string(),
            });
        }
        if self.fail_vault_names.iter().any(|n| n == name) {
            return Err(AccountError::VaultCreate {
                name: name.to_string(),
                message: format!(
                    "HTTP 409: a vault named '{}' already exists - rename or remove it and re-run",
                    name
                ),
            });
        }
        let id = format!("dv-{}", self.vault_seq.fetch_add(1, Ordering::SeqCst) + 1);
        let vault = Vault {
            id: id.clone(),
            name: name.to_string(),
            item_count: None,
        };
        self.vaults.lock().unwrap().push(vault.clone());
        self.items.lock().unwrap().insert(id, Vec::new());
        Ok(vault)
    }

    async fn create_item(&self, item: &Item) -> AccountResult<String> {
        self.item_create_calls.fetch_add(1, Ordering::SeqCst);
        if self.auth_reject_item_creates {
            return Err(AccountError::Auth {
                message: "HTTP 401: token expired".to_string(),
            });
        }
        if self.fail_item_titles.iter().any(|t| t == &item.title) {
            return Err(AccountError::ItemCreate {
                message: format!("destination rejected '{}'", item.title),
                kind: CreateErrorKind::Validation,
            });
        }
        let n = self.item_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("di-{}", n);
        let mut stored = item.clone();
        stored.id = Some(id.clone());
        self.items
            .lock()
            .unwrap()
            .entry(item.vault_id.clone())
            .or_default()
            .push(stored);
        if let Some((token, after)) = &self.cancel_after_creates {
            if n >= *after {
                token.cancel();
            }
        }
        Ok(id)
    }

    async fn count_items(&self, vault_id: &str, _include_archived: bool) -> AccountResult<u32> {
        Ok(self.stored_items(vault_id).len() as u32)
    }
}

/// Bridge fake: records calls, optionally fails, and mirrors successful
/// creations into the destination fake so reconciliation sees them.
struct FakeBridge {
    dest: Option<Arc<FakeAccount>>,
    error: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeBridge {
    fn writing_to(dest: Arc<FakeAccount>) -> Self {
        Self {
            dest: Some(dest),
            error: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn failing_with(message: &str) -> Self {
        Self {
            dest: None,
            error: Some(message.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn unused() -> Self {
        Self {
            dest: None,
            error: Some("bridge should not have been called".to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ItemBridge for FakeBridge {
    async fn migrate_item(
        &self,
        _source_vault_id: &str,
        item_id: &str,
        dest_vault_id: &str,
    ) -> AccountResult<String> {
        self.calls.lock().unwrap().push(item_id.to_string());
        if let Some(message) = &self.error {
            return Err(AccountError::Bridge {
                message: message.clone(),
            });
        }
        let id = format!("bridge-{}", item_id);
        if let Some(dest) = &self.dest {
            let mut item = login_item(&id, &format!("bridged {}", item_id), dest_vault_id);
            item.category = Some(Category::Custom);
            dest.items
                .lock()
                .unwrap()
                .entry(dest_vault_id.to_string())
                .or_default()
                .push(item);
        }
        Ok(id)
    }
}

fn login_item(id: &str, title: &str, vault_id: &str) -> Item {
    Item {
        id: Some(id.to_string()),
        title: title.to_string(),
        vault_id: vault_id.to_string(),
        category: Some(Category::Login),
        fields: Vec::new(),
        sections: Vec::new(),
        files: Vec::new(),
        tags: Vec::new(),
        websites: Vec::new(),
        notes: None,
        version: None,
        created_at: None,
        updated_at: None,
        last_edited_by: None,
    }
}

fn custom_item(id: &str, title: &str, vault_id: &str) -> Item {
    let mut item = login_item(id, title, vault_id);
    item.category = Some(Category::Custom);
    item
}

fn orchestrator(
    source: Arc<FakeAccount>,
    dest: Arc<FakeAccount>,
    bridge: Arc<FakeBridge>,
    cancel: CancellationToken,
) -> (MigrationOrchestrator, Arc<RunLog>) {
    let run_log = Arc::new(RunLog::new());
    let orchestrator = MigrationOrchestrator::new(
        source,
        dest,
        bridge,
        MigrationConfig::default(),
        Arc::clone(&run_log),
        None,
        cancel,
    )
    .unwrap();
    (orchestrator, run_log)
}

fn vault_of(run: &RunSummary, index: usize) -> &VaultMigrationSummary {
    &run.vaults[index]
}

#[tokio::test]
async fn test_five_clean_items_complete_the_vault() {
    let items: Vec<Item> = (1..=5)
        .map(|n| login_item(&format!("it-{}", n), &format!("Login {}", n), "sv1"))
        .collect();
    let source = Arc::new(FakeAccount::with_vault("sv1", "Personal", items));
    let dest = Arc::new(FakeAccount::default());
    let bridge = Arc::new(FakeBridge::unused());

    let (orchestrator, _log) =
        orchestrator(source, Arc::clone(&dest), bridge, CancellationToken::new());
    let run = orchestrator.migrate_vaults(None).await.unwrap();

    let vault = vault_of(&run, 0);
    assert_eq!(vault.status, VaultStatus::Completed);
    assert_eq!(vault.source_item_count, Some(5));
    assert_eq!(vault.dest_item_count, Some(5));
    assert_eq!(vault.success_count, 5);
    assert_eq!(vault.failure_count, 0);
    assert!(run.is_clean());

    // Outcomes arrive in enumeration order and the last one closes at 100%.
    let ids: Vec<&str> = vault.outcomes.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["it-1", "it-2", "it-3", "it-4", "it-5"]);
    assert_eq!(vault.outcomes[4].progress_percent, 100.0);
    assert!((vault.outcomes[0].progress_percent - 20.0).abs() < 1e-9);

    assert_eq!(dest.stored_items("dv-1").len(), 5);
}

#[tokio::test]
async fn test_item_failures_never_abort_the_vault_and_counts_stay_consistent() {
    let items = vec![
        login_item("it-1", "Good 1", "sv1"),
        login_item("it-2", "Broken", "sv1"),
        login_item("it-3", "Good 2", "sv1"),
    ];
    let source = Arc::new(FakeAccount::with_vault("sv1", "Personal", items));
    let mut dest = FakeAccount::default();
    dest.fail_item_titles.push("Broken".to_string());
    let dest = Arc::new(dest);
    let bridge = Arc::new(FakeBridge::unused());

    let run_log = Arc::new(RunLog::new());
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let orchestrator = MigrationOrchestrator::new(
        source,
        dest.clone(),
        bridge,
        MigrationConfig::default(),
        Arc::clone(&run_log),
        Some(tx),
        CancellationToken::new(),
    )
    .unwrap();

    let run = orchestrator.migrate_vaults(None).await.unwrap();
    let vault = vault_of(&run, 0);

    assert_eq!(vault.status, VaultStatus::CompletedWithFailures);
    assert_eq!(vault.success_count, 2);
    assert_eq!(vault.failure_count, 1);
    assert_eq!(vault.outcomes.len(), 3);
    let failed = &vault.outcomes[1];
    assert!(!failed.success);
    assert!(failed.error.as_deref().unwrap().contains("destination rejected"));

    // Every item-level emission keeps success + failure == processed.
    let mut saw_item_emission = false;
    while let Ok(event) = rx.try_recv() {
        if let ProgressEvent::Vault {
            items_processed: Some(processed),
            success_count: Some(success),
            failure_count: Some(failure),
            ..
        } = event
        {
            saw_item_emission = true;
            assert_eq!(success + failure, processed);
        }
    }
    assert!(saw_item_emission);
    assert!(run_log.error_count() >= 1);
}

#[tokio::test]
async fn test_cancellation_after_four_items_stops_dispatch() {
    let items: Vec<Item> = (1..=10)
        .map(|n| login_item(&format!("it-{}", n), &format!("Login {}", n), "sv1"))
        .collect();
    let source = Arc::new(FakeAccount::with_vault("sv1", "Personal", items));

    let cancel = CancellationToken::new();
    let mut dest = FakeAccount::default();
    dest.cancel_after_creates = Some((cancel.clone(), 4));
    let dest = Arc::new(dest);
    let bridge = Arc::new(FakeBridge::unused());

    let (orchestrator, _log) = orchestrator(source, Arc::clone(&dest), bridge, cancel);
    let run = orchestrator.migrate_vaults(None).await.unwrap();

    let vault = vault_of(&run, 0);
    assert_eq!(vault.status, VaultStatus::Cancelled);
    assert_eq!(vault.outcomes.len(), 4);
    assert_eq!(vault.success_count, 4);
    assert!(run.cancelled);
    // Items 5 through 10 were never attempted.
    assert_eq!(dest.stored_items("dv-1").len(), 4);
}

#[tokio::test]
async fn test_custom_items_route_through_the_bridge() {
    let items = vec![
        login_item("it-1", "Ordinary login", "sv1"),
        custom_item("it-2", "Legacy widget", "sv1"),
    ];
    let source = Arc::new(FakeAccount::with_vault("sv1", "Personal", items));
    let dest = Arc::new(FakeAccount::default());
    let bridge = Arc::new(FakeBridge::writing_to(Arc::clone(&dest)));

    let (orchestrator, _log) = orchestrator(
        source,
        Arc::clone(&dest),
        Arc::clone(&bridge),
        CancellationToken::new(),
    );
    let run = orchestrator.migrate_vaults(None).await.unwrap();

    let vault = vault_of(&run, 0);
    assert_eq!(vault.status, VaultStatus::Completed);
    assert_eq!(vault.success_count, 2);
    assert_eq!(bridge.calls(), vec!["it-2"]);
    assert_eq!(dest.stored_items("dv-1").len(), 2);
}

#[tokio::test]
async fn test_bridge_failure_fails_the_item_but_the_vault_continues() {
    let items = vec![
        custom_item("it-1", "Legacy widget", "sv1"),
        login_item("it-2", "Ordinary login", "sv1"),
        login_item("it-3", "Another login", "sv1"),
    ];
    let source = Arc::new(FakeAccount::with_vault("sv1", "Personal", items));
    let dest = Arc::new(FakeAccount::default());
    let bridge = Arc::new(FakeBridge::failing_with(
        "no custom item template available on the destination; supply the template id explicitly (bridge.template_id) and re-run",
    ));

    let (orchestrator, _log) =
        orchestrator(source, Arc::clone(&dest), bridge, CancellationToken::new());
    let run = orchestrator.migrate_vaults(None).await.unwrap();

    let vault = vault_of(&run, 0);
    assert_eq!(vault.status, VaultStatus::CompletedWithFailures);
    assert_eq!(vault.success_count, 2);
    assert_eq!(vault.failure_count, 1);
    let failed = &vault.outcomes[0];
    assert!(failed.error.as_deref().unwrap().contains("supply the template id"));
}

#[tokio::test]
async fn test_vault_name_collision_fails_that_vault_only_without_retries() {
    let source = FakeAccount::default();
    source.vaults.lock().unwrap().extend([
        Vault {
            id: "sv1".to_string(),
            name: "Taken".to_string(),
            item_count: Some(0),
        },
        Vault {
            id: "sv2".to_string(),
            name: "Fresh".to_string(),
            item_count: Some(1),
        },
    ]);
    source
        .items
        .lock()
        .unwrap()
        .insert("sv2".to_string(), vec![login_item("it-1", "Login", "sv2")]);
    let source = Arc::new(source);

    let mut dest = FakeAccount::default();
    dest.fail_vault_names.push("Taken".to_string());
    let dest = Arc::new(dest);
    let bridge = Arc::new(FakeBridge::unused());

    let (orchestrator, run_log) =
        orchestrator(source, Arc::clone(&dest), bridge, CancellationToken::new());
    let run = orchestrator.migrate_vaults(None).await.unwrap();

    assert_eq!(vault_of(&run, 0).status, VaultStatus::Failed);
    assert!(vault_of(&run, 0)
        .error
        .as_deref()
        .unwrap()
        .contains("already exists"));
    assert_eq!(vault_of(&run, 1).status, VaultStatus::Completed);
    // A collision is a hard failure; the conflict wording must not trip
    // the transient-retry classifier.
    assert_eq!(dest.vault_create_calls.load(Ordering::SeqCst), 2);
    assert!(run_log.error_count() >= 1);
}

#[tokio::test]
async fn test_unknown_selection_entry_is_a_setup_error() {
    let source = Arc::new(FakeAccount::with_vault("sv1", "Personal", Vec::new()));
    let dest = Arc::new(FakeAccount::default());
    let bridge = Arc::new(FakeBridge::unused());

    let (orchestrator, _log) = orchestrator(source, dest, bridge, CancellationToken::new());
    let result = orchestrator
        .migrate_vaults(Some(vec!["no-such-vault".to_string()]))
        .await;

    match result {
        Err(RunError::Configuration { message }) => {
            assert!(message.contains("no-such-vault"));
        }
        other => panic!("expected configuration error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_selection_matches_vaults_by_name_or_id() {
    let source = FakeAccount::default();
    source.vaults.lock().unwrap().extend([
        Vault {
            id: "sv1".to_string(),
            name: "Personal".to_string(),
            item_count: Some(0),
        },
        Vault {
            id: "sv2".to_string(),
            name: "Work".to_string(),
            item_count: Some(0),
        },
    ]);
    source.items.lock().unwrap().insert("sv2".to_string(), Vec::new());
    let source = Arc::new(source);
    let dest = Arc::new(FakeAccount::default());
    let bridge = Arc::new(FakeBridge::unused());

    let (orchestrator, _log) = orchestrator(source, dest, bridge, CancellationToken::new());
    let run = orchestrator
        .migrate_vaults(Some(vec!["Work".to_string()]))
        .await
        .unwrap();

    assert_eq!(run.vaults.len(), 1);
    assert_eq!(run.vaults[0].vault_name, "Work");
}

#[tokio::test]
async fn test_a_panicking_item_task_becomes_a_failed_outcome() {
    let items = vec![
        login_item("it-1", "Explosive", "sv1"),
        login_item("it-2", "Calm", "sv1"),
    ];
    let mut source = FakeAccount::with_vault("sv1", "Personal", items);
    source.panic_on_get.push("it-1".to_string());
    let source = Arc::new(source);
    let dest = Arc::new(FakeAccount::default());
    let bridge = Arc::new(FakeBridge::unused());

    let (orchestrator, run_log) =
        orchestrator(source, Arc::clone(&dest), bridge, CancellationToken::new());
    let run = orchestrator.migrate_vaults(None).await.unwrap();

    let vault = vault_of(&run, 0);
    assert_eq!(vault.status, VaultStatus::CompletedWithFailures);
    assert_eq!(vault.success_count, 1);
    assert_eq!(vault.failure_count, 1);
    assert!(vault.outcomes[0]
        .error
        .as_deref()
        .unwrap()
        .contains("panicked"));
    assert!(run_log.error_count() >= 1);
}

#[tokio::test]
async fn test_auth_rejection_mid_run_aborts_instead_of_grinding_on() {
    // Two vaults of five items each against a destination whose token
    // dies on item creation.
    let source = FakeAccount::default();
    source.vaults.lock().unwrap().extend([
        Vault {
            id: "sv1".to_string(),
            name: "Personal".to_string(),
            item_count: Some(5),
        },
        Vault {
            id: "sv2".to_string(),
            name: "Work".to_string(),
            item_count: Some(5),
        },
    ]);
    for vault_id in ["sv1", "sv2"] {
        let items: Vec<Item> = (1..=5)
            .map(|n| {
                login_item(
                    &format!("{}-it-{}", vault_id, n),
                    &format!("Login {}", n),
                    vault_id,
                )
            })
            .collect();
        source.items.lock().unwrap().insert(vault_id.to_string(), items);
    }
    let source = Arc::new(source);

    let mut dest = FakeAccount::default();
    dest.auth_reject_item_creates = true;
    let dest = Arc::new(dest);
    let bridge = Arc::new(FakeBridge::unused());

    let cancel = CancellationToken::new();
    let (orchestrator, run_log) =
        orchestrator(source, Arc::clone(&dest), bridge, cancel.clone());
    let result = orchestrator.migrate_vaults(None).await;

    match result {
        Err(RunError::Authentication { role, .. }) => {
            assert_eq!(role, TenantRole::Destination);
        }
        other => panic!("expected an authentication abort, got {:?}", other.map(|_| ())),
    }
    assert!(cancel.is_cancelled());
    // At most one create per vault was in flight when the abort landed;
    // the other eight queued items were never dispatched.
    assert!(dest.item_create_calls.load(Ordering::SeqCst) <= 2);
    assert!(run_log
        .snapshot()
        .iter()
        .any(|entry| entry.message.contains("run aborted")));
}

#[tokio::test]
async fn test_auth_rejection_creating_the_destination_vault_aborts_the_run() {
    let source = Arc::new(FakeAccount::with_vault(
        "sv1",
        "Personal",
        vec![login_item("it-1", "Login", "sv1")],
    ));
    let mut dest = FakeAccount::default();
    dest.auth_reject_vault_creates = true;
    let dest = Arc::new(dest);
    let bridge = Arc::new(FakeBridge::unused());

    let cancel = CancellationToken::new();
    let (orchestrator, _log) = orchestrator(source, Arc::clone(&dest), bridge, cancel.clone());
    let result = orchestrator.migrate_vaults(None).await;

    assert!(matches!(
        result,
        Err(RunError::Authentication {
            role: TenantRole::Destination,
            ..
        })
    ));
    assert!(cancel.is_cancelled());
    assert_eq!(dest.item_create_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_transcode_warnings_reach_the_run_log_with_item_context() {
    let mut item = login_item("it-1", "Login with bad otp", "sv1");
    item.fields.push(Field {
        id: Some("f1".to_string()),
        title: "one-time password".to_string(),
        field_type: FieldType::Otp,
        value: Some("hello".to_string()),
        section_id: None,
        details: None,
    });
    let source = Arc::new(FakeAccount::with_vault("sv1", "Personal", vec![item]));
    let dest = Arc::new(FakeAccount::default());
    let bridge = Arc::new(FakeBridge::unused());

    let (orchestrator, run_log) =
        orchestrator(source, Arc::clone(&dest), bridge, CancellationToken::new());
    let run = orchestrator.migrate_vaults(None).await.unwrap();

    assert_eq!(vault_of(&run, 0).status, VaultStatus::Completed);
    assert!(run_log.warning_count() >= 1);
    let warned = run_log
        .snapshot()
        .into_iter()
        .any(|entry| entry.item.as_deref() == Some("it-1") && entry.message.contains("downgraded"));
    assert!(warned);
}
