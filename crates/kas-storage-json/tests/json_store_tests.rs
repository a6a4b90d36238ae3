use std::{fs, sync::Arc};

use kas_core::{
    AccountRoles, DocumentStore, LocalDay, RequestContext, RetryPolicy, ReversalEngine,
    SystemClock, TransactionEngine, TransactionRequest,
};
use kas_domain::{Account, AccountKind, AccountRole, TransactionKind};
use kas_storage_json::{load_documents_from_path, JsonDocumentStore, StoragePaths};
use tempfile::tempdir;

fn seed(store: &JsonDocumentStore) -> (Account, Account) {
    let bri = Account::new("BRI", AccountKind::Bank, 1_000_000);
    let laci = Account::new("Laci", AccountKind::Tunai, 250_000).with_role(AccountRole::CashDrawer);
    store.insert_account(bri.clone()).expect("insert bri");
    store.insert_account(laci.clone()).expect("insert laci");
    (bri, laci)
}

fn engine(store: Arc<JsonDocumentStore>) -> TransactionEngine {
    let roles = AccountRoles::resolve_default(store.as_ref()).expect("roles");
    TransactionEngine::new(
        store,
        Arc::new(SystemClock),
        roles,
        LocalDay::wib(),
        RetryPolicy::default(),
    )
}

#[test]
fn committed_transactions_survive_reopen() {
    let dir = tempdir().expect("tempdir");
    let paths = StoragePaths::under(dir.path());
    let store = Arc::new(JsonDocumentStore::open(paths.clone()).expect("open store"));
    let (bri, laci) = seed(&store);

    let request = TransactionRequest::new(TransactionKind::CustomerTransfer, bri.id, 100_000, "Budi")
        .with_service_fee(5_000);
    let receipt = engine(store.clone())
        .execute(&request, &RequestContext::new("kasir-1"))
        .expect("execute");
    let path = store.data_path().to_path_buf();
    drop(store);

    assert_eq!(path.extension().and_then(|ext| ext.to_str()), Some("json"));
    let reopened = JsonDocumentStore::open(paths).expect("reopen store");
    assert_eq!(reopened.account(bri.id).unwrap().unwrap().balance, 900_000);
    assert_eq!(reopened.account(laci.id).unwrap().unwrap().balance, 355_000);
    assert_eq!(reopened.entries(laci.id).unwrap().len(), 1);
    let audit = reopened
        .audit(TransactionKind::CustomerTransfer, receipt.audit.id)
        .unwrap()
        .expect("audit persisted");
    assert_eq!(audit.entry_ids.len(), 2);

    let raw = fs::read_to_string(&path).expect("read data file");
    assert!(raw.contains("\"kasAccounts\""));
    assert!(raw.contains("\"customerTransfers\""));
}

#[test]
fn reversal_is_persisted() {
    let dir = tempdir().expect("tempdir");
    let paths = StoragePaths::under(dir.path());
    let store = Arc::new(JsonDocumentStore::open(paths.clone()).expect("open store"));
    let (bri, _) = seed(&store);

    let request = TransactionRequest::new(TransactionKind::PpobPdam, bri.id, 80_000, "PDAM 1234");
    let receipt = engine(store.clone())
        .execute(&request, &RequestContext::new("kasir-1"))
        .expect("execute");
    ReversalEngine::new(store.clone(), RetryPolicy::default())
        .reverse(&receipt.entries[0])
        .expect("reverse");

    let docs = load_documents_from_path(store.data_path()).expect("load file");
    assert_eq!(docs.kas_accounts[&bri.id].balance, 1_000_000);
    assert_eq!(docs.audit_count(), 0);
    assert_eq!(docs.entry_count(), 0);
}

#[test]
fn rejected_commit_leaves_file_untouched() {
    let dir = tempdir().expect("tempdir");
    let store = Arc::new(JsonDocumentStore::open(StoragePaths::under(dir.path())).expect("open store"));
    let (bri, _) = seed(&store);
    let before = fs::read_to_string(store.data_path()).expect("read");

    let request = TransactionRequest::new(TransactionKind::CustomerTransfer, bri.id, 5_000_000, "Budi");
    assert!(engine(store.clone())
        .execute(&request, &RequestContext::new("kasir-1"))
        .is_err());

    assert_eq!(fs::read_to_string(store.data_path()).expect("read"), before);
}

#[test]
fn backups_restore_previous_documents() {
    let dir = tempdir().expect("tempdir");
    let store = Arc::new(JsonDocumentStore::open(StoragePaths::under(dir.path())).expect("open store"));
    let (bri, _) = seed(&store);

    let info = store.backup(Some("Buka Toko")).expect("backup");
    assert!(info.id.starts_with("kas_"));
    assert!(info.id.contains("buka-toko"));
    assert!(info.created_at.is_some());

    let request = TransactionRequest::new(TransactionKind::CustomerWithdrawal, bri.id, 200_000, "Sari");
    engine(store.clone())
        .execute(&request, &RequestContext::new("kasir-1"))
        .expect("execute");
    assert_eq!(store.account(bri.id).unwrap().unwrap().balance, 800_000);

    let restored = store.restore_backup(&info).expect("restore");
    assert_eq!(restored.kas_accounts[&bri.id].balance, 1_000_000);
    assert_eq!(store.account(bri.id).unwrap().unwrap().balance, 1_000_000);

    let listed = store.list_backups().expect("list");
    assert!(listed.iter().any(|backup| backup.id == info.id));
    assert!(listed.iter().any(|backup| backup.id.contains("pre-restore")));
}

#[test]
fn backup_retention_prunes_oldest() {
    let dir = tempdir().expect("tempdir");
    let store = JsonDocumentStore::with_retention(StoragePaths::under(dir.path()), "Kas Utama", 3)
        .expect("open store");
    for _ in 0..5 {
        store.backup(None).expect("backup");
    }
    let backups = store.list_backup_metadata().expect("metadata");
    assert_eq!(backups.len(), 3);
    assert!(backups.iter().all(|row| row.name.starts_with("kas_utama_")));
    assert!(backups.iter().all(|row| row.size_bytes > 0));
}

#[test]
fn deleted_backups_disappear_from_the_listing() {
    let dir = tempdir().expect("tempdir");
    let store = JsonDocumentStore::open(StoragePaths::under(dir.path())).expect("open store");
    seed(&store);
    let kept = store.backup(Some("pagi")).expect("first backup");
    let dropped = store.backup(Some("siang")).expect("second backup");

    store.delete_backup(&dropped).expect("delete");
    assert!(!dropped.path.exists());
    let names: Vec<_> = store
        .list_backups()
        .expect("list")
        .into_iter()
        .map(|backup| backup.id)
        .collect();
    assert_eq!(names, vec![kept.id.clone()]);

    let mut escape = kept.clone();
    escape.id = "../kas.json".into();
    assert!(store.delete_backup(&escape).is_err());
    assert!(store.data_path().exists());
}

#[test]
fn unremovable_backup_does_not_fail_new_backups() {
    let dir = tempdir().expect("tempdir");
    let store = JsonDocumentStore::with_retention(StoragePaths::under(dir.path()), "kas", 1)
        .expect("open store");
    seed(&store);
    let first = store.backup(None).expect("first backup");
    let backup_dir = first.path.parent().expect("backup dir").to_path_buf();
    // A directory with a backup name is listed but cannot be removed as a file.
    let stuck = backup_dir.join("kas_20200101_0000.json");
    fs::create_dir(&stuck).expect("stuck entry");

    let latest = store.backup(Some("tutup")).expect("backup despite prune failure");
    assert!(latest.path.exists());
    assert!(stuck.is_dir());
    let names: Vec<_> = store
        .list_backups()
        .expect("list")
        .into_iter()
        .map(|backup| backup.id)
        .collect();
    assert_eq!(names[0], latest.id);
    assert!(names.contains(&"kas_20200101_0000.json".to_string()));
}
