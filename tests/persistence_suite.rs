mod common;

use std::{fs, path::Path, sync::Arc, thread};

use kas_kiosk::{
    kas_core::{CoreError, DocumentStore, RetryPolicy, ReversalEngine, SystemClock},
    kas_domain::{Account, AccountKind, AccountRole, TransactionKind},
    kas_storage_json::{JsonDocumentStore, StoragePaths},
    Kiosk,
};

use common::{balance, setup_kiosk, test_config};

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.tmp", existing),
        None => String::from("tmp"),
    };
    tmp.set_extension(ext);
    tmp
}

#[test]
fn kiosk_state_survives_restart() {
    let seeded = setup_kiosk();
    let request = seeded
        .kiosk
        .request(TransactionKind::CustomerTransfer, seeded.bri, 1_500_000, "Rina");
    let receipt = seeded.kiosk.execute(&request).expect("execute");
    let root = seeded.root.clone();
    drop(seeded.kiosk);

    let reopened = Kiosk::open(test_config(&root)).expect("reopen");
    assert_eq!(reopened.roles().cash_drawer_id(), Some(seeded.laci));
    assert_eq!(balance(&reopened, seeded.bri), 500_000);
    assert_eq!(balance(&reopened, seeded.laci), 300_000 + 1_507_000);
    let audit = reopened
        .store()
        .audit(TransactionKind::CustomerTransfer, receipt.audit.id)
        .expect("read audit")
        .expect("audit exists");
    assert_eq!(audit.service_fee, 7_000);
}

#[test]
fn failed_write_preserves_file_and_balances() {
    let seeded = setup_kiosk();
    let data_path = seeded.root.join("data").join("kas.json");
    let original = fs::read_to_string(&data_path).expect("read original file");

    // A directory where the temp file should go makes the write fail.
    fs::create_dir_all(tmp_path_for(&data_path)).expect("block temp path");

    let request = seeded
        .kiosk
        .request(TransactionKind::CustomerTransfer, seeded.bri, 100_000, "Budi");
    let err = seeded.kiosk.execute(&request).unwrap_err();
    assert!(err.to_string().contains("aborted"), "{err}");

    assert_eq!(fs::read_to_string(&data_path).expect("read after failure"), original);
    assert_eq!(balance(&seeded.kiosk, seeded.bri), 2_000_000);
    assert!(seeded.kiosk.history(seeded.bri).expect("history").is_empty());
}

#[test]
fn backup_and_restore_through_the_kiosk() {
    let mut seeded = setup_kiosk();
    let info = seeded.kiosk.backup(Some("pagi")).expect("backup");

    let request = seeded
        .kiosk
        .request(TransactionKind::CustomerWithdrawal, seeded.bri, 400_000, "Joko");
    seeded.kiosk.execute(&request).expect("execute");
    assert_eq!(balance(&seeded.kiosk, seeded.bri), 1_600_000);

    seeded.kiosk.restore_backup(&info).expect("restore");
    assert_eq!(balance(&seeded.kiosk, seeded.bri), 2_000_000);
    assert_eq!(seeded.kiosk.roles().cash_drawer_id(), Some(seeded.laci));
    let backups = seeded.kiosk.list_backups().expect("list");
    assert!(backups.len() >= 2);

    seeded.kiosk.delete_backup(&info).expect("delete backup");
    let remaining = seeded.kiosk.list_backups().expect("list after delete");
    assert_eq!(remaining.len(), backups.len() - 1);
    assert!(remaining.iter().all(|backup| backup.id != info.id));
}

#[test]
fn concurrent_reversals_apply_once() {
    let root = common::test_root();
    let config = test_config(&root);
    let store = Arc::new(
        JsonDocumentStore::open(StoragePaths {
            data_root: config.resolve_data_root(),
            backup_root: config.resolve_backup_root(),
        })
        .expect("open store"),
    );
    let mut kiosk =
        Kiosk::with_store(config, store.clone(), Arc::new(SystemClock)).expect("kiosk over store");
    let bri = kiosk
        .open_account("BRI", AccountKind::Bank, 1_000_000)
        .expect("open BRI");
    kiosk
        .provision(Account::new("Laci", AccountKind::Tunai, 0).with_role(AccountRole::CashDrawer))
        .expect("open Laci");
    kiosk.refresh_roles().expect("roles");

    let request = kiosk.request(TransactionKind::CustomerTransfer, bri.id, 200_000, "Tono");
    let receipt = kiosk.execute(&request).expect("execute");
    let audit_id = receipt.audit.id;

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = ReversalEngine::new(store.clone(), RetryPolicy::new(10));
            thread::spawn(move || engine.reverse_audit(TransactionKind::CustomerTransfer, audit_id))
        })
        .collect();
    let outcomes: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("reversal thread"))
        .collect();

    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .filter_map(|outcome| outcome.as_ref().err())
        .all(|err| matches!(err, CoreError::AuditNotFound(_))));
    assert_eq!(balance(&kiosk, bri.id), 1_000_000);
    assert_eq!(store.snapshot().entry_count(), 0);
}
