#![allow(dead_code)]

use std::{path::PathBuf, sync::Mutex};

use kas_kiosk::{
    kas_config::Config,
    kas_domain::{Account, AccountKind, AccountRole},
    Kiosk,
};
use once_cell::sync::Lazy;
use tempfile::TempDir;
use uuid::Uuid;

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Creates a unique directory that outlives the calling test.
pub fn test_root() -> PathBuf {
    let temp = TempDir::new().expect("create temp dir");
    let base = temp.path().to_path_buf();
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);
    base
}

/// Config whose data and backup roots live under `base`.
pub fn test_config(base: &PathBuf) -> Config {
    Config {
        device_name: "kasir-test".into(),
        data_root: Some(base.join("data")),
        backup_root: Some(base.join("backups")),
        ..Config::default()
    }
}

pub struct Seeded {
    pub kiosk: Kiosk,
    pub root: PathBuf,
    pub bri: Uuid,
    pub laci: Uuid,
    pub dana: Uuid,
}

/// Opens a JSON-backed kiosk with BRI, the Laci cash drawer and DANA provisioned.
pub fn setup_kiosk() -> Seeded {
    let root = test_root();
    let mut kiosk = Kiosk::open(test_config(&root)).expect("open kiosk");
    let bri = kiosk
        .open_account("BRI", AccountKind::Bank, 2_000_000)
        .expect("open BRI");
    let laci = kiosk
        .provision(Account::new("Laci", AccountKind::Tunai, 300_000).with_role(AccountRole::CashDrawer))
        .expect("open Laci");
    let dana = kiosk
        .open_account("DANA", AccountKind::EWallet, 500_000)
        .expect("open DANA");
    kiosk.refresh_roles().expect("resolve roles");

    Seeded {
        kiosk,
        root,
        bri: bri.id,
        laci: laci.id,
        dana: dana.id,
    }
}

pub fn balance(kiosk: &Kiosk, id: Uuid) -> i64 {
    kiosk
        .store()
        .account(id)
        .expect("read account")
        .expect("account exists")
        .balance
}
