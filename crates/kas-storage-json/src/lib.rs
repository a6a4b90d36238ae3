use std::{
    cmp::Reverse,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use kas_core::{CoreError, DocumentStore, Documents, MemoryStore, WriteBatch};
use kas_domain::{
    Account, AuditRecord, DailyReportSnapshot, LedgerEntry, ShiftReconciliation, TransactionKind,
};

const DATA_EXTENSION: &str = "json";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M";
const TMP_SUFFIX: &str = "tmp";
const DEFAULT_RETENTION: usize = 5;
const DEFAULT_STORE_NAME: &str = "kas";

/// Where the document file and its backups live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub data_root: PathBuf,
    pub backup_root: PathBuf,
}

impl StoragePaths {
    /// `<root>/data` and `<root>/backups`.
    pub fn under(root: &Path) -> Self {
        Self {
            data_root: root.join("data"),
            backup_root: root.join("backups"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInfo {
    pub id: String,
    pub path: PathBuf,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct BackupMetadata {
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub size_bytes: u64,
    pub path: PathBuf,
}

/// [`DocumentStore`] persisted as one pretty-printed JSON document set.
///
/// Every commit writes the candidate documents to a temporary file and renames it over
/// the data file before the in-memory view changes, so a failed write leaves both the
/// file and the visible state at their previous contents.
pub struct JsonDocumentStore {
    name: String,
    data_path: PathBuf,
    backup_dir: PathBuf,
    retention: usize,
    memory: MemoryStore,
}

impl JsonDocumentStore {
    pub fn open(paths: StoragePaths) -> Result<Self, CoreError> {
        Self::with_retention(paths, DEFAULT_STORE_NAME, DEFAULT_RETENTION)
    }

    pub fn with_retention(paths: StoragePaths, name: &str, retention: usize) -> Result<Self, CoreError> {
        fs::create_dir_all(&paths.data_root)?;
        fs::create_dir_all(&paths.backup_root)?;
        let slug = canonical_name(name);
        let data_path = paths
            .data_root
            .join(format!("{}.{}", slug, DATA_EXTENSION));
        let docs = if data_path.exists() {
            load_documents_from_path(&data_path)?
        } else {
            Documents::default()
        };
        info!(
            path = %data_path.display(),
            accounts = docs.kas_accounts.len(),
            audits = docs.audit_count(),
            "document store opened"
        );
        Ok(Self {
            backup_dir: paths.backup_root.join(&slug),
            name: slug,
            data_path,
            retention: retention.max(1),
            memory: MemoryStore::from_documents(docs),
        })
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn snapshot(&self) -> Documents {
        self.memory.snapshot()
    }

    /// Writes the current documents to a timestamped backup and prunes old ones.
    pub fn backup(&self, note: Option<&str>) -> Result<BackupInfo, CoreError> {
        fs::create_dir_all(&self.backup_dir)?;
        let timestamp = Utc::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
        let mut stem = format!("{}_{}", self.name, timestamp);
        if let Some(label) = sanitize_backup_note(note) {
            stem.push('_');
            stem.push_str(&label);
        }
        let mut file_name = format!("{}.{}", stem, DATA_EXTENSION);
        let mut counter = 2;
        while self.backup_dir.join(&file_name).exists() {
            file_name = format!("{}-{}.{}", stem, counter, DATA_EXTENSION);
            counter += 1;
        }
        let path = self.backup_dir.join(&file_name);
        write_atomic(&path, &serialize_documents(&self.memory.snapshot())?)?;
        self.prune_backups()?;
        info!(backup = %file_name, "backup written");
        Ok(BackupInfo {
            created_at: parse_backup_timestamp(&file_name),
            id: file_name,
            path,
        })
    }

    /// Backups, newest first.
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>, CoreError> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.backup_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(DATA_EXTENSION) {
                continue;
            }
            let modified = entry.metadata().and_then(|meta| meta.modified()).ok();
            if let Some(file_name) = path.file_name().and_then(|name| name.to_str()) {
                let info = BackupInfo {
                    id: file_name.to_string(),
                    created_at: parse_backup_timestamp(file_name),
                    path: path.clone(),
                };
                entries.push((modified, info));
            }
        }
        // Names only carry minutes; the file time orders backups taken within one minute.
        entries.sort_by_key(|(modified, info)| Reverse((info.created_at, *modified)));
        Ok(entries.into_iter().map(|(_, info)| info).collect())
    }

    pub fn list_backup_metadata(&self) -> Result<Vec<BackupMetadata>, CoreError> {
        let rows = self
            .list_backups()?
            .into_iter()
            .map(|entry| BackupMetadata {
                size_bytes: fs::metadata(&entry.path).map(|meta| meta.len()).unwrap_or(0),
                name: entry.id,
                created_at: entry.created_at,
                path: entry.path,
            })
            .collect();
        Ok(rows)
    }

    /// Replaces every document with the backup's contents, backing up the current set first.
    pub fn restore_backup(&self, backup: &BackupInfo) -> Result<Documents, CoreError> {
        if !backup.path.exists() {
            return Err(CoreError::Storage(format!("backup `{}` not found", backup.id)));
        }
        let restored = load_documents_from_path(&backup.path)?;
        self.backup(Some("pre-restore"))?;
        let path = self.data_path.clone();
        self.memory.update_with(
            |docs| {
                *docs = restored.clone();
                Ok(())
            },
            |docs| save_documents_to_path(docs, &path),
        )?;
        info!(backup = %backup.id, "documents restored from backup");
        Ok(restored)
    }

    /// Removes a listed backup. Only files inside this store's backup directory are touched.
    pub fn delete_backup(&self, backup: &BackupInfo) -> Result<(), CoreError> {
        let path = self.backup_dir.join(&backup.id);
        if path.parent() != Some(self.backup_dir.as_path()) {
            return Err(CoreError::Validation(format!("`{}` is not a backup name", backup.id)));
        }
        if path.is_file() {
            fs::remove_file(&path)?;
            info!(backup = %backup.id, "backup deleted");
        }
        Ok(())
    }

    fn persist(&self) -> impl FnOnce(&Documents) -> Result<(), CoreError> + '_ {
        move |docs: &Documents| save_documents_to_path(docs, &self.data_path)
    }

    fn prune_backups(&self) -> Result<(), CoreError> {
        for entry in self.list_backups()?.into_iter().skip(self.retention) {
            debug!(backup = %entry.id, "pruning old backup");
            if let Err(err) = fs::remove_file(&entry.path) {
                warn!(backup = %entry.id, error = %err, "failed to prune old backup");
            }
        }
        Ok(())
    }
}

impl DocumentStore for JsonDocumentStore {
    fn account(&self, id: Uuid) -> Result<Option<Account>, CoreError> {
        self.memory.account(id)
    }

    fn accounts(&self) -> Result<Vec<Account>, CoreError> {
        self.memory.accounts()
    }

    fn insert_account(&self, account: Account) -> Result<(), CoreError> {
        self.memory
            .update_with(|docs| docs.insert_account(account), self.persist())
    }

    fn entries(&self, account_id: Uuid) -> Result<Vec<LedgerEntry>, CoreError> {
        self.memory.entries(account_id)
    }

    fn audit(&self, kind: TransactionKind, id: Uuid) -> Result<Option<AuditRecord>, CoreError> {
        self.memory.audit(kind, id)
    }

    fn audits_since(
        &self,
        kind: TransactionKind,
        since: DateTime<Utc>,
    ) -> Result<Vec<AuditRecord>, CoreError> {
        self.memory.audits_since(kind, since)
    }

    fn audits_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AuditRecord>, CoreError> {
        self.memory.audits_between(start, end)
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), CoreError> {
        self.memory.commit_with(batch, self.persist())
    }

    fn append_daily_report(&self, report: DailyReportSnapshot) -> Result<(), CoreError> {
        self.memory
            .update_with(|docs| docs.append_daily_report(report), self.persist())
    }

    fn daily_reports(&self) -> Result<Vec<DailyReportSnapshot>, CoreError> {
        self.memory.daily_reports()
    }

    fn append_shift_reconciliation(&self, shift: ShiftReconciliation) -> Result<(), CoreError> {
        self.memory
            .update_with(|docs| docs.append_shift(shift), self.persist())
    }

    fn shift_reconciliations(&self) -> Result<Vec<ShiftReconciliation>, CoreError> {
        self.memory.shift_reconciliations()
    }
}

/// Saves a document set to an arbitrary path via a temporary file and rename.
pub fn save_documents_to_path(docs: &Documents, path: &Path) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    write_atomic(&tmp, &serialize_documents(docs)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn load_documents_from_path(path: &Path) -> Result<Documents, CoreError> {
    let data = fs::read_to_string(path)?;
    serde_json::from_str(&data).map_err(|err| CoreError::Serde(err.to_string()))
}

fn canonical_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' => c,
            _ => '_',
        })
        .collect();
    if sanitized.trim_matches('_').is_empty() {
        DEFAULT_STORE_NAME.into()
    } else {
        sanitized
    }
}

fn sanitize_backup_note(note: Option<&str>) -> Option<String> {
    let raw = note?.trim();
    let mut sanitized = String::new();
    let mut last_dash = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            sanitized.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if (ch.is_whitespace() || matches!(ch, '-' | '.' | '_'))
            && !sanitized.is_empty()
            && !last_dash
        {
            sanitized.push('-');
            last_dash = true;
        }
    }
    let trimmed = sanitized.trim_matches('-').to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Finds the `<YYYYmmdd>_<HHMM>` pair anywhere in a backup file name.
fn parse_backup_timestamp(name: &str) -> Option<DateTime<Utc>> {
    let stem = name.strip_suffix(&format!(".{}", DATA_EXTENSION))?;
    let segments: Vec<&str> = stem.split('_').collect();
    segments.windows(2).find_map(|pair| {
        let time = pair[1].split('-').next().unwrap_or(pair[1]);
        if !is_digits(pair[0], 8) || !is_digits(time, 4) {
            return None;
        }
        NaiveDateTime::parse_from_str(&format!("{}{}", pair[0], time), "%Y%m%d%H%M")
            .ok()
            .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
    })
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|c| c.is_ascii_digit())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_atomic(path: &Path, data: &str) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    file.sync_all()?;
    Ok(())
}

fn serialize_documents(docs: &Documents) -> Result<String, CoreError> {
    serde_json::to_string_pretty(docs).map_err(|err| CoreError::Serde(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_names_parse_with_and_without_notes() {
        let plain = parse_backup_timestamp("kas_20250301_1015.json").unwrap();
        assert_eq!(plain.format("%Y-%m-%d %H:%M").to_string(), "2025-03-01 10:15");
        assert_eq!(
            parse_backup_timestamp("kas_20250301_1015_tutup-shift.json"),
            Some(plain)
        );
        assert_eq!(parse_backup_timestamp("kas_20250301_1015-2.json"), Some(plain));
        assert_eq!(parse_backup_timestamp("kas_notes.json"), None);
    }

    #[test]
    fn notes_are_slugged() {
        assert_eq!(
            sanitize_backup_note(Some("  Tutup Shift. Pagi ")),
            Some("tutup-shift-pagi".into())
        );
        assert_eq!(sanitize_backup_note(Some("***")), None);
        assert_eq!(canonical_name("Kas Utama"), "kas_utama");
        assert_eq!(canonical_name("  "), "kas");
    }
}
