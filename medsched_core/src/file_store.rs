//! Durable medication store backed by a single JSON document.
//!
//! Concurrent processes are serialized through a sidecar lock file:
//! readers take a shared lock, writers hold an exclusive lock across the
//! whole load-modify-save. The document is replaced atomically by
//! writing a temp file in the same directory, syncing it and renaming it
//! over the original.

use crate::request::MedicationInput;
use crate::store::{MedicationStore, MedicationTable, TableDocument};
use crate::{Error, IntakeTime, Medication, MedicationId, Result};
use chrono::NaiveDateTime;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// File name of the store document inside the data directory
pub const STORE_FILE_NAME: &str = "medications.json";

/// JSON document store with file locking
pub struct JsonFileStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl JsonFileStore {
    /// Create a store for the given document path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_name = path.as_os_str().to_os_string();
        lock_name.push(".lock");
        Self {
            path,
            lock_path: PathBuf::from(lock_name),
        }
    }

    /// Store rooted in a data directory
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(STORE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the document and its lock file
    fn data_dir(&self) -> Option<&Path> {
        self.path.parent().filter(|p| !p.as_os_str().is_empty())
    }

    fn open_lock(&self) -> Result<File> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)?;
        Ok(file)
    }

    /// Load the table. A missing document is an empty store.
    fn load(&self) -> Result<MedicationTable> {
        if !self.path.exists() {
            tracing::debug!("No store document at {:?}, starting empty", self.path);
            return Ok(MedicationTable::default());
        }

        let contents = std::fs::read_to_string(&self.path)?;
        let doc: TableDocument = serde_json::from_str(&contents).map_err(|e| {
            Error::Storage(format!("unreadable store document {:?}: {}", self.path, e))
        })?;
        let table = MedicationTable::try_from(doc)?;
        tracing::debug!("Loaded {} medications from {:?}", table.len(), self.path);
        Ok(table)
    }

    fn persist(&self, table: &MedicationTable) -> Result<()> {
        let parent = self.path.parent().ok_or_else(|| {
            Error::Storage(format!("store path {:?} has no parent directory", self.path))
        })?;
        let temp = NamedTempFile::new_in(parent)?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string_pretty(&TableDocument::from(table))?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved {} medications to {:?}", table.len(), self.path);
        Ok(())
    }

    /// Run `f` against the stored table under a shared lock. A data
    /// directory that does not exist yet reads as an empty store and is
    /// left uncreated.
    fn read<R>(&self, f: impl FnOnce(&MedicationTable) -> Result<R>) -> Result<R> {
        if self.data_dir().is_some_and(|dir| !dir.exists()) {
            tracing::debug!("Data directory for {:?} missing, reading empty store", self.path);
            return f(&MedicationTable::default());
        }

        let lock = self.open_lock()?;
        FileExt::lock_shared(&lock)?;
        let result = self.load().and_then(|table| f(&table));
        FileExt::unlock(&lock)?;
        result
    }

    /// Load, mutate and persist under one exclusive lock. Nothing is
    /// written when `f` fails.
    fn write<R>(&self, f: impl FnOnce(&mut MedicationTable) -> Result<R>) -> Result<R> {
        if let Some(dir) = self.data_dir() {
            std::fs::create_dir_all(dir)?;
        }
        let lock = self.open_lock()?;
        FileExt::lock_exclusive(&lock)?;
        let result = self.load().and_then(|mut table| {
            let value = f(&mut table)?;
            self.persist(&table)?;
            Ok(value)
        });
        FileExt::unlock(&lock)?;
        result
    }
}

impl MedicationStore for JsonFileStore {
    fn list_active_ordered_by_next_intake(&self) -> Result<Vec<Medication>> {
        self.read(|table| Ok(table.list_active_ordered()))
    }

    fn get_active_by_id(&self, id: MedicationId) -> Result<Medication> {
        self.read(|table| table.get_active(id).cloned())
    }

    fn search_active_by_name_contains(&self, fragment: &str) -> Result<Vec<Medication>> {
        self.read(|table| Ok(table.search_active(fragment)))
    }

    fn find_due_for_reminder(&self, at: IntakeTime) -> Result<Vec<Medication>> {
        self.read(|table| Ok(table.due_at(at)))
    }

    fn insert(&mut self, input: MedicationInput, now: NaiveDateTime) -> Result<Medication> {
        self.write(|table| table.insert(input, now))
    }

    fn save(&mut self, medication: &Medication) -> Result<Medication> {
        self.write(|table| table.save(medication))
    }

    fn modify_active<F>(&mut self, id: MedicationId, f: F) -> Result<Medication>
    where
        F: FnOnce(&mut Medication) -> Result<()>,
    {
        self.write(|table| table.modify_active(id, f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::{input, now};
    use crate::MedicationStatus;

    #[test]
    fn test_insert_and_reload() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::in_dir(temp_dir.path());

        let med = store.insert(input("Paracetamol", "08:00"), now()).unwrap();

        let reopened = JsonFileStore::in_dir(temp_dir.path());
        let loaded = reopened.get_active_by_id(med.id).unwrap();
        assert_eq!(loaded, med);
    }

    #[test]
    fn test_missing_document_is_empty_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_dir(&temp_dir.path().join("nested"));
        assert!(store.list_active_ordered_by_next_intake().unwrap().is_empty());
    }

    #[test]
    fn test_reads_do_not_create_data_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let data_dir = temp_dir.path().join("nested/data");
        let store = JsonFileStore::in_dir(&data_dir);

        assert!(store.list_active_ordered_by_next_intake().unwrap().is_empty());
        assert!(store.search_active_by_name_contains("ibu").unwrap().is_empty());
        assert!(store.get_active_by_id(MedicationId(1)).unwrap_err().is_not_found());
        assert!(!temp_dir.path().join("nested").exists());
    }

    #[test]
    fn test_first_write_creates_data_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let data_dir = temp_dir.path().join("nested/data");
        let mut store = JsonFileStore::in_dir(&data_dir);

        store.insert(input("A", "08:00"), now()).unwrap();
        assert!(data_dir.join(STORE_FILE_NAME).exists());
    }

    #[test]
    fn test_corrupted_document_is_storage_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_dir(temp_dir.path());
        std::fs::write(store.path(), "{ invalid json }").unwrap();

        let err = store.list_active_ordered_by_next_intake().unwrap_err();
        assert!(err.is_storage(), "unexpected error: {:?}", err);
    }

    #[test]
    fn test_ids_not_reused_across_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::in_dir(temp_dir.path());
        let first = store.insert(input("A", "08:00"), now()).unwrap();
        store
            .modify_active(first.id, |m| {
                m.status = MedicationStatus::Inactive;
                Ok(())
            })
            .unwrap();

        let mut reopened = JsonFileStore::in_dir(temp_dir.path());
        let second = reopened.insert(input("B", "09:00"), now()).unwrap();
        assert!(second.id > first.id);
    }

    #[test]
    fn test_failed_write_does_not_touch_document() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::in_dir(temp_dir.path());
        let med = store.insert(input("A", "08:00"), now()).unwrap();
        let before = std::fs::read_to_string(store.path()).unwrap();

        let result = store.modify_active(med.id, |m| {
            m.name = "B".into();
            Err(Error::Validation("rejected".into()))
        });
        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
    }

    #[test]
    fn test_atomic_save_leaves_no_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::in_dir(temp_dir.path());
        store.insert(input("A", "08:00"), now()).unwrap();

        let extras: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name != STORE_FILE_NAME && name != "medications.json.lock")
            .collect();
        assert!(extras.is_empty(), "Unexpected extra files: {:?}", extras);
    }
}
