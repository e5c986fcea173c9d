//! Medication storage contract and the in-memory table behind it.
//!
//! Every read path filters on the active flag here, so no caller can see a
//! soft-deleted record by accident. Writes go through `insert`, `save` or
//! `modify_active`; the last one is the fetch-modify-save unit that the
//! scheduling service relies on for atomic updates.

use crate::request::MedicationInput;
use crate::{Error, IntakeTime, Medication, MedicationId, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Storage contract consumed by the scheduling service
pub trait MedicationStore {
    /// Active medications, soonest intake first (ties by id)
    fn list_active_ordered_by_next_intake(&self) -> Result<Vec<Medication>>;

    /// The active medication with this id, or `NotFound`
    fn get_active_by_id(&self, id: MedicationId) -> Result<Medication>;

    /// Active medications whose name contains `fragment`, ignoring case
    fn search_active_by_name_contains(&self, fragment: &str) -> Result<Vec<Medication>>;

    /// Active, reminder-enabled medications scheduled at or before `at`
    fn find_due_for_reminder(&self, at: IntakeTime) -> Result<Vec<Medication>>;

    /// Persist a new record, assigning its id
    fn insert(&mut self, input: MedicationInput, now: NaiveDateTime) -> Result<Medication>;

    /// Persist changes to an existing active record
    fn save(&mut self, medication: &Medication) -> Result<Medication>;

    /// Fetch an active record, mutate it and save it as one unit.
    ///
    /// If `f` fails, nothing is written.
    fn modify_active<F>(&mut self, id: MedicationId, f: F) -> Result<Medication>
    where
        F: FnOnce(&mut Medication) -> Result<()>;
}

/// Keyed medication records plus the id counter
#[derive(Clone, Debug)]
pub struct MedicationTable {
    next_id: u64,
    medications: BTreeMap<MedicationId, Medication>,
}

impl Default for MedicationTable {
    fn default() -> Self {
        Self {
            next_id: 1,
            medications: BTreeMap::new(),
        }
    }
}

/// On-disk shape of a table
#[derive(Debug, Serialize, Deserialize)]
pub struct TableDocument {
    next_id: u64,
    medications: Vec<Medication>,
}

impl TryFrom<TableDocument> for MedicationTable {
    type Error = Error;

    fn try_from(doc: TableDocument) -> Result<Self> {
        let highest = doc.medications.iter().map(|m| m.id.0).max().unwrap_or(0);
        let after_highest = highest.checked_add(1).ok_or_else(|| {
            Error::Storage(format!("medication id {} leaves no room for new ids", highest))
        })?;
        let next_id = doc.next_id.max(after_highest);
        let medications = doc
            .medications
            .into_iter()
            .map(|m| (m.id, m))
            .collect();
        Ok(Self {
            next_id,
            medications,
        })
    }
}

impl From<&MedicationTable> for TableDocument {
    fn from(table: &MedicationTable) -> Self {
        Self {
            next_id: table.next_id,
            medications: table.medications.values().cloned().collect(),
        }
    }
}

impl MedicationTable {
    /// Number of stored records, inactive ones included
    pub fn len(&self) -> usize {
        self.medications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.medications.is_empty()
    }

    fn active(&self) -> impl Iterator<Item = &Medication> {
        self.medications.values().filter(|m| m.is_active())
    }

    pub fn list_active_ordered(&self) -> Vec<Medication> {
        let mut meds: Vec<Medication> = self.active().cloned().collect();
        meds.sort_by_key(|m| (m.next_intake_time, m.id));
        meds
    }

    pub fn get_active(&self, id: MedicationId) -> Result<&Medication> {
        self.medications
            .get(&id)
            .filter(|m| m.is_active())
            .ok_or(Error::NotFound(id))
    }

    pub fn search_active(&self, fragment: &str) -> Vec<Medication> {
        self.active()
            .filter(|m| m.name_contains(fragment))
            .cloned()
            .collect()
    }

    pub fn due_at(&self, at: IntakeTime) -> Vec<Medication> {
        self.active().filter(|m| m.is_due_at(at)).cloned().collect()
    }

    pub fn insert(&mut self, input: MedicationInput, now: NaiveDateTime) -> Result<Medication> {
        let id = MedicationId(self.next_id);
        self.next_id = self
            .next_id
            .checked_add(1)
            .ok_or_else(|| Error::Storage("medication id space exhausted".into()))?;

        let medication = Medication::new(id, input, now);
        self.medications.insert(id, medication.clone());
        Ok(medication)
    }

    /// Replace a stored active record. Creation time is kept from storage.
    pub fn save(&mut self, medication: &Medication) -> Result<Medication> {
        let stored = self
            .medications
            .get_mut(&medication.id)
            .filter(|m| m.is_active())
            .ok_or(Error::NotFound(medication.id))?;

        let created_at = stored.created_at;
        *stored = medication.clone();
        stored.created_at = created_at;
        stored.updated_at = stored.updated_at.max(created_at);
        Ok(stored.clone())
    }

    pub fn modify_active<F>(&mut self, id: MedicationId, f: F) -> Result<Medication>
    where
        F: FnOnce(&mut Medication) -> Result<()>,
    {
        let mut working = self.get_active(id)?.clone();
        f(&mut working)?;
        working.id = id;
        self.save(&working)
    }
}

/// Volatile store, used by tests and embedders that bring their own persistence
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    table: MedicationTable,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self) -> &MedicationTable {
        &self.table
    }
}

impl MedicationStore for MemoryStore {
    fn list_active_ordered_by_next_intake(&self) -> Result<Vec<Medication>> {
        Ok(self.table.list_active_ordered())
    }

    fn get_active_by_id(&self, id: MedicationId) -> Result<Medication> {
        self.table.get_active(id).cloned()
    }

    fn search_active_by_name_contains(&self, fragment: &str) -> Result<Vec<Medication>> {
        Ok(self.table.search_active(fragment))
    }

    fn find_due_for_reminder(&self, at: IntakeTime) -> Result<Vec<Medication>> {
        Ok(self.table.due_at(at))
    }

    fn insert(&mut self, input: MedicationInput, now: NaiveDateTime) -> Result<Medication> {
        self.table.insert(input, now)
    }

    fn save(&mut self, medication: &Medication) -> Result<Medication> {
        self.table.save(medication)
    }

    fn modify_active<F>(&mut self, id: MedicationId, f: F) -> Result<Medication>
    where
        F: FnOnce(&mut Medication) -> Result<()>,
    {
        self.table.modify_active(id, f)
    }
}
