//! Scheduling service: lifecycle rules on top of a medication store.
//!
//! Operations:
//! - create / update / soft delete
//! - mark taken (advances the next intake by one frequency interval)
//! - lookups (by id, list, name search)
//! - reminder pass (selects the due set without changing it)
//!
//! The service keeps no state between calls besides its store and clock.

use crate::clock::{Clock, SystemClock};
use crate::request::MedicationRequest;
use crate::store::MedicationStore;
use crate::{IntakeTime, Medication, MedicationId, Result};

pub struct SchedulingService<S, C = SystemClock> {
    store: S,
    clock: C,
}

impl<S: MedicationStore> SchedulingService<S, SystemClock> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S: MedicationStore, C: Clock> SchedulingService<S, C> {
    pub fn with_clock(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Create a new active medication
    pub fn create(&mut self, request: MedicationRequest) -> Result<Medication> {
        let input = request.validate()?;
        let now = self.clock.now();
        let medication = self.store.insert(input, now)?;

        tracing::info!(
            "Created medication {} ({}, every {}, next at {})",
            medication.id,
            medication.name,
            medication.frequency_hours,
            medication.next_intake_time
        );
        Ok(medication)
    }

    pub fn get_by_id(&self, id: MedicationId) -> Result<Medication> {
        self.store.get_active_by_id(id)
    }

    /// All active medications, soonest intake first
    pub fn list_all(&self) -> Result<Vec<Medication>> {
        let meds = self.store.list_active_ordered_by_next_intake()?;
        tracing::debug!("Listed {} active medications", meds.len());
        Ok(meds)
    }

    /// Case-insensitive name search; an empty fragment matches everything
    pub fn search_by_name(&self, fragment: &str) -> Result<Vec<Medication>> {
        let meds = self.store.search_active_by_name_contains(fragment)?;
        tracing::debug!("Search {:?} matched {} medications", fragment, meds.len());
        Ok(meds)
    }

    /// Overwrite an active medication from a full request.
    ///
    /// Omitted description clears the stored one; omitted reminder flag
    /// re-enables reminders.
    pub fn update(&mut self, id: MedicationId, request: MedicationRequest) -> Result<Medication> {
        let input = request.validate()?;
        let now = self.clock.now();
        let medication = self.store.modify_active(id, |med| {
            med.apply_update(input, now);
            Ok(())
        })?;

        tracing::info!("Updated medication {} ({})", medication.id, medication.name);
        Ok(medication)
    }

    /// Soft delete. A second call reports `NotFound`.
    pub fn delete(&mut self, id: MedicationId) -> Result<()> {
        let now = self.clock.now();
        self.store.modify_active(id, |med| {
            med.deactivate(now);
            Ok(())
        })?;

        tracing::info!("Deactivated medication {}", id);
        Ok(())
    }

    /// Record an intake: next intake moves forward by the frequency,
    /// wrapping past midnight. Treatment end dates are not consulted.
    pub fn mark_taken(&mut self, id: MedicationId) -> Result<Medication> {
        let now = self.clock.now();
        let mut previous = None;
        let medication = self.store.modify_active(id, |med| {
            previous = Some(med.next_intake_time);
            med.advance_after_intake(now);
            Ok(())
        })?;

        if let Some(previous) = previous {
            tracing::info!(
                "Medication {} taken: next intake {} -> {}",
                id,
                previous,
                medication.next_intake_time
            );
        }
        Ok(medication)
    }

    /// Medications due at `at` (default: the clock's time of day).
    ///
    /// Read-only: due medications stay due until marked taken.
    pub fn process_reminders(&self, at: Option<IntakeTime>) -> Result<Vec<Medication>> {
        let at = at.unwrap_or_else(|| IntakeTime::of(self.clock.now()));
        let due = self.store.find_due_for_reminder(at)?;

        tracing::info!("Reminder pass at {}: {} medications due", at, due.len());
        for med in &due {
            tracing::debug!(
                "Due: {} {} ({}) scheduled {}",
                med.id,
                med.name,
                med.dosage,
                med.next_intake_time
            );
        }
        Ok(due)
    }
}
