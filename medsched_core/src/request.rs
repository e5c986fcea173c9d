//! Input parsing and validation for create/update requests.
//!
//! A `MedicationRequest` is what a caller hands over; `validate()` turns it
//! into a `MedicationInput` whose fields already satisfy the record's
//! constraints. Defaults (the reminder flag) are applied here and nowhere
//! else.

use crate::{Error, FrequencyHours, IntakeTime, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Maximum description length, in characters
pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// Unvalidated create/update payload
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MedicationRequest {
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub description: Option<String>,
    pub frequency_hours: Option<i64>,
    pub next_intake_time: Option<IntakeTime>,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub reminder_active: Option<bool>,
}

/// Validated create/update payload
#[derive(Clone, Debug, PartialEq)]
pub struct MedicationInput {
    pub name: String,
    pub dosage: String,
    pub description: Option<String>,
    pub frequency_hours: FrequencyHours,
    pub next_intake_time: IntakeTime,
    pub start_date: NaiveDateTime,
    pub end_date: Option<NaiveDateTime>,
    pub reminder_active: bool,
}

impl MedicationRequest {
    pub fn validate(self) -> Result<MedicationInput> {
        let name = required_text("name", self.name)?;
        let dosage = required_text("dosage", self.dosage)?;

        // Length is measured on the text as supplied, padding included
        if let Some(ref d) = self.description {
            let len = d.chars().count();
            if len > MAX_DESCRIPTION_CHARS {
                return Err(Error::Validation(format!(
                    "description must be at most {} characters (got {})",
                    MAX_DESCRIPTION_CHARS, len
                )));
            }
        }
        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let frequency_hours = self
            .frequency_hours
            .ok_or_else(|| missing("frequency_hours"))
            .and_then(FrequencyHours::new)?;
        let next_intake_time = self
            .next_intake_time
            .ok_or_else(|| missing("next_intake_time"))?;
        let start_date = self.start_date.ok_or_else(|| missing("start_date"))?;

        Ok(MedicationInput {
            name,
            dosage,
            description,
            frequency_hours,
            next_intake_time,
            start_date,
            end_date: self.end_date,
            reminder_active: self.reminder_active.unwrap_or(true),
        })
    }
}

fn missing(field: &str) -> Error {
    Error::Validation(format!("{} is required", field))
}

fn required_text(field: &str, value: Option<String>) -> Result<String> {
    let value = value.ok_or_else(|| missing(field))?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(format!("{} must not be blank", field)));
    }
    Ok(trimmed.to_string())
}
