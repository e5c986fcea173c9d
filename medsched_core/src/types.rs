//! Core domain types for medication scheduling.
//!
//! This module defines the fundamental types used throughout the system:
//! - Identifiers and the time-of-day value used for intakes
//! - The Medication record and its lifecycle transitions
//! - The derived per-record schedule state

use crate::request::MedicationInput;
use crate::{Error, Result};
use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Identifier
// ============================================================================

/// Server-assigned medication identifier. Never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MedicationId(pub u64);

impl fmt::Display for MedicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MedicationId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u64>()
            .map(MedicationId)
            .map_err(|_| Error::Validation(format!("invalid medication id: {:?}", s)))
    }
}

// ============================================================================
// Time of day
// ============================================================================

/// A wall-clock time of day at whole-second precision.
///
/// Carries no date: arithmetic wraps modulo 24 hours, so advancing
/// 20:00:00 by 8 hours yields 04:00:00.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IntakeTime(NaiveTime);

impl IntakeTime {
    pub fn from_hms(hour: u32, minute: u32, second: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, second).map(IntakeTime)
    }

    /// Build from a chrono time, dropping sub-second precision.
    ///
    /// A leap second folds into second 59; text input never reaches this
    /// path with one (see `FromStr`).
    pub fn from_naive(time: NaiveTime) -> Self {
        IntakeTime(time.with_nanosecond(0).unwrap_or(time))
    }

    /// Time of day of a wall-clock timestamp
    pub fn of(datetime: NaiveDateTime) -> Self {
        Self::from_naive(datetime.time())
    }

    pub fn as_naive(&self) -> NaiveTime {
        self.0
    }

    /// Advance by whole hours, wrapping past midnight
    pub fn advance_hours(self, hours: u32) -> Self {
        let (time, _wrapped_days) = self
            .0
            .overflowing_add_signed(Duration::hours(i64::from(hours)));
        IntakeTime(time)
    }
}

impl fmt::Display for IntakeTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M:%S"))
    }
}

impl FromStr for IntakeTime {
    type Err = Error;

    /// Accepts `HH:MM:SS` or `HH:MM`. Leap seconds (`:60`) are rejected.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid =
            || Error::Validation(format!("invalid time of day: {:?} (expected HH:MM:SS)", s));

        let time = NaiveTime::parse_from_str(s, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
            .map_err(|_| invalid())?;
        // chrono encodes a leap second as nanosecond >= 1_000_000_000
        if time.nanosecond() >= 1_000_000_000 {
            return Err(invalid());
        }
        Ok(IntakeTime::from_naive(time))
    }
}

impl Serialize for IntakeTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IntakeTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Frequency
// ============================================================================

/// Hours between two intakes, always within 1..=24
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct FrequencyHours(u8);

impl FrequencyHours {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 24;

    pub fn new(hours: i64) -> Result<Self> {
        if hours < i64::from(Self::MIN) || hours > i64::from(Self::MAX) {
            return Err(Error::Validation(format!(
                "frequency_hours must be between {} and {} (got {})",
                Self::MIN,
                Self::MAX,
                hours
            )));
        }
        Ok(FrequencyHours(hours as u8))
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for FrequencyHours {
    type Error = Error;

    fn try_from(hours: u8) -> Result<Self> {
        FrequencyHours::new(i64::from(hours))
    }
}

impl From<FrequencyHours> for u8 {
    fn from(frequency: FrequencyHours) -> u8 {
        frequency.0
    }
}

impl fmt::Display for FrequencyHours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}h", self.0)
    }
}

// ============================================================================
// Medication record
// ============================================================================

/// Soft-delete flag. `Inactive` is terminal.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MedicationStatus {
    #[default]
    Active,
    Inactive,
}

/// Per-record schedule state derived from status and reminder flag
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScheduleState {
    ActiveReminding,
    ActiveSilenced,
    Inactive,
}

/// A medication taken on a recurring schedule
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Medication {
    pub id: MedicationId,
    pub name: String,
    pub dosage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub frequency_hours: FrequencyHours,
    pub next_intake_time: IntakeTime,
    pub start_date: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub status: MedicationStatus,
    pub reminder_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Medication {
    /// Build a fresh, active record from validated input
    pub fn new(id: MedicationId, input: MedicationInput, now: NaiveDateTime) -> Self {
        Medication {
            id,
            name: input.name,
            dosage: input.dosage,
            description: input.description,
            frequency_hours: input.frequency_hours,
            next_intake_time: input.next_intake_time,
            start_date: input.start_date,
            end_date: input.end_date,
            status: MedicationStatus::Active,
            reminder_active: input.reminder_active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == MedicationStatus::Active
    }

    pub fn state(&self) -> ScheduleState {
        match (self.status, self.reminder_active) {
            (MedicationStatus::Inactive, _) => ScheduleState::Inactive,
            (MedicationStatus::Active, true) => ScheduleState::ActiveReminding,
            (MedicationStatus::Active, false) => ScheduleState::ActiveSilenced,
        }
    }

    /// Active, reminder-enabled and scheduled at or before `at`
    pub fn is_due_at(&self, at: IntakeTime) -> bool {
        self.state() == ScheduleState::ActiveReminding && self.next_intake_time <= at
    }

    /// Case-insensitive substring match on the name
    pub fn name_contains(&self, fragment: &str) -> bool {
        self.name.to_lowercase().contains(&fragment.to_lowercase())
    }

    /// Refresh `updated_at`, never letting it fall behind `created_at`
    pub fn touch(&mut self, now: NaiveDateTime) {
        self.updated_at = now.max(self.created_at);
    }

    /// Overwrite every editable field from the input.
    ///
    /// An absent description clears the stored one; the reminder flag
    /// arrives already defaulted from the request.
    pub fn apply_update(&mut self, input: MedicationInput, now: NaiveDateTime) {
        self.name = input.name;
        self.dosage = input.dosage;
        self.description = input.description;
        self.frequency_hours = input.frequency_hours;
        self.next_intake_time = input.next_intake_time;
        self.start_date = input.start_date;
        self.end_date = input.end_date;
        self.reminder_active = input.reminder_active;
        self.touch(now);
    }

    /// Move the next intake forward by one frequency interval
    pub fn advance_after_intake(&mut self, now: NaiveDateTime) {
        self.next_intake_time = self
            .next_intake_time
            .advance_hours(u32::from(self.frequency_hours.get()));
        self.touch(now);
    }

    /// Soft delete
    pub fn deactivate(&mut self, now: NaiveDateTime) {
        self.status = MedicationStatus::Inactive;
        self.touch(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> IntakeTime {
        IntakeTime::from_hms(h, m, s).unwrap()
    }

    fn timestamp(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn sample() -> Medication {
        Medication {
            id: MedicationId(1),
            name: "Ibuprofeno".into(),
            dosage: "200mg".into(),
            description: Some("Para el dolor".into()),
            frequency_hours: FrequencyHours::new(8).unwrap(),
            next_intake_time: at(9, 0, 0),
            start_date: timestamp(1, 8),
            end_date: None,
            status: MedicationStatus::Active,
            reminder_active: true,
            created_at: timestamp(1, 8),
            updated_at: timestamp(1, 8),
        }
    }

    #[test]
    fn test_advance_wraps_past_midnight() {
        assert_eq!(at(9, 0, 0).advance_hours(8), at(17, 0, 0));
        assert_eq!(at(17, 0, 0).advance_hours(8), at(1, 0, 0));
        assert_eq!(at(23, 59, 59).advance_hours(1), at(0, 59, 59));
        assert_eq!(at(6, 30, 0).advance_hours(24), at(6, 30, 0));
    }

    #[test]
    fn test_parse_time_of_day() {
        assert_eq!("08:00:00".parse::<IntakeTime>().unwrap(), at(8, 0, 0));
        assert_eq!("21:15".parse::<IntakeTime>().unwrap(), at(21, 15, 0));
        assert!("25:00".parse::<IntakeTime>().is_err());
        assert!("noon".parse::<IntakeTime>().is_err());
    }

    #[test]
    fn test_leap_second_rejected() {
        let err = "08:00:60".parse::<IntakeTime>().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!("23:59:60".parse::<IntakeTime>().is_err());

        let from_json: std::result::Result<IntakeTime, _> = serde_json::from_str("\"08:00:60\"");
        assert!(from_json.is_err());
    }

    #[test]
    fn test_intake_time_serializes_as_hms() {
        let json = serde_json::to_string(&at(7, 5, 0)).unwrap();
        assert_eq!(json, "\"07:05:00\"");
    }

    #[test]
    fn test_from_naive_drops_subseconds() {
        let t = NaiveTime::from_hms_milli_opt(10, 0, 0, 750).unwrap();
        assert_eq!(IntakeTime::from_naive(t), at(10, 0, 0));
    }

    #[test]
    fn test_frequency_bounds() {
        assert!(FrequencyHours::new(0).is_err());
        assert!(FrequencyHours::new(25).is_err());
        assert_eq!(FrequencyHours::new(1).unwrap().get(), 1);
        assert_eq!(FrequencyHours::new(24).unwrap().get(), 24);
    }

    #[test]
    fn test_frequency_rejected_when_deserializing() {
        let result: std::result::Result<FrequencyHours, _> = serde_json::from_str("30");
        assert!(result.is_err());
    }

    #[test]
    fn test_medication_id_parse() {
        assert_eq!("17".parse::<MedicationId>().unwrap(), MedicationId(17));
        assert!("-1".parse::<MedicationId>().is_err());
    }

    #[test]
    fn test_schedule_states() {
        let mut med = sample();
        assert_eq!(med.state(), ScheduleState::ActiveReminding);

        med.reminder_active = false;
        assert_eq!(med.state(), ScheduleState::ActiveSilenced);

        med.deactivate(timestamp(2, 8));
        assert_eq!(med.state(), ScheduleState::Inactive);
        assert!(!med.is_active());
    }

    #[test]
    fn test_due_requires_reminder_and_active() {
        let mut med = sample();
        med.next_intake_time = at(8, 30, 0);
        assert!(med.is_due_at(at(9, 0, 0)));
        assert!(med.is_due_at(at(8, 30, 0)));
        assert!(!med.is_due_at(at(8, 29, 59)));

        med.reminder_active = false;
        assert!(!med.is_due_at(at(9, 0, 0)));

        med.reminder_active = true;
        med.deactivate(timestamp(1, 9));
        assert!(!med.is_due_at(at(9, 0, 0)));
    }

    #[test]
    fn test_touch_never_precedes_creation() {
        let mut med = sample();
        med.touch(timestamp(1, 2));
        assert_eq!(med.updated_at, med.created_at);

        med.touch(timestamp(3, 2));
        assert_eq!(med.updated_at, timestamp(3, 2));
    }

    #[test]
    fn test_name_match_ignores_case() {
        let med = sample();
        assert!(med.name_contains("ibu"));
        assert!(med.name_contains("PROF"));
        assert!(med.name_contains(""));
        assert!(!med.name_contains("para"));
    }

    #[test]
    fn test_status_defaults_active_when_missing() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value.as_object_mut().unwrap().remove("status");
        let med: Medication = serde_json::from_value(value).unwrap();
        assert!(med.is_active());
    }
}
