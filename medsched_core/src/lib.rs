#![forbid(unsafe_code)]

//! Core domain model and business logic for medication intake scheduling.
//!
//! This crate provides:
//! - Domain types (medications, intake times, frequencies)
//! - Request validation
//! - Persistence (in-memory and locked JSON file stores)
//! - The scheduling service (lifecycle, mark-taken, reminder pass)

pub mod types;
pub mod error;
pub mod request;
pub mod clock;
pub mod config;
pub mod logging;
pub mod store;
pub mod file_store;
pub mod service;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use request::{MedicationInput, MedicationRequest};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use store::{MedicationStore, MemoryStore};
pub use file_store::JsonFileStore;
pub use service::SchedulingService;
