//! # Clinic Intake
//!
//! Local appointment intake for a single-operator clinic desk.
//!
//! This crate provides:
//! - Checksum validation of national IDs, phone numbers and amounts
//! - Field-level encryption of PII columns at rest
//! - A validated, encrypting appointment store over SQLite
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Appointment types, validator, field cipher, record codec
//! - `ports`: Repository trait for row persistence
//! - `adapters`: SQLite storage, key sourcing, log sanitization
//! - `application`: The appointment store
//! - `config`: Environment configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::{AppointmentStore, CorruptRow, ListedAppointment, ListedRow};
pub use domain::{AppointmentDetails, AppointmentRecord, FieldCipher, FieldKey, Gender};

/// Result type for intake operations
pub type Result<T> = std::result::Result<T, IntakeError>;

/// Main error type for intake operations
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("Validation failed: {0}")]
    Validation(#[from] domain::ValidationError),

    #[error(transparent)]
    Decrypt(#[from] CorruptRow),

    #[error("Appointment {0} not found")]
    NotFound(i64),

    #[error("Storage operation failed: {0}")]
    Persistence(#[from] adapters::StorageError),

    #[error("Field key unavailable: {0}")]
    Secret(#[from] adapters::secrets::SecretError),
}
