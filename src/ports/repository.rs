//! Repository port: Trait for appointment row persistence.
//!
//! Implementations only ever see stored rows, so PII columns reach them as
//! ciphertext.

use crate::domain::{StoredAppointment, StoredDetails};

/// Row-level persistence for appointments.
///
/// Implementations are used from a single thread; every call runs to
/// completion before returning.
pub trait AppointmentRepository {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Insert a new row and return its assigned id.
    ///
    /// # Errors
    /// Returns error if the insert is rejected.
    fn insert(&self, details: &StoredDetails, submit_time: &str) -> Result<i64, Self::Error>;

    /// Replace every mutable column of row `id`.
    ///
    /// # Returns
    /// `false` if no row has that id.
    ///
    /// # Errors
    /// Returns error if the update is rejected.
    fn update(&self, id: i64, details: &StoredDetails) -> Result<bool, Self::Error>;

    /// Remove row `id`.
    ///
    /// # Returns
    /// `false` if no row has that id.
    ///
    /// # Errors
    /// Returns error if the delete is rejected.
    fn delete(&self, id: i64) -> Result<bool, Self::Error>;

    /// Load row `id`.
    ///
    /// # Errors
    /// Returns error if the query fails.
    fn find(&self, id: i64) -> Result<Option<StoredAppointment>, Self::Error>;

    /// Load every row ordered by appointment time ascending.
    ///
    /// # Errors
    /// Returns error if the query fails.
    fn load_all(&self) -> Result<Vec<StoredAppointment>, Self::Error>;

    /// Count stored rows.
    ///
    /// # Errors
    /// Returns error if the query fails.
    fn count(&self) -> Result<usize, Self::Error>;
}
