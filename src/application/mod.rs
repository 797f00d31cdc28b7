//! Application layer: Use cases and services.
//!
//! The appointment store orchestrates validation, the record codec and the
//! repository port.

mod store;

pub use store::{AppointmentStore, CorruptRow, ListedAppointment, ListedRow};
