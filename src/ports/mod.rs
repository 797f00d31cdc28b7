//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundary
//! between the appointment store and the persistence engine.

mod repository;

pub use repository::AppointmentRepository;
