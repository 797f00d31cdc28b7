//! Domain layer: Core business types and logic.
//!
//! Pure Rust types and functions with no I/O: the appointment model, the
//! identifier validator, the field cipher and the record codec.

mod appointment;
mod cipher;
mod codec;
pub mod validation;

pub use appointment::{
    format_timestamp, parse_timestamp, truncate_to_minute, AppointmentDetails, AppointmentRecord,
    Gender, Rosters, UnknownGender, MAX_AGE, MIN_AGE, TIME_FORMAT,
};
pub use cipher::{CipherError, FieldCipher, FieldKey, BLOCK_SIZE, KEY_LEN};
pub use codec::{CodecError, RecordCodec, StoredAppointment, StoredDetails};
pub use validation::{Field, ValidationError};
