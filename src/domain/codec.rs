//! Record codec: in-memory appointments to and from their stored rows.
//!
//! Only `national_id` and `phone` are transformed by the field cipher. All
//! other columns are carried as plain text or integers.

use super::appointment::{
    format_timestamp, parse_timestamp, AppointmentDetails, AppointmentRecord, Gender,
};
use super::cipher::{CipherError, FieldCipher};

/// Mutable columns of a stored appointment row.
///
/// `national_id` and `phone` hold base64 ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDetails {
    pub customer_name: String,
    pub gender: String,
    pub age: i64,
    pub national_id: String,
    pub phone: String,
    pub appointment_time: String,
    pub service_description: String,
    pub staff_assignee: String,
    pub department: String,
    pub is_first_visit: i64,
    pub amount: String,
    pub notes: String,
}

/// A complete stored appointment row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAppointment {
    /// Assigned by the database; ignored on insert.
    pub id: i64,
    pub details: StoredDetails,
    pub submit_time: String,
}

/// Error decoding a stored row.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Cannot decrypt column {column}: {source}")]
    Decrypt {
        column: &'static str,
        #[source]
        source: CipherError,
    },

    #[error("Unparseable timestamp in column {column}: {value:?}")]
    Timestamp { column: &'static str, value: String },

    #[error("Unknown gender label {0:?}")]
    Gender(String),

    #[error("Age {0} out of range")]
    Age(i64),
}

/// Encode/decode boundary between plaintext records and stored rows.
#[derive(Debug, Clone)]
pub struct RecordCodec {
    cipher: FieldCipher,
}

impl RecordCodec {
    #[must_use]
    pub fn new(cipher: FieldCipher) -> Self {
        Self { cipher }
    }

    /// The field cipher used for PII columns.
    #[must_use]
    pub fn cipher(&self) -> &FieldCipher {
        &self.cipher
    }

    /// Encode the mutable columns, encrypting the PII fields.
    #[must_use]
    pub fn encode_details(&self, details: &AppointmentDetails) -> StoredDetails {
        StoredDetails {
            customer_name: details.customer_name.clone(),
            gender: details.gender.label().to_string(),
            age: i64::from(details.age),
            national_id: self.cipher.encrypt(&details.national_id),
            phone: self.cipher.encrypt(&details.phone),
            appointment_time: format_timestamp(&details.appointment_time),
            service_description: details.service_description.clone(),
            staff_assignee: details.staff_assignee.clone(),
            department: details.department.clone(),
            is_first_visit: i64::from(details.is_first_visit),
            amount: details.amount.clone(),
            notes: details.notes.clone(),
        }
    }

    /// Encode a full record for storage.
    #[must_use]
    pub fn encode_for_storage(&self, record: &AppointmentRecord) -> StoredAppointment {
        StoredAppointment {
            id: record.id,
            details: self.encode_details(&record.details),
            submit_time: format_timestamp(&record.submit_time),
        }
    }

    /// Decode a stored row, decrypting the PII fields.
    ///
    /// # Errors
    /// Returns `CodecError` if a PII column cannot be decrypted or a column
    /// holds a value outside its domain.
    pub fn decode_from_storage(
        &self,
        row: StoredAppointment,
    ) -> Result<AppointmentRecord, CodecError> {
        let StoredAppointment {
            id,
            details: stored,
            submit_time,
        } = row;

        let national_id = self
            .cipher
            .decrypt(&stored.national_id)
            .map_err(|source| CodecError::Decrypt {
                column: "national_id",
                source,
            })?;
        let phone = self
            .cipher
            .decrypt(&stored.phone)
            .map_err(|source| CodecError::Decrypt {
                column: "phone",
                source,
            })?;

        let gender = Gender::from_label(&stored.gender).ok_or(CodecError::Gender(stored.gender))?;
        let age = u32::try_from(stored.age).map_err(|_| CodecError::Age(stored.age))?;

        let appointment_time =
            parse_timestamp(&stored.appointment_time).map_err(|_| CodecError::Timestamp {
                column: "appointment_time",
                value: stored.appointment_time.clone(),
            })?;
        let submit_time = parse_timestamp(&submit_time).map_err(|_| CodecError::Timestamp {
            column: "submit_time",
            value: submit_time.clone(),
        })?;

        Ok(AppointmentRecord {
            id,
            details: AppointmentDetails {
                customer_name: stored.customer_name,
                gender,
                age,
                national_id,
                phone,
                appointment_time,
                service_description: stored.service_description,
                staff_assignee: stored.staff_assignee,
                department: stored.department,
                is_first_visit: stored.is_first_visit != 0,
                amount: stored.amount,
                notes: stored.notes,
            },
            submit_time,
        })
    }
}
