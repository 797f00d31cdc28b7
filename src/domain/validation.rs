//! Identifier and amount validation.
//!
//! Pure functions, no I/O. Every mutation path in the store runs
//! [`validate_details`] before anything is encrypted or written.

use std::sync::OnceLock;

use regex::Regex;

use super::appointment::{AppointmentDetails, Rosters, MAX_AGE, MIN_AGE};

/// Weights applied to the first 17 digits of a national ID.
const CHECKSUM_WEIGHTS: [u32; 17] = [7, 9, 10, 5, 8, 4, 2, 1, 6, 3, 7, 9, 10, 5, 8, 4, 2];

/// Check characters indexed by `weighted sum mod 11`.
const CHECK_CODES: &[u8; 11] = b"10X98765432";

/// Region code, birth date (years 18xx-20xx), sequence, check character.
/// ASCII digits only.
const NATIONAL_ID_PATTERN: &str =
    r"^[1-9][0-9]{5}(18|19|20)[0-9]{2}(0[1-9]|1[0-2])(0[1-9]|[12][0-9]|3[01])[0-9]{3}[0-9Xx]$";

const PHONE_PATTERN: &str = r"^1[3-9][0-9]{9}$";

static NATIONAL_ID_RE: OnceLock<Regex> = OnceLock::new();
static PHONE_RE: OnceLock<Regex> = OnceLock::new();

fn national_id_re() -> &'static Regex {
    NATIONAL_ID_RE.get_or_init(|| Regex::new(NATIONAL_ID_PATTERN).expect("Valid regex"))
}

fn phone_re() -> &'static Regex {
    PHONE_RE.get_or_init(|| Regex::new(PHONE_PATTERN).expect("Valid regex"))
}

/// Field that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    CustomerName,
    NationalId,
    Phone,
    Amount,
    Age,
    StaffAssignee,
    Department,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::CustomerName => "customer_name",
            Self::NationalId => "national_id",
            Self::Phone => "phone",
            Self::Amount => "amount",
            Self::Age => "age",
            Self::StaffAssignee => "staff_assignee",
            Self::Department => "department",
        };
        f.write_str(name)
    }
}

/// A rejected input field and the reason.
///
/// The reason never echoes the offending value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: Field,
    pub reason: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(field: Field, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Compute the check character for the first 17 digits of a national ID.
///
/// Returns `None` unless `first17` is exactly 17 ASCII digits.
#[must_use]
pub fn national_id_check_char(first17: &str) -> Option<char> {
    let digits = first17.as_bytes();
    if digits.len() != CHECKSUM_WEIGHTS.len() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }

    let sum: u32 = digits
        .iter()
        .zip(CHECKSUM_WEIGHTS)
        .map(|(d, w)| u32::from(d - b'0') * w)
        .sum();

    Some(char::from(CHECK_CODES[(sum % 11) as usize]))
}

/// Format and checksum check for an 18-character national ID.
#[must_use]
pub fn validate_national_id(s: &str) -> bool {
    if !national_id_re().is_match(s) {
        return false;
    }

    // The pattern guarantees 17 ASCII digits followed by one ASCII character.
    let (body, last) = s.split_at(17);
    match national_id_check_char(body) {
        Some(expected) => last.eq_ignore_ascii_case(&expected.to_string()),
        None => false,
    }
}

/// Mainland mobile number: `1`, then `3`-`9`, then nine digits.
#[must_use]
pub fn validate_phone(s: &str) -> bool {
    phone_re().is_match(s)
}

/// Whole, positive amount written with ASCII digits only.
///
/// Decimal points, signs and separators are rejected.
#[must_use]
pub fn validate_amount(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) && s.bytes().any(|b| b != b'0')
}

/// Validate a full set of appointment details.
///
/// Checks run in intake order (name, national ID, phone, amount, then age and
/// rosters) and the first failure is returned.
///
/// # Errors
/// Returns the first `ValidationError` found.
pub fn validate_details(
    details: &AppointmentDetails,
    rosters: &Rosters,
) -> Result<(), ValidationError> {
    if details.customer_name.trim().is_empty() {
        return Err(ValidationError::new(Field::CustomerName, "must not be empty"));
    }
    if !validate_national_id(&details.national_id) {
        return Err(ValidationError::new(
            Field::NationalId,
            "malformed 18-character ID or checksum mismatch",
        ));
    }
    if !validate_phone(&details.phone) {
        return Err(ValidationError::new(
            Field::Phone,
            "expected an 11-digit mobile number starting with 13-19",
        ));
    }
    if !validate_amount(&details.amount) {
        return Err(ValidationError::new(
            Field::Amount,
            "expected a positive whole number of digits",
        ));
    }
    if !(MIN_AGE..=MAX_AGE).contains(&details.age) {
        return Err(ValidationError::new(
            Field::Age,
            format!("must be between {MIN_AGE} and {MAX_AGE}"),
        ));
    }
    if !rosters.has_staff(&details.staff_assignee) {
        return Err(ValidationError::new(Field::StaffAssignee, "not on the staff roster"));
    }
    if !rosters.has_department(&details.department) {
        return Err(ValidationError::new(Field::Department, "not a configured department"));
    }
    Ok(())
}
