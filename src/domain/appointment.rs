//! Appointment types for the clinic intake desk.

use chrono::{Duration, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Text format for appointment and submission timestamps (minute precision).
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Format with seconds, as written by SQLite's own `DATETIME` helpers.
const TIME_FORMAT_SECONDS: &str = "%Y-%m-%d %H:%M:%S";

/// Oldest accepted age, inclusive.
pub const MIN_AGE: u32 = 0;

/// Highest accepted age, inclusive.
pub const MAX_AGE: u32 = 150;

/// Client gender, persisted as its display label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[default]
    Female,
    Male,
    Other,
}

impl Gender {
    /// Label shown on forms and stored in the database.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Female => "女",
            Self::Male => "男",
            Self::Other => "其他",
        }
    }

    /// Parse a stored label back into a gender.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "女" => Some(Self::Female),
            "男" => Some(Self::Male),
            "其他" => Some(Self::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Returned when a gender label or name is not recognised.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Unknown gender '{0}': expected 女/男/其他 or female/male/other")]
pub struct UnknownGender(pub String);

impl std::str::FromStr for Gender {
    type Err = UnknownGender;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(gender) = Self::from_label(s) {
            return Ok(gender);
        }
        match s.to_lowercase().as_str() {
            "female" | "f" => Ok(Self::Female),
            "male" | "m" => Ok(Self::Male),
            "other" | "o" => Ok(Self::Other),
            _ => Err(UnknownGender(s.to_string())),
        }
    }
}

/// Staff and department choices offered at intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rosters {
    pub staff: Vec<String>,
    pub departments: Vec<String>,
}

impl Rosters {
    #[must_use]
    pub fn new(staff: Vec<String>, departments: Vec<String>) -> Self {
        Self { staff, departments }
    }

    #[must_use]
    pub fn has_staff(&self, name: &str) -> bool {
        self.staff.iter().any(|s| s == name)
    }

    #[must_use]
    pub fn has_department(&self, name: &str) -> bool {
        self.departments.iter().any(|d| d == name)
    }
}

impl Default for Rosters {
    fn default() -> Self {
        Self {
            staff: vec!["孙总".to_string(), "蔡医生".to_string()],
            departments: vec!["仟美医疗美容".to_string()],
        }
    }
}

/// The operator-editable part of an appointment.
///
/// Used as input to create and update, and embedded in every stored record.
/// `national_id` and `phone` are plaintext here; they only exist in this form
/// inside process memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentDetails {
    pub customer_name: String,
    pub gender: Gender,
    pub age: u32,
    pub national_id: String,
    pub phone: String,
    #[serde(with = "minute_format")]
    pub appointment_time: NaiveDateTime,
    pub service_description: String,
    pub staff_assignee: String,
    pub department: String,
    pub is_first_visit: bool,
    pub amount: String,
    pub notes: String,
}

impl AppointmentDetails {
    /// Clean up operator input the way the intake form does.
    ///
    /// Trims text fields, removes embedded spaces from the national ID and
    /// the amount, and truncates the appointment time to the minute.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.customer_name = self.customer_name.trim().to_string();
        self.national_id = self.national_id.replace(' ', "").trim().to_string();
        self.phone = self.phone.trim().to_string();
        self.amount = self.amount.replace(' ', "").trim().to_string();
        self.service_description = self.service_description.trim().to_string();
        self.notes = self.notes.trim().to_string();
        self.appointment_time = truncate_to_minute(self.appointment_time);
        self
    }

    /// Default appointment slot offered by the form: one hour from `now`.
    #[must_use]
    pub fn default_appointment_time(now: NaiveDateTime) -> NaiveDateTime {
        truncate_to_minute(now + Duration::hours(1))
    }
}

/// A persisted appointment with its store-assigned identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentRecord {
    /// Assigned by the store on creation, never changed.
    pub id: i64,

    #[serde(flatten)]
    pub details: AppointmentDetails,

    /// Set once at creation, never changed.
    #[serde(with = "minute_format")]
    pub submit_time: NaiveDateTime,
}

impl AppointmentRecord {
    /// Whether the appointment slot lies before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: NaiveDateTime) -> bool {
        self.details.appointment_time < now
    }

    /// Display label for the first-visit flag.
    #[must_use]
    pub fn first_visit_label(&self) -> &'static str {
        if self.details.is_first_visit {
            "是"
        } else {
            "否"
        }
    }
}

/// Drop seconds and sub-second precision.
#[must_use]
pub fn truncate_to_minute(time: NaiveDateTime) -> NaiveDateTime {
    time.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(time)
}

/// Render a timestamp in the stored text format.
#[must_use]
pub fn format_timestamp(time: &NaiveDateTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Parse a stored or operator-supplied timestamp.
///
/// Accepts `YYYY-MM-DD HH:MM` and `YYYY-MM-DD HH:MM:SS`; seconds are dropped.
///
/// # Errors
/// Returns the chrono parse error if neither format matches.
pub fn parse_timestamp(text: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, TIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, TIME_FORMAT_SECONDS))
        .map(truncate_to_minute)
}

mod minute_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        time: &NaiveDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<NaiveDateTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse_timestamp(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(text: &str) -> NaiveDateTime {
        parse_timestamp(text).expect("Valid timestamp")
    }

    #[test]
    fn test_gender_labels_roundtrip() {
        for gender in [Gender::Female, Gender::Male, Gender::Other] {
            assert_eq!(Gender::from_label(gender.label()), Some(gender));
        }
        assert_eq!(Gender::from_label("unknown"), None);
    }

    #[test]
    fn test_gender_from_str() {
        assert_eq!("男".parse::<Gender>().expect("Should parse"), Gender::Male);
        assert_eq!("Female".parse::<Gender>().expect("Should parse"), Gender::Female);
        assert_eq!(" o ".parse::<Gender>().expect("Should parse"), Gender::Other);
        assert!("x".parse::<Gender>().is_err());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(at("2026-03-01 09:30"), at("2026-03-01 09:30:45"));
        assert_eq!(format_timestamp(&at("2026-03-01 09:30")), "2026-03-01 09:30");
        assert!(parse_timestamp("2026/03/01").is_err());
    }

    #[test]
    fn test_default_appointment_time() {
        let now = at("2026-03-01 09:30:45");
        assert_eq!(AppointmentDetails::default_appointment_time(now), at("2026-03-01 10:30"));
    }

    #[test]
    fn test_rosters_default() {
        let rosters = Rosters::default();
        assert!(rosters.has_staff("孙总"));
        assert!(rosters.has_staff("蔡医生"));
        assert!(rosters.has_department("仟美医疗美容"));
        assert!(!rosters.has_staff("nobody"));
    }

    #[test]
    fn test_normalized_strips_spaces() {
        let details = AppointmentDetails {
            customer_name: "  李四 ".to_string(),
            gender: Gender::Female,
            age: 30,
            national_id: "110105 19491231 002X".to_string(),
            phone: " 13812345678 ".to_string(),
            appointment_time: at("2026-03-01 09:30:59"),
            service_description: String::new(),
            staff_assignee: "孙总".to_string(),
            department: "仟美医疗美容".to_string(),
            is_first_visit: false,
            amount: " 1 000 ".to_string(),
            notes: String::new(),
        }
        .normalized();

        assert_eq!(details.customer_name, "李四");
        assert_eq!(details.national_id, "11010519491231002X");
        assert_eq!(details.phone, "13812345678");
        assert_eq!(details.amount, "1000");
        assert_eq!(details.appointment_time, at("2026-03-01 09:30"));
    }
}
