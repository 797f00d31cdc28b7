//! Appointment store: validated, encrypted CRUD and search.
//!
//! Every write goes validator → codec → repository. Every read goes
//! repository → codec. Plaintext PII never reaches the repository.
//!
//! # Search
//!
//! Phone numbers are stored as ECB ciphertext, which preserves whole-value
//! equality but no substring relation. To keep "search by name or phone"
//! working, `search` decrypts every row and filters in memory. This gives up
//! database-side filtering; the desk holds a single clinic's bookings.

use chrono::NaiveDateTime;

use crate::adapters::StorageError;
use crate::domain::{
    truncate_to_minute, validation, AppointmentDetails, AppointmentRecord, CodecError,
    FieldCipher, RecordCodec, Rosters, StoredAppointment,
};
use crate::ports::AppointmentRepository;
use crate::IntakeError;

/// A stored row that could not be decoded.
#[derive(Debug, thiserror::Error)]
#[error("Appointment {id} could not be decoded: {source}")]
pub struct CorruptRow {
    pub id: i64,
    #[source]
    pub source: CodecError,
}

/// A decoded appointment as shown in listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedAppointment {
    pub record: AppointmentRecord,
    /// Appointment time has already passed.
    pub expired: bool,
}

/// One entry of a listing: a decoded appointment or the row that failed.
pub type ListedRow = Result<ListedAppointment, CorruptRow>;

/// Store for clinic appointments.
pub struct AppointmentStore<S>
where
    S: AppointmentRepository,
{
    storage: S,
    codec: RecordCodec,
    rosters: Rosters,
}

impl<S> AppointmentStore<S>
where
    S: AppointmentRepository,
    S::Error: Into<StorageError>,
{
    /// Create a store that owns its storage, cipher and rosters.
    pub fn new(storage: S, cipher: FieldCipher, rosters: Rosters) -> Self {
        tracing::debug!(
            "Appointment store ready (key fingerprint {})",
            cipher.key_fingerprint()
        );
        Self {
            storage,
            codec: RecordCodec::new(cipher),
            rosters,
        }
    }

    /// Staff and department choices accepted by this store.
    #[must_use]
    pub fn rosters(&self) -> &Rosters {
        &self.rosters
    }

    /// Give back the underlying storage (e.g. to close it).
    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Validate, encrypt and insert a new appointment.
    ///
    /// # Returns
    /// The id assigned by the store.
    ///
    /// # Errors
    /// Returns `IntakeError::Validation` (nothing written) or
    /// `IntakeError::Persistence`.
    pub fn create(&self, details: AppointmentDetails) -> Result<i64, IntakeError> {
        self.create_at(details, now())
    }

    /// Like [`AppointmentStore::create`], with an explicit submission time.
    ///
    /// # Errors
    /// Returns `IntakeError::Validation` (nothing written) or
    /// `IntakeError::Persistence`.
    pub fn create_at(
        &self,
        details: AppointmentDetails,
        submit_time: NaiveDateTime,
    ) -> Result<i64, IntakeError> {
        let pending = AppointmentRecord {
            id: 0,
            details: self.checked(details)?,
            submit_time: truncate_to_minute(submit_time),
        };
        let row = self.codec.encode_for_storage(&pending);

        let id = self
            .storage
            .insert(&row.details, &row.submit_time)
            .map_err(|e| IntakeError::Persistence(e.into()))?;

        tracing::info!("Created appointment {}", id);
        Ok(id)
    }

    /// Load and decrypt one appointment.
    ///
    /// # Errors
    /// Returns `IntakeError::NotFound`, `IntakeError::Decrypt` if the row is
    /// corrupt, or `IntakeError::Persistence`.
    pub fn get(&self, id: i64) -> Result<AppointmentRecord, IntakeError> {
        let row = self
            .storage
            .find(id)
            .map_err(|e| IntakeError::Persistence(e.into()))?
            .ok_or(IntakeError::NotFound(id))?;

        Ok(self.decode(row)?)
    }

    /// Validate and replace every mutable field of appointment `id`.
    ///
    /// `id` and `submit_time` are never changed.
    ///
    /// # Errors
    /// Returns `IntakeError::Validation` (nothing written),
    /// `IntakeError::NotFound`, or `IntakeError::Persistence`.
    pub fn update(&self, id: i64, details: AppointmentDetails) -> Result<(), IntakeError> {
        let details = self.checked(details)?;
        let stored = self.codec.encode_details(&details);

        let found = self
            .storage
            .update(id, &stored)
            .map_err(|e| IntakeError::Persistence(e.into()))?;
        if !found {
            return Err(IntakeError::NotFound(id));
        }

        tracing::info!("Updated appointment {}", id);
        Ok(())
    }

    /// Remove appointment `id`.
    ///
    /// # Errors
    /// Returns `IntakeError::NotFound` or `IntakeError::Persistence`.
    pub fn delete(&self, id: i64) -> Result<(), IntakeError> {
        let found = self
            .storage
            .delete(id)
            .map_err(|e| IntakeError::Persistence(e.into()))?;
        if !found {
            return Err(IntakeError::NotFound(id));
        }

        tracing::info!("Deleted appointment {}", id);
        Ok(())
    }

    /// All appointments, ordered by appointment time.
    ///
    /// # Errors
    /// Returns `IntakeError::Persistence` if rows cannot be read. Rows that
    /// fail to decode are returned as `Err` entries instead.
    pub fn list(&self) -> Result<Vec<ListedRow>, IntakeError> {
        self.list_at(now())
    }

    /// Like [`AppointmentStore::list`], flagging appointments before `now`.
    ///
    /// # Errors
    /// Returns `IntakeError::Persistence` if rows cannot be read.
    pub fn list_at(&self, now: NaiveDateTime) -> Result<Vec<ListedRow>, IntakeError> {
        let rows = self.load_rows()?;
        Ok(rows.into_iter().map(|row| self.listed(row, now)).collect())
    }

    /// Appointments whose customer name or phone contains `keyword`.
    ///
    /// A blank keyword lists everything. Corrupt rows are included as `Err`
    /// entries when their (plaintext) name matches.
    ///
    /// # Errors
    /// Returns `IntakeError::Persistence` if rows cannot be read.
    pub fn search(&self, keyword: &str) -> Result<Vec<ListedRow>, IntakeError> {
        self.search_at(keyword, now())
    }

    /// Like [`AppointmentStore::search`], flagging appointments before `now`.
    ///
    /// # Errors
    /// Returns `IntakeError::Persistence` if rows cannot be read.
    pub fn search_at(
        &self,
        keyword: &str,
        now: NaiveDateTime,
    ) -> Result<Vec<ListedRow>, IntakeError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return self.list_at(now);
        }

        let rows = self.load_rows()?;
        let matches: Vec<ListedRow> = rows
            .into_iter()
            .filter_map(|row| {
                let name_matches = row.details.customer_name.contains(keyword);
                match self.listed(row, now) {
                    Ok(listed) => (name_matches || listed.record.details.phone.contains(keyword))
                        .then_some(Ok(listed)),
                    Err(corrupt) => name_matches.then_some(Err(corrupt)),
                }
            })
            .collect();

        tracing::debug!("Search matched {} appointments", matches.len());
        Ok(matches)
    }

    /// Number of stored appointments.
    ///
    /// # Errors
    /// Returns `IntakeError::Persistence`.
    pub fn count(&self) -> Result<usize, IntakeError> {
        self.storage
            .count()
            .map_err(|e| IntakeError::Persistence(e.into()))
    }

    fn checked(&self, details: AppointmentDetails) -> Result<AppointmentDetails, IntakeError> {
        let details = details.normalized();
        if let Err(e) = validation::validate_details(&details, &self.rosters) {
            tracing::warn!("Rejected appointment input: {}", e);
            return Err(e.into());
        }
        Ok(details)
    }

    fn load_rows(&self) -> Result<Vec<StoredAppointment>, IntakeError> {
        self.storage
            .load_all()
            .map_err(|e| IntakeError::Persistence(e.into()))
    }

    fn decode(&self, row: StoredAppointment) -> Result<AppointmentRecord, CorruptRow> {
        let id = row.id;
        self.codec.decode_from_storage(row).map_err(|source| {
            tracing::warn!("Appointment {} could not be decoded: {}", id, source);
            CorruptRow { id, source }
        })
    }

    fn listed(&self, row: StoredAppointment, now: NaiveDateTime) -> ListedRow {
        let record = self.decode(row)?;
        let expired = record.is_expired_at(now);
        Ok(ListedAppointment { record, expired })
    }
}

fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::SqliteStorage;
    use crate::domain::{parse_timestamp, Field, FieldKey, Gender};

    fn at(text: &str) -> NaiveDateTime {
        parse_timestamp(text).expect("Valid timestamp")
    }

    fn create_test_store() -> AppointmentStore<SqliteStorage> {
        let storage = SqliteStorage::in_memory().expect("Should create db");
        let cipher = FieldCipher::new(FieldKey::from_bytes(*b"test-field-key-1"));
        AppointmentStore::new(storage, cipher, Rosters::default())
    }

    fn details(name: &str, phone: &str, time: &str) -> AppointmentDetails {
        AppointmentDetails {
            customer_name: name.to_string(),
            gender: Gender::Female,
            age: 32,
            national_id: "11010519491231002X".to_string(),
            phone: phone.to_string(),
            appointment_time: at(time),
            service_description: "skin consultation".to_string(),
            staff_assignee: "孙总".to_string(),
            department: "仟美医疗美容".to_string(),
            is_first_visit: true,
            amount: "1500".to_string(),
            notes: "prefers mornings".to_string(),
        }
    }

    fn names(rows: &[ListedRow]) -> Vec<String> {
        rows.iter()
            .map(|r| r.as_ref().expect("Should decode").record.details.customer_name.clone())
            .collect()
    }

    #[test]
    fn test_create_then_get_returns_plaintext() {
        let store = create_test_store();
        let input = details("张三", "13812345678", "2026-06-01 10:00");

        let id = store.create_at(input.clone(), at("2026-05-20 09:15:30")).expect("Should create");
        let record = store.get(id).expect("Should load");

        assert_eq!(record.id, id);
        assert_eq!(record.details, input);
        assert_eq!(record.submit_time, at("2026-05-20 09:15"));
        assert_eq!(record.first_visit_label(), "是");
    }

    #[test]
    fn test_pii_is_encrypted_at_rest() {
        let store = create_test_store();
        let id = store
            .create(details("张三", "13812345678", "2026-06-01 10:00"))
            .expect("Should create");

        let row = store.storage.find(id).expect("Should query").expect("Should exist");
        assert_ne!(row.details.phone, "13812345678");
        assert_ne!(row.details.national_id, "11010519491231002X");
        assert!(!row.details.phone.contains("1381234"));
        assert_eq!(row.details.phone, store.codec.cipher().encrypt("13812345678"));
    }

    #[test]
    fn test_stored_row_matches_record_encoding() {
        let store = create_test_store();
        let id = store
            .create_at(
                details("张三", "13812345678", "2026-06-01 10:00"),
                at("2026-05-20 09:15:45"),
            )
            .expect("Should create");

        let row = store.storage.find(id).expect("Should query").expect("Should exist");
        let record = store.get(id).expect("Should load");
        assert_eq!(row.submit_time, "2026-05-20 09:15");
        assert_eq!(row, store.codec.encode_for_storage(&record));
    }

    #[test]
    fn test_invalid_national_id_is_rejected_without_write() {
        let store = create_test_store();
        store
            .create(details("A", "13812345678", "2026-06-01 10:00"))
            .expect("Should create");
        let before = store.list().expect("Should list").len();

        let mut bad = details("B", "13812345678", "2026-06-01 11:00");
        bad.national_id = "110105194912310021".to_string();
        let err = store.create(bad).expect_err("Should reject");

        assert!(matches!(
            err,
            IntakeError::Validation(ref v) if v.field == Field::NationalId
        ));
        assert_eq!(store.list().expect("Should list").len(), before);
        assert_eq!(store.count().expect("Should count"), before);
    }

    #[test]
    fn test_create_normalizes_input() {
        let store = create_test_store();
        let mut input = details(" 张三 ", " 13812345678 ", "2026-06-01 10:00");
        input.national_id = "110105 1949 1231 002x".to_string();

        let id = store.create(input).expect("Should create");
        let record = store.get(id).expect("Should load");
        assert_eq!(record.details.customer_name, "张三");
        assert_eq!(record.details.phone, "13812345678");
        assert_eq!(record.details.national_id, "11010519491231002x");
    }

    #[test]
    fn test_update_replaces_fields_but_keeps_identity() {
        let store = create_test_store();
        let id = store
            .create_at(details("A", "13812345678", "2026-06-01 10:00"), at("2026-05-01 08:00"))
            .expect("Should create");

        let mut changed = details("A2", "15900001111", "2026-06-02 16:30");
        changed.gender = Gender::Male;
        changed.national_id = "440304199001011233".to_string();
        changed.staff_assignee = "蔡医生".to_string();
        changed.is_first_visit = false;
        changed.amount = "200".to_string();
        changed.notes = String::new();
        store.update(id, changed.clone()).expect("Should update");

        let record = store.get(id).expect("Should load");
        assert_eq!(record.id, id);
        assert_eq!(record.details, changed);
        assert_eq!(record.submit_time, at("2026-05-01 08:00"));
        assert_eq!(record.first_visit_label(), "否");
    }

    #[test]
    fn test_update_missing_id_is_not_found() {
        let store = create_test_store();
        store
            .create(details("A", "13812345678", "2026-06-01 10:00"))
            .expect("Should create");

        let err = store
            .update(999, details("B", "13812345678", "2026-06-01 10:00"))
            .expect_err("Should fail");
        assert!(matches!(err, IntakeError::NotFound(999)));
        assert_eq!(names(&store.list().expect("Should list")), ["A"]);
    }

    #[test]
    fn test_update_with_invalid_phone_leaves_row_unchanged() {
        let store = create_test_store();
        let original = details("A", "13812345678", "2026-06-01 10:00");
        let id = store.create(original.clone()).expect("Should create");

        let err = store
            .update(id, details("A", "1381234567", "2026-06-01 10:00"))
            .expect_err("Should reject");
        assert!(matches!(err, IntakeError::Validation(ref v) if v.field == Field::Phone));
        assert_eq!(store.get(id).expect("Should load").details, original);
    }

    #[test]
    fn test_delete() {
        let store = create_test_store();
        let keep = store
            .create(details("keep", "13812345678", "2026-06-01 10:00"))
            .expect("Should create");
        let gone = store
            .create(details("gone", "13812345679", "2026-06-01 11:00"))
            .expect("Should create");

        store.delete(gone).expect("Should delete");
        assert!(matches!(store.get(gone), Err(IntakeError::NotFound(id)) if id == gone));
        assert_eq!(names(&store.list().expect("Should list")), ["keep"]);
        assert!(store.get(keep).is_ok());

        assert!(matches!(store.delete(gone), Err(IntakeError::NotFound(_))));
    }

    #[test]
    fn test_list_orders_and_flags_expired() {
        let store = create_test_store();
        store.create(details("later", "13812345678", "2026-06-03 10:00")).expect("Should create");
        store.create(details("past", "13812345678", "2026-06-01 10:00")).expect("Should create");
        store.create(details("soon", "13812345678", "2026-06-02 10:00")).expect("Should create");

        let rows = store.list_at(at("2026-06-02 00:00")).expect("Should list");
        assert_eq!(names(&rows), ["past", "soon", "later"]);

        let expired: Vec<bool> = rows
            .iter()
            .map(|r| r.as_ref().expect("Should decode").expired)
            .collect();
        assert_eq!(expired, [true, false, false]);
    }

    #[test]
    fn test_search_by_name_and_phone_substring() {
        let store = create_test_store();
        store
            .create(details("王小明", "13812345678", "2026-06-01 10:00"))
            .expect("Should create");
        store.create(details("李华", "15987654321", "2026-06-02 10:00")).expect("Should create");
        store.create(details("王芳", "17700001111", "2026-06-03 10:00")).expect("Should create");

        assert_eq!(names(&store.search("王").expect("Should search")), ["王小明", "王芳"]);
        assert_eq!(names(&store.search("8765").expect("Should search")), ["李华"]);
        assert_eq!(names(&store.search("17700001111").expect("Should search")), ["王芳"]);
        assert!(store.search("nobody").expect("Should search").is_empty());
        assert_eq!(store.search("  ").expect("Should search").len(), 3);
    }

    #[test]
    fn test_corrupt_row_does_not_abort_listing() {
        let store = create_test_store();
        let good = store
            .create(details("good", "13812345678", "2026-06-01 10:00"))
            .expect("Should create");
        let bad = store
            .create(details("bad", "13812345679", "2026-06-02 10:00"))
            .expect("Should create");

        let mut row = store.storage.find(bad).expect("Should query").expect("Should exist");
        row.details.phone = "not-ciphertext".to_string();
        store.storage.update(bad, &row.details).expect("Should corrupt");

        let rows = store.list().expect("Should list");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].as_ref().expect("Should decode").record.id, good);
        let corrupt = rows[1].as_ref().expect_err("Should be corrupt");
        assert_eq!(corrupt.id, bad);

        assert!(matches!(store.get(bad), Err(IntakeError::Decrypt(ref c)) if c.id == bad));

        let found = store.search("bad").expect("Should search");
        assert_eq!(found.len(), 1);
        assert!(found[0].is_err());
    }

    #[test]
    fn test_rejects_unknown_staff() {
        let store = create_test_store();
        let mut input = details("A", "13812345678", "2026-06-01 10:00");
        input.staff_assignee = "stranger".to_string();
        let err = store.create(input).expect_err("Should reject");
        assert!(matches!(err, IntakeError::Validation(ref v) if v.field == Field::StaffAssignee));
        assert_eq!(store.count().expect("Should count"), 0);
    }
}
