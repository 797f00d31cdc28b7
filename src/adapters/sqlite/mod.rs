//! SQLite adapter: Implementation of `AppointmentRepository`.
//!
//! Provides local persistence for appointment rows in a single database file.
//!
//! # Schema compatibility
//!
//! Column names follow databases written by the earlier intake desktop tool
//! (`id_number`, `service_type`, `design_director`, `is_first_time`), so
//! existing files open without migration. `id_number` and `phone` only ever
//! hold ciphertext.
//!
//! # Connection lifetime
//!
//! One connection is opened in `new`/`in_memory` and held for the life of
//! the adapter. It is released on drop, or explicitly through [`SqliteStorage::close`].
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::domain::{StoredAppointment, StoredDetails};
use crate::ports::AppointmentRepository;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Row count {0} out of range")]
    Count(i64),
}

const SELECT_COLUMNS: &str = r"
    SELECT id, customer_name, gender, age, id_number, phone, appointment_time,
           service_type, design_director, department, is_first_time, amount,
           notes, submit_time
    FROM appointments
";

/// SQLite storage adapter.
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Open (or create) the database at `path`.
    ///
    /// # Errors
    /// Returns error if database cannot be opened or initialized.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let storage = Self { conn };
        storage.init_schema()?;
        Ok(storage)
    }

    /// Create an in-memory SQLite database (for testing).
    ///
    /// # Errors
    /// Returns error if database cannot be created.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let storage = Self { conn };
        storage.init_schema()?;
        Ok(storage)
    }

    /// Close the connection, surfacing any error SQLite reports.
    ///
    /// # Errors
    /// Returns error if SQLite refuses to close the connection.
    pub fn close(self) -> Result<(), StorageError> {
        self.conn.close().map_err(|(_, e)| StorageError::Database(e))?;
        tracing::debug!("Closed appointment database");
        Ok(())
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS appointments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                customer_name TEXT NOT NULL,
                gender TEXT NOT NULL,
                age INTEGER NOT NULL,
                id_number TEXT NOT NULL,
                phone TEXT NOT NULL,
                appointment_time DATETIME NOT NULL,
                service_type TEXT NOT NULL,
                design_director TEXT NOT NULL,
                department TEXT NOT NULL,
                is_first_time INTEGER NOT NULL,
                amount TEXT NOT NULL,
                notes TEXT,
                submit_time DATETIME NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_appointments_time
                ON appointments(appointment_time);

            CREATE INDEX IF NOT EXISTS idx_appointments_name
                ON appointments(customer_name);
            ",
        )?;

        Ok(())
    }

    fn row_to_stored(row: &Row<'_>) -> rusqlite::Result<StoredAppointment> {
        let notes: Option<String> = row.get(12)?;
        Ok(StoredAppointment {
            id: row.get(0)?,
            details: StoredDetails {
                customer_name: row.get(1)?,
                gender: row.get(2)?,
                age: row.get(3)?,
                national_id: row.get(4)?,
                phone: row.get(5)?,
                appointment_time: row.get(6)?,
                service_description: row.get(7)?,
                staff_assignee: row.get(8)?,
                department: row.get(9)?,
                is_first_visit: row.get(10)?,
                amount: row.get(11)?,
                notes: notes.unwrap_or_default(),
            },
            submit_time: row.get(13)?,
        })
    }
}

impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl AppointmentRepository for SqliteStorage {
    type Error = StorageError;

    fn insert(&self, details: &StoredDetails, submit_time: &str) -> Result<i64, Self::Error> {
        self.conn.execute(
            r"
            INSERT INTO appointments (
                customer_name, gender, age, id_number, phone,
                appointment_time, service_type, design_director, department,
                is_first_time, amount, notes, submit_time
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ",
            params![
                details.customer_name,
                details.gender,
                details.age,
                details.national_id,
                details.phone,
                details.appointment_time,
                details.service_description,
                details.staff_assignee,
                details.department,
                details.is_first_visit,
                details.amount,
                details.notes,
                submit_time,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        tracing::debug!("Inserted appointment row {}", id);
        Ok(id)
    }

    fn update(&self, id: i64, details: &StoredDetails) -> Result<bool, Self::Error> {
        let changed = self.conn.execute(
            r"
            UPDATE appointments SET
                customer_name = ?1, gender = ?2, age = ?3, id_number = ?4,
                phone = ?5, appointment_time = ?6, service_type = ?7,
                design_director = ?8, department = ?9, is_first_time = ?10,
                amount = ?11, notes = ?12
            WHERE id = ?13
            ",
            params![
                details.customer_name,
                details.gender,
                details.age,
                details.national_id,
                details.phone,
                details.appointment_time,
                details.service_description,
                details.staff_assignee,
                details.department,
                details.is_first_visit,
                details.amount,
                details.notes,
                id,
            ],
        )?;

        Ok(changed > 0)
    }

    fn delete(&self, id: i64) -> Result<bool, Self::Error> {
        let changed = self
            .conn
            .execute("DELETE FROM appointments WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    fn find(&self, id: i64) -> Result<Option<StoredAppointment>, Self::Error> {
        let mut stmt = self.conn.prepare(&format!("{SELECT_COLUMNS} WHERE id = ?1"))?;
        let row = stmt
            .query_row(params![id], Self::row_to_stored)
            .optional()?;
        Ok(row)
    }

    fn load_all(&self) -> Result<Vec<StoredAppointment>, Self::Error> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_COLUMNS} ORDER BY appointment_time, id"))?;

        let rows = stmt
            .query_map([], Self::row_to_stored)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn count(&self) -> Result<usize, Self::Error> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM appointments", [], |row| row.get(0))?;

        usize::try_from(count).map_err(|_| StorageError::Count(count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(name: &str, time: &str) -> StoredDetails {
        StoredDetails {
            customer_name: name.to_string(),
            gender: "女".to_string(),
            age: 33,
            national_id: "Y2lwaGVydGV4dC1pZA==".to_string(),
            phone: "Y2lwaGVydGV4dC1waG9uZQ==".to_string(),
            appointment_time: time.to_string(),
            service_description: "consultation".to_string(),
            staff_assignee: "孙总".to_string(),
            department: "仟美医疗美容".to_string(),
            is_first_visit: 0,
            amount: "500".to_string(),
            notes: String::new(),
        }
    }

    #[test]
    fn test_appointment_crud() {
        let storage = SqliteStorage::in_memory().expect("Should create db");
        assert_eq!(storage.count().expect("Should count"), 0);

        let id = storage
            .insert(&stored("A", "2026-01-02 09:00"), "2026-01-01 08:00")
            .expect("Should insert");
        assert_eq!(storage.count().expect("Should count"), 1);

        let row = storage.find(id).expect("Should query").expect("Should exist");
        assert_eq!(row.details, stored("A", "2026-01-02 09:00"));
        assert_eq!(row.submit_time, "2026-01-01 08:00");

        let mut changed = stored("B", "2026-01-03 10:00");
        changed.is_first_visit = 1;
        assert!(storage.update(id, &changed).expect("Should update"));
        let row = storage.find(id).expect("Should query").expect("Should exist");
        assert_eq!(row.details, changed);
        assert_eq!(row.submit_time, "2026-01-01 08:00");

        assert!(storage.delete(id).expect("Should delete"));
        assert!(storage.find(id).expect("Should query").is_none());
        assert_eq!(storage.count().expect("Should count"), 0);
    }

    #[test]
    fn test_missing_rows_report_false() {
        let storage = SqliteStorage::in_memory().expect("Should create db");
        assert!(!storage.update(42, &stored("A", "2026-01-02 09:00")).expect("Should run"));
        assert!(!storage.delete(42).expect("Should run"));
        assert!(storage.find(42).expect("Should run").is_none());
    }

    #[test]
    fn test_load_all_orders_by_appointment_time() {
        let storage = SqliteStorage::in_memory().expect("Should create db");
        storage
            .insert(&stored("late", "2026-02-01 09:00"), "2026-01-01 08:00")
            .expect("Should insert");
        storage
            .insert(&stored("early", "2026-01-05 09:00"), "2026-01-01 08:00")
            .expect("Should insert");
        storage
            .insert(&stored("middle", "2026-01-20 09:00"), "2026-01-01 08:00")
            .expect("Should insert");

        let names: Vec<String> = storage
            .load_all()
            .expect("Should load")
            .into_iter()
            .map(|r| r.details.customer_name)
            .collect();
        assert_eq!(names, ["early", "middle", "late"]);
    }

    #[test]
    fn test_null_notes_read_as_empty() {
        let storage = SqliteStorage::in_memory().expect("Should create db");
        let id = storage
            .insert(&stored("A", "2026-01-02 09:00"), "2026-01-01 08:00")
            .expect("Should insert");
        storage
            .conn
            .execute("UPDATE appointments SET notes = NULL WHERE id = ?1", params![id])
            .expect("Should null notes");
        let row = storage.find(id).expect("Should query").expect("Should exist");
        assert_eq!(row.details.notes, "");
    }

    #[test]
    fn test_ids_are_not_reused() {
        let storage = SqliteStorage::in_memory().expect("Should create db");
        let first = storage
            .insert(&stored("A", "2026-01-02 09:00"), "2026-01-01 08:00")
            .expect("Should insert");
        storage.delete(first).expect("Should delete");
        let second = storage
            .insert(&stored("B", "2026-01-02 09:00"), "2026-01-01 08:00")
            .expect("Should insert");
        assert!(second > first);
    }
}
