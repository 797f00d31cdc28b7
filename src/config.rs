//! Runtime configuration from the environment.
//!
//! | variable | default |
//! |---|---|
//! | `INTAKE_DB_PATH` | `qianmei.db` |
//! | `INTAKE_STAFF_ROSTER` | `孙总,蔡医生` |
//! | `INTAKE_DEPARTMENTS` | `仟美医疗美容` |
//!
//! The field key is not part of this struct; see [`crate::adapters::secrets`].

use std::path::PathBuf;

use crate::domain::Rosters;

pub const DB_PATH_ENV: &str = "INTAKE_DB_PATH";
pub const STAFF_ROSTER_ENV: &str = "INTAKE_STAFF_ROSTER";
pub const DEPARTMENTS_ENV: &str = "INTAKE_DEPARTMENTS";

const DEFAULT_DB_PATH: &str = "qianmei.db";

/// Settings composed once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeConfig {
    /// SQLite database file.
    pub db_path: PathBuf,
    /// Staff and department choices accepted by the store.
    pub rosters: Rosters,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            rosters: Rosters::default(),
        }
    }
}

impl IntakeConfig {
    /// Read configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let db_path = lookup(DB_PATH_ENV)
            .filter(|p| !p.trim().is_empty())
            .map_or(defaults.db_path, |p| PathBuf::from(p.trim()));

        let staff = lookup(STAFF_ROSTER_ENV)
            .map(|v| split_list(&v))
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.rosters.staff);

        let departments = lookup(DEPARTMENTS_ENV)
            .map(|v| split_list(&v))
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.rosters.departments);

        Self {
            db_path,
            rosters: Rosters::new(staff, departments),
        }
    }
}

/// Split a comma-separated list, accepting ASCII and full-width commas.
fn split_list(value: &str) -> Vec<String> {
    value
        .split([',', '，'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
