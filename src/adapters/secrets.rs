//! Field key sourcing.
//!
//! The 16-byte field key is read once at startup and handed to the field
//! cipher. It is never compiled into the library.
//!
//! Precedence (highest first):
//! - `INTAKE_FIELD_KEY_FD` (read from an already-open FD, then close it)
//! - `INTAKE_FIELD_KEY_FILE` (read from a file path)
//! - `/run/secrets/intake_field_key` (Docker/Compose secret default)
//! - `INTAKE_FIELD_KEY` (debug builds only)
//!
//! The secret text is either exactly 16 bytes or base64 of 16 bytes.
use std::path::Path;
#[cfg(unix)]
use std::{fs, io::Read, os::unix::io::FromRawFd};

use base64::{engine::general_purpose::STANDARD, Engine};
use zeroize::Zeroizing;

use crate::domain::{FieldKey, KEY_LEN};

pub const FIELD_KEY_FD_ENV: &str = "INTAKE_FIELD_KEY_FD";
pub const FIELD_KEY_FILE_ENV: &str = "INTAKE_FIELD_KEY_FILE";
pub const FIELD_KEY_DOCKER_SECRET_PATH: &str = "/run/secrets/intake_field_key";

// Dev-only escape hatch for local runs and tests.
pub const FIELD_KEY_ENV_DEV: &str = "INTAKE_FIELD_KEY";

/// Error type for key sourcing.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Missing field key: set {FIELD_KEY_FD_ENV} or {FIELD_KEY_FILE_ENV}, or mount a secret")]
    Missing,

    #[error("Cannot read field key: {0}")]
    Read(#[from] std::io::Error),

    #[error("Field key must be {KEY_LEN} bytes or base64 of {KEY_LEN} bytes")]
    InvalidKey,
}

/// Load the field key from the first available secure source.
///
/// In release builds, environment variables are not accepted for secrets.
///
/// # Errors
/// Returns `SecretError::Missing` if no source is configured, or
/// `SecretError::InvalidKey` if the secret has the wrong shape.
pub fn load_field_key() -> Result<FieldKey, SecretError> {
    let secret = read_secret()?;
    let key = parse_field_key(&secret)?;
    tracing::info!("Loaded field key (fingerprint {})", key.fingerprint());
    Ok(key)
}

/// Interpret secret text as a field key.
///
/// Trailing newlines are ignored.
///
/// # Errors
/// Returns `SecretError::InvalidKey` unless the text is 16 raw bytes or
/// base64 of 16 bytes.
pub fn parse_field_key(secret: &str) -> Result<FieldKey, SecretError> {
    let secret = secret.trim_end_matches(['\n', '\r']);
    if secret.len() == KEY_LEN {
        return FieldKey::from_slice(secret.as_bytes()).map_err(|_| SecretError::InvalidKey);
    }

    let decoded = Zeroizing::new(
        STANDARD
            .decode(secret.trim())
            .map_err(|_| SecretError::InvalidKey)?,
    );
    FieldKey::from_slice(&decoded).map_err(|_| SecretError::InvalidKey)
}

fn non_empty(content: String) -> Result<Zeroizing<String>, SecretError> {
    let content = Zeroizing::new(content);
    let secret = content.trim_end_matches(['\n', '\r']);
    if secret.is_empty() {
        return Err(SecretError::Missing);
    }
    Ok(Zeroizing::new(secret.to_string()))
}

fn read_secret() -> Result<Zeroizing<String>, SecretError> {
    // 1) Read from an already-open FD
    #[cfg(unix)]
    if let Ok(fd_str) = std::env::var(FIELD_KEY_FD_ENV) {
        let fd: i32 = fd_str.trim().parse().map_err(|_| SecretError::Missing)?;
        if fd <= 2 {
            // Refuse stdio FDs.
            return Err(SecretError::Missing);
        }

        // SAFETY: We take ownership of the FD for one-time secret read and close it.
        let mut file = unsafe { fs::File::from_raw_fd(fd) };
        let mut buf = String::new();
        file.read_to_string(&mut buf)?;
        return non_empty(buf);
    }

    // 2) Read from an explicit file path
    if let Ok(path) = std::env::var(FIELD_KEY_FILE_ENV) {
        return non_empty(std::fs::read_to_string(path.trim())?);
    }

    // 3) Docker secrets default path
    if Path::new(FIELD_KEY_DOCKER_SECRET_PATH).exists() {
        return non_empty(std::fs::read_to_string(FIELD_KEY_DOCKER_SECRET_PATH)?);
    }

    // 4) Dev-only env var (refused in release builds)
    if cfg!(debug_assertions) {
        if let Ok(v) = std::env::var(FIELD_KEY_ENV_DEV) {
            return non_empty(v);
        }
    }

    Err(SecretError::Missing)
}
