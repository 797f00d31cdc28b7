//! Field-level encryption for PII columns.
//!
//! Wraps AES-128 in electronic-codebook (ECB) mode with PKCS#7 padding and
//! standard base64 transport encoding.
//!
//! # Known weakness
//!
//! ECB has no IV and no chaining: the same plaintext always produces the same
//! ciphertext under a given key. This leaks equality of stored values and
//! offers no semantic security. It is kept deliberately because previously
//! persisted rows were written this way and must stay decodable. Moving to an
//! authenticated mode requires a separate, versioned re-encryption of every
//! row, not a silent change here.
//!
//! # Memory Security
//!
//! `FieldKey` implements `Zeroize` and `ZeroizeOnDrop`, and its `Debug`
//! output carries only a fingerprint.

use aes::Aes128;
use base64::{engine::general_purpose::STANDARD, Engine};
use ecb::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyInit};
use zeroize::{Zeroize, ZeroizeOnDrop};

type Aes128EcbEnc = ecb::Encryptor<Aes128>;
type Aes128EcbDec = ecb::Decryptor<Aes128>;

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Length of a field key in bytes (AES-128).
pub const KEY_LEN: usize = 16;

/// Error type for field encryption operations.
///
/// Variants never carry plaintext or key bytes.
#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("Invalid key length: expected {KEY_LEN} bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("Ciphertext is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Ciphertext length {0} is not a multiple of the {BLOCK_SIZE}-byte block size")]
    BlockLength(usize),

    #[error("Malformed padding: wrong key or corrupted data")]
    Padding,

    #[error("Decrypted field is not valid UTF-8")]
    Utf8,
}

/// Symmetric key shared by every field cipher operation.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct FieldKey {
    bytes: [u8; KEY_LEN],
}

impl FieldKey {
    /// Create a key from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Create a key from a byte slice.
    ///
    /// # Errors
    /// Returns `CipherError::InvalidKeyLength` unless the slice is exactly 16 bytes.
    pub fn from_slice(slice: &[u8]) -> Result<Self, CipherError> {
        let bytes: [u8; KEY_LEN] = slice
            .try_into()
            .map_err(|_| CipherError::InvalidKeyLength(slice.len()))?;
        Ok(Self { bytes })
    }

    /// Fingerprint for identifying a key in logs (first 8 bytes of SHA-256, hex).
    #[must_use]
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};

        let digest = Sha256::digest(self.bytes);
        digest[..8].iter().map(|b| format!("{b:02x}")).collect()
    }

    fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl std::fmt::Debug for FieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldKey")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Deterministic, keyed, reversible transform of a text field.
#[derive(Debug, Clone)]
pub struct FieldCipher {
    key: FieldKey,
}

impl FieldCipher {
    /// Create a cipher that owns `key` for its whole lifetime.
    #[must_use]
    pub fn new(key: FieldKey) -> Self {
        Self { key }
    }

    /// Fingerprint of the key in use.
    #[must_use]
    pub fn key_fingerprint(&self) -> String {
        self.key.fingerprint()
    }

    /// Encrypt `plaintext` and return the base64-encoded ciphertext.
    ///
    /// Equal plaintexts yield equal ciphertexts.
    #[must_use]
    pub fn encrypt(&self, plaintext: &str) -> String {
        let ciphertext = Aes128EcbEnc::new(self.key.as_bytes().into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
        STANDARD.encode(ciphertext)
    }

    /// Decode and decrypt a value produced by [`FieldCipher::encrypt`].
    ///
    /// # Errors
    /// Returns `CipherError` if the input is not base64, is not a whole number
    /// of blocks, has malformed padding, or does not decrypt to UTF-8.
    pub fn decrypt(&self, ciphertext_b64: &str) -> Result<String, CipherError> {
        let ciphertext = STANDARD.decode(ciphertext_b64.trim())?;
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(CipherError::BlockLength(ciphertext.len()));
        }

        let plaintext = Aes128EcbDec::new(self.key.as_bytes().into())
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| CipherError::Padding)?;

        // Moves the buffer; no plaintext copy is left behind.
        String::from_utf8(plaintext).map_err(|e| {
            e.into_bytes().zeroize();
            CipherError::Utf8
        })
    }
}
