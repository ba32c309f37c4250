// crates/upgrade-guard-core/src/core/hashing.rs
// ============================================================================
// Module: Upgrade Guard Content Hashing
// Description: SHA-256 digests over fetched bytes and canonical JSON.
// Purpose: Fingerprint source payloads, stored outcomes, and snapshot files.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Every evidence reference and snapshot file carries a digest so a later
//! reader can prove which bytes a verdict was computed from. Source payloads
//! and snapshot files are hashed over their bytes exactly as written; the
//! snapshot root and stored outcomes are hashed over RFC 8785 (JCS)
//! canonical JSON so field order never changes a digest.
//!
//! Digests serialize as `sha256:<hex>`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Label of the only digest algorithm in use.
pub const DIGEST_ALGORITHM: &str = "sha256";

/// Hex length of a SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// Lowercase hex alphabet.
const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when computing or reading digests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
    /// A persisted digest could not be read.
    #[error("malformed digest: {0}")]
    Malformed(String),
}

// ============================================================================
// SECTION: Digest
// ============================================================================

/// SHA-256 content digest.
///
/// # Invariants
/// - `hex` is exactly 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HashDigest {
    /// Lowercase hex digest.
    hex: String,
}

impl HashDigest {
    /// Digests raw bytes.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut hex = String::with_capacity(DIGEST_HEX_LEN);
        for byte in digest {
            hex.push(char::from(HEX_DIGITS[usize::from(byte >> 4)]));
            hex.push(char::from(HEX_DIGITS[usize::from(byte & 0x0f)]));
        }
        Self {
            hex,
        }
    }

    /// Digests the canonical JSON form of a value.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::Canonicalization`] when serialization fails.
    pub fn of_canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<Self, HashError> {
        Ok(Self::of_bytes(&canonical_json_bytes(value)?))
    }

    /// Reads a bare hex digest, as stored next to an algorithm column.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::Malformed`] unless `hex` is 64 hex characters.
    pub fn from_hex(hex: &str) -> Result<Self, HashError> {
        if hex.len() != DIGEST_HEX_LEN || !hex.bytes().all(|byte| byte.is_ascii_hexdigit()) {
            return Err(HashError::Malformed(format!("expected {DIGEST_HEX_LEN} hex characters")));
        }
        Ok(Self {
            hex: hex.to_ascii_lowercase(),
        })
    }

    /// Reads the `sha256:<hex>` form.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::Malformed`] for another algorithm or bad hex.
    pub fn parse(labeled: &str) -> Result<Self, HashError> {
        match labeled.split_once(':') {
            Some((DIGEST_ALGORITHM, hex)) => Self::from_hex(hex),
            Some((algorithm, _)) => Err(HashError::Malformed(format!("unsupported algorithm {algorithm}"))),
            None => Err(HashError::Malformed(format!("missing `{DIGEST_ALGORITHM}:` prefix"))),
        }
    }

    /// Returns the lowercase hex digest.
    #[must_use]
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Returns the first 12 hex characters, for display.
    #[must_use]
    pub fn short(&self) -> &str {
        self.hex.get(..12).unwrap_or(&self.hex)
    }

    /// Returns true when `bytes` hash to this digest.
    #[must_use]
    pub fn matches(&self, bytes: &[u8]) -> bool {
        Self::of_bytes(bytes) == *self
    }
}

impl fmt::Display for HashDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{DIGEST_ALGORITHM}:{}", self.hex)
    }
}

impl TryFrom<String> for HashDigest {
    type Error = HashError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<HashDigest> for String {
    fn from(digest: HashDigest) -> Self {
        digest.to_string()
    }
}

// ============================================================================
// SECTION: Canonical JSON
// ============================================================================

/// Returns RFC 8785 canonical JSON bytes for a value.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}
