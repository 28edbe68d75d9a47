//! Fixed-capacity byte strings used for keys and values
//!
//! Every key and value in the store fits in 255 bytes. Longer input is
//! truncated on construction rather than rejected, so the limit holds for
//! anything that reaches the store.

use std::fmt;

/// Maximum length in bytes of a key, a value, or any single protocol token
pub const MAX_FIELD_LEN: usize = 255;

/// Byte string capped at [`MAX_FIELD_LEN`] bytes
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoundedBytes(Vec<u8>);

impl BoundedBytes {
    /// Copy `bytes`, keeping at most the first [`MAX_FIELD_LEN`] bytes
    pub fn new(bytes: &[u8]) -> Self {
        let end = bytes.len().min(MAX_FIELD_LEN);
        Self(bytes[..end].to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&[u8]> for BoundedBytes {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

impl From<&str> for BoundedBytes {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}

impl From<String> for BoundedBytes {
    fn from(s: String) -> Self {
        let mut bytes = s.into_bytes();
        bytes.truncate(MAX_FIELD_LEN);
        Self(bytes)
    }
}

impl AsRef<[u8]> for BoundedBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for BoundedBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}
