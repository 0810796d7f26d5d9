//! Record identifier.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a record.
///
/// Record ids are 128-bit values that are:
/// - Minted on the client at creation time
/// - Immutable once assigned
/// - The primary key both locally and remotely
///
/// On the wire they travel as 32-character lowercase hex strings.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId([u8; 16]);

impl RecordId {
    /// Creates a record id from raw bytes.
    #[inline]
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Mints a new random record id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().into_bytes())
    }

    /// Returns the raw bytes.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Returns the hex encoding used on the wire and in object keys.
    #[must_use]
    pub fn as_hex(&self) -> String {
        Uuid::from_bytes(self.0).simple().to_string()
    }

    /// Parses a hex-encoded id.
    ///
    /// Accepts both the bare 32-character form and the hyphenated UUID form.
    /// Returns `None` if the input is neither.
    #[must_use]
    pub fn from_hex(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(|u| Self(u.into_bytes()))
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.as_hex())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_hex())
    }
}

impl From<[u8; 16]> for RecordId {
    fn from(bytes: [u8; 16]) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<RecordId> for [u8; 16] {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_hex())
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid record id: {s}")))
    }
}
