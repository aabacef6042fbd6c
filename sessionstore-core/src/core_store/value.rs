/*
    ValueRecord - versioned, type-tagged payload held by a data store entry

    Responsibilities:
    `value.rs` defines the leaf data types of the data store:
    - StoreKey: the identifier an entry is stored under
    - TypeName: the declared type of a stored value, compared as a plain string
    - SerializedPayload: opaque bytes plus the uncompressed size declared by the
      serializer
    - ValueRecord: (type name, version, payload). The type name never changes
      for the lifetime of a key; version and payload change together on a write.

    The store never looks inside the payload. Type safety is enforced only by
    comparing type names.
*/

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Version assigned to a record when it is first added.
pub const INITIAL_VERSION: u32 = 1;

/// Identifier of an entry in a data store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreKey(String);

impl StoreKey {
    pub fn new(key: impl Into<String>) -> Self {
        StoreKey(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StoreKey {
    fn from(key: &str) -> Self {
        StoreKey(key.to_string())
    }
}

impl From<String> for StoreKey {
    fn from(key: String) -> Self {
        StoreKey(key)
    }
}

impl From<&StoreKey> for StoreKey {
    fn from(key: &StoreKey) -> Self {
        key.clone()
    }
}

impl Borrow<str> for StoreKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Declared type of a stored value, e.g. `Integer_uint8`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeName(String);

impl TypeName {
    pub fn new(name: impl Into<String>) -> Self {
        TypeName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        TypeName(name.to_string())
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serialized form of a value as produced by the serialization service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedPayload {
    /// Size of the value before any transport compression, in bytes
    pub uncompressed_size: u32,
    /// Encoded value bytes, compared byte-for-byte by compare-exchange
    pub bytes: Vec<u8>,
}

impl SerializedPayload {
    pub fn new(bytes: Vec<u8>) -> Self {
        let uncompressed_size = u32::try_from(bytes.len()).unwrap_or(u32::MAX);
        SerializedPayload { uncompressed_size, bytes }
    }

    pub fn empty() -> Self {
        SerializedPayload::default()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }
}

/// A versioned value held by a data store entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRecord {
    pub type_name: TypeName,
    pub version: u32,
    pub payload: SerializedPayload,
}

impl ValueRecord {
    pub fn new(type_name: TypeName, version: u32, payload: SerializedPayload) -> Self {
        ValueRecord { type_name, version, payload }
    }
}

/// Shared read-only view of a record. A view never changes after it was handed
/// out; writers substitute a new record instead.
pub type ValueRecordRef = Arc<ValueRecord>;
