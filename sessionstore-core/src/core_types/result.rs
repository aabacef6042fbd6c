//! Typed view of a store outcome.

use tracing::error;

use crate::core_store::{ResultCode, StoreKey, StoreResult, ValueRecord};

use super::serializer::decode_record;
use super::wrapped::DataStoreType;

/// Outcome of a typed data store operation.
///
/// Holds a value only for `Added`, `Fetched` and `Exchanged`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataStoreResult<T> {
    code: ResultCode,
    value: Option<T>,
    version: Option<u32>,
}

impl<T> DataStoreResult<T> {
    pub fn new(code: ResultCode, value: T, version: Option<u32>) -> Self {
        DataStoreResult { code, value: Some(value), version }
    }

    /// Result without a value, e.g. `NotFound` or `TypeMismatch`.
    pub fn from_code(code: ResultCode) -> Self {
        DataStoreResult { code, value: None, version: None }
    }

    pub fn unexpected_error() -> Self {
        Self::from_code(ResultCode::UnexpectedError)
    }

    pub fn code(&self) -> ResultCode {
        self.code
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Option<T> {
        self.value
    }

    /// Version of the record the value was read from or written to, when known.
    pub fn version(&self) -> Option<u32> {
        self.version
    }

    /// True when the result holds a value.
    pub fn is_ok(&self) -> bool {
        self.value.is_some()
    }
}

impl<T> Default for DataStoreResult<T> {
    fn default() -> Self {
        Self::unexpected_error()
    }
}

impl<T: DataStoreType> DataStoreResult<T> {
    /// Decode an untyped store result.
    ///
    /// A record that cannot be decoded as `T` yields `UnexpectedError`.
    pub fn from_store_result(key: &StoreKey, result: &StoreResult) -> Self {
        match &result.value {
            Some(record) if result.code.has_value() => Self::from_record(key, result.code, record),
            _ => Self::from_code(result.code),
        }
    }

    pub(crate) fn from_record(key: &StoreKey, code: ResultCode, record: &ValueRecord) -> Self {
        match decode_record::<T>(record) {
            Ok(value) => DataStoreResult::new(code, value, Some(record.version)),
            Err(e) => {
                error!(%key, type_name = %record.type_name, "Failed to decode stored value: {}", e);
                Self::unexpected_error()
            }
        }
    }
}
