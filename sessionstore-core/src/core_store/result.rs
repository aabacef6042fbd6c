//! Outcome taxonomy shared by the store, the protocol and the client.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::value::ValueRecordRef;

/// Outcome of a data store operation.
///
/// These are routine results, not errors. `UnexpectedError` is the default and
/// is also what a caller observes when a request times out or a response
/// cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ResultCode {
    /// The key did not exist and was created
    Added,
    /// The key existed and its current value is returned
    Fetched,
    /// The value was replaced by the desired value
    Exchanged,
    /// The key does not exist
    NotFound,
    /// The key exists but holds a different type
    TypeMismatch,
    /// Infrastructure failure (timeout, malformed message)
    #[default]
    UnexpectedError,
}

impl ResultCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultCode::Added => "added",
            ResultCode::Fetched => "fetched",
            ResultCode::Exchanged => "exchanged",
            ResultCode::NotFound => "not_found",
            ResultCode::TypeMismatch => "type_mismatch",
            ResultCode::UnexpectedError => "unexpected_error",
        }
    }

    /// True for the codes that carry a value back to the caller.
    pub fn has_value(&self) -> bool {
        matches!(self, ResultCode::Added | ResultCode::Fetched | ResultCode::Exchanged)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Untyped result of a store operation.
#[derive(Debug, Clone, Default)]
pub struct StoreResult {
    pub code: ResultCode,
    pub value: Option<ValueRecordRef>,
}

impl StoreResult {
    pub fn new(code: ResultCode, value: Option<ValueRecordRef>) -> Self {
        StoreResult { code, value }
    }

    pub fn with_value(code: ResultCode, value: ValueRecordRef) -> Self {
        StoreResult { code, value: Some(value) }
    }

    pub fn code_only(code: ResultCode) -> Self {
        StoreResult { code, value: None }
    }

    pub fn version(&self) -> Option<u32> {
        self.value.as_ref().map(|record| record.version)
    }
}
