//! Assertions over data store results

use std::fmt::Debug;

use crate::core_store::ResultCode;
use crate::core_types::DataStoreResult;

/// Assert the code of a result and return its value, if any
pub fn assert_code<T: Debug>(result: DataStoreResult<T>, expected: ResultCode) -> Option<T> {
    assert_eq!(result.code(), expected, "unexpected result: {:?}", result);
    result.into_value()
}

/// Assert that a result carries `expected` with the given code
pub fn assert_value<T: Debug + PartialEq>(
    result: DataStoreResult<T>,
    code: ResultCode,
    expected: &T,
) {
    let value = assert_code(result, code);
    assert_eq!(value.as_ref(), Some(expected));
}
