//! Typed data store for use within one process, without a session.

use parking_lot::Mutex;
use tracing::error;

use crate::core_store::{DataStore, ResultCode, StoreKey, StoreResult, UpdatePolicy};
use crate::core_types::{encode_value, CodecError, DataStoreResult, DataStoreType};

/// Thread safe typed store with the same result semantics as a session
/// client, answered synchronously.
#[derive(Debug, Default)]
pub struct LocalDataStore {
    store: Mutex<DataStore>,
}

impl LocalDataStore {
    pub fn new() -> Self {
        Self::with_policy(UpdatePolicy::Overwrite)
    }

    pub fn with_policy(policy: UpdatePolicy) -> Self {
        LocalDataStore { store: Mutex::new(DataStore::with_policy(policy)) }
    }

    pub fn fetch_or_add<T: DataStoreType>(
        &self,
        key: impl Into<StoreKey>,
        value: &T,
    ) -> DataStoreResult<T> {
        let key = key.into();
        let result = match encode_value(value) {
            Ok(payload) => self.store.lock().fetch_or_add(&key, &T::type_name(), &payload),
            Err(e) => Self::encode_failed(&key, e),
        };
        DataStoreResult::from_store_result(&key, &result)
    }

    pub fn fetch_as<T: DataStoreType>(&self, key: impl Into<StoreKey>) -> DataStoreResult<T> {
        let key = key.into();
        let result = self.store.lock().fetch(&key, &T::type_name());
        DataStoreResult::from_store_result(&key, &result)
    }

    /// Unconditionally set `key` to `value`, creating it if needed.
    pub fn store<T: DataStoreType>(
        &self,
        key: impl Into<StoreKey>,
        value: &T,
    ) -> DataStoreResult<T> {
        let key = key.into();
        let result = match encode_value(value) {
            Ok(payload) => self.store.lock().store(&key, &T::type_name(), &payload, None),
            Err(e) => Self::encode_failed(&key, e),
        };
        DataStoreResult::from_store_result(&key, &result)
    }

    pub fn compare_exchange<T: DataStoreType>(
        &self,
        key: impl Into<StoreKey>,
        expected: &T,
        desired: &T,
    ) -> DataStoreResult<T> {
        let key = key.into();
        let type_name = T::type_name();
        let (expected, desired) = match (encode_value(expected), encode_value(desired)) {
            (Ok(expected), Ok(desired)) => (expected, desired),
            (Err(e), _) | (_, Err(e)) => {
                return DataStoreResult::from_store_result(&key, &Self::encode_failed(&key, e))
            }
        };

        let mut store = self.store.lock();
        let current = store.fetch(&key, &type_name);
        let expected_matches = current
            .value
            .as_ref()
            .map_or(false, |record| record.payload.bytes == expected.bytes);
        let result = if expected_matches {
            store.store(&key, &type_name, &desired, None)
        } else {
            current
        };
        drop(store);
        DataStoreResult::from_store_result(&key, &result)
    }

    pub fn len(&self) -> usize {
        self.store.lock().size()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    fn encode_failed(key: &StoreKey, e: CodecError) -> StoreResult {
        error!(%key, "Failed to serialize value: {}", e);
        StoreResult::code_only(ResultCode::UnexpectedError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::Text;

    #[test]
    fn test_local_operations() {
        let store = LocalDataStore::new();
        assert!(store.is_empty());

        assert_eq!(store.fetch_as::<i32>("k").code(), ResultCode::NotFound);
        assert_eq!(store.fetch_or_add("k", &10i32).code(), ResultCode::Added);
        let fetched = store.fetch_or_add("k", &20i32);
        assert_eq!(fetched.code(), ResultCode::Fetched);
        assert_eq!(fetched.value(), Some(&10));

        let exchanged = store.compare_exchange("k", &10i32, &11i32);
        assert_eq!(exchanged.code(), ResultCode::Exchanged);
        assert_eq!(exchanged.version(), Some(2));

        let stale = store.compare_exchange("k", &10i32, &12i32);
        assert_eq!(stale.code(), ResultCode::Fetched);
        assert_eq!(stale.value(), Some(&11));

        assert_eq!(store.fetch_as::<u32>("k").code(), ResultCode::TypeMismatch);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_upserts() {
        let store = LocalDataStore::new();
        assert_eq!(store.store("t", &Text::new("a")).code(), ResultCode::Added);
        let second = store.store("t", &Text::new("b"));
        assert_eq!(second.code(), ResultCode::Exchanged);
        assert_eq!(second.version(), Some(2));
        assert_eq!(store.fetch_as::<Text>("t").into_value(), Some(Text::new("b")));
        assert_eq!(store.store("t", &1u8).code(), ResultCode::TypeMismatch);
    }

    #[test]
    fn test_compare_exchange_missing_key() {
        let store = LocalDataStore::new();
        assert_eq!(store.compare_exchange("none", &1u8, &2u8).code(), ResultCode::NotFound);
    }
}
