/*
    DataStore - in-process map from key to versioned record

    Responsibilities:
    `store.rs` implements the authoritative key/value map used by the session
    server, by each client as its local cache and by the standalone local store.
    It handles:
    - fetch-or-add: create a key at version 1 or return the existing record
    - store: unconditional upsert, auto-incrementing (wrapping) the version
    - fetch/get_version: read-only lookups
    - visit: full-state iteration for replication to late joiners

    A key's type name is fixed once created. Any operation addressing the key
    with another type name fails with TypeMismatch and leaves the entry intact.

    The store is not internally synchronized. The server drives it from a single
    task; the client wraps it in its own lock.
*/

use std::collections::HashMap;
use std::sync::Arc;

use super::result::{ResultCode, StoreResult};
use super::value::{SerializedPayload, StoreKey, TypeName, ValueRecord, ValueRecordRef, INITIAL_VERSION};

/// How a write applies to an existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdatePolicy {
    /// Update the record allocation in place when no reader holds a view of it.
    /// A view that is still held is detached first, so readers never observe a
    /// mutation through a view they own.
    #[default]
    Overwrite,
    /// Always allocate a new record and swap it into the map. Views handed out
    /// earlier keep pointing at the old record.
    Replace,
}

#[derive(Debug, Default)]
pub struct DataStore {
    entries: HashMap<StoreKey, ValueRecordRef>,
    policy: UpdatePolicy,
}

impl DataStore {
    /// Create a store using the `Overwrite` policy.
    pub fn new() -> Self {
        Self::with_policy(UpdatePolicy::Overwrite)
    }

    pub fn with_policy(policy: UpdatePolicy) -> Self {
        DataStore { entries: HashMap::new(), policy }
    }

    /// Return the existing record for `key`, or add `payload` at version 1.
    ///
    /// The existing payload is never overwritten.
    pub fn fetch_or_add(
        &mut self,
        key: &StoreKey,
        type_name: &TypeName,
        payload: &SerializedPayload,
    ) -> StoreResult {
        match self.entries.get(key) {
            Some(existing) if existing.type_name == *type_name => {
                StoreResult::with_value(ResultCode::Fetched, existing.clone())
            }
            Some(_) => StoreResult::code_only(ResultCode::TypeMismatch),
            None => {
                let record = Arc::new(ValueRecord::new(
                    type_name.clone(),
                    INITIAL_VERSION,
                    payload.clone(),
                ));
                self.entries.insert(key.clone(), record.clone());
                StoreResult::with_value(ResultCode::Added, record)
            }
        }
    }

    /// Unconditionally store `payload` under `key`.
    ///
    /// The record takes `version` when given. Otherwise a new key starts at 1
    /// and an existing key advances by one, wrapping from `u32::MAX` to 0.
    pub fn store(
        &mut self,
        key: &StoreKey,
        type_name: &TypeName,
        payload: &SerializedPayload,
        version: Option<u32>,
    ) -> StoreResult {
        let policy = self.policy;
        match self.entries.get_mut(key) {
            Some(existing) if existing.type_name == *type_name => {
                let next_version = version.unwrap_or_else(|| existing.version.wrapping_add(1));
                match policy {
                    UpdatePolicy::Overwrite => {
                        let record = Arc::make_mut(existing);
                        record.version = next_version;
                        record.payload = payload.clone();
                    }
                    UpdatePolicy::Replace => {
                        *existing = Arc::new(ValueRecord::new(
                            type_name.clone(),
                            next_version,
                            payload.clone(),
                        ));
                    }
                }
                StoreResult::with_value(ResultCode::Exchanged, existing.clone())
            }
            Some(_) => StoreResult::code_only(ResultCode::TypeMismatch),
            None => {
                let record = Arc::new(ValueRecord::new(
                    type_name.clone(),
                    version.unwrap_or(INITIAL_VERSION),
                    payload.clone(),
                ));
                self.entries.insert(key.clone(), record.clone());
                StoreResult::with_value(ResultCode::Added, record)
            }
        }
    }

    /// Look up `key` as `type_name`. Never mutates the store.
    pub fn fetch(&self, key: &StoreKey, type_name: &TypeName) -> StoreResult {
        match self.entries.get(key) {
            Some(existing) if existing.type_name == *type_name => {
                StoreResult::with_value(ResultCode::Fetched, existing.clone())
            }
            Some(_) => StoreResult::code_only(ResultCode::TypeMismatch),
            None => StoreResult::code_only(ResultCode::NotFound),
        }
    }

    /// Current version of `key`, regardless of its type.
    pub fn get_version(&self, key: &StoreKey) -> Option<u32> {
        self.entries.get(key).map(|record| record.version)
    }

    /// Call `visitor` for every entry, in no particular order.
    pub fn visit<F>(&self, mut visitor: F)
    where
        F: FnMut(&StoreKey, &ValueRecordRef),
    {
        for (key, record) in &self.entries {
            visitor(key, record);
        }
    }

    /// Number of entries.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn int32() -> TypeName {
        TypeName::from("Integer_int32")
    }

    fn payload(byte: u8) -> SerializedPayload {
        SerializedPayload::new(vec![byte; 4])
    }

    #[test]
    fn test_fetch_or_add_sets_version_one() {
        let mut store = DataStore::new();
        let key = StoreKey::from("Key1");

        let result = store.fetch_or_add(&key, &int32(), &payload(10));
        assert_eq!(result.code, ResultCode::Added);
        assert_eq!(store.get_version(&key), Some(1));
    }

    #[test]
    fn test_fetch_or_add_does_not_overwrite() {
        let mut store = DataStore::new();
        let key = StoreKey::from("Key1");

        store.fetch_or_add(&key, &int32(), &payload(10));
        let result = store.fetch_or_add(&key, &int32(), &payload(20));

        assert_eq!(result.code, ResultCode::Fetched);
        assert_eq!(result.value.unwrap().payload, payload(10));
        assert_eq!(store.get_version(&key), Some(1));
    }

    #[test]
    fn test_store_defaults_to_version_one() {
        let mut store = DataStore::new();
        let key = StoreKey::from("Key1");

        assert_eq!(store.store(&key, &int32(), &payload(10), None).code, ResultCode::Added);
        assert_eq!(store.get_version(&key), Some(1));
    }

    #[test]
    fn test_store_uses_explicit_version() {
        let mut store = DataStore::new();
        let key = StoreKey::from("Key1");

        assert_eq!(store.store(&key, &int32(), &payload(10), Some(55)).code, ResultCode::Added);
        assert_eq!(store.get_version(&key), Some(55));
        assert_eq!(
            store.store(&key, &int32(), &payload(10), Some(75)).code,
            ResultCode::Exchanged
        );
        assert_eq!(store.get_version(&key), Some(75));
    }

    #[test]
    fn test_store_increments_version() {
        let mut store = DataStore::new();
        let key = StoreKey::from("Key1");

        store.store(&key, &int32(), &payload(10), Some(55));
        assert_eq!(store.store(&key, &int32(), &payload(20), None).code, ResultCode::Exchanged);
        assert_eq!(store.get_version(&key), Some(56));
    }

    #[test]
    fn test_store_version_wraps_around() {
        let mut store = DataStore::new();
        let key = StoreKey::from("Key1");

        store.store(&key, &int32(), &payload(10), Some(u32::MAX));
        assert_eq!(store.get_version(&key), Some(u32::MAX));
        assert_eq!(store.store(&key, &int32(), &payload(10), None).code, ResultCode::Exchanged);
        assert_eq!(store.get_version(&key), Some(0));
    }

    #[test]
    fn test_fetch_returns_stored_version() {
        let mut store = DataStore::new();
        let key = StoreKey::from("Key1");

        store.store(&key, &int32(), &payload(10), Some(32));
        assert_eq!(store.fetch(&key, &int32()).version(), Some(32));
        assert_eq!(store.fetch_or_add(&key, &int32(), &payload(10)).version(), Some(32));
        assert_eq!(store.get_version(&key), Some(32));
    }

    #[test]
    fn test_fetch_not_found() {
        let store = DataStore::new();
        let result = store.fetch(&StoreKey::from("missing"), &int32());
        assert_eq!(result.code, ResultCode::NotFound);
        assert!(result.value.is_none());
        assert_eq!(store.get_version(&StoreKey::from("missing")), None);
    }

    #[test]
    fn test_type_mismatch_leaves_entry_unchanged() {
        let mut store = DataStore::new();
        let key = StoreKey::from("Key1");
        let float = TypeName::from("Float_float32");

        store.store(&key, &int32(), &payload(10), Some(7));

        assert_eq!(store.fetch(&key, &float).code, ResultCode::TypeMismatch);
        assert_eq!(store.fetch_or_add(&key, &float, &payload(1)).code, ResultCode::TypeMismatch);
        assert_eq!(store.store(&key, &float, &payload(1), None).code, ResultCode::TypeMismatch);

        let current = store.fetch(&key, &int32()).value.unwrap();
        assert_eq!(current.version, 7);
        assert_eq!(current.payload, payload(10));
    }

    #[test]
    fn test_replace_policy_keeps_old_views() {
        let mut store = DataStore::with_policy(UpdatePolicy::Replace);
        let key = StoreKey::from("Key1");

        store.store(&key, &int32(), &payload(1), Some(32));
        let first = store.fetch_or_add(&key, &int32(), &payload(1));
        store.store(&key, &int32(), &payload(2), Some(42));
        let second = store.fetch(&key, &int32());

        let first = first.value.unwrap();
        let second = second.value.unwrap();
        assert_eq!(first.version, 32);
        assert_eq!(first.payload, payload(1));
        assert_eq!(second.version, 42);
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_overwrite_policy_never_mutates_held_views() {
        let mut store = DataStore::with_policy(UpdatePolicy::Overwrite);
        let key = StoreKey::from("Key1");

        store.store(&key, &int32(), &payload(1), None);
        let held = store.fetch(&key, &int32()).value.unwrap();
        store.store(&key, &int32(), &payload(2), None);

        assert_eq!(held.version, 1);
        assert_eq!(held.payload, payload(1));
        assert_eq!(store.get_version(&key), Some(2));
    }

    #[test]
    fn test_visit_and_size() {
        let mut store = DataStore::new();
        for i in 0..5u8 {
            store.fetch_or_add(&StoreKey::new(format!("key{}", i)), &int32(), &payload(i));
        }

        let mut visited = Vec::new();
        store.visit(|key, record| visited.push((key.clone(), record.version)));
        visited.sort();

        assert_eq!(store.size(), 5);
        assert_eq!(visited.len(), 5);
        assert!(visited.iter().all(|(_, version)| *version == 1));
        assert_eq!(visited[0].0, StoreKey::from("key0"));
    }

    proptest! {
        #[test]
        fn prop_each_store_advances_version_by_one(start in any::<u32>(), writes in 1usize..32) {
            let mut store = DataStore::new();
            let key = StoreKey::from("counter");
            store.store(&key, &int32(), &payload(0), Some(start));

            for i in 0..writes {
                let result = store.store(&key, &int32(), &payload(i as u8), None);
                prop_assert_eq!(result.code, ResultCode::Exchanged);
            }
            prop_assert_eq!(store.get_version(&key), Some(start.wrapping_add(writes as u32)));
        }

        #[test]
        fn prop_other_type_never_touches_entry(a in "[a-z]{1,8}", b in "[a-z]{1,8}", version in any::<u32>()) {
            prop_assume!(a != b);
            let mut store = DataStore::with_policy(UpdatePolicy::Replace);
            let key = StoreKey::from("k");
            let type_a = TypeName::new(a);
            let type_b = TypeName::new(b);

            store.store(&key, &type_a, &payload(1), Some(version));
            prop_assert_eq!(store.fetch(&key, &type_b).code, ResultCode::TypeMismatch);
            prop_assert_eq!(store.store(&key, &type_b, &payload(2), None).code, ResultCode::TypeMismatch);
            prop_assert_eq!(store.fetch_or_add(&key, &type_b, &payload(2)).code, ResultCode::TypeMismatch);

            let current = store.fetch(&key, &type_a).value.unwrap();
            prop_assert_eq!(current.version, version);
            prop_assert_eq!(&current.payload, &payload(1));
        }
    }
}
