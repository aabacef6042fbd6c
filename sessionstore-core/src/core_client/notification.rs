//! Change notification handlers registered on a client data store.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;
use tracing::error;

use crate::core_store::{StoreKey, TypeName, ValueRecord, ValueRecordRef};
use crate::core_types::{decode_record, DataStoreType};

/// Independent flags controlling when a handler is called.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChangeNotificationOptions(u8);

impl ChangeNotificationOptions {
    pub const NONE: Self = ChangeNotificationOptions(0);
    /// Call the handler on registration with the currently cached value
    pub const NOTIFY_ON_INITIAL_VALUE: Self = ChangeNotificationOptions(1);
    /// Call the handler without a value when the key holds another type
    pub const NOTIFY_ON_TYPE_MISMATCH: Self = ChangeNotificationOptions(1 << 1);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl Default for ChangeNotificationOptions {
    fn default() -> Self {
        Self::NOTIFY_ON_INITIAL_VALUE | Self::NOTIFY_ON_TYPE_MISMATCH
    }
}

impl BitOr for ChangeNotificationOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        ChangeNotificationOptions(self.0 | rhs.0)
    }
}

impl BitOrAssign for ChangeNotificationOptions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for ChangeNotificationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotificationOptions")
            .field("initial_value", &self.contains(Self::NOTIFY_ON_INITIAL_VALUE))
            .field("type_mismatch", &self.contains(Self::NOTIFY_ON_TYPE_MISMATCH))
            .finish()
    }
}

type ErasedCallback = Arc<dyn Fn(&StoreKey, Option<&ValueRecord>) + Send + Sync>;

/// A handler with its value type erased.
#[derive(Clone)]
pub(crate) struct RegisteredHandler {
    type_name: TypeName,
    options: ChangeNotificationOptions,
    callback: ErasedCallback,
}

impl RegisteredHandler {
    pub(crate) fn new<T, F>(options: ChangeNotificationOptions, handler: F) -> Self
    where
        T: DataStoreType + 'static,
        F: Fn(&StoreKey, Option<T>) + Send + Sync + 'static,
    {
        let callback = move |key: &StoreKey, record: Option<&ValueRecord>| match record {
            Some(record) => match decode_record::<T>(record) {
                Ok(value) => handler(key, Some(value)),
                Err(e) => error!(%key, "Change notification dropped, value undecodable: {}", e),
            },
            None => handler(key, None),
        };
        RegisteredHandler { type_name: T::type_name(), options, callback: Arc::new(callback) }
    }

    pub(crate) fn options(&self) -> ChangeNotificationOptions {
        self.options
    }

    /// Notification for `record` now being the cached value of `key`.
    pub(crate) fn for_value(&self, key: &StoreKey, record: &ValueRecordRef) -> Option<PendingNotification> {
        if record.type_name == self.type_name {
            Some(PendingNotification {
                key: key.clone(),
                callback: self.callback.clone(),
                value: Some(record.clone()),
            })
        } else {
            self.for_mismatch(key)
        }
    }

    /// Notification for `key` holding a type other than the handler's.
    pub(crate) fn for_mismatch(&self, key: &StoreKey) -> Option<PendingNotification> {
        if !self.options.contains(ChangeNotificationOptions::NOTIFY_ON_TYPE_MISMATCH) {
            return None;
        }
        Some(PendingNotification { key: key.clone(), callback: self.callback.clone(), value: None })
    }
}

/// A handler call prepared under the client lock and run after releasing it.
pub(crate) struct PendingNotification {
    key: StoreKey,
    callback: ErasedCallback,
    value: Option<ValueRecordRef>,
}

impl PendingNotification {
    pub(crate) fn dispatch(self) {
        (self.callback)(&self.key, self.value.as_deref());
    }
}
