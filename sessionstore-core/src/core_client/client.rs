/*
    ClientDataStore - cached client view of a session data store

    Responsibilities:
    - answer reads from a local cache, never from the network
    - forward fetch-or-add and compare-exchange to the server when the cache
      cannot answer, then update the cache from the response
    - apply server pushed replication events to the cache and fire the change
      notification handler registered for each key

    The cache only ever holds values the server accepted: values received from
    it, or values this client sent and the server acknowledged. It may be
    stale, it is never ahead.

    One lock guards the cache and the handler registry. It is held only while
    reading or writing local state, never across a request, and handlers are
    called after it is released.
*/

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, error, trace, warn};

use crate::config::ClientConfig;
use crate::core_protocol::{
    CompareExchangeRequest, DataStoreRequest, DataStoreResponse, FetchOrAddRequest,
    ReplicationEvent, UNSET_VERSION,
};
use crate::core_session::{ClientSession, ReplicationEventSink};
use crate::core_store::{
    DataStore, ResultCode, SerializedPayload, StoreKey, StoreResult, TypeName, UpdatePolicy,
    ValueRecord, INITIAL_VERSION,
};
use crate::core_types::{encode_value, DataStoreResult, DataStoreType};
use crate::metrics;

use super::notification::{ChangeNotificationOptions, PendingNotification, RegisteredHandler};

struct ClientState {
    cache: DataStore,
    handlers: HashMap<StoreKey, RegisteredHandler>,
}

pub struct ClientDataStore {
    session: Arc<dyn ClientSession>,
    state: Mutex<ClientState>,
    compare_exchange_payload_threshold: u32,
    request_timeout: Duration,
}

impl ClientDataStore {
    /// Create a client with default settings and route the session's
    /// replication events to it.
    pub fn new(session: Arc<dyn ClientSession>) -> Arc<Self> {
        Self::with_config(session, &ClientConfig::default())
    }

    pub fn with_config(session: Arc<dyn ClientSession>, config: &ClientConfig) -> Arc<Self> {
        let client = Arc::new(ClientDataStore {
            session,
            state: Mutex::new(ClientState {
                cache: DataStore::with_policy(UpdatePolicy::Replace),
                handlers: HashMap::new(),
            }),
            compare_exchange_payload_threshold: config.compare_exchange_payload_threshold,
            request_timeout: config.request_timeout,
        });
        let sink = Arc::downgrade(&client);
        let sink: Weak<dyn ReplicationEventSink> = sink;
        client.session.register_event_sink(sink);
        client
    }

    /// Return the value of `key`, adding `value` if the key does not exist.
    ///
    /// A cached value or cached type mismatch is returned without contacting
    /// the server.
    pub async fn fetch_or_add<T: DataStoreType>(
        &self,
        key: impl Into<StoreKey>,
        value: &T,
    ) -> DataStoreResult<T> {
        let key = key.into();
        let type_name = T::type_name();
        let Some(payload) = Self::encode(&key, value) else {
            return DataStoreResult::unexpected_error();
        };

        let cached = self.state.lock().cache.fetch(&key, &type_name);
        if matches!(cached.code, ResultCode::Fetched | ResultCode::TypeMismatch) {
            metrics::record_cache_hit();
            return DataStoreResult::from_store_result(&key, &cached);
        }

        let request = DataStoreRequest::FetchOrAdd(FetchOrAddRequest {
            key: key.clone(),
            type_name: type_name.clone(),
            serialized_value: payload.clone(),
        });
        let result = match self.send(request).await {
            Some(response) => self.handle_response(&key, &type_name, &payload, response),
            None => StoreResult::code_only(ResultCode::UnexpectedError),
        };
        DataStoreResult::from_store_result(&key, &result)
    }

    /// Return the cached value of `key`. Never contacts the server.
    pub fn fetch_as<T: DataStoreType>(&self, key: impl Into<StoreKey>) -> DataStoreResult<T> {
        let key = key.into();
        let cached = self.state.lock().cache.fetch(&key, &T::type_name());
        DataStoreResult::from_store_result(&key, &cached)
    }

    /// Replace the value of `key` with `desired` if it currently equals
    /// `expected`.
    ///
    /// Returns `Exchanged` on success, or `Fetched` with the current value when
    /// `expected` is stale. Keys this client has no cached value for yield
    /// `NotFound` without contacting the server.
    pub async fn compare_exchange<T: DataStoreType>(
        &self,
        key: impl Into<StoreKey>,
        expected: &T,
        desired: &T,
    ) -> DataStoreResult<T> {
        let key = key.into();
        let type_name = T::type_name();
        let (Some(expected_payload), Some(desired_payload)) =
            (Self::encode(&key, expected), Self::encode(&key, desired))
        else {
            return DataStoreResult::unexpected_error();
        };

        let cached = self.state.lock().cache.fetch(&key, &type_name);
        let cached_record = match (cached.code, &cached.value) {
            (ResultCode::Fetched, Some(record)) => record.clone(),
            _ => {
                metrics::record_cache_hit();
                return DataStoreResult::from_store_result(&key, &cached);
            }
        };

        if cached_record.payload.bytes != expected_payload.bytes {
            trace!(%key, "Expected value differs from cache, exchange skipped");
            metrics::record_cache_hit();
            return DataStoreResult::from_store_result(&key, &cached);
        }

        // Version 0 is only reachable by wrapping and means "compare by payload" on the wire
        let request = if expected_payload.uncompressed_size > self.compare_exchange_payload_threshold
            && cached_record.version != UNSET_VERSION
        {
            CompareExchangeRequest::by_version(
                key.clone(),
                type_name.clone(),
                cached_record.version,
                desired_payload.clone(),
            )
        } else {
            CompareExchangeRequest::by_payload(
                key.clone(),
                type_name.clone(),
                expected_payload,
                desired_payload.clone(),
            )
        };

        let result = match self.send(DataStoreRequest::CompareExchange(request)).await {
            Some(response) => self.handle_response(&key, &type_name, &desired_payload, response),
            None => StoreResult::code_only(ResultCode::UnexpectedError),
        };
        DataStoreResult::from_store_result(&key, &result)
    }

    /// Call `handler` whenever the server pushes a new value for `key`.
    ///
    /// Replaces any handler previously registered for `key`. With
    /// `NOTIFY_ON_INITIAL_VALUE` the handler is called right away when the
    /// key is cached.
    pub fn register_change_notification_handler<T, F>(
        &self,
        key: impl Into<StoreKey>,
        handler: F,
        options: ChangeNotificationOptions,
    ) where
        T: DataStoreType + 'static,
        F: Fn(&StoreKey, Option<T>) + Send + Sync + 'static,
    {
        let key = key.into();
        let handler = RegisteredHandler::new::<T, F>(options, handler);

        let initial = {
            let mut state = self.state.lock();
            let initial = if handler
                .options()
                .contains(ChangeNotificationOptions::NOTIFY_ON_INITIAL_VALUE)
            {
                let cached = state.cache.fetch(&key, &T::type_name());
                match (cached.code, cached.value) {
                    (ResultCode::Fetched, Some(record)) => handler.for_value(&key, &record),
                    (ResultCode::TypeMismatch, _) => handler.for_mismatch(&key),
                    _ => None,
                }
            } else {
                None
            };
            state.handlers.insert(key.clone(), handler);
            initial
        };

        debug!(%key, "Change notification handler registered");
        if let Some(notification) = initial {
            notification.dispatch();
        }
    }

    pub fn unregister_change_notification_handler(&self, key: impl Into<StoreKey>) {
        let key = key.into();
        if self.state.lock().handlers.remove(&key).is_some() {
            debug!(%key, "Change notification handler unregistered");
        }
    }

    pub fn has_change_notification_handler(&self, key: &StoreKey) -> bool {
        self.state.lock().handlers.contains_key(key)
    }

    fn encode<T: DataStoreType>(key: &StoreKey, value: &T) -> Option<SerializedPayload> {
        match encode_value(value) {
            Ok(payload) => Some(payload),
            Err(e) => {
                error!(%key, "Failed to serialize value: {}", e);
                metrics::record_unexpected_error();
                None
            }
        }
    }

    /// Send one request, mapping any transport failure to `None`.
    async fn send(&self, request: DataStoreRequest) -> Option<DataStoreResponse> {
        let key = request.key().clone();
        let kind = request.message_type();
        match tokio::time::timeout(self.request_timeout, self.session.send_request(request)).await {
            Ok(Ok(response)) => Some(response),
            Ok(Err(e)) => {
                warn!(%key, kind, "Request failed: {}", e);
                metrics::record_unexpected_error();
                None
            }
            Err(_) => {
                warn!(%key, kind, timeout = ?self.request_timeout, "Request timed out");
                metrics::record_unexpected_error();
                None
            }
        }
    }

    /// Update the cache from a server response to a request that sent `sent`.
    fn handle_response(
        &self,
        key: &StoreKey,
        type_name: &TypeName,
        sent: &SerializedPayload,
        response: DataStoreResponse,
    ) -> StoreResult {
        let (code, payload, version) = match response {
            DataStoreResponse::Added => (ResultCode::Added, sent.clone(), INITIAL_VERSION),
            DataStoreResponse::Exchanged { version } => (ResultCode::Exchanged, sent.clone(), version),
            DataStoreResponse::Fetched(record) => {
                if record.type_name != *type_name {
                    error!(
                        %key,
                        stored = %record.type_name,
                        requested = %type_name,
                        "Server fetched a value of another type"
                    );
                    return StoreResult::code_only(ResultCode::UnexpectedError);
                }
                (ResultCode::Fetched, record.payload, record.version)
            }
            other => return StoreResult::code_only(other.code()),
        };

        let mut state = self.state.lock();
        if let Some(cached) = state.cache.get_version(key) {
            if is_newer(cached, version) {
                // A replication event overtook this response
                trace!(%key, cached, version, "Keeping newer cached value");
                let answered = ValueRecord::new(type_name.clone(), version, payload);
                return StoreResult::with_value(code, Arc::new(answered));
            }
        }
        let stored = state.cache.store(key, type_name, &payload, Some(version));
        match stored.value {
            Some(record) => StoreResult::with_value(code, record),
            None => {
                error!(%key, %type_name, "Cache holds another type than the server");
                debug_assert!(false, "cache type diverged from server for {}", key);
                StoreResult::code_only(ResultCode::UnexpectedError)
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn cache_size(&self) -> usize {
        self.state.lock().cache.size()
    }

    #[cfg(test)]
    pub(crate) fn cached_record(&self, key: &str) -> Option<crate::core_store::ValueRecordRef> {
        let state = self.state.lock();
        let mut found = None;
        state.cache.visit(|k, record| {
            if k.as_str() == key {
                found = Some(record.clone());
            }
        });
        found
    }
}

impl ReplicationEventSink for ClientDataStore {
    fn on_replication_event(&self, event: ReplicationEvent) {
        let notifications: Vec<PendingNotification> = {
            let mut state = self.state.lock();
            let mut notifications = Vec::new();
            for (key, record) in event.values {
                let stored =
                    state.cache.store(&key, &record.type_name, &record.payload, Some(record.version));
                let Some(cached) = stored.value else {
                    error!(
                        %key,
                        type_name = %record.type_name,
                        "Replicated value has another type than the cache"
                    );
                    debug_assert!(false, "replicated type mismatch for {}", key);
                    continue;
                };
                if let Some(handler) = state.handlers.get(&key) {
                    notifications.extend(handler.for_value(&key, &cached));
                }
            }
            notifications
        };

        trace!(count = notifications.len(), "Dispatching change notifications");
        for notification in notifications {
            notification.dispatch();
        }
    }
}

impl Drop for ClientDataStore {
    fn drop(&mut self) {
        self.session.unregister_event_sink();
    }
}

/// True when version `a` was written after version `b`, allowing for wraparound.
fn is_newer(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) > 0
}
