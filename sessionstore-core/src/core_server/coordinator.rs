/*
    ServerDataStore - authoritative store of a session

    Responsibilities:
    - apply fetch-or-add and compare-exchange requests to the authoritative store
    - answer each request with a DataStoreResponse
    - push every accepted change to all connected endpoints except the one that
      made it
    - send the full store content to a newly connected endpoint

    Both pushes are skipped when content replication is disabled; clients then
    only learn about values through their own requests.

    The coordinator is not synchronized. It must be driven by one task at a
    time, see `actor::spawn_server`.
*/

use std::sync::Arc;
use tracing::{debug, error, trace, warn};

use crate::config::ServerConfig;
use crate::core_protocol::{
    decode_request, encode_response, CompareExchangeRequest, DataStoreRequest, DataStoreResponse,
    FetchOrAddRequest, ReplicationEvent,
};
use crate::core_session::{EndpointId, ServerSession};
use crate::core_store::{DataStore, ResultCode, StoreKey, UpdatePolicy, ValueRecord};
use crate::metrics;

pub struct ServerDataStore {
    store: DataStore,
    session: Arc<dyn ServerSession>,
    content_replication_enabled: bool,
}

impl ServerDataStore {
    pub fn new(session: Arc<dyn ServerSession>, content_replication_enabled: bool) -> Self {
        ServerDataStore {
            store: DataStore::with_policy(UpdatePolicy::Replace),
            session,
            content_replication_enabled,
        }
    }

    pub fn with_config(session: Arc<dyn ServerSession>, config: &ServerConfig) -> Self {
        Self::new(session, config.content_replication_enabled)
    }

    pub fn content_replication_enabled(&self) -> bool {
        self.content_replication_enabled
    }

    /// Read access to the authoritative store.
    pub fn store(&self) -> &DataStore {
        &self.store
    }

    /// Send every stored value to `endpoint` in one event.
    pub fn on_client_connected(&mut self, endpoint: EndpointId) {
        debug!(%endpoint, entries = self.store.size(), "Client connected");
        if !self.content_replication_enabled || self.store.is_empty() {
            return;
        }

        let mut event = ReplicationEvent::new();
        self.store.visit(|key, record| event.push(key.clone(), ValueRecord::clone(record)));
        metrics::record_replication_event(event.len());
        self.session.send_event(&[endpoint], &event);
    }

    pub fn on_client_disconnected(&mut self, endpoint: EndpointId) {
        debug!(%endpoint, "Client disconnected");
    }

    /// Decode, apply and answer one request frame.
    ///
    /// A frame that cannot be decoded is answered with `UnexpectedError`.
    pub fn handle_encoded_request(&mut self, requester: EndpointId, frame: &[u8]) -> Vec<u8> {
        let response = match decode_request(frame) {
            Ok(request) => self.handle_request(requester, request),
            Err(e) => {
                warn!(%requester, "Rejecting undecodable request: {}", e);
                DataStoreResponse::UnexpectedError
            }
        };
        match encode_response(&response) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(%requester, "Failed to encode response: {}", e);
                encode_response(&DataStoreResponse::UnexpectedError).unwrap_or_default()
            }
        }
    }

    pub fn handle_request(
        &mut self,
        requester: EndpointId,
        request: DataStoreRequest,
    ) -> DataStoreResponse {
        metrics::record_request(request.message_type());
        match request {
            DataStoreRequest::FetchOrAdd(request) => self.on_fetch_or_add_request(requester, request),
            DataStoreRequest::CompareExchange(request) => {
                self.on_compare_exchange_request(requester, request)
            }
        }
    }

    fn on_fetch_or_add_request(
        &mut self,
        requester: EndpointId,
        request: FetchOrAddRequest,
    ) -> DataStoreResponse {
        let result =
            self.store.fetch_or_add(&request.key, &request.type_name, &request.serialized_value);
        trace!(%requester, key = %request.key, code = %result.code, "FetchOrAdd");

        match (result.code, result.value) {
            (ResultCode::Added, Some(record)) => {
                self.replicate(requester, &request.key, &record);
                DataStoreResponse::Added
            }
            (ResultCode::Fetched, Some(record)) => {
                metrics::record_fetch();
                DataStoreResponse::Fetched(ValueRecord::clone(&record))
            }
            (ResultCode::TypeMismatch, _) => DataStoreResponse::TypeMismatch,
            (code, _) => {
                error!(key = %request.key, %code, "Unexpected store result for FetchOrAdd");
                debug_assert!(false, "fetch_or_add returned {}", code);
                DataStoreResponse::UnexpectedError
            }
        }
    }

    fn on_compare_exchange_request(
        &mut self,
        requester: EndpointId,
        request: CompareExchangeRequest,
    ) -> DataStoreResponse {
        let current = self.store.fetch(&request.key, &request.type_name);
        let current = match (current.code, current.value) {
            (ResultCode::Fetched, Some(record)) => record,
            (ResultCode::NotFound, _) => return DataStoreResponse::NotFound,
            (ResultCode::TypeMismatch, _) => return DataStoreResponse::TypeMismatch,
            (code, _) => {
                error!(key = %request.key, %code, "Unexpected store result for CompareExchange");
                return DataStoreResponse::UnexpectedError;
            }
        };

        // A version mismatch is treated exactly like a payload mismatch.
        let expected_matches = if request.compares_by_version() {
            current.version == request.expected_version
        } else {
            current.payload.bytes == request.expected_payload.bytes
        };

        trace!(
            %requester,
            key = %request.key,
            by_version = request.compares_by_version(),
            expected_matches,
            "CompareExchange"
        );

        if !expected_matches {
            metrics::record_fetch();
            return DataStoreResponse::Fetched(ValueRecord::clone(&current));
        }

        let stored =
            self.store.store(&request.key, &request.type_name, &request.desired_payload, None);
        match (stored.code, stored.value) {
            (ResultCode::Exchanged, Some(record)) => {
                metrics::record_exchange();
                self.replicate(requester, &request.key, &record);
                DataStoreResponse::Exchanged { version: record.version }
            }
            (code, _) => {
                error!(key = %request.key, %code, "Store rejected a matched exchange");
                debug_assert!(false, "store returned {} after a successful fetch", code);
                DataStoreResponse::UnexpectedError
            }
        }
    }

    fn replicate(&self, requester: EndpointId, key: &StoreKey, record: &ValueRecord) {
        if !self.content_replication_enabled {
            return;
        }
        let recipients: Vec<EndpointId> = self
            .session
            .client_endpoint_ids()
            .into_iter()
            .filter(|endpoint| *endpoint != requester)
            .collect();
        if recipients.is_empty() {
            return;
        }
        metrics::record_replication_event(1);
        self.session
            .send_event(&recipients, &ReplicationEvent::single(key.clone(), record.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_protocol::encode_request;
    use crate::core_protocol::decode_response;
    use crate::core_store::{SerializedPayload, TypeName};
    use parking_lot::Mutex;

    /// Records every event together with its recipients.
    #[derive(Default)]
    struct RecordingSession {
        endpoints: Vec<EndpointId>,
        sent: Mutex<Vec<(Vec<EndpointId>, ReplicationEvent)>>,
    }

    impl RecordingSession {
        fn with_endpoints(endpoints: Vec<EndpointId>) -> Arc<Self> {
            Arc::new(RecordingSession { endpoints, sent: Mutex::new(Vec::new()) })
        }

        fn sent(&self) -> Vec<(Vec<EndpointId>, ReplicationEvent)> {
            self.sent.lock().clone()
        }
    }

    impl ServerSession for RecordingSession {
        fn client_endpoint_ids(&self) -> Vec<EndpointId> {
            self.endpoints.clone()
        }

        fn send_event(&self, recipients: &[EndpointId], event: &ReplicationEvent) {
            self.sent.lock().push((recipients.to_vec(), event.clone()));
        }
    }

    fn uint8() -> TypeName {
        TypeName::from("Integer_uint8")
    }

    fn payload(byte: u8) -> SerializedPayload {
        SerializedPayload::new(vec![byte])
    }

    fn add(key: &str, byte: u8) -> DataStoreRequest {
        DataStoreRequest::FetchOrAdd(FetchOrAddRequest {
            key: StoreKey::from(key),
            type_name: uint8(),
            serialized_value: payload(byte),
        })
    }

    fn exchange(key: &str, expected: u8, desired: u8) -> DataStoreRequest {
        DataStoreRequest::CompareExchange(CompareExchangeRequest::by_payload(
            StoreKey::from(key),
            uint8(),
            payload(expected),
            payload(desired),
        ))
    }

    fn exchange_by_version(key: &str, version: u32, desired: u8) -> DataStoreRequest {
        DataStoreRequest::CompareExchange(CompareExchangeRequest::by_version(
            StoreKey::from(key),
            uint8(),
            version,
            payload(desired),
        ))
    }

    #[test]
    fn test_added_response_carries_no_value_and_skips_requester() {
        let (a, b, c) = (EndpointId::new(), EndpointId::new(), EndpointId::new());
        let session = RecordingSession::with_endpoints(vec![a, b, c]);
        let mut server = ServerDataStore::new(session.clone(), true);

        assert_eq!(server.handle_request(a, add("k", 1)), DataStoreResponse::Added);

        let sent = session.sent();
        assert_eq!(sent.len(), 1);
        assert!(!sent[0].0.contains(&a));
        assert_eq!(sent[0].0.len(), 2);
        assert_eq!(sent[0].1.values[0].1.version, 1);
    }

    #[test]
    fn test_fetch_or_add_on_existing_key_fetches() {
        let a = EndpointId::new();
        let session = RecordingSession::with_endpoints(vec![a]);
        let mut server = ServerDataStore::new(session.clone(), true);

        server.handle_request(a, add("k", 1));
        match server.handle_request(a, add("k", 9)) {
            DataStoreResponse::Fetched(record) => {
                assert_eq!(record.payload, payload(1));
                assert_eq!(record.version, 1);
            }
            other => panic!("expected Fetched, got {:?}", other),
        }
    }

    #[test]
    fn test_type_mismatch_on_fetch_or_add() {
        let a = EndpointId::new();
        let mut server = ServerDataStore::new(RecordingSession::with_endpoints(vec![a]), true);
        server.handle_request(a, add("k", 1));

        let request = DataStoreRequest::FetchOrAdd(FetchOrAddRequest {
            key: StoreKey::from("k"),
            type_name: TypeName::from("Integer_int8"),
            serialized_value: payload(1),
        });
        assert_eq!(server.handle_request(a, request), DataStoreResponse::TypeMismatch);
    }

    #[test]
    fn test_compare_exchange_outcomes() {
        let a = EndpointId::new();
        let mut server = ServerDataStore::new(RecordingSession::with_endpoints(vec![a]), true);

        assert_eq!(server.handle_request(a, exchange("k", 0, 1)), DataStoreResponse::NotFound);

        server.handle_request(a, add("k", 0));
        assert_eq!(
            server.handle_request(a, exchange("k", 0, 1)),
            DataStoreResponse::Exchanged { version: 2 }
        );

        // Stale expected value: current value returned, store untouched
        match server.handle_request(a, exchange("k", 0, 5)) {
            DataStoreResponse::Fetched(record) => {
                assert_eq!(record.payload, payload(1));
                assert_eq!(record.version, 2);
            }
            other => panic!("expected Fetched, got {:?}", other),
        }
        assert_eq!(server.store().get_version(&StoreKey::from("k")), Some(2));
    }

    #[test]
    fn test_compare_exchange_by_version() {
        let a = EndpointId::new();
        let mut server = ServerDataStore::new(RecordingSession::with_endpoints(vec![a]), true);
        server.handle_request(a, add("k", 0));

        assert!(matches!(
            server.handle_request(a, exchange_by_version("k", 7, 1)),
            DataStoreResponse::Fetched(_)
        ));
        assert_eq!(
            server.handle_request(a, exchange_by_version("k", 1, 1)),
            DataStoreResponse::Exchanged { version: 2 }
        );
    }

    #[test]
    fn test_replication_disabled_sends_nothing() {
        let (a, b) = (EndpointId::new(), EndpointId::new());
        let session = RecordingSession::with_endpoints(vec![a, b]);
        let mut server = ServerDataStore::new(session.clone(), false);

        server.handle_request(a, add("k", 0));
        server.handle_request(a, exchange("k", 0, 1));
        server.on_client_connected(b);
        assert!(session.sent().is_empty());
    }

    #[test]
    fn test_full_sync_goes_to_new_endpoint_only() {
        let (a, late) = (EndpointId::new(), EndpointId::new());
        let session = RecordingSession::with_endpoints(vec![a]);
        let mut server = ServerDataStore::new(session.clone(), true);

        server.handle_request(a, add("x", 1));
        server.handle_request(a, add("y", 2));
        server.on_client_connected(late);

        let sent = session.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, vec![late]);
        let mut keys: Vec<_> = sent[0].1.values.iter().map(|(k, _)| k.to_string()).collect();
        keys.sort();
        assert_eq!(keys, vec!["x", "y"]);
    }

    #[test]
    fn test_undecodable_frame_gets_unexpected_error() {
        let a = EndpointId::new();
        let mut server = ServerDataStore::new(RecordingSession::with_endpoints(vec![a]), true);

        let reply = server.handle_encoded_request(a, &[0xff, 0xff, 0xff]);
        assert_eq!(decode_response(&reply).unwrap(), DataStoreResponse::UnexpectedError);

        let frame = encode_request(&add("k", 3)).unwrap();
        let reply = server.handle_encoded_request(a, &frame);
        assert_eq!(decode_response(&reply).unwrap(), DataStoreResponse::Added);
    }
}
