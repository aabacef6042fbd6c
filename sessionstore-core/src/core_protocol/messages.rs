/*
    Messages - request, response and event shapes of the data store protocol

    Request messages (client -> server):
    - FETCH_OR_ADD(key, type, value)
    - COMPARE_EXCHANGE(key, type, expected version or expected payload, desired payload)

    Response messages (server -> requester):
    - one DataStoreResponse per request. Only `Fetched` carries a full value; the
      requester already knows what it sent for `Added` and `Exchanged`, so those
      carry at most the new version.

    Event messages (server -> all other clients):
    - REPLICATION(list of key/record pairs), used for incremental pushes and for
      the full sync sent to a newly connected client.
*/

use serde::{Deserialize, Serialize};

use crate::core_store::{ResultCode, SerializedPayload, StoreKey, TypeName, ValueRecord};

/// Sentinel meaning "compare by payload" in a compare-exchange request.
pub const UNSET_VERSION: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOrAddRequest {
    pub key: StoreKey,
    pub type_name: TypeName,
    pub serialized_value: SerializedPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareExchangeRequest {
    pub key: StoreKey,
    pub type_name: TypeName,
    /// Version the client expects the server to hold, or `UNSET_VERSION`
    pub expected_version: u32,
    /// Expected value bytes; empty when `expected_version` is set
    pub expected_payload: SerializedPayload,
    pub desired_payload: SerializedPayload,
}

impl CompareExchangeRequest {
    /// Request comparing the full expected payload.
    pub fn by_payload(
        key: StoreKey,
        type_name: TypeName,
        expected_payload: SerializedPayload,
        desired_payload: SerializedPayload,
    ) -> Self {
        CompareExchangeRequest {
            key,
            type_name,
            expected_version: UNSET_VERSION,
            expected_payload,
            desired_payload,
        }
    }

    /// Request comparing only the version of the expected value.
    pub fn by_version(
        key: StoreKey,
        type_name: TypeName,
        expected_version: u32,
        desired_payload: SerializedPayload,
    ) -> Self {
        CompareExchangeRequest {
            key,
            type_name,
            expected_version,
            expected_payload: SerializedPayload::empty(),
            desired_payload,
        }
    }

    pub fn compares_by_version(&self) -> bool {
        self.expected_version != UNSET_VERSION
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataStoreRequest {
    FetchOrAdd(FetchOrAddRequest),
    CompareExchange(CompareExchangeRequest),
}

impl DataStoreRequest {
    pub fn key(&self) -> &StoreKey {
        match self {
            DataStoreRequest::FetchOrAdd(request) => &request.key,
            DataStoreRequest::CompareExchange(request) => &request.key,
        }
    }

    /// Get message type name
    pub fn message_type(&self) -> &'static str {
        match self {
            DataStoreRequest::FetchOrAdd(_) => "FetchOrAdd",
            DataStoreRequest::CompareExchange(_) => "CompareExchange",
        }
    }
}

/// Server answer to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DataStoreResponse {
    /// Key created at version 1 with the requester's value
    Added,
    /// Current value, sent because the requester does not have it
    Fetched(ValueRecord),
    /// Requester's desired value stored at `version`
    Exchanged { version: u32 },
    NotFound,
    TypeMismatch,
    #[default]
    UnexpectedError,
}

impl DataStoreResponse {
    pub fn code(&self) -> ResultCode {
        match self {
            DataStoreResponse::Added => ResultCode::Added,
            DataStoreResponse::Fetched(_) => ResultCode::Fetched,
            DataStoreResponse::Exchanged { .. } => ResultCode::Exchanged,
            DataStoreResponse::NotFound => ResultCode::NotFound,
            DataStoreResponse::TypeMismatch => ResultCode::TypeMismatch,
            DataStoreResponse::UnexpectedError => ResultCode::UnexpectedError,
        }
    }

    /// Response for a code that carries no value.
    pub fn from_code(code: ResultCode) -> Self {
        match code {
            ResultCode::Added => DataStoreResponse::Added,
            ResultCode::NotFound => DataStoreResponse::NotFound,
            ResultCode::TypeMismatch => DataStoreResponse::TypeMismatch,
            ResultCode::Fetched | ResultCode::Exchanged | ResultCode::UnexpectedError => {
                DataStoreResponse::UnexpectedError
            }
        }
    }
}

/// Key/record pairs pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReplicationEvent {
    pub values: Vec<(StoreKey, ValueRecord)>,
}

impl ReplicationEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(key: StoreKey, record: ValueRecord) -> Self {
        ReplicationEvent { values: vec![(key, record)] }
    }

    pub fn push(&mut self, key: StoreKey, record: ValueRecord) {
        self.values.push((key, record));
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
