/*
    Session - transport seam between data store clients and the session server

    The data store does not own a transport. It talks to one through two traits:
    - ClientSession: request/response to the server plus delivery of server
      pushed replication events to a registered sink
    - ServerSession: the set of connected client endpoints and event delivery
      to a chosen subset of them

    `memory` provides an in-process implementation where every message still
    goes through the wire codec.
*/

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Weak;
use thiserror::Error;
use uuid::Uuid;

use crate::core_protocol::{DataStoreRequest, DataStoreResponse, ReplicationEvent};
use crate::core_types::CodecError;

pub use memory::{MemoryClientSession, MemoryServerSession, MemorySessionHub};

/// Identifies one connected participant of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointId(Uuid);

impl EndpointId {
    pub fn new() -> Self {
        EndpointId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EndpointId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport level failures.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session server is not running")]
    ServerUnavailable,

    #[error("Request dropped before a response was produced")]
    ResponseDropped,

    #[error("Endpoint {0} is not connected")]
    NotConnected(EndpointId),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Receiver of replication events pushed by the server.
pub trait ReplicationEventSink: Send + Sync {
    fn on_replication_event(&self, event: ReplicationEvent);
}

/// Client side of a session.
#[async_trait]
pub trait ClientSession: Send + Sync {
    fn endpoint_id(&self) -> EndpointId;

    /// Send one request to the server and wait for its response.
    async fn send_request(
        &self,
        request: DataStoreRequest,
    ) -> Result<DataStoreResponse, SessionError>;

    /// Route replication events for this endpoint to `sink`. Events arriving
    /// after the sink was dropped are discarded.
    fn register_event_sink(&self, sink: Weak<dyn ReplicationEventSink>);

    fn unregister_event_sink(&self);
}

/// Server side of a session.
pub trait ServerSession: Send + Sync {
    /// Endpoints currently connected, in no particular order.
    fn client_endpoint_ids(&self) -> Vec<EndpointId>;

    /// Deliver `event` to each of `recipients`. Unknown endpoints are skipped.
    fn send_event(&self, recipients: &[EndpointId], event: &ReplicationEvent);
}
