/*
    In-process session transport

    MemorySessionHub hosts one ServerDataStore on an actor task and hands out
    client sessions bound to it. Requests, responses and replication events are
    all encoded with the wire codec, so the hub exercises exactly the bytes a
    networked transport would carry.

    Connection lifecycle of a client endpoint:
    1. create_client_session(): endpoint registered, not yet connected
    2. register_event_sink(): done by ClientDataStore on construction
    3. connect(): endpoint marked connected, server notified; any full state
       sync is delivered to the sink before connect() returns
    4. drop: endpoint removed, server notified
*/

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::config::{ClientConfig, ServerConfig};
use crate::core_client::ClientDataStore;
use crate::core_protocol::{
    decode_event, decode_response, encode_event, encode_request, DataStoreRequest,
    DataStoreResponse, ReplicationEvent,
};
use crate::core_server::{spawn_server, ServerDataStore, ServerHandle};

use super::{ClientSession, EndpointId, ReplicationEventSink, ServerSession, SessionError};

#[derive(Default)]
struct EndpointSlot {
    connected: bool,
    sink: Option<Weak<dyn ReplicationEventSink>>,
}

#[derive(Default)]
struct EndpointRegistry {
    endpoints: RwLock<HashMap<EndpointId, EndpointSlot>>,
}

impl EndpointRegistry {
    fn add(&self, endpoint: EndpointId) {
        self.endpoints.write().insert(endpoint, EndpointSlot::default());
    }

    fn remove(&self, endpoint: &EndpointId) {
        self.endpoints.write().remove(endpoint);
    }

    fn set_connected(&self, endpoint: &EndpointId, connected: bool) {
        if let Some(slot) = self.endpoints.write().get_mut(endpoint) {
            slot.connected = connected;
        }
    }

    fn is_connected(&self, endpoint: &EndpointId) -> bool {
        self.endpoints.read().get(endpoint).map(|slot| slot.connected).unwrap_or(false)
    }

    fn set_sink(&self, endpoint: &EndpointId, sink: Option<Weak<dyn ReplicationEventSink>>) {
        if let Some(slot) = self.endpoints.write().get_mut(endpoint) {
            slot.sink = sink;
        }
    }

    fn connected(&self) -> Vec<EndpointId> {
        self.endpoints
            .read()
            .iter()
            .filter(|(_, slot)| slot.connected)
            .map(|(id, _)| *id)
            .collect()
    }

    fn live_sinks(&self, recipients: &[EndpointId]) -> Vec<(EndpointId, Arc<dyn ReplicationEventSink>)> {
        let endpoints = self.endpoints.read();
        recipients
            .iter()
            .filter_map(|id| {
                let slot = endpoints.get(id).filter(|slot| slot.connected)?;
                let sink = slot.sink.as_ref()?.upgrade()?;
                Some((*id, sink))
            })
            .collect()
    }
}

/// Server half of the in-process transport.
pub struct MemoryServerSession {
    registry: Arc<EndpointRegistry>,
}

impl ServerSession for MemoryServerSession {
    fn client_endpoint_ids(&self) -> Vec<EndpointId> {
        self.registry.connected()
    }

    fn send_event(&self, recipients: &[EndpointId], event: &ReplicationEvent) {
        let frame = match encode_event(event) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to encode replication event: {}", e);
                return;
            }
        };

        // Sinks are called with the registry unlocked; a sink may drop the last
        // reference to its client, which unregisters the endpoint.
        for (endpoint, sink) in self.registry.live_sinks(recipients) {
            match decode_event(&frame) {
                Ok(event) => sink.on_replication_event(event),
                Err(e) => warn!(%endpoint, "Dropping undecodable replication event: {}", e),
            }
        }
    }
}

/// Client half of the in-process transport.
pub struct MemoryClientSession {
    endpoint: EndpointId,
    registry: Arc<EndpointRegistry>,
    server: ServerHandle,
}

impl MemoryClientSession {
    /// Join the session. Returns once the server has processed the connection,
    /// including any initial replication to this endpoint.
    pub async fn connect(&self) -> Result<(), SessionError> {
        self.registry.set_connected(&self.endpoint, true);
        if let Err(e) = self.server.client_connected(self.endpoint).await {
            self.registry.set_connected(&self.endpoint, false);
            return Err(e);
        }
        debug!(endpoint = %self.endpoint, "Client session connected");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.registry.is_connected(&self.endpoint)
    }
}

#[async_trait]
impl ClientSession for MemoryClientSession {
    fn endpoint_id(&self) -> EndpointId {
        self.endpoint
    }

    async fn send_request(
        &self,
        request: DataStoreRequest,
    ) -> Result<DataStoreResponse, SessionError> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected(self.endpoint));
        }
        let frame = encode_request(&request)?;
        let reply = self.server.request(self.endpoint, frame).await?;
        Ok(decode_response(&reply)?)
    }

    fn register_event_sink(&self, sink: Weak<dyn ReplicationEventSink>) {
        self.registry.set_sink(&self.endpoint, Some(sink));
    }

    fn unregister_event_sink(&self) {
        self.registry.set_sink(&self.endpoint, None);
    }
}

impl Drop for MemoryClientSession {
    fn drop(&mut self) {
        self.registry.remove(&self.endpoint);
        self.server.client_disconnected(self.endpoint);
    }
}

/// Hosts a session server and its clients within one process.
pub struct MemorySessionHub {
    registry: Arc<EndpointRegistry>,
    server: ServerHandle,
    server_task: JoinHandle<()>,
}

impl MemorySessionHub {
    /// Spawn the server actor. Must be called from within a tokio runtime.
    pub fn start(config: &ServerConfig) -> Self {
        let registry = Arc::new(EndpointRegistry::default());
        let session = Arc::new(MemoryServerSession { registry: registry.clone() });
        let (server, server_task) = spawn_server(ServerDataStore::with_config(session, config));
        MemorySessionHub { registry, server, server_task }
    }

    pub fn with_replication(content_replication_enabled: bool) -> Self {
        Self::start(&ServerConfig { content_replication_enabled })
    }

    /// Register a new, not yet connected, client endpoint.
    pub fn create_client_session(&self) -> Arc<MemoryClientSession> {
        let endpoint = EndpointId::new();
        self.registry.add(endpoint);
        Arc::new(MemoryClientSession {
            endpoint,
            registry: self.registry.clone(),
            server: self.server.clone(),
        })
    }

    /// Create a client data store and connect it to the session.
    pub async fn connect_client(
        &self,
        config: &ClientConfig,
    ) -> Result<Arc<ClientDataStore>, SessionError> {
        let session = self.create_client_session();
        let client = ClientDataStore::with_config(session.clone(), config);
        session.connect().await?;
        Ok(client)
    }

    pub fn server(&self) -> &ServerHandle {
        &self.server
    }

    pub fn connected_clients(&self) -> usize {
        self.registry.connected().len()
    }

    /// Stop the server actor and wait for it to exit.
    pub async fn shutdown(self) -> Result<(), SessionError> {
        self.server.shutdown().await?;
        if let Err(e) = self.server_task.await {
            error!("Server task failed: {}", e);
        }
        Ok(())
    }
}
