//! Test fixtures: value types and session clusters

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{ClientConfig, ServerConfig};
use crate::core_client::ClientDataStore;
use crate::core_session::MemorySessionHub;
use crate::impl_custom_data_store_type;

/// Small structured value, well under the compare-exchange threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomTypeTest {
    pub int8_value: i8,
    pub int32_value: i32,
    pub float_value: f32,
    pub int32_array: [i32; 3],
}

impl_custom_data_store_type!(CustomTypeTest);

impl CustomTypeTest {
    pub fn new(int8_value: i8, int32_value: i32, float_value: f32) -> Self {
        let int32_array =
            [int32_value, int32_value.wrapping_add(1), int32_value.wrapping_add(2)];
        CustomTypeTest { int8_value, int32_value, float_value, int32_array }
    }
}

/// Structured value whose encoding exceeds the default compare-exchange
/// threshold, so it is compared by version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LargeCustomType {
    pub values: [i32; 21],
}

impl_custom_data_store_type!(LargeCustomType);

impl LargeCustomType {
    pub fn filled(value: i32) -> Self {
        LargeCustomType { values: [value; 21] }
    }
}

/// A session server with connected clients
pub struct TestCluster {
    pub hub: MemorySessionHub,
    pub clients: Vec<Arc<ClientDataStore>>,
}

impl TestCluster {
    pub fn builder() -> TestClusterBuilder {
        TestClusterBuilder::default()
    }

    pub fn client(&self, index: usize) -> &Arc<ClientDataStore> {
        &self.clients[index]
    }

    /// Connect one more client with the cluster's client settings.
    pub async fn join(&mut self, config: &ClientConfig) -> Arc<ClientDataStore> {
        let client = self.hub.connect_client(config).await.expect("client failed to connect");
        self.clients.push(client.clone());
        client
    }
}

pub struct TestClusterBuilder {
    clients: usize,
    server: ServerConfig,
    client: ClientConfig,
}

impl Default for TestClusterBuilder {
    fn default() -> Self {
        TestClusterBuilder { clients: 2, server: ServerConfig::default(), client: ClientConfig::default() }
    }
}

impl TestClusterBuilder {
    pub fn clients(mut self, clients: usize) -> Self {
        self.clients = clients;
        self
    }

    pub fn replication(mut self, enabled: bool) -> Self {
        self.server.content_replication_enabled = enabled;
        self
    }

    pub fn client_config(mut self, config: ClientConfig) -> Self {
        self.client = config;
        self
    }

    pub async fn build(self) -> TestCluster {
        let hub = MemorySessionHub::start(&self.server);
        let mut clients = Vec::with_capacity(self.clients);
        for _ in 0..self.clients {
            clients.push(hub.connect_client(&self.client).await.expect("client failed to connect"));
        }
        TestCluster { hub, clients }
    }
}
