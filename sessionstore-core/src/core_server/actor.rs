/*
    Server actor

    Owns a ServerDataStore on a dedicated task and feeds it one command at a
    time from an mpsc channel. This is what makes the coordinator's single
    threaded contract hold no matter how many clients talk to it.

    ServerHandle is the cloneable front of the actor:
        request(endpoint, frame)      -> response frame
        client_connected(endpoint)    -> resolves once the endpoint is synced
        client_disconnected(endpoint) -> fire and forget
        shutdown()
*/

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core_session::{EndpointId, SessionError};

use super::coordinator::ServerDataStore;

const COMMAND_CHANNEL_CAPACITY: usize = 100;

/// Commands processed by the server actor
#[derive(Debug)]
pub enum ServerCommand {
    /// Encoded request from a client, answered with an encoded response
    Request {
        requester: EndpointId,
        frame: Vec<u8>,
        response_tx: oneshot::Sender<Vec<u8>>,
    },
    ClientConnected {
        endpoint: EndpointId,
        ack: oneshot::Sender<()>,
    },
    ClientDisconnected {
        endpoint: EndpointId,
    },
    Shutdown,
}

/// Handle to a running server actor
#[derive(Clone)]
pub struct ServerHandle {
    command_tx: mpsc::Sender<ServerCommand>,
}

impl ServerHandle {
    pub async fn request(
        &self,
        requester: EndpointId,
        frame: Vec<u8>,
    ) -> Result<Vec<u8>, SessionError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(ServerCommand::Request { requester, frame, response_tx })
            .await
            .map_err(|_| SessionError::ServerUnavailable)?;
        response_rx.await.map_err(|_| SessionError::ResponseDropped)
    }

    pub async fn client_connected(&self, endpoint: EndpointId) -> Result<(), SessionError> {
        let (ack, ack_rx) = oneshot::channel();
        self.command_tx
            .send(ServerCommand::ClientConnected { endpoint, ack })
            .await
            .map_err(|_| SessionError::ServerUnavailable)?;
        ack_rx.await.map_err(|_| SessionError::ResponseDropped)
    }

    /// Notify the server without waiting. Usable from `Drop`.
    pub fn client_disconnected(&self, endpoint: EndpointId) {
        if self.command_tx.try_send(ServerCommand::ClientDisconnected { endpoint }).is_err() {
            debug!(%endpoint, "Server gone or busy, disconnect notification dropped");
        }
    }

    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.command_tx
            .send(ServerCommand::Shutdown)
            .await
            .map_err(|_| SessionError::ServerUnavailable)
    }

    pub fn is_running(&self) -> bool {
        !self.command_tx.is_closed()
    }
}

/// Move `server` onto its own task and return a handle to it.
pub fn spawn_server(server: ServerDataStore) -> (ServerHandle, JoinHandle<()>) {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let task = tokio::spawn(run(server, command_rx));
    (ServerHandle { command_tx }, task)
}

async fn run(mut server: ServerDataStore, mut command_rx: mpsc::Receiver<ServerCommand>) {
    info!(
        content_replication = server.content_replication_enabled(),
        "Session server started"
    );

    while let Some(command) = command_rx.recv().await {
        match command {
            ServerCommand::Request { requester, frame, response_tx } => {
                let reply = server.handle_encoded_request(requester, &frame);
                if response_tx.send(reply).is_err() {
                    warn!(%requester, "Requester went away before its response was sent");
                }
            }
            ServerCommand::ClientConnected { endpoint, ack } => {
                server.on_client_connected(endpoint);
                let _ = ack.send(());
            }
            ServerCommand::ClientDisconnected { endpoint } => {
                server.on_client_disconnected(endpoint);
            }
            ServerCommand::Shutdown => break,
        }
    }

    info!(entries = server.store().size(), "Session server stopped");
}
