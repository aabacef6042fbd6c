//! Replicated key/value store for coordinating shared session state.
//!
//! A session server holds the authoritative value of every key. Each client
//! keeps a cache that is updated from its own acknowledged writes and from
//! values the server pushes, and changes values with versioned
//! compare-exchange.
//!
//! ```no_run
//! use sessionstore_core::config::ClientConfig;
//! use sessionstore_core::core_session::MemorySessionHub;
//!
//! # async fn run() {
//! let hub = MemorySessionHub::with_replication(true);
//! let client = hub.connect_client(&ClientConfig::default()).await.unwrap();
//!
//! let mut id = client.fetch_or_add("CameraId", &0i64).await.into_value().unwrap();
//! loop {
//!     let result = client.compare_exchange("CameraId", &id, &(id + 1)).await;
//!     if result.code() == sessionstore_core::ResultCode::Exchanged {
//!         break;
//!     }
//!     id = result.into_value().unwrap();
//! }
//! # }
//! ```

pub mod config;
pub mod core_client;
pub mod core_protocol;
pub mod core_server;
pub mod core_session;
pub mod core_store;
pub mod core_types;
pub mod logging;
pub mod metrics;

#[cfg(test)]
pub(crate) mod test_utils;

pub use core_client::{ChangeNotificationOptions, ClientDataStore, LocalDataStore};
pub use core_server::ServerDataStore;
pub use core_store::{ResultCode, StoreKey, TypeName, UpdatePolicy};
pub use core_types::{DataStoreResult, DataStoreType, Name, Text};
pub use logging::{init_logging, LogLevel};
