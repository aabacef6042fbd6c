pub mod actor;
pub mod coordinator;

pub use actor::{spawn_server, ServerCommand, ServerHandle};
pub use coordinator::ServerDataStore;
