pub mod client;
pub mod local;
pub mod notification;

#[cfg(test)]
mod tests;

pub use client::ClientDataStore;
pub use local::LocalDataStore;
pub use notification::ChangeNotificationOptions;
