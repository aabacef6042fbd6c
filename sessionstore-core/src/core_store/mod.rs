pub mod result;
pub mod store;
pub mod value;

pub use result::{ResultCode, StoreResult};
pub use store::{DataStore, UpdatePolicy};
pub use value::{
    SerializedPayload, StoreKey, TypeName, ValueRecord, ValueRecordRef, INITIAL_VERSION,
};
