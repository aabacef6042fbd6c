pub mod result;
pub mod serializer;
pub mod wrapped;

pub use result::DataStoreResult;
pub use serializer::{decode_payload, decode_record, encode_value, from_bytes, to_bytes, CodecError};
pub use wrapped::{DataStoreType, Name, Text, WrappedValue};
