//! Serialization service
//!
//! Converts wrapped values and protocol messages to and from bytes with
//! `bincode`. Every value stored in a data store goes through here, so two
//! equal values always produce identical payload bytes.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::core_store::{SerializedPayload, TypeName, ValueRecord};

use super::wrapped::{DataStoreType, WrappedValue};

/// Errors produced while encoding or decoding values and messages.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to encode: {0}")]
    Encode(String),

    #[error("Failed to decode: {0}")]
    Decode(String),

    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Type mismatch: stored {stored}, requested {requested}")]
    TypeMismatch { stored: TypeName, requested: TypeName },

    #[error("Payload does not hold a {0}")]
    UnexpectedShape(TypeName),
}

/// Serialize any serde type to bytes.
pub fn to_bytes<M: Serialize + ?Sized>(message: &M) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(message).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Deserialize any serde type from bytes.
pub fn from_bytes<M: DeserializeOwned>(bytes: &[u8]) -> Result<M, CodecError> {
    bincode::deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}

/// Serialize a typed value into the payload stored under its type name.
pub fn encode_value<T: DataStoreType>(value: &T) -> Result<SerializedPayload, CodecError> {
    let wrapped = value.to_wrapped()?;
    Ok(SerializedPayload::new(to_bytes(&wrapped)?))
}

/// Deserialize a payload into `T` without checking the declared type name.
pub fn decode_payload<T: DataStoreType>(payload: &SerializedPayload) -> Result<T, CodecError> {
    let wrapped: WrappedValue = from_bytes(&payload.bytes)?;
    T::from_wrapped(wrapped)
}

/// Deserialize a record into `T`, rejecting records of another type.
pub fn decode_record<T: DataStoreType>(record: &ValueRecord) -> Result<T, CodecError> {
    let requested = T::type_name();
    if record.type_name != requested {
        return Err(CodecError::TypeMismatch { stored: record.type_name.clone(), requested });
    }
    decode_payload(&record.payload)
}
