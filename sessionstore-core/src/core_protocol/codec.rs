//! Wire codec for data store messages.
//!
//! Frames are plain bincode encodings. Oversized frames are rejected on both
//! ends before any allocation based on their content.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::core_types::{from_bytes, to_bytes, CodecError};

use super::messages::{DataStoreRequest, DataStoreResponse, ReplicationEvent};

/// Maximum frame size accepted by the codec (16 MiB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

fn encode_frame<M: Serialize>(message: &M) -> Result<Vec<u8>, CodecError> {
    let bytes = to_bytes(message)?;
    if bytes.len() > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge { size: bytes.len(), max: MAX_FRAME_SIZE });
    }
    Ok(bytes)
}

fn decode_frame<M: DeserializeOwned>(bytes: &[u8]) -> Result<M, CodecError> {
    if bytes.len() > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge { size: bytes.len(), max: MAX_FRAME_SIZE });
    }
    from_bytes(bytes)
}

pub fn encode_request(request: &DataStoreRequest) -> Result<Vec<u8>, CodecError> {
    encode_frame(request)
}

pub fn decode_request(bytes: &[u8]) -> Result<DataStoreRequest, CodecError> {
    decode_frame(bytes)
}

pub fn encode_response(response: &DataStoreResponse) -> Result<Vec<u8>, CodecError> {
    encode_frame(response)
}

pub fn decode_response(bytes: &[u8]) -> Result<DataStoreResponse, CodecError> {
    decode_frame(bytes)
}

pub fn encode_event(event: &ReplicationEvent) -> Result<Vec<u8>, CodecError> {
    encode_frame(event)
}

pub fn decode_event(bytes: &[u8]) -> Result<ReplicationEvent, CodecError> {
    decode_frame(bytes)
}
