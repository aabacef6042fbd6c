pub mod codec;
pub mod messages;

pub use codec::{
    decode_event, decode_request, decode_response, encode_event, encode_request, encode_response,
    MAX_FRAME_SIZE,
};
pub use messages::{
    CompareExchangeRequest, DataStoreRequest, DataStoreResponse, FetchOrAddRequest,
    ReplicationEvent, UNSET_VERSION,
};
