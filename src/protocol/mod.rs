//! Wire protocol between clients and the broker.
//!
//! Format: length (4 bytes BE) | api_key (2 bytes BE) | payload (bincode).

mod codec;

pub use codec::{
    decode_request, decode_response, encode_request, encode_response, CommitOffsetRequest,
    ConsumeRequest, CreateTopicRequest, GetOffsetRequest, HeartbeatRequest, JoinGroupRequest,
    LeaveGroupRequest, ProduceRequest, ProduceResponse, Request, RequestFrame, Response,
    ResponseFrame, SeekRequest, SubscribeRequest, SyncGroupRequest, MAX_FRAME_LEN,
};
