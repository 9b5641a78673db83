//! Request/response codec (length-prefixed, api_key, bincode payload).
//!
//! Frame: length (4 bytes BE, covers api_key + payload) | api_key (2 bytes BE)
//! | bincode((request_id, body)). Failed responses use `API_ERROR` with the
//! error string as body.

use crate::coordinator::{HeartbeatResponse, JoinGroupResponse};
use crate::error::{EmberlogError, Result};
use crate::types::{Message, OffsetCommit, TopicPartition};
use bytes::{Buf, BytesMut};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Frames above this size are rejected.
pub const MAX_FRAME_LEN: usize = 100 * 1024 * 1024; // 100MB

const API_CREATE_TOPIC: u16 = 0;
const API_PRODUCE: u16 = 1;
const API_CONSUME: u16 = 2;
const API_SUBSCRIBE: u16 = 3;
const API_SEEK: u16 = 4;
const API_JOIN_GROUP: u16 = 5;
const API_LEAVE_GROUP: u16 = 6;
const API_SYNC_GROUP: u16 = 7;
const API_HEARTBEAT: u16 = 8;
const API_COMMIT_OFFSET: u16 = 9;
const API_GET_OFFSET: u16 = 10;
const API_LIST_TOPICS: u16 = 11;
const API_ERROR: u16 = u16::MAX;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTopicRequest {
    pub topic_name: String,
    pub partition_count: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProduceRequest {
    pub topic_name: String,
    pub partition_key: Vec<u8>,
    pub value: Vec<u8>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumeRequest {
    pub topic_name: String,
    pub partition_id: i32,
    pub offset: i64,
    pub max_messages: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeekRequest {
    pub topic: String,
    pub partition_id: i32,
    pub offset: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinGroupRequest {
    pub group_id: String,
    pub consumer_id: String,
    pub topics: Vec<String>,
    /// Member session timeout; the coordinator default when `None`.
    pub session_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveGroupRequest {
    pub group_id: String,
    pub consumer_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncGroupRequest {
    pub group_id: String,
    pub consumer_id: String,
    pub generation: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub group_id: String,
    pub consumer_id: String,
    pub generation: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitOffsetRequest {
    pub group_id: String,
    pub consumer_id: String,
    pub generation: i32,
    pub offsets: Vec<OffsetCommit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetOffsetRequest {
    pub group_id: String,
    pub topic: String,
    pub partition_id: i32,
}

/// Client request; one variant per request kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    CreateTopic(CreateTopicRequest),
    Produce(ProduceRequest),
    Consume(ConsumeRequest),
    Subscribe(SubscribeRequest),
    Seek(SeekRequest),
    JoinGroup(JoinGroupRequest),
    LeaveGroup(LeaveGroupRequest),
    SyncGroup(SyncGroupRequest),
    Heartbeat(HeartbeatRequest),
    CommitOffset(CommitOffsetRequest),
    GetOffset(GetOffsetRequest),
    ListTopics,
}

impl Request {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::CreateTopic(_) => "create_topic",
            Request::Produce(_) => "produce",
            Request::Consume(_) => "consume",
            Request::Subscribe(_) => "subscribe",
            Request::Seek(_) => "seek",
            Request::JoinGroup(_) => "join_group",
            Request::LeaveGroup(_) => "leave_group",
            Request::SyncGroup(_) => "sync_group",
            Request::Heartbeat(_) => "heartbeat",
            Request::CommitOffset(_) => "commit_offset",
            Request::GetOffset(_) => "get_offset",
            Request::ListTopics => "list_topics",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProduceResponse {
    pub partition_id: i32,
    pub offset: i64,
}

/// Server response; `Error` is the failure indicator.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    CreateTopic,
    Produce(ProduceResponse),
    Consume(Vec<Message>),
    Subscribe,
    Seek,
    JoinGroup(JoinGroupResponse),
    LeaveGroup,
    SyncGroup(Vec<TopicPartition>),
    Heartbeat(HeartbeatResponse),
    CommitOffset,
    GetOffset(i64),
    ListTopics(Vec<String>),
    Error(String),
}

impl Response {
    pub fn is_success(&self) -> bool {
        !matches!(self, Response::Error(_))
    }
}

/// A request with its correlation id.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestFrame {
    pub request_id: u64,
    pub request: Request,
}

/// A response echoing the correlation id of its request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseFrame {
    pub request_id: u64,
    pub response: Response,
}

/// Decode a single request from `src`, consuming its frame. `None` until a
/// full frame is buffered.
pub fn decode_request(src: &mut BytesMut) -> Result<Option<RequestFrame>> {
    let Some((api_key, payload)) = split_frame(src)? else {
        return Ok(None);
    };
    let frame = match api_key {
        API_CREATE_TOPIC => body(&payload, Request::CreateTopic)?,
        API_PRODUCE => body(&payload, Request::Produce)?,
        API_CONSUME => body(&payload, Request::Consume)?,
        API_SUBSCRIBE => body(&payload, Request::Subscribe)?,
        API_SEEK => body(&payload, Request::Seek)?,
        API_JOIN_GROUP => body(&payload, Request::JoinGroup)?,
        API_LEAVE_GROUP => body(&payload, Request::LeaveGroup)?,
        API_SYNC_GROUP => body(&payload, Request::SyncGroup)?,
        API_HEARTBEAT => body(&payload, Request::Heartbeat)?,
        API_COMMIT_OFFSET => body(&payload, Request::CommitOffset)?,
        API_GET_OFFSET => body(&payload, Request::GetOffset)?,
        API_LIST_TOPICS => body(&payload, |()| Request::ListTopics)?,
        _ => {
            return Err(EmberlogError::Protocol(format!(
                "Unknown api_key {}",
                api_key
            )))
        }
    };
    Ok(Some(RequestFrame {
        request_id: frame.0,
        request: frame.1,
    }))
}

pub fn encode_request(frame: &RequestFrame, dst: &mut BytesMut) -> Result<()> {
    let id = frame.request_id;
    let (api_key, payload) = match &frame.request {
        Request::CreateTopic(r) => (API_CREATE_TOPIC, serialize(id, r)?),
        Request::Produce(r) => (API_PRODUCE, serialize(id, r)?),
        Request::Consume(r) => (API_CONSUME, serialize(id, r)?),
        Request::Subscribe(r) => (API_SUBSCRIBE, serialize(id, r)?),
        Request::Seek(r) => (API_SEEK, serialize(id, r)?),
        Request::JoinGroup(r) => (API_JOIN_GROUP, serialize(id, r)?),
        Request::LeaveGroup(r) => (API_LEAVE_GROUP, serialize(id, r)?),
        Request::SyncGroup(r) => (API_SYNC_GROUP, serialize(id, r)?),
        Request::Heartbeat(r) => (API_HEARTBEAT, serialize(id, r)?),
        Request::CommitOffset(r) => (API_COMMIT_OFFSET, serialize(id, r)?),
        Request::GetOffset(r) => (API_GET_OFFSET, serialize(id, r)?),
        Request::ListTopics => (API_LIST_TOPICS, serialize(id, &())?),
    };
    write_frame(api_key, &payload, dst);
    Ok(())
}

/// Decode a single response from `src`, consuming its frame.
pub fn decode_response(src: &mut BytesMut) -> Result<Option<ResponseFrame>> {
    let Some((api_key, payload)) = split_frame(src)? else {
        return Ok(None);
    };
    let frame = match api_key {
        API_CREATE_TOPIC => body(&payload, |()| Response::CreateTopic)?,
        API_PRODUCE => body(&payload, Response::Produce)?,
        API_CONSUME => body(&payload, Response::Consume)?,
        API_SUBSCRIBE => body(&payload, |()| Response::Subscribe)?,
        API_SEEK => body(&payload, |()| Response::Seek)?,
        API_JOIN_GROUP => body(&payload, Response::JoinGroup)?,
        API_LEAVE_GROUP => body(&payload, |()| Response::LeaveGroup)?,
        API_SYNC_GROUP => body(&payload, Response::SyncGroup)?,
        API_HEARTBEAT => body(&payload, Response::Heartbeat)?,
        API_COMMIT_OFFSET => body(&payload, |()| Response::CommitOffset)?,
        API_GET_OFFSET => body(&payload, Response::GetOffset)?,
        API_LIST_TOPICS => body(&payload, Response::ListTopics)?,
        API_ERROR => body(&payload, Response::Error)?,
        _ => {
            return Err(EmberlogError::Protocol(format!(
                "Unknown response api_key {}",
                api_key
            )))
        }
    };
    Ok(Some(ResponseFrame {
        request_id: frame.0,
        response: frame.1,
    }))
}

/// Encode response into dst.
pub fn encode_response(frame: &ResponseFrame, dst: &mut BytesMut) -> Result<()> {
    let id = frame.request_id;
    let (api_key, payload) = match &frame.response {
        Response::CreateTopic => (API_CREATE_TOPIC, serialize(id, &())?),
        Response::Produce(r) => (API_PRODUCE, serialize(id, r)?),
        Response::Consume(messages) => (API_CONSUME, serialize(id, messages)?),
        Response::Subscribe => (API_SUBSCRIBE, serialize(id, &())?),
        Response::Seek => (API_SEEK, serialize(id, &())?),
        Response::JoinGroup(r) => (API_JOIN_GROUP, serialize(id, r)?),
        Response::LeaveGroup => (API_LEAVE_GROUP, serialize(id, &())?),
        Response::SyncGroup(assignment) => (API_SYNC_GROUP, serialize(id, assignment)?),
        Response::Heartbeat(r) => (API_HEARTBEAT, serialize(id, r)?),
        Response::CommitOffset => (API_COMMIT_OFFSET, serialize(id, &())?),
        Response::GetOffset(offset) => (API_GET_OFFSET, serialize(id, offset)?),
        Response::ListTopics(topics) => (API_LIST_TOPICS, serialize(id, topics)?),
        Response::Error(msg) => (API_ERROR, serialize(id, msg)?), // error sentinel
    };
    write_frame(api_key, &payload, dst);
    Ok(())
}

/// Split off one complete frame as (api_key, payload).
fn split_frame(src: &mut BytesMut) -> Result<Option<(u16, BytesMut)>> {
    if src.len() < 4 {
        return Ok(None);
    }
    let len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
    if len < 2 {
        return Err(EmberlogError::Protocol(format!("Frame too short: {}", len)));
    }
    if len > MAX_FRAME_LEN {
        return Err(EmberlogError::Protocol(format!("Frame too large: {}", len)));
    }
    if src.len() < 4 + len {
        return Ok(None);
    }
    let mut frame = src.split_to(4 + len);
    frame.advance(4);
    let api_key = frame.get_u16();
    Ok(Some((api_key, frame)))
}

fn write_frame(api_key: u16, payload: &[u8], dst: &mut BytesMut) {
    let frame_len = 2 + payload.len();
    dst.reserve(4 + frame_len);
    dst.extend_from_slice(&(frame_len as u32).to_be_bytes());
    dst.extend_from_slice(&api_key.to_be_bytes());
    dst.extend_from_slice(payload);
}

fn serialize<T: Serialize>(request_id: u64, body: &T) -> Result<Vec<u8>> {
    bincode::serialize(&(request_id, body)).map_err(|e| EmberlogError::Protocol(e.to_string()))
}

fn body<T, R, F>(payload: &[u8], wrap: F) -> Result<(u64, R)>
where
    T: DeserializeOwned,
    F: FnOnce(T) -> R,
{
    let (request_id, body): (u64, T) =
        bincode::deserialize(payload).map_err(|e| EmberlogError::Protocol(e.to_string()))?;
    Ok((request_id, wrap(body)))
}
