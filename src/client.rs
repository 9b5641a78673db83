//! Async TCP client for the broker protocol.

use crate::coordinator::{HeartbeatResponse, JoinGroupResponse};
use crate::error::{EmberlogError, Result};
use crate::protocol::{
    decode_response, encode_request, CommitOffsetRequest, ConsumeRequest, CreateTopicRequest,
    GetOffsetRequest, HeartbeatRequest, JoinGroupRequest, LeaveGroupRequest, ProduceRequest,
    ProduceResponse, Request, RequestFrame, Response, ResponseFrame, SeekRequest,
    SubscribeRequest, SyncGroupRequest,
};
use crate::types::{Message, OffsetCommit, TopicPartition};
use bytes::BytesMut;
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// One connection to a broker. Requests are sent one at a time and matched
/// to their response by correlation id.
pub struct BrokerClient {
    stream: TcpStream,
    read_buf: BytesMut,
    next_request_id: u64,
}

impl BrokerClient {
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            read_buf: BytesMut::with_capacity(4096),
            next_request_id: 1,
        })
    }

    /// Send a request and wait for its response. A failed response becomes
    /// `EmberlogError::Remote` with the broker's message.
    pub async fn request(&mut self, request: Request) -> Result<Response> {
        let request_id = self.next_request_id;
        self.next_request_id += 1;

        let mut out = BytesMut::new();
        encode_request(
            &RequestFrame {
                request_id,
                request,
            },
            &mut out,
        )?;
        self.stream.write_all(&out).await?;
        self.stream.flush().await?;

        let frame = self.read_response().await?;
        if frame.request_id != request_id {
            return Err(EmberlogError::Protocol(format!(
                "response for request {} while waiting for {}",
                frame.request_id, request_id
            )));
        }
        match frame.response {
            Response::Error(msg) => Err(EmberlogError::Remote(msg)),
            other => Ok(other),
        }
    }

    async fn read_response(&mut self) -> Result<ResponseFrame> {
        loop {
            if let Some(frame) = decode_response(&mut self.read_buf)? {
                return Ok(frame);
            }
            self.read_buf.reserve(4096);
            if self.stream.read_buf(&mut self.read_buf).await? == 0 {
                return Err(EmberlogError::Protocol("connection closed by broker".into()));
            }
        }
    }

    pub async fn create_topic(&mut self, topic_name: &str, partition_count: i32) -> Result<()> {
        let req = Request::CreateTopic(CreateTopicRequest {
            topic_name: topic_name.to_string(),
            partition_count,
        });
        match self.request(req).await? {
            Response::CreateTopic => Ok(()),
            other => Err(unexpected("create_topic", &other)),
        }
    }

    pub async fn produce(
        &mut self,
        topic_name: &str,
        partition_key: &[u8],
        value: &[u8],
        headers: HashMap<String, String>,
    ) -> Result<ProduceResponse> {
        let req = Request::Produce(ProduceRequest {
            topic_name: topic_name.to_string(),
            partition_key: partition_key.to_vec(),
            value: value.to_vec(),
            headers,
        });
        match self.request(req).await? {
            Response::Produce(r) => Ok(r),
            other => Err(unexpected("produce", &other)),
        }
    }

    pub async fn consume(
        &mut self,
        topic_name: &str,
        partition_id: i32,
        offset: i64,
        max_messages: i32,
    ) -> Result<Vec<Message>> {
        let req = Request::Consume(ConsumeRequest {
            topic_name: topic_name.to_string(),
            partition_id,
            offset,
            max_messages,
        });
        match self.request(req).await? {
            Response::Consume(messages) => Ok(messages),
            other => Err(unexpected("consume", &other)),
        }
    }

    pub async fn subscribe(&mut self, topics: &[String]) -> Result<()> {
        let req = Request::Subscribe(SubscribeRequest {
            topics: topics.to_vec(),
        });
        match self.request(req).await? {
            Response::Subscribe => Ok(()),
            other => Err(unexpected("subscribe", &other)),
        }
    }

    pub async fn seek(&mut self, topic: &str, partition_id: i32, offset: i64) -> Result<()> {
        let req = Request::Seek(SeekRequest {
            topic: topic.to_string(),
            partition_id,
            offset,
        });
        match self.request(req).await? {
            Response::Seek => Ok(()),
            other => Err(unexpected("seek", &other)),
        }
    }

    pub async fn join_group(
        &mut self,
        group_id: &str,
        consumer_id: &str,
        topics: &[String],
        session_timeout: Option<Duration>,
    ) -> Result<JoinGroupResponse> {
        let req = Request::JoinGroup(JoinGroupRequest {
            group_id: group_id.to_string(),
            consumer_id: consumer_id.to_string(),
            topics: topics.to_vec(),
            session_timeout_ms: session_timeout.map(|d| d.as_millis() as u64),
        });
        match self.request(req).await? {
            Response::JoinGroup(r) => Ok(r),
            other => Err(unexpected("join_group", &other)),
        }
    }

    pub async fn leave_group(&mut self, group_id: &str, consumer_id: &str) -> Result<()> {
        let req = Request::LeaveGroup(LeaveGroupRequest {
            group_id: group_id.to_string(),
            consumer_id: consumer_id.to_string(),
        });
        match self.request(req).await? {
            Response::LeaveGroup => Ok(()),
            other => Err(unexpected("leave_group", &other)),
        }
    }

    pub async fn sync_group(
        &mut self,
        group_id: &str,
        consumer_id: &str,
        generation: i32,
    ) -> Result<Vec<TopicPartition>> {
        let req = Request::SyncGroup(SyncGroupRequest {
            group_id: group_id.to_string(),
            consumer_id: consumer_id.to_string(),
            generation,
        });
        match self.request(req).await? {
            Response::SyncGroup(assignment) => Ok(assignment),
            other => Err(unexpected("sync_group", &other)),
        }
    }

    pub async fn heartbeat(
        &mut self,
        group_id: &str,
        consumer_id: &str,
        generation: i32,
    ) -> Result<HeartbeatResponse> {
        let req = Request::Heartbeat(HeartbeatRequest {
            group_id: group_id.to_string(),
            consumer_id: consumer_id.to_string(),
            generation,
        });
        match self.request(req).await? {
            Response::Heartbeat(r) => Ok(r),
            other => Err(unexpected("heartbeat", &other)),
        }
    }

    pub async fn commit_offsets(
        &mut self,
        group_id: &str,
        consumer_id: &str,
        generation: i32,
        offsets: Vec<OffsetCommit>,
    ) -> Result<()> {
        let req = Request::CommitOffset(CommitOffsetRequest {
            group_id: group_id.to_string(),
            consumer_id: consumer_id.to_string(),
            generation,
            offsets,
        });
        match self.request(req).await? {
            Response::CommitOffset => Ok(()),
            other => Err(unexpected("commit_offset", &other)),
        }
    }

    pub async fn get_offset(
        &mut self,
        group_id: &str,
        topic: &str,
        partition_id: i32,
    ) -> Result<i64> {
        let req = Request::GetOffset(GetOffsetRequest {
            group_id: group_id.to_string(),
            topic: topic.to_string(),
            partition_id,
        });
        match self.request(req).await? {
            Response::GetOffset(offset) => Ok(offset),
            other => Err(unexpected("get_offset", &other)),
        }
    }

    pub async fn list_topics(&mut self) -> Result<Vec<String>> {
        match self.request(Request::ListTopics).await? {
            Response::ListTopics(topics) => Ok(topics),
            other => Err(unexpected("list_topics", &other)),
        }
    }
}

fn unexpected(kind: &str, response: &Response) -> EmberlogError {
    EmberlogError::Protocol(format!("unexpected response to {}: {:?}", kind, response))
}
