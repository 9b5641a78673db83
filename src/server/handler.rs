//! Handle client connections: decode requests, call the core, encode responses.

use crate::broker::Broker;
use crate::coordinator::GroupCoordinator;
use crate::error::{EmberlogError, Result};
use crate::protocol::{
    decode_request, encode_response, ProduceResponse, Request, RequestFrame, Response,
    ResponseFrame,
};
use crate::types::Message;
use bytes::BytesMut;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, error, info};

/// Run the TCP server loop (accept and spawn per-connection handler).
pub async fn run_server(
    broker: Arc<Broker>,
    coordinator: Arc<GroupCoordinator>,
    addr: &str,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    run_server_on_listener(broker, coordinator, listener).await
}

pub async fn run_server_on_listener(
    broker: Arc<Broker>,
    coordinator: Arc<GroupCoordinator>,
    listener: tokio::net::TcpListener,
) -> Result<()> {
    let addr = listener.local_addr()?;
    info!("Emberlog server listening on {}", addr);
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(x) => x,
            Err(e) => {
                error!("accept error: {}", e);
                continue;
            }
        };
        let broker = Arc::clone(&broker);
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            debug!("client connected {}", peer);
            if let Err(e) = handle_connection(&broker, &coordinator, stream).await {
                error!("connection {} error: {}", peer, e);
            }
            debug!("client disconnected {}", peer);
        });
    }
}

async fn handle_connection(
    broker: &Broker,
    coordinator: &GroupCoordinator,
    mut stream: TcpStream,
) -> Result<()> {
    let mut read_buf = BytesMut::with_capacity(4096);
    loop {
        read_buf.reserve(4096);
        let n = stream.read_buf(&mut read_buf).await?;
        if n == 0 {
            break;
        }
        while let Some(frame) = decode_request(&mut read_buf)? {
            let resp = dispatch(broker, coordinator, frame);
            let mut write_buf = BytesMut::new();
            encode_response(&resp, &mut write_buf)?;
            stream.write_all(&write_buf).await?;
            stream.flush().await?;
        }
    }
    Ok(())
}

/// Run one request against the core. Failures become `Response::Error`
/// carrying the error's message.
pub fn dispatch(
    broker: &Broker,
    coordinator: &GroupCoordinator,
    frame: RequestFrame,
) -> ResponseFrame {
    let RequestFrame {
        request_id,
        request,
    } = frame;
    let kind = request.kind();
    let response = match handle(broker, coordinator, request) {
        Ok(r) => r,
        Err(e) => {
            debug!(request_id, kind, "request failed: {}", e);
            Response::Error(e.to_string())
        }
    };
    ResponseFrame {
        request_id,
        response,
    }
}

fn handle(broker: &Broker, coordinator: &GroupCoordinator, request: Request) -> Result<Response> {
    match request {
        Request::CreateTopic(r) => {
            if broker.create_topic(&r.topic_name, r.partition_count)? {
                coordinator.rebalance_subscribers(&r.topic_name);
            }
            Ok(Response::CreateTopic)
        }
        Request::Produce(r) => {
            let message = Message::new(r.value)
                .with_key(r.partition_key)
                .with_headers(r.headers);
            let (partition_id, offset) = broker.produce(&r.topic_name, message)?;
            Ok(Response::Produce(ProduceResponse {
                partition_id,
                offset,
            }))
        }
        Request::Consume(r) => {
            let max = usize::try_from(r.max_messages).map_err(|_| {
                EmberlogError::InvalidArgument(format!(
                    "max_messages must not be negative: {}",
                    r.max_messages
                ))
            })?;
            let messages = broker.consume(&r.topic_name, r.partition_id, r.offset, max)?;
            Ok(Response::Consume(messages))
        }
        Request::Subscribe(r) => {
            for topic in &r.topics {
                broker.topic(topic)?;
            }
            Ok(Response::Subscribe)
        }
        Request::Seek(r) => {
            // the cursor itself lives in the client
            broker.validate_partition(&r.topic, r.partition_id)?;
            Ok(Response::Seek)
        }
        Request::JoinGroup(r) => {
            let resp = coordinator.join_group_with_timeout(
                &r.group_id,
                &r.consumer_id,
                &r.topics,
                r.session_timeout_ms.map(Duration::from_millis),
            )?;
            Ok(Response::JoinGroup(resp))
        }
        Request::LeaveGroup(r) => {
            coordinator.leave_group(&r.group_id, &r.consumer_id)?;
            Ok(Response::LeaveGroup)
        }
        Request::SyncGroup(r) => {
            let assignment = coordinator.sync_group(&r.group_id, &r.consumer_id, r.generation)?;
            Ok(Response::SyncGroup(assignment))
        }
        Request::Heartbeat(r) => {
            let resp = coordinator.heartbeat(&r.group_id, &r.consumer_id, r.generation)?;
            Ok(Response::Heartbeat(resp))
        }
        Request::CommitOffset(r) => {
            coordinator.commit_offsets(&r.group_id, &r.consumer_id, r.generation, &r.offsets)?;
            Ok(Response::CommitOffset)
        }
        Request::GetOffset(r) => {
            let offset = coordinator.get_offset(&r.group_id, &r.topic, r.partition_id)?;
            Ok(Response::GetOffset(offset))
        }
        Request::ListTopics => Ok(Response::ListTopics(broker.list_topics())),
    }
}
