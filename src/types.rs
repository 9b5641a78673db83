//! Core types shared across the broker, coordinator and protocol.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::SystemTime;

/// Offset carried by a message that has not been appended yet.
pub const UNASSIGNED_OFFSET: i64 = -1;

/// Record unit stored in a partition log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Routing key; empty keys always land on partition 0.
    pub key: Vec<u8>,
    /// Payload.
    pub value: Vec<u8>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Creation time in millis since epoch.
    pub timestamp: i64,
    /// Position within the partition, assigned on append.
    pub offset: i64,
}

impl Message {
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: Vec::new(),
            value: value.into(),
            headers: HashMap::new(),
            timestamp: now_millis(),
            offset: UNASSIGNED_OFFSET,
        }
    }

    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// True once the message has been appended to a partition.
    pub fn is_assigned(&self) -> bool {
        self.offset != UNASSIGNED_OFFSET
    }
}

/// A (topic, partition) pair; the unit of group assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: i32,
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

/// One entry of a CommitOffset request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetCommit {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

impl OffsetCommit {
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
        }
    }
}

pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
