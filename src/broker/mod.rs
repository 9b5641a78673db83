//! Broker and topic management.

mod topic;

pub use topic::Topic;

use crate::error::{EmberlogError, Result};
use crate::types::Message;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Central registry: owns the topic namespace, routes produce/consume to
/// partition logs.
///
/// The topic map sits behind one registry-wide read/write lock; each
/// partition log carries its own lock, so appends to different partitions
/// never contend.
#[derive(Default)]
pub struct Broker {
    topics: RwLock<HashMap<String, Arc<Topic>>>,
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a topic. Idempotent: an existing topic is left untouched
    /// whatever partition count is requested. Returns true when the topic
    /// was created by this call.
    pub fn create_topic(&self, name: impl AsRef<str>, num_partitions: i32) -> Result<bool> {
        let name = name.as_ref();
        if name.is_empty() {
            return Err(EmberlogError::InvalidArgument(
                "topic name must not be empty".into(),
            ));
        }
        let mut topics = self.topics.write();
        if topics.contains_key(name) {
            return Ok(false);
        }
        let topic = Topic::new(name, num_partitions);
        info!(
            topic = name,
            partitions = topic.partition_count(),
            "created topic"
        );
        topics.insert(name.to_string(), Arc::new(topic));
        Ok(true)
    }

    pub fn topic(&self, name: &str) -> Result<Arc<Topic>> {
        self.topics
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| EmberlogError::TopicNotFound(name.to_string()))
    }

    /// Produce: route by key and append, return (partition, offset).
    pub fn produce(&self, topic: &str, message: Message) -> Result<(i32, i64)> {
        let topic = self.topic(topic)?;
        Ok(topic.produce(message))
    }

    /// Consume: read up to `max_count` messages from `from_offset`.
    pub fn consume(
        &self,
        topic: &str,
        partition: i32,
        from_offset: i64,
        max_count: usize,
    ) -> Result<Vec<Message>> {
        let log = self.topic(topic)?.partition(partition)?;
        Ok(log.read(from_offset, max_count))
    }

    /// Topic names, sorted.
    pub fn list_topics(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topics.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn num_partitions(&self, topic: &str) -> Result<i32> {
        Ok(self.topic(topic)?.partition_count())
    }

    /// Partition count if the topic exists; used by rebalances, where absent
    /// topics simply contribute nothing.
    pub fn partition_count(&self, topic: &str) -> Option<i32> {
        self.topics.read().get(topic).map(|t| t.partition_count())
    }

    /// High water mark for a partition (next offset to be assigned).
    pub fn high_water_mark(&self, topic: &str, partition: i32) -> Result<i64> {
        Ok(self.topic(topic)?.partition(partition)?.latest_offset())
    }

    /// Fails unless `topic` exists and has `partition`.
    pub fn validate_partition(&self, topic: &str, partition: i32) -> Result<()> {
        self.topic(topic)?.partition(partition).map(|_| ())
    }
}
