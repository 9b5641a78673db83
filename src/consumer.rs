//! Group consumer: join a consumer group, poll assigned partitions, commit offsets.

use crate::client::BrokerClient;
use crate::error::{EmberlogError, Result};
use crate::types::{Message, OffsetCommit, TopicPartition};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

/// Consumer settings.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub group_id: String,
    pub consumer_id: String,
    /// Session timeout requested on join; broker default when `None`.
    pub session_timeout: Option<Duration>,
}

impl ConsumerConfig {
    pub fn new(group_id: impl Into<String>, consumer_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            consumer_id: consumer_id.into(),
            session_timeout: None,
        }
    }

    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = Some(timeout);
        self
    }
}

/// A message together with where it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerRecord {
    pub topic: String,
    pub partition: i32,
    pub message: Message,
}

/// Consumer bound to one group. Read positions are tracked locally and start
/// from the group's committed offsets whenever the assignment changes.
pub struct Consumer {
    client: BrokerClient,
    config: ConsumerConfig,
    topics: Vec<String>,
    generation: i32,
    assignment: Vec<TopicPartition>,
    positions: HashMap<TopicPartition, i64>,
}

impl Consumer {
    pub async fn connect(addr: &str, config: ConsumerConfig) -> Result<Self> {
        Ok(Self::new(BrokerClient::connect(addr).await?, config))
    }

    pub fn new(client: BrokerClient, config: ConsumerConfig) -> Self {
        Self {
            client,
            config,
            topics: Vec::new(),
            generation: 0,
            assignment: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// Subscribe to `topics` (replacing any previous subscription), join the
    /// group and fetch this member's assignment.
    pub async fn subscribe(&mut self, topics: Vec<String>) -> Result<()> {
        self.client.subscribe(&topics).await?;
        self.topics = topics;
        self.rejoin().await
    }

    /// Join (or refresh membership), then sync and reload positions from the
    /// committed offsets.
    async fn rejoin(&mut self) -> Result<()> {
        let joined = self
            .client
            .join_group(
                &self.config.group_id,
                &self.config.consumer_id,
                &self.topics,
                self.config.session_timeout,
            )
            .await?;
        self.generation = joined.generation;
        let assignment = self
            .client
            .sync_group(&self.config.group_id, &self.config.consumer_id, self.generation)
            .await?;

        let mut positions = HashMap::with_capacity(assignment.len());
        for tp in &assignment {
            let committed = self
                .client
                .get_offset(&self.config.group_id, &tp.topic, tp.partition)
                .await?;
            positions.insert(tp.clone(), committed);
        }
        info!(
            group = %self.config.group_id,
            member = %self.config.consumer_id,
            generation = self.generation,
            partitions = assignment.len(),
            "consumer assignment updated"
        );
        self.assignment = assignment;
        self.positions = positions;
        Ok(())
    }

    pub fn generation(&self) -> i32 {
        self.generation
    }

    pub fn assignment(&self) -> &[TopicPartition] {
        &self.assignment
    }

    /// Fetch up to `max_messages` across the assigned partitions, advancing
    /// the local positions.
    pub async fn poll(&mut self, max_messages: usize) -> Result<Vec<ConsumerRecord>> {
        let mut out = Vec::new();
        for tp in self.assignment.clone() {
            let remaining = max_messages.saturating_sub(out.len());
            if remaining == 0 {
                break;
            }
            let start = self.positions.get(&tp).copied().unwrap_or(0);
            let batch = self
                .client
                .consume(
                    &tp.topic,
                    tp.partition,
                    start,
                    i32::try_from(remaining).unwrap_or(i32::MAX),
                )
                .await?;
            if let Some(last) = batch.last() {
                self.positions.insert(tp.clone(), last.offset + 1);
            }
            out.extend(batch.into_iter().map(|message| ConsumerRecord {
                topic: tp.topic.clone(),
                partition: tp.partition,
                message,
            }));
        }
        Ok(out)
    }

    /// Move the read position of an assigned partition.
    pub async fn seek(&mut self, topic: &str, partition: i32, offset: i64) -> Result<()> {
        let tp = TopicPartition::new(topic, partition);
        if !self.assignment.contains(&tp) {
            return Err(EmberlogError::InvalidArgument(format!(
                "{}/{} is not assigned to this consumer",
                topic, partition
            )));
        }
        self.client.seek(topic, partition, offset).await?;
        self.positions.insert(tp, offset);
        Ok(())
    }

    pub fn position(&self, topic: &str, partition: i32) -> Option<i64> {
        self.positions
            .get(&TopicPartition::new(topic, partition))
            .copied()
    }

    /// Commit the current positions of all assigned partitions.
    pub async fn commit(&mut self) -> Result<()> {
        let offsets: Vec<OffsetCommit> = self
            .assignment
            .iter()
            .map(|tp| {
                OffsetCommit::new(
                    tp.topic.clone(),
                    tp.partition,
                    self.positions.get(tp).copied().unwrap_or(0),
                )
            })
            .collect();
        self.client
            .commit_offsets(
                &self.config.group_id,
                &self.config.consumer_id,
                self.generation,
                offsets,
            )
            .await
    }

    /// Keep the membership alive. Returns true when the assignment was
    /// refreshed because the group rebalanced or fenced this member.
    pub async fn heartbeat(&mut self) -> Result<bool> {
        let outcome = self
            .client
            .heartbeat(&self.config.group_id, &self.config.consumer_id, self.generation)
            .await;
        match outcome {
            Ok(resp) if !resp.rebalance_required => Ok(false),
            Ok(_) => {
                self.rejoin().await?;
                Ok(true)
            }
            Err(EmberlogError::Remote(msg)) => {
                debug!(member = %self.config.consumer_id, "heartbeat rejected: {}", msg);
                self.rejoin().await?;
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    /// Leave the group so the remaining members are rebalanced right away.
    pub async fn close(mut self) -> Result<()> {
        self.client
            .leave_group(&self.config.group_id, &self.config.consumer_id)
            .await
    }
}
