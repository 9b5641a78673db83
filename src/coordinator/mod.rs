//! Group coordinator: membership, generation fencing, rebalancing, liveness
//! and committed offsets for consumer groups.
//!
//! Assignment is computed coordinator-side and always in full: any change in
//! membership or in a member's subscription triggers a complete round-robin
//! rebalance. There is no incremental or cooperative rebalancing.
//!
//! All mutating calls and the rebalance they trigger run under one
//! coordinator-wide write lock, so a generation bump is never observable
//! without its assignment.

mod assignment;
mod group;
mod sweep;

pub use assignment::{assign_round_robin, Assignment, Subscriptions};
pub use group::{next_generation, ConsumerGroup, GroupMember, GroupState};

use crate::broker::Broker;
use crate::config::CoordinatorConfig;
use crate::error::{EmberlogError, Result};
use crate::types::{OffsetCommit, TopicPartition};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of a JoinGroup call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinGroupResponse {
    pub consumer_id: String,
    pub generation: i32,
    /// Lowest member id; informational only, assignment is not leader-driven.
    pub leader_id: String,
    /// Current member ids, sorted.
    pub members: Vec<String>,
}

/// Result of a Heartbeat call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    /// The member has not fetched the current generation's assignment yet.
    pub rebalance_required: bool,
}

/// Point-in-time view of a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDescription {
    pub group_id: String,
    pub state: GroupState,
    pub generation: i32,
    pub members: Vec<String>,
    pub subscribed_topics: Vec<String>,
    pub assignment: BTreeMap<String, Vec<TopicPartition>>,
}

pub(crate) struct Shared {
    broker: Arc<Broker>,
    config: CoordinatorConfig,
    groups: RwLock<HashMap<String, ConsumerGroup>>,
}

impl Shared {
    fn rebalance(&self, group: &mut ConsumerGroup, reason: &str) {
        let previous = group.generation;
        group.rebalance(|topic| self.broker.partition_count(topic));
        info!(
            group = %group.group_id,
            reason,
            from = previous,
            to = group.generation,
            members = group.members.len(),
            state = %group.state,
            "rebalanced group"
        );
    }

    /// One liveness pass: drop groups already Dead, then remove expired
    /// members and rebalance each affected group once. Returns the number of
    /// members removed.
    pub(crate) fn sweep(&self, now: Instant) -> usize {
        let mut groups = self.groups.write();
        groups.retain(|group_id, group| {
            let keep = group.state != GroupState::Dead;
            if !keep {
                info!(group = %group_id, "removed dead group");
            }
            keep
        });

        let mut removed = 0;
        for group in groups.values_mut() {
            let expired: Vec<String> = group
                .members
                .values()
                .filter(|m| m.is_expired(now))
                .map(|m| m.consumer_id.clone())
                .collect();
            if expired.is_empty() {
                continue;
            }
            for consumer_id in &expired {
                warn!(group = %group.group_id, member = %consumer_id, "member session expired");
                group.members.remove(consumer_id);
            }
            removed += expired.len();
            self.rebalance(group, "session timeout");
        }
        removed
    }
}

/// Owns every consumer group and the background liveness sweep.
pub struct GroupCoordinator {
    shared: Arc<Shared>,
    shutdown: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl GroupCoordinator {
    pub fn new(broker: Arc<Broker>, config: CoordinatorConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                broker,
                config,
                groups: RwLock::new(HashMap::new()),
            }),
            shutdown: CancellationToken::new(),
            sweeper: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.shared.config
    }

    /// Join with the configured default session timeout.
    pub fn join_group(
        &self,
        group_id: &str,
        consumer_id: &str,
        topics: &[String],
    ) -> Result<JoinGroupResponse> {
        self.join_group_with_timeout(group_id, consumer_id, topics, None)
    }

    /// Register (or refresh) a member and rebalance if membership or the
    /// member's subscription changed. The rebalance completes before this
    /// returns.
    pub fn join_group_with_timeout(
        &self,
        group_id: &str,
        consumer_id: &str,
        topics: &[String],
        session_timeout: Option<Duration>,
    ) -> Result<JoinGroupResponse> {
        require_id("group id", group_id)?;
        require_id("consumer id", consumer_id)?;
        let session_timeout = self.session_timeout(session_timeout)?;
        let topics: BTreeSet<String> = topics.iter().cloned().collect();
        let now = Instant::now();

        let mut groups = self.shared.groups.write();
        let group = groups.entry(group_id.to_string()).or_insert_with(|| {
            info!(group = group_id, "created consumer group");
            ConsumerGroup::new(group_id)
        });

        let changed = match group.members.get_mut(consumer_id) {
            Some(member) => {
                member.last_heartbeat = now;
                member.session_timeout = session_timeout;
                if member.topics != topics {
                    member.topics = topics;
                    true
                } else {
                    false
                }
            }
            None => {
                group.members.insert(
                    consumer_id.to_string(),
                    GroupMember::new(consumer_id, topics, session_timeout, now),
                );
                true
            }
        };
        debug!(group = group_id, member = consumer_id, changed, "join group");
        if changed || group.state != GroupState::Stable {
            self.shared.rebalance(group, "join");
        }

        Ok(JoinGroupResponse {
            consumer_id: consumer_id.to_string(),
            generation: group.generation,
            leader_id: group.leader_id().unwrap_or_default().to_string(),
            members: group.members.keys().cloned().collect(),
        })
    }

    /// Fetch the member's assignment for `generation`.
    pub fn sync_group(
        &self,
        group_id: &str,
        consumer_id: &str,
        generation: i32,
    ) -> Result<Vec<TopicPartition>> {
        let mut groups = self.shared.groups.write();
        let group = group_mut(&mut groups, group_id)?;
        group.check_generation(generation)?;
        if group.state != GroupState::Stable {
            return Err(EmberlogError::RebalanceInProgress(group_id.to_string()));
        }
        let current = group.generation;
        group.member_mut(consumer_id)?.synced_generation = Some(current);
        Ok(group.assignment_for(consumer_id))
    }

    pub fn heartbeat(
        &self,
        group_id: &str,
        consumer_id: &str,
        generation: i32,
    ) -> Result<HeartbeatResponse> {
        let now = Instant::now();
        let mut groups = self.shared.groups.write();
        let group = group_mut(&mut groups, group_id)?;
        let current = group.generation;
        let group_name = group.group_id.clone();
        let member = group.member_mut(consumer_id)?;
        if generation != current {
            return Err(EmberlogError::StaleGeneration {
                group: group_name,
                expected: current,
                actual: generation,
            });
        }
        member.last_heartbeat = now;
        Ok(HeartbeatResponse {
            rebalance_required: member.synced_generation != Some(current),
        })
    }

    /// Commit offsets for partitions the member owns in `generation`. The
    /// batch is applied only if every entry is owned.
    pub fn commit_offsets(
        &self,
        group_id: &str,
        consumer_id: &str,
        generation: i32,
        offsets: &[OffsetCommit],
    ) -> Result<()> {
        let mut groups = self.shared.groups.write();
        let group = group_mut(&mut groups, group_id)?;
        group.check_generation(generation)?;
        group.member_mut(consumer_id)?;
        if let Some(unowned) = offsets
            .iter()
            .find(|c| !group.owns(consumer_id, &c.topic, c.partition))
        {
            return Err(EmberlogError::PartitionNotOwned {
                group: group_id.to_string(),
                member: consumer_id.to_string(),
                topic: unowned.topic.clone(),
                partition: unowned.partition,
            });
        }
        for commit in offsets {
            group
                .committed_offsets
                .entry(commit.topic.clone())
                .or_default()
                .insert(commit.partition, commit.offset);
        }
        debug!(
            group = group_id,
            member = consumer_id,
            count = offsets.len(),
            "committed offsets"
        );
        Ok(())
    }

    /// Committed offset for a partition, or 0 when nothing was committed yet.
    pub fn get_offset(&self, group_id: &str, topic: &str, partition: i32) -> Result<i64> {
        let groups = self.shared.groups.read();
        let group = groups
            .get(group_id)
            .ok_or_else(|| EmberlogError::UnknownGroup(group_id.to_string()))?;
        self.shared.broker.validate_partition(topic, partition)?;
        Ok(group.committed_offset(topic, partition).unwrap_or(0))
    }

    /// Remove a member right away and rebalance. An emptied group becomes
    /// Dead and is dropped by the next sweep.
    pub fn leave_group(&self, group_id: &str, consumer_id: &str) -> Result<()> {
        let mut groups = self.shared.groups.write();
        let group = group_mut(&mut groups, group_id)?;
        group.member_mut(consumer_id)?;
        group.members.remove(consumer_id);
        info!(group = group_id, member = consumer_id, "member left group");
        self.shared.rebalance(group, "leave");
        Ok(())
    }

    pub fn describe_group(&self, group_id: &str) -> Result<GroupDescription> {
        let groups = self.shared.groups.read();
        let group = groups
            .get(group_id)
            .ok_or_else(|| EmberlogError::UnknownGroup(group_id.to_string()))?;
        Ok(GroupDescription {
            group_id: group.group_id.clone(),
            state: group.state,
            generation: group.generation,
            members: group.members.keys().cloned().collect(),
            subscribed_topics: group.subscribed_topics.iter().cloned().collect(),
            assignment: group
                .assignment
                .iter()
                .map(|(member, pairs)| (member.clone(), pairs.clone()))
                .collect(),
        })
    }

    /// Registered group ids, sorted.
    pub fn group_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.shared.groups.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Rebalance every live group subscribed to `topic`, so partitions of a
    /// topic created after the members joined get owners. Returns the number
    /// of groups rebalanced.
    pub fn rebalance_subscribers(&self, topic: &str) -> usize {
        let mut groups = self.shared.groups.write();
        let mut rebalanced = 0;
        for group in groups.values_mut() {
            if group.state == GroupState::Dead || !group.subscribed_topics.contains(topic) {
                continue;
            }
            self.shared.rebalance(group, "topic created");
            rebalanced += 1;
        }
        rebalanced
    }

    /// Run one liveness pass now; returns the number of members removed.
    pub fn check_expired_members(&self) -> usize {
        self.shared.sweep(Instant::now())
    }

    /// Spawn the periodic liveness sweep on the current tokio runtime.
    /// Calling it again while the sweep runs is a no-op. Fails with
    /// `EmberlogError::Runtime` when called outside a runtime.
    pub fn start_liveness_sweep(&self) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()?;
        let mut sweeper = self.sweeper.lock();
        if sweeper.as_ref().is_some_and(|h| !h.is_finished()) {
            return Ok(());
        }
        let interval = self.shared.config.sweep_interval.max(Duration::from_millis(1));
        *sweeper = Some(runtime.spawn(sweep::run(
            Arc::clone(&self.shared),
            interval,
            self.shutdown.clone(),
        )));
        Ok(())
    }

    /// Stop the liveness sweep and wait for it to exit.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = self.sweeper.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("liveness sweep ended abnormally: {}", e);
            }
        }
    }

    fn session_timeout(&self, requested: Option<Duration>) -> Result<Duration> {
        let config = &self.shared.config;
        let Some(timeout) = requested else {
            return Ok(config.session_timeout);
        };
        if timeout < config.min_session_timeout || timeout > config.max_session_timeout {
            return Err(EmberlogError::InvalidArgument(format!(
                "session timeout {}ms outside [{}ms, {}ms]",
                timeout.as_millis(),
                config.min_session_timeout.as_millis(),
                config.max_session_timeout.as_millis()
            )));
        }
        Ok(timeout)
    }
}

impl Drop for GroupCoordinator {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn group_mut<'a>(
    groups: &'a mut HashMap<String, ConsumerGroup>,
    group_id: &str,
) -> Result<&'a mut ConsumerGroup> {
    groups
        .get_mut(group_id)
        .ok_or_else(|| EmberlogError::UnknownGroup(group_id.to_string()))
}

fn require_id(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(EmberlogError::InvalidArgument(format!(
            "{} must not be empty",
            what
        )));
    }
    Ok(())
}
