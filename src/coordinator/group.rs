//! Consumer group state: members, assignment, committed offsets, generation.

use super::assignment::{assign_round_robin, Assignment, Subscriptions};
use crate::error::{EmberlogError, Result};
use crate::types::TopicPartition;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Consumer group state machine.
///
/// `Stable -> Rebalancing -> Stable` on every membership change;
/// `Stable -> Dead` once the last member is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupState {
    Stable,
    Rebalancing,
    Dead,
}

impl fmt::Display for GroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GroupState::Stable => "Stable",
            GroupState::Rebalancing => "Rebalancing",
            GroupState::Dead => "Dead",
        };
        f.write_str(s)
    }
}

/// One consumer process registered in a group.
#[derive(Debug, Clone)]
pub struct GroupMember {
    pub consumer_id: String,
    pub topics: BTreeSet<String>,
    pub last_heartbeat: Instant,
    pub session_timeout: Duration,
    /// Generation whose assignment this member last fetched via SyncGroup.
    pub(crate) synced_generation: Option<i32>,
}

impl GroupMember {
    pub(crate) fn new(
        consumer_id: impl Into<String>,
        topics: BTreeSet<String>,
        session_timeout: Duration,
        now: Instant,
    ) -> Self {
        Self {
            consumer_id: consumer_id.into(),
            topics,
            last_heartbeat: now,
            session_timeout,
            synced_generation: None,
        }
    }

    /// True when `now` is strictly past the member's session deadline.
    pub fn is_expired(&self, now: Instant) -> bool {
        now > self.last_heartbeat + self.session_timeout
    }
}

/// All coordinator-side state of one group.
#[derive(Debug)]
pub struct ConsumerGroup {
    pub(crate) group_id: String,
    /// Keyed by consumer id; iteration order is the assignment order.
    pub(crate) members: BTreeMap<String, GroupMember>,
    pub(crate) assignment: Assignment,
    /// topic -> partition -> committed offset. Survives rebalances.
    pub(crate) committed_offsets: HashMap<String, HashMap<i32, i64>>,
    /// Union of all members' topics.
    pub(crate) subscribed_topics: BTreeSet<String>,
    pub(crate) state: GroupState,
    pub(crate) generation: i32,
}

impl ConsumerGroup {
    pub(crate) fn new(group_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            members: BTreeMap::new(),
            assignment: HashMap::new(),
            committed_offsets: HashMap::new(),
            subscribed_topics: BTreeSet::new(),
            state: GroupState::Stable,
            generation: 0,
        }
    }

    /// Recompute the whole assignment from the current members and bump the
    /// generation by one. Topics for which `partition_count` returns `None`
    /// contribute no pairs.
    pub(crate) fn rebalance<F>(&mut self, partition_count: F)
    where
        F: Fn(&str) -> Option<i32>,
    {
        self.state = GroupState::Rebalancing;
        self.subscribed_topics = self
            .members
            .values()
            .flat_map(|m| m.topics.iter().cloned())
            .collect();

        let topic_partitions: BTreeMap<String, i32> = self
            .subscribed_topics
            .iter()
            .filter_map(|t| partition_count(t).map(|n| (t.clone(), n)))
            .collect();
        let subscriptions: Subscriptions = self
            .members
            .iter()
            .map(|(id, m)| (id.clone(), m.topics.clone()))
            .collect();

        self.assignment = assign_round_robin(&subscriptions, &topic_partitions);
        self.generation = next_generation(self.generation);
        self.state = if self.members.is_empty() {
            GroupState::Dead
        } else {
            GroupState::Stable
        };
    }

    pub(crate) fn check_generation(&self, generation: i32) -> Result<()> {
        if generation != self.generation {
            return Err(EmberlogError::StaleGeneration {
                group: self.group_id.clone(),
                expected: self.generation,
                actual: generation,
            });
        }
        Ok(())
    }

    pub(crate) fn member_mut(&mut self, consumer_id: &str) -> Result<&mut GroupMember> {
        let group = &self.group_id;
        self.members
            .get_mut(consumer_id)
            .ok_or_else(|| EmberlogError::UnknownMember {
                group: group.clone(),
                member: consumer_id.to_string(),
            })
    }

    pub(crate) fn assignment_for(&self, consumer_id: &str) -> Vec<TopicPartition> {
        self.assignment.get(consumer_id).cloned().unwrap_or_default()
    }

    pub(crate) fn owns(&self, consumer_id: &str, topic: &str, partition: i32) -> bool {
        self.assignment
            .get(consumer_id)
            .is_some_and(|pairs| {
                pairs
                    .iter()
                    .any(|tp| tp.topic == topic && tp.partition == partition)
            })
    }

    pub(crate) fn committed_offset(&self, topic: &str, partition: i32) -> Option<i64> {
        self.committed_offsets
            .get(topic)
            .and_then(|parts| parts.get(&partition))
            .copied()
    }

    /// Lowest member id; reported to clients but not used for assignment.
    pub(crate) fn leader_id(&self) -> Option<&str> {
        self.members.keys().next().map(String::as_str)
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn state(&self) -> GroupState {
        self.state
    }

    pub fn generation(&self) -> i32 {
        self.generation
    }
}

/// Generation following `current`. Wraps from `i32::MAX` back to 1; fencing
/// only compares generations for equality.
pub fn next_generation(current: i32) -> i32 {
    current.checked_add(1).unwrap_or(1)
}
