//! Round-robin partition assignment.
//!
//! 1. Members are taken in `consumer_id` order.
//! 2. Target pairs are sorted by (topic, partition).
//! 3. Each pair goes to the next member in the cycle that subscribes to its
//!    topic; the cycle position is shared across topics.
//!
//! With topics A (3 partitions), B (2 partitions) and two members subscribed
//! to both: `c1 -> [A-0, A-2, B-1]`, `c2 -> [A-1, B-0]`.

use crate::types::TopicPartition;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Member id -> subscribed topics.
pub type Subscriptions = BTreeMap<String, BTreeSet<String>>;

/// Member id -> owned pairs, in assignment order.
pub type Assignment = HashMap<String, Vec<TopicPartition>>;

/// Compute a full assignment. Every member appears in the result (possibly
/// with no pairs); pairs whose topic no member subscribes to are left out.
pub fn assign_round_robin(
    subscriptions: &Subscriptions,
    topic_partitions: &BTreeMap<String, i32>,
) -> Assignment {
    let members: Vec<(&String, &BTreeSet<String>)> = subscriptions.iter().collect();
    let mut result: Assignment = members
        .iter()
        .map(|(id, _)| ((*id).clone(), Vec::new()))
        .collect();
    if members.is_empty() {
        return result;
    }

    let mut cursor = 0usize;
    for (topic, &count) in topic_partitions {
        for partition in 0..count.max(0) {
            let owner = (0..members.len())
                .map(|step| (cursor + step) % members.len())
                .find(|&idx| members[idx].1.contains(topic));
            let Some(idx) = owner else {
                continue;
            };
            cursor = idx + 1;
            if let Some(pairs) = result.get_mut(members[idx].0) {
                pairs.push(TopicPartition::new(topic.clone(), partition));
            }
        }
    }
    result
}
