use std::collections::{BTreeMap, BTreeSet};

use emberlog::coordinator::{assign_round_robin, Subscriptions};
use emberlog::TopicPartition;

fn subs(entries: &[(&str, &[&str])]) -> Subscriptions {
    entries
        .iter()
        .map(|(member, topics)| {
            (
                member.to_string(),
                topics.iter().map(|t| t.to_string()).collect::<BTreeSet<_>>(),
            )
        })
        .collect()
}

fn counts(entries: &[(&str, i32)]) -> BTreeMap<String, i32> {
    entries.iter().map(|(t, n)| (t.to_string(), *n)).collect()
}

fn tp(topic: &str, partition: i32) -> TopicPartition {
    TopicPartition::new(topic, partition)
}

#[test]
fn cursor_carries_across_topics() {
    let result = assign_round_robin(
        &subs(&[("c1", &["A", "B"]), ("c2", &["A", "B"])]),
        &counts(&[("A", 3), ("B", 2)]),
    );
    assert_eq!(result["c1"], vec![tp("A", 0), tp("A", 2), tp("B", 1)]);
    assert_eq!(result["c2"], vec![tp("A", 1), tp("B", 0)]);
}

#[test]
fn pairs_skip_members_not_subscribed() {
    let result = assign_round_robin(
        &subs(&[("c1", &["A"]), ("c2", &["A", "B"]), ("c3", &["B"])]),
        &counts(&[("A", 2), ("B", 2)]),
    );
    assert_eq!(result["c1"], vec![tp("A", 0)]);
    assert_eq!(result["c2"], vec![tp("A", 1), tp("B", 1)]);
    assert_eq!(result["c3"], vec![tp("B", 0)]);
}

#[test]
fn every_member_gets_an_entry_even_when_idle() {
    let result = assign_round_robin(
        &subs(&[("c1", &["A"]), ("c2", &["A"]), ("c3", &["A"])]),
        &counts(&[("A", 1)]),
    );
    assert_eq!(result.len(), 3);
    assert_eq!(result["c1"], vec![tp("A", 0)]);
    assert!(result["c2"].is_empty());
    assert!(result["c3"].is_empty());
}

#[test]
fn unsubscribed_topics_and_empty_groups_assign_nothing() {
    let result = assign_round_robin(&subs(&[("c1", &["A"])]), &counts(&[("Z", 4)]));
    assert_eq!(result.len(), 1);
    assert!(result["c1"].is_empty());

    assert!(assign_round_robin(&Subscriptions::new(), &counts(&[("A", 2)])).is_empty());
}

#[test]
fn load_is_balanced_for_shared_subscriptions() {
    let members: Vec<String> = (0..4).map(|i| format!("c{}", i)).collect();
    let subscriptions: Subscriptions = members
        .iter()
        .map(|m| (m.clone(), BTreeSet::from(["t".to_string()])))
        .collect();
    let result = assign_round_robin(&subscriptions, &counts(&[("t", 10)]));

    let sizes: Vec<usize> = members.iter().map(|m| result[m].len()).collect();
    assert_eq!(sizes.iter().sum::<usize>(), 10);
    let (min, max) = (sizes.iter().min().unwrap(), sizes.iter().max().unwrap());
    assert!(max - min <= 1);
}
