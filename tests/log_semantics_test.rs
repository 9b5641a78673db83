use std::sync::Arc;
use std::thread;

use emberlog::{Broker, EmberlogError, Message, PartitionLog, Topic};

fn broker_with_topic(name: &str, partitions: i32) -> Arc<Broker> {
    let broker = Arc::new(Broker::new());
    broker.create_topic(name, partitions).unwrap();
    broker
}

#[test]
fn offsets_are_dense_under_concurrent_appends() {
    let log = Arc::new(PartitionLog::new("t", 0));
    let handles: Vec<_> = (0..8)
        .map(|w| {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                (0..250)
                    .map(|i| log.append(Message::new(format!("{}-{}", w, i))))
                    .collect::<Vec<i64>>()
            })
        })
        .collect();

    let mut offsets: Vec<i64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    offsets.sort_unstable();
    assert_eq!(offsets, (0..2000).collect::<Vec<i64>>());
    assert_eq!(log.latest_offset(), 2000);

    let stored: Vec<i64> = log.read(0, 5000).iter().map(|m| m.offset).collect();
    assert_eq!(stored, (0..2000).collect::<Vec<i64>>());
}

#[test]
fn read_clamps_and_rejects_out_of_range_starts() {
    let log = PartitionLog::new("t", 0);
    for i in 0..5 {
        log.append(Message::new(format!("v{}", i)));
    }

    let tail = log.read(3, 10);
    assert_eq!(tail.len(), 2);
    assert_eq!(tail[0].value, b"v3");
    assert_eq!(tail[1].offset, 4);

    assert!(log.read(5, 10).is_empty());
    assert!(log.read(99, 10).is_empty());
    assert!(log.read(-1, 10).is_empty());
    assert!(log.read(0, 0).is_empty());
}

#[test]
fn read_returns_independent_copies() {
    let log = PartitionLog::new("t", 0);
    log.append(Message::new("original").with_header("h", "1"));

    let mut first = log.read(0, 1);
    first[0].value = b"mutated".to_vec();
    first[0].headers.clear();

    let again = log.read(0, 1);
    assert_eq!(again[0].value, b"original");
    assert_eq!(again[0].header("h"), Some("1"));
}

#[test]
fn append_assigns_offset_and_keeps_payload() {
    let log = PartitionLog::new("t", 2);
    let msg = Message::new("payload")
        .with_key("k")
        .with_header("trace", "abc")
        .with_timestamp(1234);
    assert!(!msg.is_assigned());

    assert_eq!(log.append(msg), 0);
    let stored = &log.read(0, 1)[0];
    assert!(stored.is_assigned());
    assert_eq!(stored.offset, 0);
    assert_eq!(stored.key, b"k");
    assert_eq!(stored.timestamp, 1234);
    assert_eq!(stored.header("trace"), Some("abc"));
    assert_eq!(log.partition(), 2);
    assert_eq!(log.topic(), "t");
}

#[test]
fn same_key_lands_in_same_partition_in_order() {
    let broker = broker_with_topic("orders", 3);

    let (pa1, oa1) = broker
        .produce("orders", Message::new("v1").with_key("A"))
        .unwrap();
    let (pb, _) = broker
        .produce("orders", Message::new("v2").with_key("B"))
        .unwrap();
    let (pa2, oa2) = broker
        .produce("orders", Message::new("v3").with_key("A"))
        .unwrap();

    assert_eq!(pa1, pa2);
    assert_ne!(pb, pa1);
    assert_eq!((oa1, oa2), (0, 1));
    assert_eq!((pa1, pb), (0, 1));

    let values: Vec<Vec<u8>> = broker
        .consume("orders", pa1, 0, 10)
        .unwrap()
        .into_iter()
        .filter(|m| m.key == b"A")
        .map(|m| m.value)
        .collect();
    assert_eq!(values, vec![b"v1".to_vec(), b"v3".to_vec()]);
}

#[test]
fn key_routing_is_stable_and_empty_key_goes_to_partition_zero() {
    let a = Topic::new("t", 8);
    let b = Topic::new("t", 8);
    for key in ["alpha", "beta", "gamma", "user-42"] {
        let p = a.route_key(key.as_bytes());
        assert!((0..8).contains(&p));
        assert_eq!(p, b.route_key(key.as_bytes()));
    }
    assert_eq!(a.route_key(b""), 0);

    let broker = broker_with_topic("keyless", 4);
    for _ in 0..3 {
        let (p, _) = broker.produce("keyless", Message::new("x")).unwrap();
        assert_eq!(p, 0);
    }
    assert_eq!(broker.high_water_mark("keyless", 0).unwrap(), 3);
}

#[test]
fn create_topic_is_idempotent_and_coerces_partition_count() {
    let broker = Broker::new();
    assert!(broker.create_topic("t", 3).unwrap());
    broker.produce("t", Message::new("keep")).unwrap();

    assert!(!broker.create_topic("t", 10).unwrap());
    assert_eq!(broker.num_partitions("t").unwrap(), 3);
    assert_eq!(broker.consume("t", 0, 0, 10).unwrap().len(), 1);

    broker.create_topic("zero", 0).unwrap();
    broker.create_topic("negative", -5).unwrap();
    assert_eq!(broker.num_partitions("zero").unwrap(), 1);
    assert_eq!(broker.num_partitions("negative").unwrap(), 1);

    assert!(matches!(
        broker.create_topic("", 1),
        Err(EmberlogError::InvalidArgument(_))
    ));
    assert_eq!(broker.list_topics(), vec!["negative", "t", "zero"]);
}

#[test]
fn missing_topics_and_partitions_are_reported() {
    let broker = broker_with_topic("t", 2);

    assert!(matches!(
        broker.produce("nope", Message::new("x")),
        Err(EmberlogError::TopicNotFound(t)) if t == "nope"
    ));
    assert!(matches!(
        broker.consume("nope", 0, 0, 1),
        Err(EmberlogError::TopicNotFound(_))
    ));
    assert!(matches!(
        broker.consume("t", 2, 0, 1),
        Err(EmberlogError::PartitionNotFound { partition: 2, .. })
    ));
    assert!(matches!(
        broker.consume("t", -1, 0, 1),
        Err(EmberlogError::PartitionNotFound { partition: -1, .. })
    ));
    assert_eq!(broker.partition_count("nope"), None);
    assert_eq!(broker.partition_count("t"), Some(2));
}
