//! Partition log: in-memory, append-only sequence of messages for one partition.

use crate::types::Message;
use parking_lot::RwLock;

/// Log for a single partition. Offsets are `0..len`, gapless, assigned under
/// the log's write lock.
pub struct PartitionLog {
    topic: String,
    partition: i32,
    messages: RwLock<Vec<Message>>,
}

impl PartitionLog {
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        Self {
            topic: topic.into(),
            partition,
            messages: RwLock::new(Vec::new()),
        }
    }

    /// Append a message; returns the assigned offset.
    pub fn append(&self, mut message: Message) -> i64 {
        let mut log = self.messages.write();
        let offset = log.len() as i64;
        message.offset = offset;
        log.push(message);
        offset
    }

    /// Read up to `max_count` messages starting at `start_offset`, in offset order.
    ///
    /// Out-of-range starts yield an empty batch; the end is clamped to the log
    /// length. Returned messages are owned copies.
    pub fn read(&self, start_offset: i64, max_count: usize) -> Vec<Message> {
        let log = self.messages.read();
        let len = log.len() as i64;
        if start_offset < 0 || start_offset >= len {
            return Vec::new();
        }
        let start = start_offset as usize;
        let end = start.saturating_add(max_count).min(log.len());
        log[start..end].to_vec()
    }

    /// Next offset to be assigned (equal to the number of stored messages).
    pub fn latest_offset(&self) -> i64 {
        self.messages.read().len() as i64
    }

    pub fn partition(&self) -> i32 {
        self.partition
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}
