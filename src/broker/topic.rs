//! Topic: fixed set of partition logs plus key routing.

use crate::error::{EmberlogError, Result};
use crate::storage::PartitionLog;
use crate::types::Message;
use std::sync::Arc;

/// A named topic. The partition count is fixed at creation.
pub struct Topic {
    name: String,
    partitions: Vec<Arc<PartitionLog>>,
}

impl Topic {
    /// Create a topic; `num_partitions < 1` is coerced to 1.
    pub fn new(name: impl Into<String>, num_partitions: i32) -> Self {
        let name = name.into();
        let count = num_partitions.max(1);
        let partitions = (0..count)
            .map(|p| Arc::new(PartitionLog::new(name.clone(), p)))
            .collect();
        Self { name, partitions }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn partition_count(&self) -> i32 {
        self.partitions.len() as i32
    }

    /// Map a key to a partition id. Empty keys go to partition 0; other keys
    /// use CRC32 of the key bytes, sign-masked, modulo the partition count.
    pub fn route_key(&self, key: &[u8]) -> i32 {
        if key.is_empty() {
            return 0;
        }
        let hash = crc32fast::hash(key);
        ((hash & 0x7fff_ffff) as i32) % self.partition_count()
    }

    pub fn partition(&self, id: i32) -> Result<Arc<PartitionLog>> {
        if id < 0 || id >= self.partition_count() {
            return Err(EmberlogError::PartitionNotFound {
                topic: self.name.clone(),
                partition: id,
            });
        }
        Ok(Arc::clone(&self.partitions[id as usize]))
    }

    /// Route by key and append; returns (partition, offset).
    pub fn produce(&self, message: Message) -> (i32, i64) {
        let partition_id = self.route_key(&message.key);
        let offset = self.partitions[partition_id as usize].append(message);
        (partition_id, offset)
    }
}
