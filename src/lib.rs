//! Emberlog: in-memory partitioned message broker with consumer groups.

pub mod broker;
pub mod client;
pub mod config;
pub mod consumer;
pub mod coordinator;
pub mod error;
pub mod producer;
pub mod protocol;
pub mod server;
pub mod storage;
pub mod types;

pub use broker::{Broker, Topic};
pub use client::BrokerClient;
pub use config::{CoordinatorConfig, ServerConfig};
pub use consumer::{Consumer, ConsumerConfig, ConsumerRecord};
pub use coordinator::{GroupCoordinator, GroupState};
pub use error::{EmberlogError, Result};
pub use producer::{ProduceResult, Producer};
pub use protocol::{Request, Response};
pub use storage::PartitionLog;
pub use types::{Message, OffsetCommit, TopicPartition};
