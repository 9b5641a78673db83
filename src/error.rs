//! Error types for the broker and group coordinator.

use thiserror::Error;

/// Result alias for broker operations.
pub type Result<T> = std::result::Result<T, EmberlogError>;

/// Errors that can occur in the broker, the coordinator or the transport.
#[derive(Error, Debug)]
pub enum EmberlogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Topic not found: {0}")]
    TopicNotFound(String),

    #[error("Partition not found: {topic}/{partition}")]
    PartitionNotFound { topic: String, partition: i32 },

    #[error("Unknown group: {0}")]
    UnknownGroup(String),

    #[error("Unknown member {member} in group {group}")]
    UnknownMember { group: String, member: String },

    /// The caller's generation is not the group's; the client must rejoin.
    #[error("Stale generation for group {group}: current {expected}, got {actual} (rejoin required)")]
    StaleGeneration {
        group: String,
        expected: i32,
        actual: i32,
    },

    /// The group is recomputing its assignment; the client should retry SyncGroup.
    #[error("Rebalance in progress for group {0}")]
    RebalanceInProgress(String),

    #[error("Partition {topic}/{partition} is not assigned to {member} in group {group}")]
    PartitionNotOwned {
        group: String,
        member: String,
        topic: String,
        partition: i32,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No tokio runtime: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),

    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Failure string returned by a remote broker.
    #[error("Broker error: {0}")]
    Remote(String),
}
