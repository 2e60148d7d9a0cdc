//! PHM Broker
//!
//! This crate provides the broker channel abstraction the publish and
//! subscribe stages talk to, with two implementations:
//!
//! - [`KafkaBroker`]: the durable transport. A send is acknowledged only once
//!   the Kafka cluster has the record, and consumer group offsets live in the
//!   cluster, so an acknowledged trigger survives a restart of the process.
//! - [`InMemoryBroker`]: a partitioned, size-bounded log that lives inside
//!   the process. Used by tests and local runs without a cluster.
//!
//! The [`BrokerChannel`] trait is the platform layer: implementations own the
//! actual transport, the pipeline only deals in [`Record`]s going out and
//! [`Delivery`]s coming in. Delivery is at-least-once: a subscription only
//! advances its group's committed position when [`Subscription::commit`] is
//! called, so a delivery that was never committed is handed out again to the
//! next subscription in the same group.

mod kafka;
mod memory;

pub use kafka::KafkaBroker;
pub use memory::{DEFAULT_RETENTION, InMemoryBroker};

use async_trait::async_trait;
use bytes::Bytes;

/// Error type for broker operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
  /// The broker cannot be reached or has been shut down.
  #[error("broker unavailable: {0}")]
  Unavailable(String),

  /// A message could not be encoded for sending.
  #[error("failed to encode message: {0}")]
  Encode(String),

  /// A received message could not be decoded.
  #[error("malformed message at {topic}/{partition}@{offset}: {message}")]
  Malformed {
    topic: String,
    partition: u32,
    offset: u64,
    message: String,
  },

  /// A commit referenced a partition the topic does not have.
  #[error("unknown partition {partition} for topic '{topic}'")]
  UnknownPartition { topic: String, partition: u32 },
}

/// An outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
  pub topic: String,
  /// Routing key. Records with the same key land on the same partition.
  pub key: Option<String>,
  pub payload: Bytes,
}

/// Broker acknowledgement for a sent record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
  pub topic: String,
  pub partition: u32,
  pub offset: u64,
}

/// An inbound message together with its delivery metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
  pub topic: String,
  pub partition: u32,
  pub offset: u64,
  pub key: Option<String>,
  pub payload: Bytes,
}

/// Publish/subscribe transport.
#[async_trait]
pub trait BrokerChannel: Send + Sync {
  /// Append a record to its topic.
  async fn send(&self, record: Record) -> Result<Ack, TransportError>;

  /// Join `group_id` on `topic`, starting from the group's committed position.
  async fn subscribe(
    &self,
    topic: &str,
    group_id: &str,
  ) -> Result<Box<dyn Subscription>, TransportError>;

  /// Flush pending sends and refuse new ones. Called once, after the
  /// pipeline has stopped.
  async fn close(&self) {}
}

/// A consumer bound to one topic within one consumer group.
#[async_trait]
pub trait Subscription: Send {
  /// Wait for the next delivery.
  ///
  /// Returns `Ok(None)` once the broker has shut down and this subscription
  /// has nothing left to hand out.
  async fn next(&mut self) -> Result<Option<Delivery>, TransportError>;

  /// Mark `delivery` (and everything before it on its partition) as consumed
  /// by the group.
  async fn commit(&mut self, delivery: &Delivery) -> Result<(), TransportError>;
}
