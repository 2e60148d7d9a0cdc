use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::{Offset, TopicPartitionList};
use tracing::{debug, info, warn};

use crate::{Ack, BrokerChannel, Delivery, Record, Subscription, TransportError};

/// Broker channel backed by a Kafka cluster.
///
/// `send` resolves once the cluster has acknowledged the record (`acks=all`),
/// or fails after `send_timeout`. Each subscription is its own consumer in
/// the given group with auto-commit disabled: offsets move only through
/// [`Subscription::commit`], so anything not yet handed downstream is read
/// again by the next consumer of the group.
pub struct KafkaBroker {
  bootstrap_servers: String,
  producer: FutureProducer,
  send_timeout: Duration,
}

impl KafkaBroker {
  /// Create the producer. No connection is made until the first send.
  pub fn new(
    bootstrap_servers: impl Into<String>,
    send_timeout: Duration,
  ) -> Result<Self, TransportError> {
    let bootstrap_servers = bootstrap_servers.into();
    let producer: FutureProducer = producer_config(&bootstrap_servers, send_timeout)
      .create()
      .map_err(unavailable)?;

    info!(bootstrap_servers = %bootstrap_servers, "kafka producer created");
    Ok(Self {
      bootstrap_servers,
      producer,
      send_timeout,
    })
  }
}

fn producer_config(bootstrap_servers: &str, send_timeout: Duration) -> ClientConfig {
  let mut config = ClientConfig::new();
  config
    .set("bootstrap.servers", bootstrap_servers)
    .set("message.timeout.ms", send_timeout.as_millis().to_string())
    .set("acks", "all");
  config
}

fn consumer_config(bootstrap_servers: &str, group_id: &str) -> ClientConfig {
  let mut config = ClientConfig::new();
  config
    .set("bootstrap.servers", bootstrap_servers)
    .set("group.id", group_id)
    .set("enable.auto.commit", "false")
    .set("auto.offset.reset", "earliest")
    .set("enable.partition.eof", "false");
  config
}

fn unavailable(e: KafkaError) -> TransportError {
  TransportError::Unavailable(e.to_string())
}

#[async_trait]
impl BrokerChannel for KafkaBroker {
  async fn send(&self, record: Record) -> Result<Ack, TransportError> {
    let mut outbound =
      FutureRecord::<str, [u8]>::to(&record.topic).payload(record.payload.as_ref());
    if let Some(key) = record.key.as_deref() {
      outbound = outbound.key(key);
    }

    let (partition, offset) = self
      .producer
      .send(outbound, Timeout::After(self.send_timeout))
      .await
      .map_err(|(e, _)| unavailable(e))?;

    debug!(topic = %record.topic, partition, offset, "record acknowledged");
    Ok(Ack {
      topic: record.topic,
      partition: partition as u32,
      offset: offset as u64,
    })
  }

  async fn subscribe(
    &self,
    topic: &str,
    group_id: &str,
  ) -> Result<Box<dyn Subscription>, TransportError> {
    let consumer: StreamConsumer = consumer_config(&self.bootstrap_servers, group_id)
      .create()
      .map_err(unavailable)?;
    consumer.subscribe(&[topic]).map_err(unavailable)?;

    info!(
      topic,
      group_id,
      bootstrap_servers = %self.bootstrap_servers,
      "kafka consumer subscribed"
    );
    Ok(Box::new(KafkaSubscription { consumer }))
  }

  async fn close(&self) {
    if let Err(e) = self.producer.flush(Timeout::After(self.send_timeout)) {
      warn!(error = %e, "kafka producer flush failed");
    }
    info!(bootstrap_servers = %self.bootstrap_servers, "kafka producer closed");
  }
}

struct KafkaSubscription {
  consumer: StreamConsumer,
}

#[async_trait]
impl Subscription for KafkaSubscription {
  async fn next(&mut self) -> Result<Option<Delivery>, TransportError> {
    let message = self.consumer.recv().await.map_err(unavailable)?;
    Ok(Some(Delivery {
      topic: message.topic().to_string(),
      partition: message.partition() as u32,
      offset: message.offset() as u64,
      key: message
        .key()
        .map(|key| String::from_utf8_lossy(key).into_owned()),
      payload: message
        .payload()
        .map(Bytes::copy_from_slice)
        .unwrap_or_default(),
    }))
  }

  async fn commit(&mut self, delivery: &Delivery) -> Result<(), TransportError> {
    // Kafka stores the offset of the next record to read.
    let mut offsets = TopicPartitionList::new();
    offsets
      .add_partition_offset(
        &delivery.topic,
        delivery.partition as i32,
        Offset::Offset(delivery.offset as i64 + 1),
      )
      .map_err(unavailable)?;
    self
      .consumer
      .commit(&offsets, CommitMode::Async)
      .map_err(unavailable)
  }
}
