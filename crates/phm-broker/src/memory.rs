use std::collections::{HashMap, VecDeque};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Notify;
use tracing::debug;

use crate::{Ack, BrokerChannel, Delivery, Record, Subscription, TransportError};

/// Records retained per partition when no bound is given.
pub const DEFAULT_RETENTION: usize = 10_000;

struct StoredRecord {
  key: Option<String>,
  payload: Bytes,
}

/// One partition: the newest records, numbered from `base`.
#[derive(Default)]
struct PartitionLog {
  base: u64,
  records: VecDeque<StoredRecord>,
}

impl PartitionLog {
  fn end(&self) -> u64 {
    self.base + self.records.len() as u64
  }

  fn get(&self, offset: u64) -> Option<&StoredRecord> {
    let index = offset.checked_sub(self.base)?;
    self.records.get(index as usize)
  }

  /// Append and return the record's offset, evicting the oldest records
  /// beyond `retention`.
  fn append(&mut self, record: StoredRecord, retention: usize) -> u64 {
    let offset = self.end();
    self.records.push_back(record);
    while self.records.len() > retention {
      self.records.pop_front();
      self.base += 1;
    }
    offset
  }
}

#[derive(Default)]
struct State {
  /// topic -> partition -> log
  topics: HashMap<String, Vec<PartitionLog>>,
  /// (group, topic) -> next offset to consume, per partition
  committed: HashMap<(String, String), Vec<u64>>,
  closed: bool,
}

struct Inner {
  state: Mutex<State>,
  notify: Notify,
  partitions: u32,
  retention: usize,
  round_robin: AtomicU64,
}

impl Inner {
  fn lock(&self) -> MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn empty_partitions(&self) -> Vec<PartitionLog> {
    (0..self.partitions).map(|_| PartitionLog::default()).collect()
  }
}

/// In-process broker backed by one log per topic partition.
///
/// Records keep their order within a partition. Keyed records are hashed to a
/// partition, keyless ones are spread round-robin. Consumer groups track a
/// committed offset per partition; there is no partition assignment, so every
/// subscription of a group reads all partitions.
///
/// Each partition keeps at most `retention` records. Older ones are evicted
/// whether or not every group has read them, and a consumer positioned before
/// the oldest retained record resumes from it. Nothing survives the process.
///
/// Cloning is cheap and yields a handle to the same broker.
#[derive(Clone)]
pub struct InMemoryBroker {
  inner: Arc<Inner>,
}

impl InMemoryBroker {
  /// Create a broker whose topics have `partitions` partitions (at least one)
  /// retaining [`DEFAULT_RETENTION`] records each.
  pub fn new(partitions: u32) -> Self {
    Self::with_retention(partitions, DEFAULT_RETENTION)
  }

  pub fn with_retention(partitions: u32, retention: usize) -> Self {
    Self {
      inner: Arc::new(Inner {
        state: Mutex::new(State::default()),
        notify: Notify::new(),
        partitions: partitions.max(1),
        retention: retention.max(1),
        round_robin: AtomicU64::new(0),
      }),
    }
  }

  /// Refuse further sends and wake every waiting subscription.
  ///
  /// Records already in the log can still be drained.
  pub fn close(&self) {
    self.inner.lock().closed = true;
    self.inner.notify.notify_waiters();
  }

  pub fn is_closed(&self) -> bool {
    self.inner.lock().closed
  }

  /// Total number of records ever appended to `topic`.
  pub fn len(&self, topic: &str) -> usize {
    self
      .inner
      .lock()
      .topics
      .get(topic)
      .map(|partitions| partitions.iter().map(|log| log.end() as usize).sum())
      .unwrap_or(0)
  }

  /// Number of records of `topic` still held in memory.
  pub fn retained(&self, topic: &str) -> usize {
    self
      .inner
      .lock()
      .topics
      .get(topic)
      .map(|partitions| partitions.iter().map(|log| log.records.len()).sum())
      .unwrap_or(0)
  }

  /// Committed offsets of `group_id` on `topic`, one entry per partition.
  pub fn committed(&self, group_id: &str, topic: &str) -> Vec<u64> {
    self
      .inner
      .lock()
      .committed
      .get(&(group_id.to_string(), topic.to_string()))
      .cloned()
      .unwrap_or_else(|| vec![0; self.inner.partitions as usize])
  }

  fn partition_for(&self, key: Option<&str>) -> u32 {
    let partitions = self.inner.partitions as u64;
    let slot = match key {
      Some(key) => {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
      }
      None => self.inner.round_robin.fetch_add(1, Ordering::Relaxed),
    };
    (slot % partitions) as u32
  }
}

impl Default for InMemoryBroker {
  fn default() -> Self {
    Self::new(1)
  }
}

#[async_trait]
impl BrokerChannel for InMemoryBroker {
  async fn send(&self, record: Record) -> Result<Ack, TransportError> {
    let partition = self.partition_for(record.key.as_deref());

    let offset = {
      let mut state = self.inner.lock();
      if state.closed {
        return Err(TransportError::Unavailable("broker is closed".to_string()));
      }
      let empty = self.inner.empty_partitions();
      let log = &mut state
        .topics
        .entry(record.topic.clone())
        .or_insert(empty)[partition as usize];
      log.append(
        StoredRecord {
          key: record.key,
          payload: record.payload,
        },
        self.inner.retention,
      )
    };

    self.inner.notify.notify_waiters();
    debug!(topic = %record.topic, partition, offset, "record appended");

    Ok(Ack {
      topic: record.topic,
      partition,
      offset,
    })
  }

  async fn subscribe(
    &self,
    topic: &str,
    group_id: &str,
  ) -> Result<Box<dyn Subscription>, TransportError> {
    let positions = {
      let mut state = self.inner.lock();
      if state.closed {
        return Err(TransportError::Unavailable("broker is closed".to_string()));
      }
      let empty = self.inner.empty_partitions();
      state.topics.entry(topic.to_string()).or_insert(empty);
      state
        .committed
        .get(&(group_id.to_string(), topic.to_string()))
        .cloned()
        .unwrap_or_else(|| vec![0; self.inner.partitions as usize])
    };

    debug!(topic, group_id, ?positions, "subscription opened");

    Ok(Box::new(MemorySubscription {
      inner: Arc::clone(&self.inner),
      topic: topic.to_string(),
      group_id: group_id.to_string(),
      positions,
      next_partition: 0,
    }))
  }

  async fn close(&self) {
    InMemoryBroker::close(self);
  }
}

struct MemorySubscription {
  inner: Arc<Inner>,
  topic: String,
  group_id: String,
  /// Next offset to hand out, per partition.
  positions: Vec<u64>,
  /// Partition to look at first on the next poll, so no partition starves.
  next_partition: usize,
}

impl MemorySubscription {
  fn poll(&mut self, state: &State) -> Option<Delivery> {
    let partitions = state.topics.get(&self.topic)?;
    let count = partitions.len().min(self.positions.len());

    for step in 0..count {
      let partition = (self.next_partition + step) % count;
      let log = &partitions[partition];
      let offset = self.positions[partition].max(log.base);
      if let Some(record) = log.get(offset) {
        self.positions[partition] = offset + 1;
        self.next_partition = (partition + 1) % count;
        return Some(Delivery {
          topic: self.topic.clone(),
          partition: partition as u32,
          offset,
          key: record.key.clone(),
          payload: record.payload.clone(),
        });
      }
    }

    None
  }
}

#[async_trait]
impl Subscription for MemorySubscription {
  async fn next(&mut self) -> Result<Option<Delivery>, TransportError> {
    let inner = Arc::clone(&self.inner);

    loop {
      // Register for wakeups before looking at the log so a send landing
      // between the check and the await is not missed.
      let notified = inner.notify.notified();
      tokio::pin!(notified);
      notified.as_mut().enable();

      {
        let state = inner.lock();
        if let Some(delivery) = self.poll(&state) {
          return Ok(Some(delivery));
        }
        if state.closed {
          return Ok(None);
        }
      }

      notified.await;
    }
  }

  async fn commit(&mut self, delivery: &Delivery) -> Result<(), TransportError> {
    let partitions = self.inner.partitions as usize;
    if delivery.partition as usize >= partitions {
      return Err(TransportError::UnknownPartition {
        topic: delivery.topic.clone(),
        partition: delivery.partition,
      });
    }

    let mut state = self.inner.lock();
    let committed = state
      .committed
      .entry((self.group_id.clone(), delivery.topic.clone()))
      .or_insert_with(|| vec![0; partitions]);
    let slot = &mut committed[delivery.partition as usize];
    *slot = (*slot).max(delivery.offset + 1);
    Ok(())
  }
}
