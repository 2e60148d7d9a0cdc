//! Bounded stage queues and the worker pools that drain them.
//!
//! A stage is a bounded mpsc channel whose receiving end is shared by a fixed
//! number of workers. Each item is taken by exactly one worker; the shared
//! receiver is locked only while waiting for the next item, never while the
//! item is being handled.
//!
//! A queue closes when its last [`QueueSender`] is dropped. Workers keep
//! taking items until the buffer is empty and then exit, so dropping the
//! producers of a stage and joining its [`WorkerPool`] drains it.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::join_all;
use phm_config::OverflowPolicy;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::{PipelineError, StageError};

/// Create a bounded queue for `stage`.
pub fn stage_queue<T>(
  stage: &'static str,
  capacity: usize,
  overflow: OverflowPolicy,
) -> (QueueSender<T>, QueueReceiver<T>) {
  let (sender, receiver) = mpsc::channel(capacity);
  (
    QueueSender {
      stage,
      overflow,
      sender,
    },
    QueueReceiver {
      stage,
      receiver: Arc::new(Mutex::new(receiver)),
    },
  )
}

/// Producer side of a stage queue.
pub struct QueueSender<T> {
  stage: &'static str,
  overflow: OverflowPolicy,
  sender: mpsc::Sender<T>,
}

impl<T> Clone for QueueSender<T> {
  fn clone(&self) -> Self {
    Self {
      stage: self.stage,
      overflow: self.overflow,
      sender: self.sender.clone(),
    }
  }
}

impl<T> QueueSender<T> {
  pub fn stage(&self) -> &'static str {
    self.stage
  }

  /// Hand one item to the stage.
  ///
  /// With [`OverflowPolicy::Block`] this waits for a free slot; with
  /// [`OverflowPolicy::Reject`] a full queue is a [`StageError::QueueFull`].
  pub async fn enqueue(&self, item: T) -> Result<(), StageError> {
    match self.overflow {
      OverflowPolicy::Block => self.sender.send(item).await.map_err(|_| self.closed()),
      OverflowPolicy::Reject => self.sender.try_send(item).map_err(|e| match e {
        mpsc::error::TrySendError::Full(_) => StageError::QueueFull { stage: self.stage },
        mpsc::error::TrySendError::Closed(_) => self.closed(),
      }),
    }
  }

  /// Hand one item to the stage, offering it again every `pause` while the
  /// queue rejects it as full. Only fails once the stage has stopped.
  pub async fn enqueue_with_retry(&self, item: T, pause: Duration) -> Result<(), StageError> {
    let mut item = item;
    loop {
      match self.overflow {
        OverflowPolicy::Block => {
          return self.sender.send(item).await.map_err(|_| self.closed());
        }
        OverflowPolicy::Reject => match self.sender.try_send(item) {
          Ok(()) => return Ok(()),
          Err(mpsc::error::TrySendError::Full(returned)) => {
            debug!(stage = self.stage, "queue full, retrying");
            item = returned;
            tokio::time::sleep(pause).await;
          }
          Err(mpsc::error::TrySendError::Closed(_)) => return Err(self.closed()),
        },
      }
    }
  }

  /// Free slots left in the queue.
  pub fn available(&self) -> usize {
    self.sender.capacity()
  }

  pub fn is_closed(&self) -> bool {
    self.sender.is_closed()
  }

  fn closed(&self) -> StageError {
    StageError::Closed { stage: self.stage }
  }
}

/// Consumer side of a stage queue, shared by the stage's workers.
pub struct QueueReceiver<T> {
  stage: &'static str,
  receiver: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for QueueReceiver<T> {
  fn clone(&self) -> Self {
    Self {
      stage: self.stage,
      receiver: Arc::clone(&self.receiver),
    }
  }
}

impl<T> QueueReceiver<T> {
  /// Wait for the next item. `None` once the queue is closed and empty.
  pub async fn recv(&self) -> Option<T> {
    self.receiver.lock().await.recv().await
  }
}

/// The per-item work of a stage.
///
/// Implementations handle their own failures; an item that cannot be
/// processed is reported and dropped, it never stops the worker.
#[async_trait]
pub trait StageWorker<T>: Send + Sync + 'static {
  async fn handle(&self, item: T);
}

/// A fixed set of tasks draining one stage queue.
pub struct WorkerPool {
  stage: &'static str,
  handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
  /// Spawn `workers` tasks that feed items from `receiver` to `worker`.
  pub fn spawn<T, W>(workers: usize, receiver: QueueReceiver<T>, worker: Arc<W>) -> Self
  where
    T: Send + 'static,
    W: StageWorker<T>,
  {
    let stage = receiver.stage;
    info!(stage, workers, "starting worker pool");

    let handles = (0..workers)
      .map(|worker_id| {
        let receiver = receiver.clone();
        let worker = Arc::clone(&worker);
        tokio::spawn(work_loop(stage, worker_id, receiver, worker))
      })
      .collect();

    Self { stage, handles }
  }

  pub fn len(&self) -> usize {
    self.handles.len()
  }

  pub fn is_empty(&self) -> bool {
    self.handles.is_empty()
  }

  /// Wait for every worker to exit. Workers exit once the queue is closed
  /// and drained.
  pub async fn join(self) -> Result<(), PipelineError> {
    let stage = self.stage;
    let mut failure = None;
    for result in join_all(self.handles).await {
      if let Err(e) = result {
        error!(stage, error = %e, "worker task failed");
        failure.get_or_insert(PipelineError::Task {
          message: format!("{} worker: {}", stage, e),
        });
      }
    }
    info!(stage, "worker pool stopped");
    failure.map_or(Ok(()), Err)
  }
}

async fn work_loop<T, W>(
  stage: &'static str,
  worker_id: usize,
  receiver: QueueReceiver<T>,
  worker: Arc<W>,
) where
  T: Send + 'static,
  W: StageWorker<T>,
{
  debug!(stage, worker_id, "worker started");
  while let Some(item) = receiver.recv().await {
    if AssertUnwindSafe(worker.handle(item))
      .catch_unwind()
      .await
      .is_err()
    {
      error!(stage, worker_id, "worker panicked while handling an item");
    }
  }
  debug!(stage, worker_id, "queue drained, worker stopped");
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Mutex as StdMutex;

  struct Recorder {
    seen: StdMutex<Vec<u32>>,
  }

  #[async_trait]
  impl StageWorker<u32> for Recorder {
    async fn handle(&self, item: u32) {
      if item == 13 {
        panic!("unlucky item");
      }
      tokio::task::yield_now().await;
      self.seen.lock().unwrap().push(item);
    }
  }

  #[tokio::test]
  async fn test_block_policy_waits_for_free_slot() {
    let (sender, receiver) = stage_queue::<u32>("test", 1, OverflowPolicy::Block);
    sender.enqueue(1).await.unwrap();
    assert_eq!(sender.available(), 0);

    // Second item cannot be accepted until the first is taken.
    let blocked = tokio::time::timeout(Duration::from_millis(20), sender.enqueue(2)).await;
    assert!(blocked.is_err());

    let producer = {
      let sender = sender.clone();
      tokio::spawn(async move { sender.enqueue(2).await })
    };
    assert_eq!(receiver.recv().await, Some(1));
    producer.await.unwrap().unwrap();
    assert_eq!(receiver.recv().await, Some(2));
  }

  #[tokio::test]
  async fn test_reject_policy_reports_queue_full() {
    let (sender, _receiver) = stage_queue::<u32>("decision", 1, OverflowPolicy::Reject);
    sender.enqueue(1).await.unwrap();

    let err = sender.enqueue(2).await.unwrap_err();
    assert_eq!(err, StageError::QueueFull { stage: "decision" });
  }

  #[tokio::test]
  async fn test_enqueue_with_retry_waits_out_rejections() {
    let (sender, receiver) = stage_queue::<u32>("decision", 1, OverflowPolicy::Reject);
    sender.enqueue(1).await.unwrap();

    let producer = {
      let sender = sender.clone();
      tokio::spawn(async move {
        sender
          .enqueue_with_retry(2, Duration::from_millis(5))
          .await
      })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(receiver.recv().await, Some(1));
    producer.await.unwrap().unwrap();
    assert_eq!(receiver.recv().await, Some(2));
  }

  #[tokio::test]
  async fn test_enqueue_after_receivers_dropped() {
    let (sender, receiver) = stage_queue::<u32>("process_start", 4, OverflowPolicy::Block);
    drop(receiver);

    assert!(sender.is_closed());
    let err = sender.enqueue(1).await.unwrap_err();
    assert_eq!(
      err,
      StageError::Closed {
        stage: "process_start"
      }
    );
  }

  #[tokio::test]
  async fn test_pool_drains_queue_after_close() {
    let (sender, receiver) = stage_queue::<u32>("test", 16, OverflowPolicy::Block);
    let recorder = Arc::new(Recorder {
      seen: StdMutex::new(Vec::new()),
    });
    let pool = WorkerPool::spawn(3, receiver, Arc::clone(&recorder));
    assert_eq!(pool.len(), 3);

    for item in 0..10 {
      sender.enqueue(item).await.unwrap();
    }
    drop(sender);
    pool.join().await.unwrap();

    let mut seen = recorder.seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, (0..10).collect::<Vec<_>>());
  }

  #[tokio::test]
  async fn test_panicking_item_does_not_stop_worker() {
    let (sender, receiver) = stage_queue::<u32>("test", 8, OverflowPolicy::Block);
    let recorder = Arc::new(Recorder {
      seen: StdMutex::new(Vec::new()),
    });
    let pool = WorkerPool::spawn(1, receiver, Arc::clone(&recorder));

    sender.enqueue(12).await.unwrap();
    sender.enqueue(13).await.unwrap();
    sender.enqueue(14).await.unwrap();
    drop(sender);
    pool.join().await.unwrap();

    assert_eq!(*recorder.seen.lock().unwrap(), vec![12, 14]);
  }
}
