use std::sync::Arc;
use std::time::Duration;

use phm_broker::{Delivery, Subscription, TransportError};
use phm_model::Trigger;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{PipelineError, StageError};
use crate::events::{PipelineEvent, PipelineNotifier};
use crate::queue::QueueSender;

/// Reads triggers from the broker and hands them to the first stage.
///
/// A delivery is committed only once its trigger has been accepted by the
/// stage queue, or once it has been rejected as malformed. A delivery that
/// was received but not accepted when the subscriber stops stays uncommitted
/// and is delivered again to the group.
pub struct Subscriber<T> {
  subscription: Box<dyn Subscription>,
  sender: QueueSender<T>,
  notifier: Arc<dyn PipelineNotifier>,
  overflow_retry: Duration,
}

impl<T> Subscriber<T>
where
  T: From<Trigger> + Send + 'static,
{
  pub fn new(
    subscription: Box<dyn Subscription>,
    sender: QueueSender<T>,
    notifier: Arc<dyn PipelineNotifier>,
  ) -> Self {
    Self {
      subscription,
      sender,
      notifier,
      overflow_retry: Duration::from_millis(50),
    }
  }

  /// Pause before offering an item again when the queue rejects it, and
  /// before polling again after a broker error.
  pub fn with_overflow_retry(mut self, pause: Duration) -> Self {
    self.overflow_retry = pause;
    self
  }

  /// Run until cancelled, until the broker shuts down or until the stage
  /// queue closes. Dropping the subscriber afterwards closes the queue.
  pub async fn run(mut self, cancel: CancellationToken) -> Result<(), PipelineError> {
    info!(stage = self.sender.stage(), "starting subscriber");

    loop {
      let next = tokio::select! {
        _ = cancel.cancelled() => {
          info!("subscriber cancelled");
          break;
        }
        next = self.subscription.next() => next,
      };

      let delivery = match next {
        Ok(Some(delivery)) => delivery,
        Ok(None) => {
          info!("broker closed, subscriber stopping");
          break;
        }
        Err(e) => {
          warn!(error = %e, "failed to receive from broker");
          if self.pause(&cancel).await {
            break;
          }
          continue;
        }
      };

      debug!(
        topic = %delivery.topic,
        partition = delivery.partition,
        offset = delivery.offset,
        key = delivery.key.as_deref().unwrap_or(""),
        "message received"
      );

      let trigger = match serde_json::from_slice::<Trigger>(&delivery.payload) {
        Ok(trigger) => trigger,
        Err(e) => {
          self.reject(&delivery, e.to_string());
          self.commit(&delivery).await;
          continue;
        }
      };

      match self.forward(trigger, &delivery, &cancel).await {
        Ok(true) => self.commit(&delivery).await,
        // Cancelled while waiting for room; leave the delivery uncommitted.
        Ok(false) => break,
        Err(e) => {
          error!(error = %e, "stage queue closed, subscriber stopping");
          return Err(e.into());
        }
      }
    }

    Ok(())
  }

  async fn forward(
    &mut self,
    trigger: Trigger,
    delivery: &Delivery,
    cancel: &CancellationToken,
  ) -> Result<bool, StageError> {
    let trigger_id = trigger.trigger_id().to_string();
    let enqueue = self
      .sender
      .enqueue_with_retry(T::from(trigger), self.overflow_retry);

    tokio::select! {
      _ = cancel.cancelled() => {
        info!(trigger_id = %trigger_id, offset = delivery.offset, "cancelled before trigger was accepted");
        Ok(false)
      }
      result = enqueue => {
        result?;
        debug!(trigger_id = %trigger_id, "trigger accepted");
        self.notifier.notify(PipelineEvent::TriggerReceived {
          trigger_id,
          partition: delivery.partition,
          offset: delivery.offset,
        });
        Ok(true)
      }
    }
  }

  fn reject(&self, delivery: &Delivery, message: String) {
    let err = TransportError::Malformed {
      topic: delivery.topic.clone(),
      partition: delivery.partition,
      offset: delivery.offset,
      message,
    };
    warn!(error = %err, "rejecting malformed message");
    self.notifier.notify(PipelineEvent::MessageRejected {
      topic: delivery.topic.clone(),
      partition: delivery.partition,
      offset: delivery.offset,
      error: err.to_string(),
    });
  }

  async fn commit(&mut self, delivery: &Delivery) {
    if let Err(e) = self.subscription.commit(delivery).await {
      // The delivery may be seen again; stages tolerate duplicates.
      warn!(
        partition = delivery.partition,
        offset = delivery.offset,
        error = %e,
        "failed to commit offset"
      );
    }
  }

  /// Wait `overflow_retry`. Returns `true` if cancelled meanwhile.
  async fn pause(&mut self, cancel: &CancellationToken) -> bool {
    tokio::select! {
      _ = cancel.cancelled() => true,
      _ = tokio::time::sleep(self.overflow_retry) => false,
    }
  }
}
