//! Pipeline events and notifiers for observability.
//!
//! Every stage reports what happened to each item through a
//! [`PipelineNotifier`]. Failed items end here too: a notifier that persists
//! `DecisionFailed` / `ProcessFailed` events is the dead-letter hook.

use phm_model::ProcessInstanceId;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted as triggers move through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PipelineEvent {
  /// A trigger was accepted by the broker.
  TriggerPublished {
    trigger_id: String,
    partition: u32,
    offset: u64,
  },

  /// A trigger was read from the broker and handed to the first stage.
  TriggerReceived {
    trigger_id: String,
    partition: u32,
    offset: u64,
  },

  /// A broker message could not be decoded and was skipped.
  MessageRejected {
    topic: String,
    partition: u32,
    offset: u64,
    error: String,
  },

  /// The decision engine produced results for a trigger.
  DecisionCompleted {
    trigger_id: String,
    responses: usize,
  },

  /// The decision call failed; the trigger was dropped.
  DecisionFailed { trigger_id: String, error: String },

  /// A process instance was started.
  ProcessStarted {
    trigger_id: String,
    process_instance_id: ProcessInstanceId,
  },

  /// The process could not be started; the item was dropped.
  ProcessFailed { trigger_id: String, error: String },
}

/// Receives pipeline events.
pub trait PipelineNotifier: Send + Sync {
  fn notify(&self, event: PipelineEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl PipelineNotifier for NoopNotifier {
  fn notify(&self, _event: PipelineEvent) {}
}

/// Forwards events to an unbounded channel.
///
/// Unbounded so a slow observer never stalls a stage worker.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<PipelineEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<PipelineEvent>) -> Self {
    Self { sender }
  }

  /// Create a notifier together with the receiving end.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self::new(sender), receiver)
  }
}

impl PipelineNotifier for ChannelNotifier {
  fn notify(&self, event: PipelineEvent) {
    // Receiver may have been dropped.
    let _ = self.sender.send(event);
  }
}
