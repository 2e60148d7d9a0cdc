use std::sync::Arc;

use bytes::Bytes;
use phm_broker::{Ack, BrokerChannel, Record, TransportError};
use phm_model::Trigger;
use tracing::{info, instrument};

use crate::events::{PipelineEvent, PipelineNotifier};

/// Routing key every trigger is published with.
pub const ROUTING_KEY: &str = "phm-trigger";

/// Serializes triggers onto the broker topic.
#[derive(Clone)]
pub struct Publisher {
  broker: Arc<dyn BrokerChannel>,
  topic: String,
  notifier: Arc<dyn PipelineNotifier>,
}

impl Publisher {
  pub fn new(
    broker: Arc<dyn BrokerChannel>,
    topic: impl Into<String>,
    notifier: Arc<dyn PipelineNotifier>,
  ) -> Self {
    Self {
      broker,
      topic: topic.into(),
      notifier,
    }
  }

  pub fn topic(&self) -> &str {
    &self.topic
  }

  /// Send one trigger. The broker's acknowledgement is returned as is; any
  /// encoding or transport failure is returned to the caller.
  #[instrument(
    name = "publish",
    skip(self, trigger),
    fields(topic = %self.topic, trigger_id = %trigger.trigger_id())
  )]
  pub async fn publish(&self, trigger: &Trigger) -> Result<Ack, TransportError> {
    let payload = serde_json::to_vec(trigger).map_err(|e| TransportError::Encode(e.to_string()))?;

    let ack = self
      .broker
      .send(Record {
        topic: self.topic.clone(),
        key: Some(ROUTING_KEY.to_string()),
        payload: Bytes::from(payload),
      })
      .await?;

    info!(
      partition = ack.partition,
      offset = ack.offset,
      member_id = %trigger.member_id(),
      "trigger published"
    );
    self.notifier.notify(PipelineEvent::TriggerPublished {
      trigger_id: trigger.trigger_id().to_string(),
      partition: ack.partition,
      offset: ack.offset,
    });
    Ok(ack)
  }
}
