use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use phm_kie::{DecisionEngineClient, DecisionError};
use phm_model::{FactMap, ResultFactSet, Trigger};
use tracing::{error, info, instrument};

use crate::events::{PipelineEvent, PipelineNotifier};
use crate::process_start::ProcessStartItem;
use crate::queue::{QueueSender, StageWorker};

/// Runs each trigger through the rule session and forwards the results to
/// the process-start queue.
pub struct DecisionStage {
  client: Arc<dyn DecisionEngineClient>,
  container_id: String,
  session_name: String,
  next: QueueSender<ProcessStartItem>,
  overflow_retry: Duration,
  notifier: Arc<dyn PipelineNotifier>,
}

impl DecisionStage {
  pub fn new(
    client: Arc<dyn DecisionEngineClient>,
    container_id: impl Into<String>,
    session_name: impl Into<String>,
    next: QueueSender<ProcessStartItem>,
    notifier: Arc<dyn PipelineNotifier>,
  ) -> Self {
    Self {
      client,
      container_id: container_id.into(),
      session_name: session_name.into(),
      next,
      overflow_retry: Duration::from_millis(50),
      notifier,
    }
  }

  /// Pause between offers when the process-start queue rejects an item.
  pub fn with_overflow_retry(mut self, pause: Duration) -> Self {
    self.overflow_retry = pause;
    self
  }

  /// Evaluate one trigger. Each call builds its own fact map; nothing is
  /// shared between concurrent evaluations.
  #[instrument(
    name = "decide",
    skip(self, trigger),
    fields(
      trigger_id = %trigger.trigger_id(),
      container_id = %self.container_id,
      session_name = %self.session_name
    )
  )]
  pub async fn decide(&self, trigger: &Trigger) -> Result<ResultFactSet, DecisionError> {
    let facts = FactMap::from_trigger(trigger.clone());

    match self
      .client
      .execute_commands(&self.container_id, &self.session_name, facts)
      .await
    {
      Ok(results) => {
        let responses = results.responses().len();
        info!(results = results.len(), responses, "decision completed");
        self.notifier.notify(PipelineEvent::DecisionCompleted {
          trigger_id: trigger.trigger_id().to_string(),
          responses,
        });
        Ok(results)
      }
      Err(e) => {
        error!(error = %e, "decision failed, dropping trigger");
        self.notifier.notify(PipelineEvent::DecisionFailed {
          trigger_id: trigger.trigger_id().to_string(),
          error: e.to_string(),
        });
        Err(e)
      }
    }
  }
}

#[async_trait]
impl StageWorker<Trigger> for DecisionStage {
  async fn handle(&self, trigger: Trigger) {
    let Ok(results) = self.decide(&trigger).await else {
      return;
    };

    let trigger_id = trigger.trigger_id().to_string();
    let item = ProcessStartItem::Decided { trigger, results };
    if let Err(e) = self.next.enqueue_with_retry(item, self.overflow_retry).await {
      error!(trigger_id = %trigger_id, error = %e, "cannot forward decision results");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::events::ChannelNotifier;
  use crate::queue::stage_queue;
  use phm_config::OverflowPolicy;
  use phm_model::{Fact, FACT_KEY_PREFIX, RESULT_FACT_OBJECTS, ResultValue};
  use std::sync::Mutex;

  /// Echoes the inserted facts back as the session's objects.
  #[derive(Default)]
  struct EchoDecisionClient {
    seen: Mutex<Vec<FactMap>>,
  }

  #[async_trait]
  impl DecisionEngineClient for EchoDecisionClient {
    async fn execute_commands(
      &self,
      container_id: &str,
      _session_name: &str,
      facts: FactMap,
    ) -> Result<ResultFactSet, DecisionError> {
      self.seen.lock().unwrap().push(facts.clone());
      tokio::task::yield_now().await;

      if facts.keys().any(|k| k.ends_with("FAIL")) {
        return Err(DecisionError::Rejected {
          container_id: container_id.to_string(),
          message: "rule error".to_string(),
        });
      }

      let objects: Vec<Fact> = facts.into_iter().map(|(_, fact)| fact).collect();
      let mut results = ResultFactSet::new();
      results.insert(RESULT_FACT_OBJECTS, ResultValue::Facts(objects));
      Ok(results)
    }
  }

  fn stage(
    client: Arc<EchoDecisionClient>,
  ) -> (
    DecisionStage,
    crate::queue::QueueReceiver<ProcessStartItem>,
    tokio::sync::mpsc::UnboundedReceiver<PipelineEvent>,
  ) {
    let (next, receiver) = stage_queue("process_start", 8, OverflowPolicy::Block);
    let (notifier, events) = ChannelNotifier::channel();
    let stage = DecisionStage::new(client, "phm-rules", "phm-session", next, Arc::new(notifier));
    (stage, receiver, events)
  }

  #[tokio::test]
  async fn test_each_trigger_gets_its_own_fact_map() {
    let client = Arc::new(EchoDecisionClient::default());
    let (stage, _receiver, _events) = stage(client.clone());
    let stage = Arc::new(stage);

    let handles: Vec<_> = (0..8)
      .map(|i| {
        let stage = Arc::clone(&stage);
        tokio::spawn(async move {
          stage
            .decide(&Trigger::new(format!("T{}", i), format!("M{}", i)))
            .await
        })
      })
      .collect();
    for handle in handles {
      handle.await.unwrap().unwrap();
    }

    let seen = client.seen.lock().unwrap();
    assert_eq!(seen.len(), 8);
    for facts in seen.iter() {
      assert_eq!(facts.len(), 1);
      let (key, fact) = facts.iter().next().unwrap();
      let Fact::Trigger(trigger) = fact else {
        panic!("expected a trigger fact, got {:?}", fact);
      };
      assert_eq!(key, format!("{}{}", FACT_KEY_PREFIX, trigger.trigger_id()));
    }
  }

  #[tokio::test]
  async fn test_results_forwarded_to_process_start() {
    let client = Arc::new(EchoDecisionClient::default());
    let (stage, receiver, mut events) = stage(client);

    stage.handle(Trigger::new("T1", "M1")).await;

    let item = receiver.recv().await.unwrap();
    assert_eq!(item.trigger(), &Trigger::new("T1", "M1"));
    let ProcessStartItem::Decided { results, .. } = item else {
      panic!("expected decided item");
    };
    assert_eq!(results.fact_objects().len(), 1);
    assert_eq!(
      events.try_recv().unwrap(),
      PipelineEvent::DecisionCompleted {
        trigger_id: "T1".to_string(),
        responses: 0,
      }
    );
  }

  #[tokio::test]
  async fn test_failed_decision_is_dropped() {
    let client = Arc::new(EchoDecisionClient::default());
    let (stage, receiver, mut events) = stage(client);

    stage.handle(Trigger::new("FAIL", "M1")).await;
    stage.handle(Trigger::new("T2", "M2")).await;

    // Only the second trigger reaches the next stage.
    assert_eq!(
      receiver.recv().await.unwrap().trigger().trigger_id(),
      "T2"
    );
    assert!(matches!(
      events.try_recv().unwrap(),
      PipelineEvent::DecisionFailed { ref trigger_id, .. } if trigger_id == "FAIL"
    ));
  }
}
