use std::sync::Arc;

use async_trait::async_trait;
use phm_kie::{ProcessEngineClient, ProcessError};
use phm_model::{ProcessInstanceId, ProcessVariables, ResultFactSet, Trigger};
use tracing::{debug, error, info, instrument};

use crate::events::{PipelineEvent, PipelineNotifier};
use crate::queue::StageWorker;

/// Work handed to the process-start stage.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessStartItem {
  /// Decision results for a trigger. The process receives the Response
  /// facts as `pDataList`.
  Decided {
    trigger: Trigger,
    results: ResultFactSet,
  },
  /// A trigger passed straight through. The process receives
  /// `pMemberId` and `pTriggerId`.
  Direct(Trigger),
}

impl ProcessStartItem {
  pub fn trigger(&self) -> &Trigger {
    match self {
      ProcessStartItem::Decided { trigger, .. } => trigger,
      ProcessStartItem::Direct(trigger) => trigger,
    }
  }

  /// Process variables for this item.
  pub fn variables(&self) -> ProcessVariables {
    match self {
      ProcessStartItem::Decided { results, .. } => {
        ProcessVariables::from_responses(results.responses())
      }
      ProcessStartItem::Direct(trigger) => ProcessVariables::from_trigger(trigger),
    }
  }
}

impl From<Trigger> for ProcessStartItem {
  fn from(trigger: Trigger) -> Self {
    ProcessStartItem::Direct(trigger)
  }
}

/// Starts one process instance per item.
pub struct ProcessStartStage {
  client: Arc<dyn ProcessEngineClient>,
  container_id: String,
  process_definition_id: String,
  notifier: Arc<dyn PipelineNotifier>,
}

impl ProcessStartStage {
  pub fn new(
    client: Arc<dyn ProcessEngineClient>,
    container_id: impl Into<String>,
    process_definition_id: impl Into<String>,
    notifier: Arc<dyn PipelineNotifier>,
  ) -> Self {
    Self {
      client,
      container_id: container_id.into(),
      process_definition_id: process_definition_id.into(),
      notifier,
    }
  }

  #[instrument(
    name = "start_process",
    skip(self, item),
    fields(
      trigger_id = %item.trigger().trigger_id(),
      container_id = %self.container_id,
      process_definition_id = %self.process_definition_id
    )
  )]
  pub async fn start(&self, item: ProcessStartItem) -> Result<ProcessInstanceId, ProcessError> {
    let trigger_id = item.trigger().trigger_id().to_string();
    let variables = item.variables();

    match self
      .client
      .start_process(&self.container_id, &self.process_definition_id, variables)
      .await
    {
      Ok(instance_id) => {
        info!(process_instance_id = %instance_id, "process started");
        self.notifier.notify(PipelineEvent::ProcessStarted {
          trigger_id,
          process_instance_id: instance_id,
        });
        Ok(instance_id)
      }
      Err(e) => {
        error!(error = %e, "process start failed, dropping item");
        self.notifier.notify(PipelineEvent::ProcessFailed {
          trigger_id,
          error: e.to_string(),
        });
        Err(e)
      }
    }
  }
}

#[async_trait]
impl StageWorker<ProcessStartItem> for ProcessStartStage {
  async fn handle(&self, item: ProcessStartItem) {
    if let Err(e) = self.start(item).await {
      // Already reported by `start`; the item is not retried.
      debug!(error = %e, "process start item dropped");
    }
  }
}
