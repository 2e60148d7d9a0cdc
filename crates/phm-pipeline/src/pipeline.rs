use std::sync::Arc;

use phm_broker::BrokerChannel;
use phm_config::{PipelineConfig, PipelineMode};
use phm_kie::{DecisionEngineClient, EngineSession, ProcessEngineClient};
use phm_model::Trigger;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::decision::DecisionStage;
use crate::error::PipelineError;
use crate::events::{NoopNotifier, PipelineNotifier};
use crate::policy::{CallPolicy, GuardedDecisionClient, GuardedProcessClient};
use crate::process_start::{ProcessStartItem, ProcessStartStage};
use crate::publish::Publisher;
use crate::queue::{WorkerPool, stage_queue};
use crate::subscribe::Subscriber;

const DECISION_STAGE: &str = "decision";
const PROCESS_START_STAGE: &str = "process_start";

/// The engine connections a pipeline runs against.
#[derive(Clone)]
pub struct EngineClients {
  pub decision: Arc<dyn DecisionEngineClient>,
  pub process: Arc<dyn ProcessEngineClient>,
  pub session: Arc<dyn EngineSession>,
}

impl EngineClients {
  /// Use one client for every role.
  pub fn shared<C>(client: Arc<C>) -> Self
  where
    C: DecisionEngineClient + ProcessEngineClient + EngineSession + 'static,
  {
    Self {
      decision: client.clone(),
      process: client.clone(),
      session: client,
    }
  }
}

/// A running pipeline.
///
/// ```text
/// broker ─▶ Subscriber ─▶ [decision queue] ─▶ DecisionStage × N
///                                                  │
///                         [process-start queue] ◀──┘
///                                  │
///                                  ▼
///                        ProcessStartStage × M ─▶ process engine
/// ```
///
/// In [`PipelineMode::Direct`] the subscriber feeds the process-start queue
/// and there is no decision stage.
pub struct Pipeline {
  cancel: CancellationToken,
  publisher: Publisher,
  subscriber: JoinHandle<Result<(), PipelineError>>,
  decision_pool: Option<WorkerPool>,
  process_pool: WorkerPool,
  session: Arc<dyn EngineSession>,
}

impl Pipeline {
  /// Start a pipeline that discards its events.
  pub async fn start(
    config: &PipelineConfig,
    broker: Arc<dyn BrokerChannel>,
    clients: EngineClients,
  ) -> Result<Self, PipelineError> {
    Self::start_with_notifier(config, broker, clients, Arc::new(NoopNotifier)).await
  }

  /// Start a pipeline that reports its events to `notifier`.
  pub async fn start_with_notifier(
    config: &PipelineConfig,
    broker: Arc<dyn BrokerChannel>,
    clients: EngineClients,
    notifier: Arc<dyn PipelineNotifier>,
  ) -> Result<Self, PipelineError> {
    let stages = &config.stages;
    let policy = CallPolicy::new(config.retry.clone());
    let overflow_retry = stages.overflow_retry();

    info!(
      mode = ?config.mode,
      broker = ?config.broker.kind,
      endpoint = %config.broker.endpoint(),
      topic = %config.broker.topic,
      decision_workers = stages.decision_workers,
      process_workers = stages.process_workers,
      queue_capacity = stages.queue_capacity,
      overflow = ?stages.overflow,
      max_attempts = policy.max_attempts(),
      "starting pipeline"
    );

    let subscription = broker
      .subscribe(&config.broker.topic, &config.broker.group_id)
      .await?;

    let (process_tx, process_rx) =
      stage_queue::<ProcessStartItem>(PROCESS_START_STAGE, stages.queue_capacity, stages.overflow);
    let process_stage = ProcessStartStage::new(
      Arc::new(GuardedProcessClient::new(clients.process, policy.clone())),
      config.process.container_id.clone(),
      config.process.definition_id.clone(),
      notifier.clone(),
    );
    let process_pool =
      WorkerPool::spawn(stages.process_workers, process_rx, Arc::new(process_stage));

    let cancel = CancellationToken::new();

    let (subscriber, decision_pool) = match config.mode {
      PipelineMode::Decision => {
        let (decision_tx, decision_rx) =
          stage_queue::<Trigger>(DECISION_STAGE, stages.queue_capacity, stages.overflow);
        let decision_stage = DecisionStage::new(
          Arc::new(GuardedDecisionClient::new(clients.decision, policy)),
          config.decision.container_id.clone(),
          config.decision.session_name.clone(),
          process_tx,
          notifier.clone(),
        )
        .with_overflow_retry(overflow_retry);
        let decision_pool =
          WorkerPool::spawn(stages.decision_workers, decision_rx, Arc::new(decision_stage));

        let subscriber = Subscriber::new(subscription, decision_tx, notifier.clone())
          .with_overflow_retry(overflow_retry);
        (tokio::spawn(subscriber.run(cancel.clone())), Some(decision_pool))
      }
      PipelineMode::Direct => {
        let subscriber = Subscriber::new(subscription, process_tx, notifier.clone())
          .with_overflow_retry(overflow_retry);
        (tokio::spawn(subscriber.run(cancel.clone())), None)
      }
    };

    let publisher = Publisher::new(broker, config.broker.topic.clone(), notifier);

    Ok(Self {
      cancel,
      publisher,
      subscriber,
      decision_pool,
      process_pool,
      session: clients.session,
    })
  }

  /// A publisher onto the pipeline's topic.
  pub fn publisher(&self) -> Publisher {
    self.publisher.clone()
  }

  /// Stop consuming, drain both stages, then close the engine session.
  ///
  /// Items already accepted by a stage queue are processed before this
  /// returns. The session is closed even if a stage task failed.
  pub async fn shutdown(self) -> Result<(), PipelineError> {
    info!("shutting down pipeline");
    self.cancel.cancel();

    let mut failure = None;
    match self.subscriber.await {
      Ok(Ok(())) => {}
      Ok(Err(e)) => {
        error!(error = %e, "subscriber stopped with error");
        failure = Some(e);
      }
      Err(e) => {
        error!(error = %e, "subscriber task failed");
        failure = Some(PipelineError::Task {
          message: format!("subscriber: {}", e),
        });
      }
    }

    // The subscriber owned the decision queue's only sender and each
    // decision worker owns a process-start sender, so each pool drains and
    // stops once the stage before it has.
    if let Some(pool) = self.decision_pool {
      if let Err(e) = pool.join().await {
        failure.get_or_insert(e);
      }
    }
    if let Err(e) = self.process_pool.join().await {
      failure.get_or_insert(e);
    }

    self.session.close().await;
    info!("pipeline stopped");

    failure.map_or(Ok(()), Err)
  }
}
