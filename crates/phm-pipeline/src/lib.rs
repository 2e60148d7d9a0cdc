//! PHM Trigger Pipeline
//!
//! Moves triggers from the broker through the decision engine into new
//! process instances.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Publisher                           │
//! │  - serializes a Trigger, key "phm-trigger", onto the topic  │
//! └─────────────────────────────────────────────────────────────┘
//!                               │ broker
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Subscriber                          │
//! │  - decodes triggers, rejects malformed messages             │
//! │  - commits once the trigger is accepted downstream          │
//! └─────────────────────────────────────────────────────────────┘
//!                               │ bounded queue
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  DecisionStage × N workers                  │
//! │  - FactMap per trigger → execute_commands                   │
//! └─────────────────────────────────────────────────────────────┘
//!                               │ bounded queue
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                ProcessStartStage × M workers                │
//! │  - Response facts → pDataList → start_process               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let kie = Arc::new(KieServerClient::connect(&config.kie).await?);
//! let broker = Arc::new(InMemoryBroker::new(config.broker.partitions));
//!
//! let pipeline = Pipeline::start(&config, broker, EngineClients::shared(kie)).await?;
//! pipeline.publisher().publish(&Trigger::new("T1", "M1")).await?;
//!
//! pipeline.shutdown().await?;
//! ```

mod decision;
mod error;
mod events;
mod pipeline;
mod policy;
mod process_start;
mod publish;
mod queue;
mod subscribe;

pub use decision::DecisionStage;
pub use error::{PipelineError, StageError};
pub use events::{ChannelNotifier, NoopNotifier, PipelineEvent, PipelineNotifier};
pub use pipeline::{EngineClients, Pipeline};
pub use policy::{CallPolicy, GuardedDecisionClient, GuardedProcessClient};
pub use process_start::{ProcessStartItem, ProcessStartStage};
pub use publish::{Publisher, ROUTING_KEY};
pub use queue::{QueueReceiver, QueueSender, StageWorker, WorkerPool, stage_queue};
pub use subscribe::Subscriber;
