//! PHM KIE
//!
//! Contracts between the pipeline and the external engines, and the REST
//! client that fulfils them against a KIE server.
//!
//! The pipeline only ever sees the capability traits:
//! - [`DecisionEngineClient`]: run a batch of facts through a rule session
//! - [`ProcessEngineClient`]: start a process instance
//! - [`EngineDiagnostics`]: list containers, capabilities and process definitions
//! - [`EngineSession`]: release the connection at shutdown
//!
//! [`KieServerClient`] implements all four. It is built once at startup and
//! shared behind an `Arc`, so stages never reach for a global client and tests
//! can substitute their own implementations.

mod client;
mod error;
mod marshal;

use async_trait::async_trait;
use phm_model::{
  ContainerInfo, FactMap, ProcessDefinition, ProcessInstanceId, ProcessVariables, ResultFactSet,
};

pub use client::KieServerClient;
pub use error::{DecisionError, KieError, ProcessError};

/// Executes facts against a named rule session.
#[async_trait]
pub trait DecisionEngineClient: Send + Sync {
  /// Insert `facts`, fire all rules and return the session's results.
  async fn execute_commands(
    &self,
    container_id: &str,
    session_name: &str,
    facts: FactMap,
  ) -> Result<ResultFactSet, DecisionError>;
}

/// Starts process instances.
#[async_trait]
pub trait ProcessEngineClient: Send + Sync {
  async fn start_process(
    &self,
    container_id: &str,
    process_definition_id: &str,
    variables: ProcessVariables,
  ) -> Result<ProcessInstanceId, ProcessError>;
}

/// Read-only views of the engine server. Not on the pipeline's critical path.
#[async_trait]
pub trait EngineDiagnostics: Send + Sync {
  async fn list_containers(&self) -> Result<Vec<ContainerInfo>, KieError>;

  async fn list_capabilities(&self) -> Result<Vec<String>, KieError>;

  async fn list_processes(&self, container_id: &str) -> Result<Vec<ProcessDefinition>, KieError>;
}

/// Lifecycle of an engine connection.
#[async_trait]
pub trait EngineSession: Send + Sync {
  /// Release the connection. Called once, after the pipeline has drained.
  async fn close(&self);
}
