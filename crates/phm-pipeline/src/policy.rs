//! Retry and timeout policy at the engine call boundary.
//!
//! [`GuardedDecisionClient`] and [`GuardedProcessClient`] wrap the engine
//! clients so the stages stay unaware of the policy. With the default
//! [`RetryConfig`] (one attempt, no timeout) they pass calls straight through.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use phm_config::RetryConfig;
use phm_kie::{DecisionEngineClient, DecisionError, ProcessEngineClient, ProcessError};
use phm_model::{FactMap, ProcessInstanceId, ProcessVariables, ResultFactSet};
use tracing::warn;

/// How many times an engine call is attempted, how long each attempt may
/// take and how long to wait in between.
#[derive(Debug, Clone, Default)]
pub struct CallPolicy {
  retry: RetryConfig,
}

impl CallPolicy {
  pub fn new(retry: RetryConfig) -> Self {
    Self { retry }
  }

  pub fn max_attempts(&self) -> u32 {
    self.retry.max_attempts.max(1)
  }

  /// Run `call` under the policy. `on_timeout` builds the error reported
  /// when a single attempt exceeds the call timeout.
  pub async fn run<T, E, F, Fut>(
    &self,
    operation: &'static str,
    on_timeout: impl Fn(Duration) -> E,
    mut call: F,
  ) -> Result<T, E>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
  {
    let max_attempts = self.max_attempts();
    let mut attempt = 1;
    loop {
      let result = match self.retry.call_timeout() {
        Some(limit) => match tokio::time::timeout(limit, call()).await {
          Ok(result) => result,
          Err(_) => Err(on_timeout(limit)),
        },
        None => call().await,
      };

      match result {
        Ok(value) => return Ok(value),
        Err(e) if attempt < max_attempts => {
          let delay = self.retry.delay_for(attempt);
          warn!(
            operation,
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %e,
            "engine call failed, retrying"
          );
          tokio::time::sleep(delay).await;
          attempt += 1;
        }
        Err(e) => return Err(e),
      }
    }
  }
}

/// A decision client with a [`CallPolicy`] applied to every call.
pub struct GuardedDecisionClient {
  inner: Arc<dyn DecisionEngineClient>,
  policy: CallPolicy,
}

impl GuardedDecisionClient {
  pub fn new(inner: Arc<dyn DecisionEngineClient>, policy: CallPolicy) -> Self {
    Self { inner, policy }
  }
}

#[async_trait]
impl DecisionEngineClient for GuardedDecisionClient {
  async fn execute_commands(
    &self,
    container_id: &str,
    session_name: &str,
    facts: FactMap,
  ) -> Result<ResultFactSet, DecisionError> {
    self
      .policy
      .run("execute_commands", DecisionError::Timeout, || {
        self
          .inner
          .execute_commands(container_id, session_name, facts.clone())
      })
      .await
  }
}

/// A process client with a [`CallPolicy`] applied to every call.
pub struct GuardedProcessClient {
  inner: Arc<dyn ProcessEngineClient>,
  policy: CallPolicy,
}

impl GuardedProcessClient {
  pub fn new(inner: Arc<dyn ProcessEngineClient>, policy: CallPolicy) -> Self {
    Self { inner, policy }
  }
}

#[async_trait]
impl ProcessEngineClient for GuardedProcessClient {
  async fn start_process(
    &self,
    container_id: &str,
    process_definition_id: &str,
    variables: ProcessVariables,
  ) -> Result<ProcessInstanceId, ProcessError> {
    self
      .policy
      .run("start_process", ProcessError::Timeout, || {
        self
          .inner
          .start_process(container_id, process_definition_id, variables.clone())
      })
      .await
  }
}
