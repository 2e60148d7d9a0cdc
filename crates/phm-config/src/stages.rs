use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::enums::{OverflowPolicy, RetryBackoff};
use crate::error::ConfigError;

/// Sizing of the internal stage queues and worker pools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
  #[serde(default = "default_workers")]
  pub decision_workers: usize,
  #[serde(default = "default_workers")]
  pub process_workers: usize,
  /// Capacity of each stage queue.
  #[serde(default = "default_queue_capacity")]
  pub queue_capacity: usize,
  #[serde(default)]
  pub overflow: OverflowPolicy,
  /// How long the subscriber waits before offering a rejected item again.
  #[serde(default = "default_overflow_retry_ms")]
  pub overflow_retry_ms: u64,
}

impl StageConfig {
  pub fn overflow_retry(&self) -> Duration {
    Duration::from_millis(self.overflow_retry_ms)
  }

  pub(crate) fn validate(&self) -> Result<(), ConfigError> {
    if self.decision_workers == 0 {
      return Err(ConfigError::invalid(
        "stages",
        "decision_workers",
        "must be at least 1",
      ));
    }
    if self.process_workers == 0 {
      return Err(ConfigError::invalid(
        "stages",
        "process_workers",
        "must be at least 1",
      ));
    }
    if self.queue_capacity == 0 {
      return Err(ConfigError::invalid(
        "stages",
        "queue_capacity",
        "must be at least 1",
      ));
    }
    Ok(())
  }
}

impl Default for StageConfig {
  fn default() -> Self {
    Self {
      decision_workers: default_workers(),
      process_workers: default_workers(),
      queue_capacity: default_queue_capacity(),
      overflow: OverflowPolicy::default(),
      overflow_retry_ms: default_overflow_retry_ms(),
    }
  }
}

/// Policy applied around every engine call.
///
/// The default (one attempt, no timeout) leaves a failed call failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
  #[serde(default = "default_max_attempts")]
  pub max_attempts: u32,
  #[serde(default)]
  pub backoff: RetryBackoff,
  #[serde(default = "default_backoff_ms")]
  pub backoff_ms: u64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub call_timeout_ms: Option<u64>,
}

impl RetryConfig {
  /// Delay before retry number `attempt` (1-based: the delay after the first failure is `attempt == 1`).
  pub fn delay_for(&self, attempt: u32) -> Duration {
    let base = self.backoff_ms;
    let millis = match self.backoff {
      RetryBackoff::Constant => base,
      RetryBackoff::Linear => base.saturating_mul(attempt as u64),
      RetryBackoff::Exponential => {
        base.saturating_mul(1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX))
      }
    };
    Duration::from_millis(millis)
  }

  pub fn call_timeout(&self) -> Option<Duration> {
    self.call_timeout_ms.map(Duration::from_millis)
  }

  pub(crate) fn validate(&self) -> Result<(), ConfigError> {
    if self.max_attempts == 0 {
      return Err(ConfigError::invalid(
        "retry",
        "max_attempts",
        "must be at least 1",
      ));
    }
    if self.call_timeout_ms == Some(0) {
      return Err(ConfigError::invalid(
        "retry",
        "call_timeout_ms",
        "must be greater than 0",
      ));
    }
    Ok(())
  }
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_attempts: default_max_attempts(),
      backoff: RetryBackoff::default(),
      backoff_ms: default_backoff_ms(),
      call_timeout_ms: None,
    }
  }
}

/// Ingress listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
  #[serde(default = "default_listen")]
  pub listen: SocketAddr,
}

impl Default for HttpConfig {
  fn default() -> Self {
    Self {
      listen: default_listen(),
    }
  }
}

fn default_workers() -> usize {
  1
}

fn default_queue_capacity() -> usize {
  100
}

fn default_overflow_retry_ms() -> u64 {
  50
}

fn default_max_attempts() -> u32 {
  1
}

fn default_backoff_ms() -> u64 {
  500
}

fn default_listen() -> SocketAddr {
  SocketAddr::from(([0, 0, 0, 0], 8080))
}
