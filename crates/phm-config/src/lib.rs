//! PHM Config
//!
//! Typed configuration for the trigger pipeline. Everything the stages need
//! (broker topic, engine container/session/process ids, worker counts, queue
//! bounds, call policy) is resolved once at startup from a JSON file and then
//! handed to the stages as plain structs.
//!
//! Missing or invalid required settings surface as [`ConfigError`] from
//! [`PipelineConfig::validate`]; the binary refuses to start in that case.

mod broker;
mod engine;
mod enums;
mod error;
mod stages;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use broker::BrokerConfig;
pub use engine::{DecisionConfig, KieConfig, ProcessConfig};
pub use enums::{BrokerKind, OverflowPolicy, PipelineMode, RetryBackoff};
pub use error::ConfigError;
pub use stages::{HttpConfig, RetryConfig, StageConfig};

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
  #[serde(default)]
  pub mode: PipelineMode,
  #[serde(default)]
  pub broker: BrokerConfig,
  #[serde(default)]
  pub kie: KieConfig,
  #[serde(default)]
  pub decision: DecisionConfig,
  #[serde(default)]
  pub process: ProcessConfig,
  #[serde(default)]
  pub stages: StageConfig,
  #[serde(default)]
  pub retry: RetryConfig,
  #[serde(default)]
  pub http: HttpConfig,
}

impl PipelineConfig {
  /// Read and parse a JSON config file. Does not validate.
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Check that every required setting is present and sane.
  ///
  /// The decision section is only required when the pipeline runs the
  /// decision stage.
  pub fn validate(&self) -> Result<(), ConfigError> {
    self.broker.validate()?;
    self.kie.validate()?;
    if self.mode == PipelineMode::Decision {
      self.decision.validate()?;
    }
    self.process.validate()?;
    self.stages.validate()?;
    self.retry.validate()?;
    Ok(())
  }
}
