use serde::{Deserialize, Serialize};

/// Which transport carries triggers between ingress and the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerKind {
  /// Kafka cluster at `host:port`. Accepted triggers survive restarts.
  #[default]
  Kafka,
  /// In-process log. Accepted but unconsumed triggers are lost on exit.
  Memory,
}

/// What a producer does when a stage queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
  /// Wait until a slot frees up.
  #[default]
  Block,
  /// Fail the enqueue immediately and let the producer decide.
  Reject,
}

/// Which stages a consumed trigger runs through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
  /// subscribe -> decision -> process start
  #[default]
  Decision,
  /// subscribe -> process start, variables taken from the trigger itself
  Direct,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryBackoff {
  #[default]
  Constant,
  Linear,
  Exponential,
}
