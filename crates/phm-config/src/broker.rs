use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::enums::BrokerKind;
use crate::error::ConfigError;

/// Broker connection and topic settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerConfig {
  #[serde(default)]
  pub kind: BrokerKind,
  #[serde(default = "default_host")]
  pub host: String,
  #[serde(default = "default_port")]
  pub port: u16,
  #[serde(default = "default_topic")]
  pub topic: String,
  /// Consumer group the subscribe stage joins.
  #[serde(default = "default_group_id")]
  pub group_id: String,
  /// Partitions per topic of the in-memory broker.
  #[serde(default = "default_partitions")]
  pub partitions: u32,
  /// Records kept per partition by the in-memory broker.
  #[serde(default = "default_retention")]
  pub retention: usize,
  /// How long a send may wait for the broker's acknowledgement.
  #[serde(default = "default_send_timeout_ms")]
  pub send_timeout_ms: u64,
}

impl BrokerConfig {
  /// `host:port` of the broker.
  pub fn endpoint(&self) -> String {
    format!("{}:{}", self.host, self.port)
  }

  pub fn send_timeout(&self) -> Duration {
    Duration::from_millis(self.send_timeout_ms)
  }

  pub(crate) fn validate(&self) -> Result<(), ConfigError> {
    if self.kind == BrokerKind::Kafka {
      if self.host.trim().is_empty() {
        return Err(ConfigError::missing("broker", "host"));
      }
      if self.port == 0 {
        return Err(ConfigError::invalid("broker", "port", "must not be 0"));
      }
    }
    if self.send_timeout_ms == 0 {
      return Err(ConfigError::invalid(
        "broker",
        "send_timeout_ms",
        "must be at least 1",
      ));
    }
    if self.retention == 0 {
      return Err(ConfigError::invalid(
        "broker",
        "retention",
        "must be at least 1",
      ));
    }
    if self.topic.trim().is_empty() {
      return Err(ConfigError::missing("broker", "topic"));
    }
    if self.group_id.trim().is_empty() {
      return Err(ConfigError::missing("broker", "group_id"));
    }
    if self.partitions == 0 {
      return Err(ConfigError::invalid(
        "broker",
        "partitions",
        "must be at least 1",
      ));
    }
    Ok(())
  }
}

impl Default for BrokerConfig {
  fn default() -> Self {
    Self {
      kind: BrokerKind::default(),
      host: default_host(),
      port: default_port(),
      topic: default_topic(),
      group_id: default_group_id(),
      partitions: default_partitions(),
      retention: default_retention(),
      send_timeout_ms: default_send_timeout_ms(),
    }
  }
}

fn default_host() -> String {
  "localhost".to_string()
}

fn default_port() -> u16 {
  9092
}

fn default_topic() -> String {
  "test".to_string()
}

fn default_group_id() -> String {
  "phm-trigger-consumers".to_string()
}

fn default_partitions() -> u32 {
  1
}

fn default_retention() -> usize {
  10_000
}

fn default_send_timeout_ms() -> u64 {
  5_000
}
