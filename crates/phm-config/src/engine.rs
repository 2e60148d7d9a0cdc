use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Connection settings for the decision/process engine server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KieConfig {
  #[serde(default = "default_server_url")]
  pub server_url: String,
  #[serde(default = "default_user")]
  pub user: String,
  /// Usually supplied through the environment rather than the file.
  #[serde(default, skip_serializing)]
  pub password: Option<String>,
  /// Package of the fact classes known to the rule project.
  #[serde(default = "default_model_package")]
  pub model_package: String,
}

impl KieConfig {
  pub(crate) fn validate(&self) -> Result<(), ConfigError> {
    if self.server_url.trim().is_empty() {
      return Err(ConfigError::missing("kie", "server_url"));
    }
    if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
      return Err(ConfigError::invalid(
        "kie",
        "server_url",
        format!("'{}' is not an http(s) url", self.server_url),
      ));
    }
    if self.user.trim().is_empty() {
      return Err(ConfigError::missing("kie", "user"));
    }
    match &self.password {
      Some(password) if !password.is_empty() => Ok(()),
      _ => Err(ConfigError::missing("kie", "password")),
    }
  }
}

impl Default for KieConfig {
  fn default() -> Self {
    Self {
      server_url: default_server_url(),
      user: default_user(),
      password: None,
      model_package: default_model_package(),
    }
  }
}

/// Rule session the decision stage feeds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionConfig {
  #[serde(default)]
  pub container_id: String,
  #[serde(default)]
  pub session_name: String,
}

impl DecisionConfig {
  pub(crate) fn validate(&self) -> Result<(), ConfigError> {
    if self.container_id.trim().is_empty() {
      return Err(ConfigError::missing("decision", "container_id"));
    }
    if self.session_name.trim().is_empty() {
      return Err(ConfigError::missing("decision", "session_name"));
    }
    Ok(())
  }
}

/// Process definition the process-start stage instantiates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
  #[serde(default)]
  pub container_id: String,
  #[serde(default)]
  pub definition_id: String,
}

impl ProcessConfig {
  pub(crate) fn validate(&self) -> Result<(), ConfigError> {
    if self.container_id.trim().is_empty() {
      return Err(ConfigError::missing("process", "container_id"));
    }
    if self.definition_id.trim().is_empty() {
      return Err(ConfigError::missing("process", "definition_id"));
    }
    Ok(())
  }
}

fn default_server_url() -> String {
  "http://localhost:8080/kie-server/services/rest/server".to_string()
}

fn default_user() -> String {
  "kieAdmin".to_string()
}

fn default_model_package() -> String {
  "com.health_insurance.phm_model".to_string()
}
