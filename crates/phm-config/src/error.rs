use std::path::PathBuf;

/// Errors raised while loading or validating configuration.
///
/// All of these are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read config file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse config file {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("missing required setting '{section}.{setting}'")]
  MissingSetting { section: String, setting: String },

  #[error("invalid setting '{section}.{setting}': {message}")]
  InvalidSetting {
    section: String,
    setting: String,
    message: String,
  },
}

impl ConfigError {
  pub(crate) fn missing(section: &str, setting: &str) -> Self {
    ConfigError::MissingSetting {
      section: section.to_string(),
      setting: setting.to_string(),
    }
  }

  pub(crate) fn invalid(section: &str, setting: &str, message: impl Into<String>) -> Self {
    ConfigError::InvalidSetting {
      section: section.to_string(),
      setting: setting.to_string(),
      message: message.into(),
    }
  }
}
