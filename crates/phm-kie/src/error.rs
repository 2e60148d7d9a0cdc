use std::time::Duration;

/// Errors talking to the engine server, independent of which call failed.
#[derive(Debug, thiserror::Error)]
pub enum KieError {
  /// The request could not be sent or the response could not be read.
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  /// The server answered with a non-success status and no service message.
  #[error("server returned status {status}: {body}")]
  Status { status: u16, body: String },

  /// The server reported a non-success service response.
  #[error("server rejected the request: {message}")]
  Rejected { message: String },

  /// The response did not have the expected shape.
  #[error("invalid server response: {0}")]
  InvalidResponse(String),
}

/// A decision call did not produce results.
#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
  #[error("decision rejected by container '{container_id}': {message}")]
  Rejected {
    container_id: String,
    message: String,
  },

  #[error("decision call failed: {0}")]
  Engine(#[source] KieError),

  #[error("decision call timed out after {0:?}")]
  Timeout(Duration),
}

impl DecisionError {
  pub(crate) fn from_kie(container_id: &str, error: KieError) -> Self {
    match error {
      KieError::Rejected { message } => DecisionError::Rejected {
        container_id: container_id.to_string(),
        message,
      },
      other => DecisionError::Engine(other),
    }
  }
}

/// A process instance could not be started.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
  #[error("process '{process_definition_id}' rejected by container '{container_id}': {message}")]
  Rejected {
    container_id: String,
    process_definition_id: String,
    message: String,
  },

  #[error("process start failed: {0}")]
  Engine(#[source] KieError),

  #[error("process start timed out after {0:?}")]
  Timeout(Duration),
}

impl ProcessError {
  pub(crate) fn from_kie(container_id: &str, process_definition_id: &str, error: KieError) -> Self {
    match error {
      KieError::Rejected { message } => ProcessError::Rejected {
        container_id: container_id.to_string(),
        process_definition_id: process_definition_id.to_string(),
        message,
      },
      other => ProcessError::Engine(other),
    }
  }
}
