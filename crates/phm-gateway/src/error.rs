use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use phm_broker::TransportError;
use phm_kie::KieError;
use serde_json::json;

/// Errors returned by gateway handlers.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
  /// The trigger could not be handed to the broker.
  #[error("trigger not accepted: {0}")]
  Transport(#[from] TransportError),

  /// The engine server could not answer a diagnostic request.
  #[error("engine server error: {0}")]
  Engine(#[from] KieError),
}

impl GatewayError {
  fn status(&self) -> StatusCode {
    match self {
      GatewayError::Transport(TransportError::Encode(_)) => StatusCode::UNPROCESSABLE_ENTITY,
      GatewayError::Transport(_) => StatusCode::SERVICE_UNAVAILABLE,
      GatewayError::Engine(_) => StatusCode::BAD_GATEWAY,
    }
  }
}

impl IntoResponse for GatewayError {
  fn into_response(self) -> Response {
    let status = self.status();
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
