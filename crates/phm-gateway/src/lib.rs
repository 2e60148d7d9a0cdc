//! PHM Gateway
//!
//! HTTP entry point for triggers, plus read-only views of the engine server.
//!
//! | Route | |
//! |---|---|
//! | `POST /trigger` | publish a trigger, `202` with the broker ack |
//! | `GET /kieserver/listContainers` | deployed containers |
//! | `GET /kieserver/capabilities` | server capabilities |
//! | `GET /kieserver/processes/:container_id` | process definitions |
//! | `GET /health` | liveness |

mod error;
mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use phm_kie::EngineDiagnostics;
use phm_pipeline::Publisher;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use error::GatewayError;
pub use handlers::TriggerAccepted;

/// Shared handler state.
#[derive(Clone)]
pub struct GatewayState {
  pub publisher: Publisher,
  pub diagnostics: Arc<dyn EngineDiagnostics>,
}

impl GatewayState {
  pub fn new(publisher: Publisher, diagnostics: Arc<dyn EngineDiagnostics>) -> Self {
    Self {
      publisher,
      diagnostics,
    }
  }
}

/// Build the gateway router.
pub fn build_router(state: GatewayState) -> Router {
  Router::new()
    .route("/trigger", post(handlers::post_trigger))
    .route("/kieserver/listContainers", get(handlers::list_containers))
    .route("/kieserver/capabilities", get(handlers::list_capabilities))
    .route(
      "/kieserver/processes/:container_id",
      get(handlers::list_processes),
    )
    .route("/health", get(handlers::health))
    .with_state(state)
}

/// Serve the gateway on `addr` until `cancel` fires.
pub async fn serve(
  addr: SocketAddr,
  state: GatewayState,
  cancel: CancellationToken,
) -> std::io::Result<()> {
  let listener = tokio::net::TcpListener::bind(addr).await?;
  info!(addr = %listener.local_addr()?, "gateway listening");

  axum::serve(listener, build_router(state))
    .with_graceful_shutdown(async move { cancel.cancelled().await })
    .await?;

  info!("gateway stopped");
  Ok(())
}
