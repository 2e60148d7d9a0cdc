use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use phm_model::{ContainerInfo, ProcessDefinition, Trigger};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::GatewayState;
use crate::error::GatewayError;

/// Broker acknowledgement returned to the caller of `POST /trigger`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerAccepted {
  pub trigger_id: String,
  pub topic: String,
  pub partition: u32,
  pub offset: u64,
}

/// POST /trigger
///
/// Only acceptance by the broker is reported; what the pipeline later does
/// with the trigger is not.
pub async fn post_trigger(
  State(state): State<GatewayState>,
  Json(trigger): Json<Trigger>,
) -> Result<(StatusCode, Json<TriggerAccepted>), GatewayError> {
  let ack = state.publisher.publish(&trigger).await.map_err(|e| {
    warn!(trigger_id = %trigger.trigger_id(), error = %e, "trigger rejected");
    e
  })?;

  info!(
    trigger_id = %trigger.trigger_id(),
    partition = ack.partition,
    offset = ack.offset,
    "trigger accepted"
  );
  Ok((
    StatusCode::ACCEPTED,
    Json(TriggerAccepted {
      trigger_id: trigger.trigger_id().to_string(),
      topic: ack.topic,
      partition: ack.partition,
      offset: ack.offset,
    }),
  ))
}

/// GET /kieserver/listContainers
pub async fn list_containers(
  State(state): State<GatewayState>,
) -> Result<Json<Vec<ContainerInfo>>, GatewayError> {
  Ok(Json(state.diagnostics.list_containers().await?))
}

/// GET /kieserver/capabilities
pub async fn list_capabilities(
  State(state): State<GatewayState>,
) -> Result<Json<Vec<String>>, GatewayError> {
  Ok(Json(state.diagnostics.list_capabilities().await?))
}

/// GET /kieserver/processes/:container_id
pub async fn list_processes(
  State(state): State<GatewayState>,
  Path(container_id): Path<String>,
) -> Result<Json<Vec<ProcessDefinition>>, GatewayError> {
  Ok(Json(state.diagnostics.list_processes(&container_id).await?))
}

/// GET /health
pub async fn health() -> Json<Value> {
  Json(json!({ "status": "ok" }))
}
