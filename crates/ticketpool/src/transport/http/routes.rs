//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::orchestrator::OrchestratorError;
use crate::service::SimulationService;
use crate::status::SystemStatus;

use super::websocket::websocket;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: SystemStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTicketsParams {
    pub number_of_tickets: u64,
    pub vendor_id: u32,
}

fn message(status: StatusCode, text: impl Into<String>) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(serde_json::json!({ "message": text.into() })))
}

fn error(status: StatusCode, text: impl Into<String>) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(serde_json::json!({ "error": text.into() })))
}

fn orchestrator_error(err: OrchestratorError) -> (StatusCode, Json<serde_json::Value>) {
    match err {
        OrchestratorError::InvalidConfig(reason) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "Invalid configuration provided.",
                "reason": reason.to_string(),
            })),
        ),
        OrchestratorError::InvalidState(state) => error(StatusCode::BAD_REQUEST, state.to_string()),
    }
}

async fn configure(
    State(service): State<Arc<SimulationService>>,
    Json(config): Json<SimulationConfig>,
) -> impl IntoResponse {
    match service.orchestrator().configure(config) {
        Ok(()) => message(StatusCode::OK, "Configuration saved successfully"),
        Err(e) => {
            tracing::debug!(error = %e, "Rejected configuration");
            orchestrator_error(e)
        }
    }
}

async fn start(State(service): State<Arc<SimulationService>>) -> impl IntoResponse {
    match service.orchestrator().start().await {
        Ok(()) => message(StatusCode::OK, "System started successfully"),
        Err(e) => orchestrator_error(e),
    }
}

async fn stop(State(service): State<Arc<SimulationService>>) -> impl IntoResponse {
    service.orchestrator().stop().await;
    message(StatusCode::OK, "System stopped")
}

async fn add_tickets(
    State(service): State<Arc<SimulationService>>,
    Query(params): Query<AddTicketsParams>,
) -> impl IntoResponse {
    match service
        .orchestrator()
        .add_tickets(params.number_of_tickets, params.vendor_id)
        .await
    {
        Ok(added) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": format!(
                    "Vendor {} added {} tickets successfully.",
                    params.vendor_id, params.number_of_tickets
                ),
                "added": added,
            })),
        ),
        Err(e) => orchestrator_error(e),
    }
}

async fn status(State(service): State<Arc<SimulationService>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: service.orchestrator().status().await,
    })
}

async fn tickets(State(service): State<Arc<SimulationService>>) -> impl IntoResponse {
    Json(service.orchestrator().stats().await)
}

async fn logs(State(service): State<Arc<SimulationService>>) -> Json<Vec<String>> {
    Json(service.orchestrator().logs())
}

async fn save_configuration(
    State(service): State<Arc<SimulationService>>,
    Json(config): Json<SimulationConfig>,
) -> impl IntoResponse {
    match service.config_store().save(config) {
        Ok(saved) => (StatusCode::OK, Json(serde_json::json!(saved))),
        Err(e) => {
            tracing::error!(error = %e, "Failed to save configuration");
            error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn load_configuration(State(service): State<Arc<SimulationService>>) -> impl IntoResponse {
    match service.config_store().load() {
        Ok(Some(config)) => (StatusCode::OK, Json(serde_json::json!(config))),
        Ok(None) => error(StatusCode::NOT_FOUND, "No saved configuration"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn reset_configuration(State(service): State<Arc<SimulationService>>) -> impl IntoResponse {
    match service.config_store().reset_to_default() {
        Ok(config) => (StatusCode::OK, Json(serde_json::json!(config))),
        Err(e) => {
            tracing::error!(error = %e, "Failed to reset configuration");
            error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

pub fn routes(service: Arc<SimulationService>) -> Router {
    Router::new()
        .route("/api/ticket/configure", post(configure))
        .route("/api/ticket/start", post(start))
        .route("/api/ticket/stop", post(stop))
        .route("/api/ticket/vendor/add", post(add_tickets))
        .route("/api/ticket/status", get(status))
        .route("/api/ticket/tickets", get(tickets))
        .route("/api/ticket/logs", get(logs))
        .route("/api/configuration/save", post(save_configuration))
        .route("/api/configuration/load", get(load_configuration))
        .route("/api/configuration/reset", post(reset_configuration))
        .route("/websocket", get(websocket))
        .with_state(service)
}
