use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::AppState;
use crate::config::RuntimeConfig;
use crate::engine::{RoiTrailingSimulator, SimulationSummary};
use crate::error::{ConfigError, SimulationError};
use crate::types::{SimulationPayload, SimulationStep};

/// Error body shared by every endpoint: `{"status": "error", "message": ...}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({"status": "error", "message": self.message}))).into_response()
    }
}

impl From<SimulationError> for ApiError {
    fn from(err: SimulationError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

// === Simulation ===

#[derive(Debug, Serialize)]
pub struct SimulationResponse {
    pub status: &'static str,
    pub steps: Vec<SimulationStep>,
}

pub async fn post_simulate_roi_trailing(
    State(state): State<AppState>,
    payload: Result<Json<SimulationPayload>, JsonRejection>,
) -> Result<Json<SimulationResponse>, ApiError> {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!("Rejected simulation request: {}", rejection.body_text());
            state.record_rejection().await;
            return Err(rejection.into());
        }
    };

    let config = state.config_manager.get_config().await;
    let policy = config.policy().map_err(|errors| {
        error!("Active trailing policy is invalid: {}", errors.join(", "));
        ApiError::internal("trailing policy misconfigured")
    })?;

    let result = payload
        .into_request(config.request_defaults())
        .and_then(|request| {
            let steps = RoiTrailingSimulator::new(policy).run(&request)?;
            Ok((request, steps))
        });
    let (request, steps) = match result {
        Ok(run) => run,
        Err(err) => {
            warn!("Rejected simulation request on {}: {}", err.field(), err);
            state.record_rejection().await;
            return Err(err.into());
        }
    };

    if let Some(summary) = SimulationSummary::from_steps(&steps) {
        info!(
            "Simulated {} @ {} ({}x, margin {}): {}/{} steps, stopped_out={}, peak_roe={}%",
            request.direction,
            request.entry_price,
            request.leverage,
            request.margin,
            summary.steps_evaluated,
            request.prices.len(),
            summary.stopped_out,
            summary.peak_roe
        );
        state.record_run(summary.stopped_out).await;
    }

    Ok(Json(SimulationResponse { status: "ok", steps }))
}

// === Configuration Endpoints ===

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub status: &'static str,
    pub config: RuntimeConfig,
}

pub async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.config_manager.get_config().await;
    Json(ConfigResponse { status: "ok", config })
}

pub async fn post_config(
    State(state): State<AppState>,
    patch: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ConfigResponse>, ApiError> {
    let Json(patch) = patch?;
    let config = state.config_manager.update_partial(patch).await.map_err(|err| {
        warn!("Rejected config update: {}", err);
        ApiError::from(err)
    })?;
    Ok(Json(ConfigResponse { status: "ok", config }))
}

pub async fn post_config_reset(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.config_manager.reset().await;
    Json(ConfigResponse { status: "ok", config })
}

// === Stats ===

pub async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.get_stats().await)
}

// === Health Check ===

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: i64,
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.started_at,
        uptime_seconds: (Utc::now() - state.started_at).num_seconds(),
    })
}
