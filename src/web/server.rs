use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

use super::{api, AppState};
use crate::config::{ConfigChangeEvent, RuntimeConfigManager, ServerSettings};

pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/api/health", get(api::health_check))
        .route("/api/stats", get(api::get_stats))
        // Simulation
        .route("/api/simulate-roi-trailing", post(api::post_simulate_roi_trailing))
        // Config endpoints
        .route("/api/config", get(api::get_config).post(api::post_config))
        .route("/api/config/reset", post(api::post_config_reset))
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    // credentials cannot be combined with wildcard methods/headers
    CorsLayer::new()
        .allow_origin(allowed)
        .allow_credentials(true)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::HeaderName::from_static("x-requested-with"),
        ])
}

/// Port and CORS are bound once at startup; later changes only apply on restart.
fn requires_restart(event: &ConfigChangeEvent, active: &ServerSettings) -> bool {
    event.config().server != *active
}

pub fn spawn_config_watcher(manager: &RuntimeConfigManager, active: ServerSettings) -> JoinHandle<()> {
    let mut rx = manager.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if requires_restart(&event, &active) {
                        warn!(
                            "Server settings changed (port {}, {} CORS origin(s)); restart to apply",
                            event.config().server.port,
                            event.config().server.cors_origins.len()
                        );
                    } else {
                        debug!("Config change applied to the next simulation request");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Config watcher lagged, skipped {} change event(s)", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

pub async fn start_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let active = state.config_manager.get_config().await.server;
    let _watcher = spawn_config_watcher(&state.config_manager, active.clone());
    let app = build_router(state, &active.cors_origins);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Simulator API starting on http://localhost:{}", port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
