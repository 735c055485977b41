//! HTTP endpoint handlers
//!
//! `POST /sign` hands the request to the signing service in its own task, so
//! a client that disconnects mid-signing does not cancel the signer and the
//! job still cleans up after itself.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::{sync::Arc, time::SystemTime};
use tracing::{error, warn, Instrument};

use crate::{config::ServerSettings, http::form::FormRenderer, signing::SigningService};

/// Application state shared across handlers
pub struct AppState {
    pub settings: ServerSettings,
    pub service: SigningService,
    pub form: FormRenderer,
    pub start_time: SystemTime,
}

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub active_jobs: usize,
    pub max_concurrent_jobs: Option<usize>,
}

/// POST /sign - sign an uploaded shortcut
pub async fn handle_sign(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let service = state.service.clone();
    let job = tokio::spawn(async move { service.handle(request).await }.in_current_span());

    match job.await {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "Signing task failed");
            state
                .service
                .composer()
                .internal_error(&format!("Signing task failed: {}", e))
        }
    }
}

/// GET /sign - HTML submission form
pub async fn handle_form(State(state): State<Arc<AppState>>) -> Response {
    match state.form.render("/sign", state.settings.max_content_size) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render submission form");
            state
                .service
                .composer()
                .internal_error(&format!("Failed to render form: {}", e))
        }
    }
}

/// GET /health - Health check endpoint
pub async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let uptime_seconds = SystemTime::now()
        .duration_since(state.start_time)
        .unwrap_or_default()
        .as_secs();
    let admission = state.service.admission();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        active_jobs: admission.active(),
        max_concurrent_jobs: admission.limit(),
    })
}

/// GET /metrics - Prometheus metrics endpoint
pub async fn handle_metrics() -> Result<impl IntoResponse, StatusCode> {
    match crate::metrics::gather_metrics() {
        Ok(metrics_text) => Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            metrics_text,
        )),
        Err(e) => {
            warn!(error = %e, "Failed to gather Prometheus metrics");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle unknown paths
pub async fn handle_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not found")
}
