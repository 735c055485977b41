//! HTTP server setup and configuration
//!
//! Routing, listener binding and graceful shutdown for the signing server.

use axum::{extract::DefaultBodyLimit, http::Request, routing::get, Router};
use std::{sync::Arc, time::SystemTime};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument};

use crate::{
    config::ServerSettings,
    http::{form::FormRenderer, handlers::*},
    signing::SigningService,
    types::Result,
};

/// Start the HTTP server with the given settings
#[instrument(skip_all)]
pub async fn start_server(
    settings: ServerSettings,
    shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let service = SigningService::from_settings(&settings);
    let form = FormRenderer::new(settings.templates_dir.as_deref())?;

    let app_state = Arc::new(AppState {
        settings: settings.clone(),
        service,
        form,
        start_time: SystemTime::now(),
    });

    let router = create_router(app_state);

    info!(
        listen_addr = %settings.listen,
        temp_dir = %settings.temp_dir.display(),
        max_content_size = settings.max_content_size,
        max_concurrent_jobs = settings.max_concurrent_jobs,
        full_error_responses = settings.full_error_responses,
        signer = %settings.signer_program,
        "Starting HTTP server"
    );

    // Create TCP listener
    let listener = TcpListener::bind(settings.listen).await.map_err(|e| {
        error!(
            error = %e,
            addr = %settings.listen,
            "Failed to bind to address"
        );
        crate::types::Error::Io(e)
    })?;

    info!(
        local_addr = %listener.local_addr().unwrap_or(settings.listen),
        "HTTP server listening"
    );

    let server = axum::serve(listener, router).with_graceful_shutdown(async {
        shutdown_signal.await;
        info!("Shutdown signal received, starting graceful shutdown");
    });

    if let Err(e) = server.await {
        error!(error = %e, "HTTP server error");
        return Err(crate::types::Error::Io(e));
    }

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Create the Axum router with all endpoints and middleware
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let settings = &app_state.settings;

    // The signing pipeline enforces its own body cap
    let router = Router::new()
        .route("/sign", get(handle_form).post(handle_sign))
        .route(&settings.health_path, get(handle_health));

    let router = if settings.metrics_enabled {
        router.route(&settings.metrics_path, get(handle_metrics))
    } else {
        router
    };

    router
        .fallback(handle_not_found)
        .layer(DefaultBodyLimit::disable())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let user_agent = request
                    .headers()
                    .get(axum::http::header::USER_AGENT)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");
                crate::logging::request_span(
                    request.method().as_str(),
                    &request.uri().to_string(),
                    user_agent,
                )
            }),
        )
        .with_state(app_state)
}
