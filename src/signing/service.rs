//! The per-request signing pipeline
//!
//! admission -> decode -> validate -> workspace -> sign -> respond. The job
//! slot, the active-jobs gauge and the workspace are all drop guards, so every
//! exit path after their acquisition releases them.

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderMap},
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn, Instrument};

use super::admission::AdmissionController;
use super::decoder::{DecoderRegistry, SigningRequest};
use super::invoker::{ShortcutsCli, Signer, SigningInvoker};
use super::response::ResponseComposer;
use super::workspace::WorkspaceManager;
use crate::config::ServerSettings;
use crate::logging;
use crate::metrics::{self, ActiveJobGuard};
use crate::types::SigningError;

/// Everything one signing request needs; cheap to clone into a task
#[derive(Clone)]
pub struct SigningService {
    admission: AdmissionController,
    decoders: Arc<DecoderRegistry>,
    workspaces: WorkspaceManager,
    invoker: SigningInvoker,
    composer: ResponseComposer,
    max_content_size: usize,
}

impl SigningService {
    /// Service backed by the platform `shortcuts` tool
    pub fn from_settings(settings: &ServerSettings) -> Self {
        let signer = ShortcutsCli::new(settings.signer_program.clone())
            .with_timeout(settings.signer_timeout);
        info!(
            signer = signer.program(),
            timeout_secs = settings.signer_timeout.map(|t| t.as_secs()).unwrap_or(0),
            "Using external signer"
        );

        let service = Self::new(settings, Arc::new(signer));
        info!(
            temp_root = %service.workspaces.root().display(),
            media_types = ?service.decoders.media_types(),
            full_error_responses = service.composer.verbose(),
            "Signing service ready"
        );
        service
    }

    pub fn new(settings: &ServerSettings, signer: Arc<dyn Signer>) -> Self {
        Self {
            admission: AdmissionController::new(settings.max_concurrent_jobs),
            decoders: Arc::new(DecoderRegistry::with_defaults()),
            workspaces: WorkspaceManager::new(&settings.temp_dir),
            invoker: SigningInvoker::new(signer),
            composer: ResponseComposer::new(
                settings.full_error_responses,
                settings.max_filename_length,
            ),
            max_content_size: settings.max_content_size,
        }
    }

    /// Replace the decoder registry, e.g. to register extra media types
    #[cfg(test)]
    pub fn with_decoders(mut self, decoders: DecoderRegistry) -> Self {
        self.decoders = Arc::new(decoders);
        self
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub fn composer(&self) -> &ResponseComposer {
        &self.composer
    }

    /// Run one request through the pipeline; always produces exactly one response
    pub async fn handle(&self, request: Request) -> Response {
        let (parts, body) = request.into_parts();
        let content_type = header_str(&parts.headers, header::CONTENT_TYPE);

        let span = logging::signing_span(content_type.as_deref().unwrap_or("-"));

        async move {
            match self.run(&parts.headers, content_type.as_deref(), body).await {
                Ok(response) => {
                    metrics::record_signing_outcome("success");
                    response
                }
                Err(err) => {
                    if err.status_code().is_server_error() {
                        error!(kind = err.kind(), error = %err, "Signing request failed");
                    } else {
                        warn!(kind = err.kind(), error = %err, "Signing request rejected");
                    }
                    metrics::record_signing_outcome(err.kind());
                    self.composer.failure(&err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        headers: &HeaderMap,
        content_type: Option<&str>,
        body: Body,
    ) -> Result<Response, SigningError> {
        let _slot = self
            .admission
            .try_acquire()
            .ok_or(SigningError::AdmissionRejected {
                limit: self.admission.limit().unwrap_or_default(),
            })?;
        let _active = ActiveJobGuard::new();

        if let Some(length) = declared_length(headers) {
            if length > self.max_content_size as u64 {
                return Err(SigningError::BodyTooLarge {
                    limit: self.max_content_size,
                });
            }
        }

        let SigningRequest { name, content } = self
            .decoders
            .decode(content_type, body, self.max_content_size)
            .await?;

        if content.is_empty() {
            return Err(SigningError::MissingShortcut);
        }

        let workspace = self.workspaces.create().await?;
        let job_id = workspace.id().to_string();
        logging::add_job_context(&job_id);

        let started = Instant::now();
        let signed = self.invoker.sign(&workspace, &content).await;
        metrics::observe_signing_duration(started.elapsed());
        workspace.cleanup().await;
        let signed = signed?;

        info!(
            name = name.as_deref().unwrap_or(""),
            unsigned_bytes = content.len(),
            signed_bytes = signed.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Shortcut signed"
        );

        Ok(self.composer.success(name.as_deref(), &job_id, signed))
    }
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    header_str(headers, header::CONTENT_LENGTH).and_then(|value| value.trim().parse().ok())
}
