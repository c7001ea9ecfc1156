//! Conversion orchestration: validation, templating, job tracking, rendering.

use crate::converter::Renderer;
use crate::error::{ConvertError, RenderError, Result};
use crate::invoker::render_with_deadline;
use crate::job::{JobKind, JobReport, JobStatus};
use crate::registry::{JobRegistry, JobSnapshot};
use crate::request::{ConversionInput, ConversionRequest};
use crate::telemetry;
use crate::template::TemplateSource;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Document compiled by the health check.
pub const HEALTH_CHECK_DOCUMENT: &str = "#set page(paper: \"a4\", margin: 1cm)
= Health Check
This is a test document to verify Typst compilation.";

pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-request bounds.
#[derive(Debug, Clone, Copy)]
pub struct ConversionLimits {
    pub max_file_size: u64,
    pub render_timeout: Duration,
}

impl Default for ConversionLimits {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            render_timeout: DEFAULT_RENDER_TIMEOUT,
        }
    }
}

/// A successfully rendered document.
#[derive(Debug, Clone)]
pub struct RenderedPdf {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub job_id: String,
    pub duration: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    #[serde(rename = "activeProcesses")]
    pub active_processes: usize,
    pub processes: Vec<JobSnapshot>,
}

/// Outcome of a canary render.
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub healthy: bool,
    pub message: String,
}

/// Runs conversions against a renderer and tracks them in a registry.
///
/// Cheap to share behind an `Arc`; every call owns its own job and the
/// registry is the only shared mutable state.
pub struct ConversionService {
    renderer: Arc<dyn Renderer>,
    registry: Arc<JobRegistry>,
    template: TemplateSource,
    limits: ConversionLimits,
}

impl ConversionService {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        registry: Arc<JobRegistry>,
        template: TemplateSource,
        limits: ConversionLimits,
    ) -> Self {
        Self {
            renderer,
            registry,
            template,
            limits,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn template(&self) -> &TemplateSource {
        &self.template
    }

    pub fn limits(&self) -> ConversionLimits {
        self.limits
    }

    /// Converts one request into PDF bytes.
    ///
    /// Size is checked before the template or renderer are touched. The job
    /// stays registered only while the renderer is being awaited.
    pub async fn convert(&self, request: ConversionRequest) -> Result<RenderedPdf> {
        let ConversionRequest { input, options } = request;

        let size = input.len();
        if size as u64 > self.limits.max_file_size {
            return Err(ConvertError::PayloadTooLarge {
                size: Some(size),
                limit: self.limits.max_file_size,
            });
        }
        if input.is_empty() {
            return Err(ConvertError::BadRequest(
                "Missing markdownContent or typstContent in request body".to_string(),
            ));
        }

        let (kind, source) = match input {
            ConversionInput::Markdown(markdown) => {
                info!("Starting markdown to PDF conversion for {} characters", size);
                (JobKind::Markdown, self.template.apply(&markdown).await?)
            }
            ConversionInput::Typst(source) => (JobKind::Typst, source),
        };

        let (job_id, duration, rendered) = self.render_tracked(source).await;

        let report = JobReport {
            job_id: job_id.clone(),
            kind,
            status: match &rendered {
                Ok(_) => JobStatus::Complete,
                Err(RenderError::Cancelled { .. }) => JobStatus::Cancelled,
                Err(_) => JobStatus::Failed,
            },
            duration_ms: duration.as_millis() as i64,
            input_bytes: size,
            output_bytes: rendered.as_ref().ok().map(Vec::len),
            error: rendered.as_ref().err().map(ToString::to_string),
        };
        telemetry::record_job_telemetry(&report);

        let bytes = rendered?;
        Ok(RenderedPdf {
            bytes,
            filename: options.output_filename(),
            job_id,
            duration,
        })
    }

    /// Registers a job for the duration of one render.
    async fn render_tracked(
        &self,
        source: String,
    ) -> (String, Duration, std::result::Result<Vec<u8>, RenderError>) {
        let guard = self.registry.register();
        let job_id = guard.id().to_string();
        info!(
            "Starting Typst conversion for job {} ({} characters)",
            job_id,
            source.len()
        );

        let started = Instant::now();
        let rendered = render_with_deadline(
            Arc::clone(&self.renderer),
            source,
            self.limits.render_timeout,
            guard.cancel_token(),
        )
        .await;
        let duration = started.elapsed();
        drop(guard);

        match &rendered {
            Ok(bytes) => info!(
                "PDF generated successfully for job {}: {} bytes in {:?}",
                job_id,
                bytes.len(),
                duration
            ),
            Err(e) => info!("Conversion for job {} ended after {:?}: {}", job_id, duration, e),
        }

        (job_id, duration, rendered)
    }

    pub fn stats(&self) -> Stats {
        let processes = self.registry.snapshot();
        Stats {
            active_processes: processes.len(),
            processes,
        }
    }

    /// Compiles a fixed minimal document to prove the renderer works.
    ///
    /// Not registered as a job. Renderer errors are reported verbatim.
    pub async fn health_check(&self) -> HealthReport {
        let started = Instant::now();
        let result = render_with_deadline(
            Arc::clone(&self.renderer),
            HEALTH_CHECK_DOCUMENT.to_string(),
            self.limits.render_timeout,
            CancellationToken::new(),
        )
        .await;
        let duration = started.elapsed();

        match result {
            Ok(bytes) => HealthReport {
                healthy: true,
                message: format!(
                    "Test compilation successful ({} bytes in {:?})",
                    bytes.len(),
                    duration
                ),
            },
            Err(e) => HealthReport {
                healthy: false,
                message: format!("Typst compilation test failed: {}", e),
            },
        }
    }

    /// Checks the template on disk and test-compiles it with `# Test`.
    pub async fn validate_template(&self) -> Result<()> {
        let template = self.template.load().await?;
        debug!(
            template = %self.template.path().display(),
            "Validating skeleton template"
        );
        let source = crate::template::substitute(&template, "# Test")?;

        render_with_deadline(
            Arc::clone(&self.renderer),
            source,
            self.limits.render_timeout,
            CancellationToken::new(),
        )
        .await?;
        Ok(())
    }
}
