//! Deadline-bounded renderer invocation.

use crate::converter::Renderer;
use crate::error::RenderError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Renders `source` on the blocking pool and waits at most `deadline`.
///
/// When the deadline passes or `cancel` fires first, `cancel` is triggered
/// and `Cancelled` is returned straight away, carrying the time actually
/// waited. The renderer only stops if it watches the token; otherwise it
/// runs to completion in the background and its result is discarded.
pub async fn render_with_deadline(
    renderer: Arc<dyn Renderer>,
    source: String,
    deadline: Duration,
    cancel: CancellationToken,
) -> Result<Vec<u8>, RenderError> {
    let started = Instant::now();
    let token = cancel.clone();
    let task = tokio::task::spawn_blocking(move || renderer.render(&source, &token));

    let joined = tokio::select! {
        joined = task => joined,
        _ = tokio::time::sleep(deadline) => {
            cancel.cancel();
            warn!(deadline_ms = deadline.as_millis() as u64, "Render deadline exceeded");
            return Err(RenderError::Cancelled { after: deadline });
        }
        _ = cancel.cancelled() => {
            return Err(RenderError::Cancelled { after: started.elapsed() });
        }
    };

    match joined {
        Ok(Ok(bytes)) if bytes.is_empty() => Err(RenderError::EmptyOutput),
        Ok(Ok(bytes)) => Ok(bytes),
        Ok(Err(e)) => Err(RenderError::Failed(format!("{:#}", e))),
        Err(e) => Err(RenderError::Failed(format!("renderer task aborted: {}", e))),
    }
}
