//! Typst source to PDF rendering via the `typst` compiler.

use anyhow::{bail, Context, Result};
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How often a running compiler process is checked for exit or cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// An engine that turns a Typst document into PDF bytes.
///
/// Implementations are called from a blocking thread. They should check
/// `cancel` where they can; once it fires, nobody is waiting for the result.
#[cfg_attr(test, mockall::automock)]
pub trait Renderer: Send + Sync {
    /// Renders a complete Typst document.
    ///
    /// # Arguments
    ///
    /// * `source` - Typst markup, already templated
    /// * `cancel` - Fired when the caller stops waiting
    ///
    /// # Returns
    ///
    /// Returns the PDF bytes. An empty vector is treated as a failure by the caller.
    fn render(&self, source: &str, cancel: &CancellationToken) -> Result<Vec<u8>>;
}

/// Renderer that shells out to the `typst` compiler.
///
/// The document is fed through stdin so that relative imports resolve
/// against `root`. Output lands in a scratch directory under `temp_dir`
/// which is removed when rendering finishes, whatever the outcome.
#[derive(Debug, Clone)]
pub struct TypstCliRenderer {
    program: PathBuf,
    root: PathBuf,
    temp_dir: PathBuf,
}

impl TypstCliRenderer {
    /// Creates a renderer.
    ///
    /// # Arguments
    ///
    /// * `program` - Path or name of the `typst` executable
    /// * `root` - Project root passed to the compiler (usually the template directory)
    /// * `temp_dir` - Parent directory for per-render scratch directories
    pub fn new(
        program: impl Into<PathBuf>,
        root: impl Into<PathBuf>,
        temp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            root: root.into(),
            temp_dir: temp_dir.into(),
        }
    }
}

impl Renderer for TypstCliRenderer {
    /// Compiles `source` and returns the PDF bytes.
    ///
    /// # Arguments
    ///
    /// * `source` - Typst markup written to the compiler's stdin
    /// * `cancel` - Checked every poll interval while the compiler runs
    ///
    /// # Returns
    ///
    /// Returns the bytes of the generated PDF, or an error if compilation
    /// fails or is cancelled.
    ///
    /// # Errors
    ///
    /// - Scratch directory or file I/O errors
    /// - The compiler could not be started
    /// - The compiler exited unsuccessfully (stderr is included in the message)
    /// - `cancel` fired; the child process is killed first
    fn render(&self, source: &str, cancel: &CancellationToken) -> Result<Vec<u8>> {
        // Nothing is waiting for the result any more
        if cancel.is_cancelled() {
            bail!("Typst compilation cancelled");
        }

        // Per-render scratch directory, removed on drop
        let scratch = tempfile::Builder::new()
            .prefix("mdpdf-")
            .tempdir_in(&self.temp_dir)
            .with_context(|| {
                format!("Failed to create scratch directory in {}", self.temp_dir.display())
            })?;
        let output_path = scratch.path().join("document.pdf");
        let mut stderr_log =
            tempfile::tempfile_in(scratch.path()).context("Failed to create stderr capture file")?;

        info!(
            "Compiling Typst document: {} bytes, root={}",
            source.len(),
            self.root.display()
        );

        // Start the compiler reading from stdin
        let mut child = Command::new(&self.program)
            .arg("compile")
            .arg("--root")
            .arg(&self.root)
            .arg("-")
            .arg(&output_path)
            .current_dir(&self.root)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::from(
                stderr_log.try_clone().context("Failed to share stderr capture file")?,
            ))
            .spawn()
            .with_context(|| format!("Failed to start {}", self.program.display()))?;

        // Feed stdin from a helper thread so a compiler that stops reading
        // cannot block the cancellation loop. The thread ends once the pipe
        // closes, which killing the child guarantees.
        if let Some(mut stdin) = child.stdin.take() {
            let document = source.to_owned();
            std::thread::spawn(move || {
                if let Err(e) = stdin.write_all(document.as_bytes()) {
                    debug!("Compiler closed stdin early: {}", e);
                }
            });
        }

        // Wait for exit, killing the compiler if the caller gives up
        let status = loop {
            if let Some(status) = child.try_wait().context("Failed to poll compiler process")? {
                break status;
            }
            if cancel.is_cancelled() {
                warn!("Render cancelled, killing compiler pid={}", child.id());
                let _ = child.kill();
                let _ = child.wait();
                bail!("Typst compilation cancelled");
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        // Surface compiler diagnostics on failure
        if !status.success() {
            let mut diagnostics = String::new();
            stderr_log.seek(SeekFrom::Start(0))?;
            stderr_log.read_to_string(&mut diagnostics)?;
            bail!("typst exited with {}: {}", status, diagnostics.trim());
        }

        let pdf_data = fs::read(&output_path)
            .with_context(|| format!("Failed to read PDF from {}", output_path.display()))?;

        info!("Typst compilation complete: {} bytes", pdf_data.len());
        Ok(pdf_data)
    }
}
