//! Typst skeleton templates and markdown placeholder substitution.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Literal token replaced with caller content.
pub const PLACEHOLDER: &str = "{{Placeholder Markdown}}";

/// Template problems. These are operator misconfigurations, never client faults.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("skeleton template must contain {} placeholder", PLACEHOLDER)]
    MissingPlaceholder,

    #[error("failed to read skeleton template {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Replaces the first placeholder in `template` with `content`, verbatim.
pub fn substitute(template: &str, content: &str) -> Result<String, TemplateError> {
    if !template.contains(PLACEHOLDER) {
        return Err(TemplateError::MissingPlaceholder);
    }
    Ok(template.replacen(PLACEHOLDER, content, 1))
}

/// A skeleton template on disk.
///
/// The file is read again for every conversion, so edits made while the
/// service runs take effect on the next request.
#[derive(Debug, Clone)]
pub struct TemplateSource {
    path: PathBuf,
}

impl TemplateSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory that relative imports inside the template resolve against.
    pub fn root_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Reads the current template contents.
    pub async fn load(&self) -> Result<String, TemplateError> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| TemplateError::Unreadable {
                path: self.path.clone(),
                source,
            })
    }

    /// Loads the template and injects `markdown` into it.
    pub async fn apply(&self, markdown: &str) -> Result<String, TemplateError> {
        let template = self.load().await?;
        let document = substitute(&template, markdown)?;
        debug!(
            template = %self.path.display(),
            template_bytes = template.len(),
            document_bytes = document.len(),
            "Applied skeleton template"
        );
        Ok(document)
    }
}
