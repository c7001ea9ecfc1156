//! Conversion request payloads and option handling.

use crate::error::ConvertError;
use serde::Deserialize;
use serde_json::{Map, Value};

pub const DEFAULT_FILENAME: &str = "document.pdf";

/// JSON body accepted by the conversion endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertRequestBody {
    #[serde(default)]
    pub markdown_content: Option<String>,
    #[serde(default)]
    pub typst_content: Option<String>,
    #[serde(default)]
    pub options: Option<Map<String, Value>>,
}

/// Document content to convert. Exactly one kind per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionInput {
    /// Markdown injected into the skeleton template.
    Markdown(String),
    /// Complete Typst source rendered as-is.
    Typst(String),
}

impl ConversionInput {
    pub fn len(&self) -> usize {
        match self {
            Self::Markdown(content) | Self::Typst(content) => content.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Recognized conversion options. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionOptions {
    pub filename: Option<String>,
}

impl ConversionOptions {
    pub fn from_map(options: Option<&Map<String, Value>>) -> Self {
        let filename = options
            .and_then(|map| map.get("filename"))
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .map(str::to_owned);
        Self { filename }
    }

    /// Attachment filename: sanitized, `.pdf`-suffixed, `document.pdf` by default.
    pub fn output_filename(&self) -> String {
        let Some(requested) = self.filename.as_deref() else {
            return DEFAULT_FILENAME.to_string();
        };

        let mut name: String = requested
            .chars()
            .map(|c| match c {
                '"' | '\\' | '/' => '_',
                c if c.is_ascii_graphic() || c == ' ' => c,
                _ => '_',
            })
            .collect();
        if !name.ends_with(".pdf") {
            name.push_str(".pdf");
        }
        name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub input: ConversionInput,
    pub options: ConversionOptions,
}

impl ConversionRequest {
    pub fn markdown(content: impl Into<String>) -> Self {
        Self {
            input: ConversionInput::Markdown(content.into()),
            options: ConversionOptions::default(),
        }
    }

    pub fn typst(content: impl Into<String>) -> Self {
        Self {
            input: ConversionInput::Typst(content.into()),
            options: ConversionOptions::default(),
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.options.filename = Some(filename.into());
        self
    }

    /// Builds a request from a body carrying either markdown or Typst content.
    pub fn from_body(body: ConvertRequestBody) -> Result<Self, ConvertError> {
        let options = ConversionOptions::from_map(body.options.as_ref());
        let markdown = body.markdown_content.filter(|s| !s.is_empty());
        let typst = body.typst_content.filter(|s| !s.is_empty());

        let input = match (markdown, typst) {
            (Some(markdown), None) => ConversionInput::Markdown(markdown),
            (None, Some(typst)) => ConversionInput::Typst(typst),
            (Some(_), Some(_)) => {
                return Err(ConvertError::BadRequest(
                    "Provide either markdownContent or typstContent, not both".to_string(),
                ))
            }
            (None, None) => {
                return Err(ConvertError::BadRequest(
                    "Missing markdownContent or typstContent in request body".to_string(),
                ))
            }
        };

        Ok(Self { input, options })
    }

    /// Builds a request from a body that must carry markdown.
    pub fn markdown_from_body(body: ConvertRequestBody) -> Result<Self, ConvertError> {
        let options = ConversionOptions::from_map(body.options.as_ref());
        match body.markdown_content.filter(|s| !s.is_empty()) {
            Some(markdown) => Ok(Self {
                input: ConversionInput::Markdown(markdown),
                options,
            }),
            None => Err(ConvertError::BadRequest(
                "Missing markdownContent in request body".to_string(),
            )),
        }
    }
}
