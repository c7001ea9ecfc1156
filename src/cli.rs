//! Command-line arguments and the one-shot `convert` command.

use crate::config::{parse_duration, Config};
use crate::converter::TypstCliRenderer;
use crate::registry::JobRegistry;
use crate::request::ConversionRequest;
use crate::service::{ConversionLimits, ConversionService};
use crate::template::TemplateSource;
use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "mdpdf", version, about = "Markdown to PDF conversion via Typst")]
pub struct CliArgs {
    /// Optional path to a TOML configuration file.
    #[arg(long = "config-file", env = "MDPDF_CONFIG_FILE", value_name = "PATH", global = true)]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP conversion service (default).
    Serve,
    /// Convert a single markdown file to PDF.
    Convert(ConvertArgs),
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// Input markdown file.
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Output PDF file; defaults to the input path with a `.pdf` extension.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Skeleton template; overrides `skeleton_path` from configuration.
    #[arg(short, long, value_name = "FILE")]
    pub template: Option<PathBuf>,

    /// Render timeout such as `30s` or `2m`; overrides `timeout_duration`.
    #[arg(long, value_name = "DURATION", value_parser = parse_timeout)]
    pub timeout: Option<Duration>,
}

fn parse_timeout(value: &str) -> Result<Duration, String> {
    parse_duration(value).ok_or_else(|| format!("invalid duration `{value}`"))
}

/// Default output path: the input with its extension replaced by `.pdf`.
pub fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("pdf")
}

/// Converts one markdown file and writes the PDF next to it (or to `--output`).
pub async fn run_convert(args: ConvertArgs, config: &Config) -> Result<PathBuf> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input));
    if output == args.input {
        return Err(anyhow!(
            "Output path {} would overwrite the input",
            output.display()
        ));
    }

    let markdown = tokio::fs::read_to_string(&args.input)
        .await
        .with_context(|| format!("Failed to read input file {}", args.input.display()))?;

    let template = TemplateSource::new(
        args.template
            .clone()
            .unwrap_or_else(|| config.skeleton_path.clone()),
    );
    tokio::fs::create_dir_all(&config.temp_dir)
        .await
        .with_context(|| format!("Failed to create temp directory {}", config.temp_dir.display()))?;
    let renderer =
        TypstCliRenderer::new(&config.typst_bin, template.root_dir(), &config.temp_dir);
    let limits = ConversionLimits {
        render_timeout: args.timeout.unwrap_or(config.timeout_duration),
        ..config.limits()
    };
    let service = ConversionService::new(
        Arc::new(renderer),
        Arc::new(JobRegistry::new()),
        template,
        limits,
    );

    info!("Converting {} to PDF...", args.input.display());
    let pdf = service
        .convert(ConversionRequest::markdown(markdown))
        .await
        .with_context(|| format!("Failed to convert {}", args.input.display()))?;

    tokio::fs::write(&output, &pdf.bytes)
        .await
        .with_context(|| format!("Failed to write PDF file {}", output.display()))?;

    info!(
        "Generated {} bytes in {:?}: {}",
        pdf.bytes.len(),
        pdf.duration,
        output.display()
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_definition() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_parse_convert() {
        let args = CliArgs::parse_from([
            "mdpdf",
            "convert",
            "--input",
            "notes.md",
            "--template",
            "custom.typ",
            "--timeout",
            "2m",
        ]);

        match args.command {
            Some(Command::Convert(convert)) => {
                assert_eq!(convert.input, PathBuf::from("notes.md"));
                assert_eq!(convert.output, None);
                assert_eq!(convert.template, Some(PathBuf::from("custom.typ")));
                assert_eq!(convert.timeout, Some(Duration::from_secs(120)));
            }
            other => panic!("expected convert, got {other:?}"),
        }
    }

    #[test]
    fn test_serve_is_optional() {
        let args = CliArgs::parse_from(["mdpdf"]);

        assert!(args.command.is_none());
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("exams/test.md")),
            PathBuf::from("exams/test.pdf")
        );
        assert_eq!(default_output_path(Path::new("README")), PathBuf::from("README.pdf"));
    }

    #[tokio::test]
    async fn test_convert_uses_configured_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("notes.md");
        std::fs::write(&input, "# Notes").unwrap();
        let template = dir.path().join("skeleton.typ");
        std::fs::write(&template, "{{Placeholder Markdown}}").unwrap();
        let config = Config {
            host: "127.0.0.1".into(),
            port: 0,
            temp_dir: dir.path().join("scratch"),
            skeleton_path: template,
            max_file_size: 1024,
            timeout_duration: Duration::from_secs(5),
            typst_bin: PathBuf::from("/nonexistent/typst-binary"),
            log_json: false,
            otlp_endpoint: None,
        };
        let args = ConvertArgs {
            input,
            output: None,
            template: None,
            timeout: None,
        };

        let result = run_convert(args, &config).await;

        assert!(result.is_err());
        assert!(config.temp_dir.is_dir());
        assert!(!dir.path().join("notes.pdf").exists());
    }

    #[tokio::test]
    async fn test_convert_refuses_to_overwrite_input() {
        let config = Config::load(None).unwrap();
        let args = ConvertArgs {
            input: PathBuf::from("exam.pdf"),
            output: None,
            template: None,
            timeout: None,
        };

        let result = run_convert(args, &config).await;

        assert!(result.unwrap_err().to_string().contains("overwrite the input"));
    }
}
