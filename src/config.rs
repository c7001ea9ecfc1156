//! Service configuration: defaults, optional TOML file, `MDPDF_*` environment.

use crate::service::{ConversionLimits, DEFAULT_MAX_FILE_SIZE, DEFAULT_RENDER_TIMEOUT};
use serde::{Deserialize, Deserializer};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const ENV_PREFIX: &str = "MDPDF";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TEMP_DIR: &str = "./temp";
const DEFAULT_SKELETON_PATH: &str = "./exam-template.typ";
const DEFAULT_TYPST_BIN: &str = "typst";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid listen address {host}:{port}: {source}")]
    Address {
        host: String,
        port: u16,
        #[source]
        source: std::net::AddrParseError,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub temp_dir: PathBuf,
    pub skeleton_path: PathBuf,
    pub max_file_size: u64,
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout_duration: Duration,
    pub typst_bin: PathBuf,
    #[serde(default)]
    pub log_json: bool,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

impl Config {
    /// Loads defaults, then `file` if given, then `MDPDF_*` variables.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("host", DEFAULT_HOST)?
            .set_default("port", DEFAULT_PORT as i64)?
            .set_default("temp_dir", DEFAULT_TEMP_DIR)?
            .set_default("skeleton_path", DEFAULT_SKELETON_PATH)?
            .set_default("max_file_size", DEFAULT_MAX_FILE_SIZE as i64)?
            .set_default(
                "timeout_duration",
                format!("{}s", DEFAULT_RENDER_TIMEOUT.as_secs()),
            )?
            .set_default("typst_bin", DEFAULT_TYPST_BIN)?;

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }

        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|source| ConfigError::Address {
                host: self.host.clone(),
                port: self.port,
                source,
            })
    }

    pub fn limits(&self) -> ConversionLimits {
        ConversionLimits {
            max_file_size: self.max_file_size,
            render_timeout: self.timeout_duration,
        }
    }
}

/// Parses `500ms`, `30s`, `2m`, `1h`, or bare seconds.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);
    let number: f64 = number.parse().ok()?;
    let seconds = match unit.trim() {
        "ms" => number / 1000.0,
        "" | "s" => number,
        "m" => number * 60.0,
        "h" => number * 3600.0,
        _ => return None,
    };
    Duration::try_from_secs_f64(seconds).ok()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(u64),
    Text(String),
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    match RawDuration::deserialize(deserializer)? {
        RawDuration::Seconds(secs) => Ok(Duration::from_secs(secs)),
        RawDuration::Text(text) => parse_duration(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid duration `{text}`"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("45"), Some(Duration::from_secs(45)));
        assert_eq!(parse_duration("1.5s"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration("10 fortnights"), None);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mdpdf.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
port = 8080
skeleton_path = "/srv/templates/exam.typ"
max_file_size = 1024
timeout_duration = "5s"
log_json = true
"#
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.skeleton_path, PathBuf::from("/srv/templates/exam.typ"));
        assert_eq!(config.max_file_size, 1024);
        assert_eq!(config.timeout_duration, Duration::from_secs(5));
        assert!(config.log_json);
        assert_eq!(config.typst_bin, PathBuf::from("typst"));
        assert_eq!(config.temp_dir, PathBuf::from("./temp"));
    }

    #[test]
    fn test_numeric_timeout_in_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mdpdf.toml");
        std::fs::write(&path, "timeout_duration = 12\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config.timeout_duration, Duration::from_secs(12));
    }

    #[test]
    fn test_limits_and_address() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mdpdf.toml");
        std::fs::write(&path, "host = \"127.0.0.1\"\nport = 3100\nmax_file_size = 10\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config.listen_addr().unwrap(), "127.0.0.1:3100".parse::<SocketAddr>().unwrap());
        assert_eq!(config.limits().max_file_size, 10);
    }
}
