//! Configuration types for bookworm.
//!
//! Settings are layered, lowest to highest: the embedded defaults below, the
//! config file, `BOOKWORM_*` environment variables, then command-line
//! overrides ([`Config::apply`]). [`Config::resolve`] validates the result
//! and produces the [`Settings`] the server runs with. [`Config::defaults`]
//! returns the embedded defaults without touching the filesystem (useful in
//! tests).

use crate::analysis::{Pattern, PatternError, PatternMode, ReportFormat};
use crate::decoder::DEFAULT_MAX_LINE_BYTES;
use serde::Deserialize;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Embedded defaults
// ---------------------------------------------------------------------------

const DEFAULT_CONFIG: &str = r#"
[server]
bind           = "127.0.0.1"
output_dir     = "."
max_line_bytes = 1048576

[analysis]
mode          = "literal"
interval_secs = 5
worker_count  = 2
report_format = "text"
"#;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error(transparent)]
    Pattern(#[from] PatternError),
}

// ---------------------------------------------------------------------------
// Public config types
// ---------------------------------------------------------------------------

/// Top-level configuration as read from the layered sources.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Listen port. Required; there is no default.
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

fn default_bind() -> String { "127.0.0.1".to_string() }
fn default_output_dir() -> PathBuf { PathBuf::from(".") }
fn default_max_line_bytes() -> usize { DEFAULT_MAX_LINE_BYTES }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: None,
            output_dir: default_output_dir(),
            max_line_bytes: default_max_line_bytes(),
        }
    }
}

/// `[analysis]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Text to count in every document. Required; there is no default.
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub mode: PatternMode,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub report_format: ReportFormat,
}

fn default_interval_secs() -> u64 { 5 }
fn default_worker_count() -> usize { 2 }

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            pattern: None,
            mode: PatternMode::default(),
            interval_secs: default_interval_secs(),
            worker_count: default_worker_count(),
            report_format: ReportFormat::default(),
        }
    }
}

/// Values given on the command line; `None` leaves the layered value alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub output_dir: Option<PathBuf>,
    pub pattern: Option<String>,
    pub mode: Option<PatternMode>,
    pub interval_secs: Option<u64>,
    pub worker_count: Option<usize>,
    pub report_format: Option<ReportFormat>,
}

/// Validated settings the server runs with.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind: IpAddr,
    pub port: u16,
    pub output_dir: PathBuf,
    pub max_line_bytes: usize,
    pub pattern: Pattern,
    pub interval: Duration,
    pub worker_count: usize,
    pub report_format: ReportFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    /// Load the embedded defaults, then `path` (or the per-user config file if
    /// no path is given), then `BOOKWORM_*` environment variables such as
    /// `BOOKWORM_SERVER__PORT` or `BOOKWORM_ANALYSIS__PATTERN`.
    ///
    /// An explicit `path` must exist; the per-user file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::from(config_path().as_path()).required(false),
        };

        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("BOOKWORM")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
            .map_err(Into::into)
    }

    /// Layer a TOML document on top of the embedded defaults.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
            .map_err(Into::into)
    }

    /// Return the built-in defaults without touching the filesystem.
    pub fn defaults() -> Self {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .build()
            .expect("built-in default config must be valid TOML")
            .try_deserialize()
            .expect("built-in default config must deserialize correctly")
    }

    /// Apply command-line overrides on top of the layered values.
    pub fn apply(&mut self, overrides: ConfigOverrides) {
        let ConfigOverrides {
            bind,
            port,
            output_dir,
            pattern,
            mode,
            interval_secs,
            worker_count,
            report_format,
        } = overrides;

        if let Some(bind) = bind {
            self.server.bind = bind;
        }
        if port.is_some() {
            self.server.port = port;
        }
        if let Some(dir) = output_dir {
            self.server.output_dir = dir;
        }
        if pattern.is_some() {
            self.analysis.pattern = pattern;
        }
        if let Some(mode) = mode {
            self.analysis.mode = mode;
        }
        if let Some(secs) = interval_secs {
            self.analysis.interval_secs = secs;
        }
        if let Some(n) = worker_count {
            self.analysis.worker_count = n;
        }
        if let Some(format) = report_format {
            self.analysis.report_format = format;
        }
    }

    /// Check required and bounded values and compile the pattern.
    pub fn resolve(&self) -> Result<Settings, ConfigError> {
        let port = self.server.port.ok_or(ConfigError::Missing("server.port"))?;
        let text = self
            .analysis
            .pattern
            .as_deref()
            .ok_or(ConfigError::Missing("analysis.pattern"))?;
        if text.is_empty() {
            return Err(invalid("analysis.pattern", "must not be empty"));
        }
        let bind: IpAddr = self
            .server
            .bind
            .parse()
            .map_err(|err: std::net::AddrParseError| invalid("server.bind", err))?;
        if self.server.max_line_bytes == 0 {
            return Err(invalid("server.max_line_bytes", "must be greater than zero"));
        }
        if self.analysis.interval_secs == 0 {
            return Err(invalid("analysis.interval_secs", "must be greater than zero"));
        }
        if self.analysis.worker_count == 0 {
            return Err(invalid("analysis.worker_count", "must be greater than zero"));
        }

        Ok(Settings {
            bind,
            port,
            output_dir: self.server.output_dir.clone(),
            max_line_bytes: self.server.max_line_bytes,
            pattern: Pattern::new(text, self.analysis.mode)?,
            interval: Duration::from_secs(self.analysis.interval_secs),
            worker_count: self.analysis.worker_count,
            report_format: self.analysis.report_format,
        })
    }
}

fn invalid(key: &'static str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

fn config_path() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
                .join(".config")
        })
        .join("bookworm")
        .join("config.toml")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
