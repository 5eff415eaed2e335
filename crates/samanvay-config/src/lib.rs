use std::fs;
use std::path::{Path, PathBuf};

use samanvay_core::CoreError;
use samanvay_server::{ServerClientConfig, ServerConfigError};
use samanvay_sync::{SessionConfig, SessionConfigError};
use samanvay_transport::{TransportConfig, TransportConfigError};
use thiserror::Error;

mod redact;
mod schema;
mod validate;

pub use schema::json_schema;

/// Top-level typed configuration contract.
#[derive(Debug, Clone, PartialEq)]
pub struct SamanvayConfig {
    pub server: ServerClientConfig,
    pub transport: TransportConfig,
    pub session: SessionConfig,
    pub logging: Option<LoggingConfig>,
}

impl Default for SamanvayConfig {
    fn default() -> Self {
        Self {
            server: ServerClientConfig::default(),
            transport: TransportConfig::default(),
            session: SessionConfig::default(),
            logging: None,
        }
    }
}

impl SamanvayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.transport.validate()?;
        self.session.validate()?;
        Ok(())
    }

    /// Section validation plus cross-section checks run before anything
    /// connects.
    pub fn validate_startup(&self) -> Result<(), ConfigError> {
        validate::validate_startup(self)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let document: schema::SamanvayConfigDocument =
            serde_yaml::from_str(text).map_err(ConfigError::ParseYaml)?;
        Self::try_from(document)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// YAML rendering with secrets and configured paths replaced.
    pub fn to_redacted_yaml(&self) -> Result<String, ConfigError> {
        redact::to_redacted_yaml(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Extra dotted paths to redact when the config is rendered.
    pub redact: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            redact: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing` filters.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    InvalidServer(#[from] ServerConfigError),

    #[error(transparent)]
    InvalidTransport(#[from] TransportConfigError),

    #[error(transparent)]
    InvalidSession(#[from] SessionConfigError),

    #[error("invalid {field}: {source}")]
    InvalidCoordinate {
        field: &'static str,
        #[source]
        source: CoreError,
    },

    #[error("invalid socket address for {field}: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error(
        "transport.max_frame_bytes is {max_frame_bytes}; a full-length chat message needs {required}"
    )]
    FrameLimitBelowChatMessage {
        max_frame_bytes: usize,
        required: usize,
    },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ParseYaml(#[source] serde_yaml::Error),

    #[error("failed to serialize config: {0}")]
    SerializeConfig(#[source] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::{ConfigError, LogFormat, LogLevel, SamanvayConfig};

    #[test]
    fn defaults_validate() {
        let config = SamanvayConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.validate_startup().is_ok());
    }

    #[test]
    fn empty_document_yields_defaults() {
        let config = SamanvayConfig::from_yaml_str("{}").expect("empty document should parse");
        assert_eq!(config, SamanvayConfig::default());
    }

    #[test]
    fn parses_full_document() {
        let config = SamanvayConfig::from_yaml_str(
            r#"
server:
  endpoint: https://ops.example
  api_prefix: /api
  request_timeout: 10s
  api_token: field-token
transport:
  live_addr: 10.0.0.5:8765
  max_frame_bytes: 65536
  connect_timeout: 2s
  read_timeout: 90s
  write_timeout: 500ms
  reconnect:
    enabled: true
    initial_delay: 1s
    max_delay: 30s
    backoff_factor: 2.0
    jitter: 0.2
    max_retries: 12
  outbound_queue: 32
  inbound_queue: 128
session:
  operator_location:
    lat: 20.2961
    lng: 85.8245
  event_buffer: 64
  command_queue: 16
  exposure_samples_per_leg: 8
logging:
  level: debug
  format: json
"#,
        )
        .expect("document should parse");

        assert_eq!(config.server.endpoint, "https://ops.example");
        assert_eq!(config.server.api_token.as_deref(), Some("field-token"));
        assert_eq!(config.transport.read_timeout, Some(Duration::from_secs(90)));
        assert_eq!(config.transport.write_timeout, Duration::from_millis(500));
        assert_eq!(config.transport.reconnect_policy.max_retries, Some(12));
        assert_eq!(
            config
                .session
                .operator_location
                .map(|location| location.latitude()),
            Some(20.2961)
        );
        let logging = config.logging.expect("logging section");
        assert_eq!(logging.level, LogLevel::Debug);
        assert_eq!(logging.format, LogFormat::Json);
        assert_eq!(LogLevel::Debug.as_str(), "debug");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let error = SamanvayConfig::from_yaml_str("server:\n  endpont: http://x\n")
            .expect_err("typo should fail");
        assert!(matches!(error, ConfigError::ParseYaml(_)));
    }

    #[test]
    fn invalid_sections_surface_their_own_errors() {
        let address = SamanvayConfig::from_yaml_str("transport:\n  live_addr: not-an-addr\n")
            .expect_err("bad address should fail");
        assert!(matches!(
            address,
            ConfigError::InvalidAddress {
                field: "transport.live_addr",
                ..
            }
        ));

        let location = SamanvayConfig::from_yaml_str(
            "session:\n  operator_location:\n    lat: 120.0\n    lng: 85.0\n",
        )
        .expect_err("out of range latitude should fail");
        assert!(matches!(location, ConfigError::InvalidCoordinate { .. }));
    }
}
