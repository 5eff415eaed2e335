use std::{net::SocketAddr, str::FromStr, time::Duration};

use samanvay_core::Coordinate;
use samanvay_server::ServerClientConfig;
use samanvay_sync::SessionConfig;
use samanvay_transport::{ReconnectPolicy, TransportConfig};
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

use crate::{ConfigError, LogFormat, LogLevel, LoggingConfig, SamanvayConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct SamanvayConfigDocument {
    #[serde(default = "default_server_document")]
    pub server: ServerConfigDocument,
    #[serde(default = "default_transport_document")]
    pub transport: TransportConfigDocument,
    #[serde(default = "default_session_document")]
    pub session: SessionConfigDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfigDocument>,
}

impl From<&SamanvayConfig> for SamanvayConfigDocument {
    fn from(value: &SamanvayConfig) -> Self {
        Self {
            server: ServerConfigDocument::from(&value.server),
            transport: TransportConfigDocument::from(&value.transport),
            session: SessionConfigDocument::from(&value.session),
            logging: value.logging.as_ref().map(LoggingConfigDocument::from),
        }
    }
}

impl TryFrom<SamanvayConfigDocument> for SamanvayConfig {
    type Error = ConfigError;

    fn try_from(value: SamanvayConfigDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            server: value.server.into(),
            transport: value.transport.try_into()?,
            session: value.session.try_into()?,
            logging: value.logging.map(Into::into),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct ServerConfigDocument {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    #[serde(default = "default_request_timeout_document")]
    pub request_timeout: DurationDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
}

impl From<&ServerClientConfig> for ServerConfigDocument {
    fn from(value: &ServerClientConfig) -> Self {
        Self {
            endpoint: value.endpoint.clone(),
            api_prefix: value.api_prefix.clone(),
            request_timeout: DurationDocument::from_duration(value.request_timeout),
            api_token: value.api_token.clone(),
        }
    }
}

impl From<ServerConfigDocument> for ServerClientConfig {
    fn from(value: ServerConfigDocument) -> Self {
        Self {
            endpoint: value.endpoint,
            api_prefix: value.api_prefix,
            request_timeout: value.request_timeout.into_duration(),
            api_token: value.api_token,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct TransportConfigDocument {
    #[serde(default = "default_live_addr")]
    pub live_addr: String,
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
    #[serde(default = "default_connect_timeout_document")]
    pub connect_timeout: DurationDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_timeout: Option<DurationDocument>,
    #[serde(default = "default_write_timeout_document")]
    pub write_timeout: DurationDocument,
    #[serde(rename = "reconnect", default = "default_reconnect_policy_document")]
    pub reconnect_policy: ReconnectPolicyDocument,
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
    #[serde(default = "default_inbound_queue")]
    pub inbound_queue: usize,
}

impl From<&TransportConfig> for TransportConfigDocument {
    fn from(value: &TransportConfig) -> Self {
        Self {
            live_addr: value.live_addr.to_string(),
            max_frame_bytes: value.max_frame_bytes,
            connect_timeout: DurationDocument::from_duration(value.connect_timeout),
            read_timeout: value.read_timeout.map(DurationDocument::from_duration),
            write_timeout: DurationDocument::from_duration(value.write_timeout),
            reconnect_policy: ReconnectPolicyDocument::from(&value.reconnect_policy),
            outbound_queue: value.outbound_queue,
            inbound_queue: value.inbound_queue,
        }
    }
}

impl TryFrom<TransportConfigDocument> for TransportConfig {
    type Error = ConfigError;

    fn try_from(value: TransportConfigDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            live_addr: parse_socket_addr("transport.live_addr", value.live_addr)?,
            max_frame_bytes: value.max_frame_bytes,
            connect_timeout: value.connect_timeout.into_duration(),
            read_timeout: value.read_timeout.map(DurationDocument::into_duration),
            write_timeout: value.write_timeout.into_duration(),
            reconnect_policy: value.reconnect_policy.into(),
            outbound_queue: value.outbound_queue,
            inbound_queue: value.inbound_queue,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[schemars(with = "String")]
pub(crate) struct DurationDocument(Duration);

impl DurationDocument {
    pub(crate) const fn from_duration(value: Duration) -> Self {
        Self(value)
    }

    pub(crate) const fn into_duration(self) -> Duration {
        self.0
    }
}

impl Serialize for DurationDocument {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_duration(self.0))
    }
}

impl<'de> Deserialize<'de> for DurationDocument {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawDuration {
            Text(String),
            Milliseconds(u64),
        }

        match RawDuration::deserialize(deserializer)? {
            RawDuration::Text(text) => parse_duration(&text)
                .map(Self)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid duration: {text}"))),
            RawDuration::Milliseconds(ms) => Ok(Self(Duration::from_millis(ms))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct ReconnectPolicyDocument {
    pub enabled: bool,
    pub initial_delay: DurationDocument,
    pub max_delay: DurationDocument,
    pub backoff_factor: f64,
    pub jitter: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

impl From<&ReconnectPolicy> for ReconnectPolicyDocument {
    fn from(value: &ReconnectPolicy) -> Self {
        Self {
            enabled: value.enabled,
            initial_delay: DurationDocument::from_duration(value.initial_delay),
            max_delay: DurationDocument::from_duration(value.max_delay),
            backoff_factor: value.backoff_factor,
            jitter: value.jitter,
            max_retries: value.max_retries,
        }
    }
}

impl From<ReconnectPolicyDocument> for ReconnectPolicy {
    fn from(value: ReconnectPolicyDocument) -> Self {
        Self {
            enabled: value.enabled,
            initial_delay: value.initial_delay.into_duration(),
            max_delay: value.max_delay.into_duration(),
            backoff_factor: value.backoff_factor,
            jitter: value.jitter,
            max_retries: value.max_retries,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct SessionConfigDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_location: Option<LocationDocument>,
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    #[serde(default = "default_command_queue")]
    pub command_queue: usize,
    #[serde(default = "default_exposure_samples_per_leg")]
    pub exposure_samples_per_leg: usize,
}

impl From<&SessionConfig> for SessionConfigDocument {
    fn from(value: &SessionConfig) -> Self {
        Self {
            operator_location: value.operator_location.map(LocationDocument::from),
            event_buffer: value.event_buffer,
            command_queue: value.command_queue,
            exposure_samples_per_leg: value.exposure_samples_per_leg,
        }
    }
}

impl TryFrom<SessionConfigDocument> for SessionConfig {
    type Error = ConfigError;

    fn try_from(value: SessionConfigDocument) -> Result<Self, Self::Error> {
        let operator_location = value
            .operator_location
            .map(|location| {
                Coordinate::new(location.lat, location.lng).map_err(|source| {
                    ConfigError::InvalidCoordinate {
                        field: "session.operator_location",
                        source,
                    }
                })
            })
            .transpose()?;

        Ok(Self {
            operator_location,
            event_buffer: value.event_buffer,
            command_queue: value.command_queue,
            exposure_samples_per_leg: value.exposure_samples_per_leg,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct LocationDocument {
    pub lat: f64,
    pub lng: f64,
}

impl From<Coordinate> for LocationDocument {
    fn from(value: Coordinate) -> Self {
        Self {
            lat: value.latitude(),
            lng: value.longitude(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct LoggingConfigDocument {
    pub level: LogLevelDocument,
    pub format: LogFormatDocument,
    #[serde(default)]
    pub redact: Vec<String>,
}

impl From<&LoggingConfig> for LoggingConfigDocument {
    fn from(value: &LoggingConfig) -> Self {
        Self {
            level: LogLevelDocument::from(value.level),
            format: LogFormatDocument::from(value.format),
            redact: value.redact.clone(),
        }
    }
}

impl From<LoggingConfigDocument> for LoggingConfig {
    fn from(value: LoggingConfigDocument) -> Self {
        Self {
            level: value.level.into(),
            format: value.format.into(),
            redact: value.redact,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub(crate) enum LogLevelDocument {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LogLevelDocument {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => Self::Trace,
            LogLevel::Debug => Self::Debug,
            LogLevel::Info => Self::Info,
            LogLevel::Warn => Self::Warn,
            LogLevel::Error => Self::Error,
        }
    }
}

impl From<LogLevelDocument> for LogLevel {
    fn from(value: LogLevelDocument) -> Self {
        match value {
            LogLevelDocument::Trace => Self::Trace,
            LogLevelDocument::Debug => Self::Debug,
            LogLevelDocument::Info => Self::Info,
            LogLevelDocument::Warn => Self::Warn,
            LogLevelDocument::Error => Self::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub(crate) enum LogFormatDocument {
    Json,
    Pretty,
    Compact,
}

impl From<LogFormat> for LogFormatDocument {
    fn from(value: LogFormat) -> Self {
        match value {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

impl From<LogFormatDocument> for LogFormat {
    fn from(value: LogFormatDocument) -> Self {
        match value {
            LogFormatDocument::Json => Self::Json,
            LogFormatDocument::Pretty => Self::Pretty,
            LogFormatDocument::Compact => Self::Compact,
        }
    }
}

/// JSON schema of the YAML document accepted by [`SamanvayConfig::load`].
///
/// [`SamanvayConfig::load`]: crate::SamanvayConfig::load
pub fn json_schema() -> JsonValue {
    serde_json::to_value(schema_for!(SamanvayConfigDocument)).unwrap_or(JsonValue::Null)
}

fn default_server_document() -> ServerConfigDocument {
    ServerConfigDocument::from(&ServerClientConfig::default())
}

fn default_endpoint() -> String {
    ServerClientConfig::default().endpoint
}

fn default_api_prefix() -> String {
    ServerClientConfig::default().api_prefix
}

fn default_request_timeout_document() -> DurationDocument {
    DurationDocument::from_duration(ServerClientConfig::default().request_timeout)
}

fn default_transport_document() -> TransportConfigDocument {
    TransportConfigDocument::from(&TransportConfig::default())
}

fn default_live_addr() -> String {
    TransportConfig::default().live_addr.to_string()
}

fn default_max_frame_bytes() -> usize {
    TransportConfig::default().max_frame_bytes
}

fn default_connect_timeout_document() -> DurationDocument {
    DurationDocument::from_duration(TransportConfig::default().connect_timeout)
}

fn default_write_timeout_document() -> DurationDocument {
    DurationDocument::from_duration(TransportConfig::default().write_timeout)
}

fn default_reconnect_policy_document() -> ReconnectPolicyDocument {
    ReconnectPolicyDocument::from(&ReconnectPolicy::default())
}

fn default_outbound_queue() -> usize {
    TransportConfig::default().outbound_queue
}

fn default_inbound_queue() -> usize {
    TransportConfig::default().inbound_queue
}

fn default_session_document() -> SessionConfigDocument {
    SessionConfigDocument::from(&SessionConfig::default())
}

fn default_event_buffer() -> usize {
    SessionConfig::default().event_buffer
}

fn default_command_queue() -> usize {
    SessionConfig::default().command_queue
}

fn default_exposure_samples_per_leg() -> usize {
    SessionConfig::default().exposure_samples_per_leg
}

fn parse_socket_addr(field: &'static str, value: String) -> Result<SocketAddr, ConfigError> {
    SocketAddr::from_str(&value).map_err(|_| ConfigError::InvalidAddress { field, value })
}

fn parse_duration(raw: &str) -> Option<Duration> {
    let text = raw.trim();
    if let Some(value) = text.strip_suffix("ms") {
        return value.trim().parse::<u64>().ok().map(Duration::from_millis);
    }
    if let Some(value) = text.strip_suffix('s') {
        return value.trim().parse::<u64>().ok().map(Duration::from_secs);
    }
    if let Some(value) = text.strip_suffix('m') {
        return value
            .trim()
            .parse::<u64>()
            .ok()
            .map(|minutes| Duration::from_secs(minutes.saturating_mul(60)));
    }

    text.parse::<u64>().ok().map(Duration::from_secs)
}

fn format_duration(duration: Duration) -> String {
    if duration.subsec_nanos() == 0 {
        return format!("{}s", duration.as_secs());
    }

    format!("{}ms", duration.as_millis())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{format_duration, json_schema, parse_duration};

    #[test]
    fn durations_accept_units_and_bare_seconds() {
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration(" 15s "), Some(Duration::from_secs(15)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("30"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
    }

    #[test]
    fn schema_describes_every_section() {
        let schema = json_schema();
        let properties = schema
            .get("properties")
            .and_then(|value| value.as_object())
            .expect("schema should list properties");
        for section in ["server", "transport", "session", "logging"] {
            assert!(properties.contains_key(section), "missing {section}");
        }
    }
}
