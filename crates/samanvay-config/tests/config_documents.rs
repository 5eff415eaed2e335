use std::fs;
use std::time::Duration;

use samanvay_config::{json_schema, ConfigError, LogFormat, SamanvayConfig};

const FIELD_DEPLOYMENT: &str = r#"
server:
  endpoint: https://ops.example
  api_token: field-token
  request_timeout: 10s
transport:
  live_addr: 10.0.0.5:8765
  max_frame_bytes: 4096
  read_timeout: 2m
  reconnect:
    enabled: true
    initial_delay: 250ms
    max_delay: 10s
    backoff_factor: 1.5
    jitter: 0.0
session:
  operator_location:
    lat: 20.2961
    lng: 85.8245
logging:
  level: warn
  format: pretty
  redact:
    - server.endpoint
"#;

#[test]
fn field_deployment_loads_from_disk_and_passes_startup() {
    let path = std::env::temp_dir().join(format!("samanvay-config-{}.yaml", std::process::id()));
    fs::write(&path, FIELD_DEPLOYMENT).expect("write should work");

    let loaded = SamanvayConfig::load(&path);
    let _ = fs::remove_file(&path);
    let config = loaded.expect("config should load");
    config.validate_startup().expect("startup checks should pass");

    assert_eq!(config.server.request_timeout, Duration::from_secs(10));
    assert_eq!(config.transport.read_timeout, Some(Duration::from_secs(120)));
    assert_eq!(
        config.transport.reconnect_policy.initial_delay,
        Duration::from_millis(250)
    );
    assert_eq!(
        config
            .logging
            .as_ref()
            .map(|logging| logging.format),
        Some(LogFormat::Pretty)
    );
}

#[test]
fn rendered_config_hides_secrets_and_reloads() {
    let config = SamanvayConfig::from_yaml_str(FIELD_DEPLOYMENT).expect("config should parse");
    let rendered = config.to_redacted_yaml().expect("render should work");

    assert!(!rendered.contains("field-token"), "{rendered}");
    assert!(!rendered.contains("ops.example"), "{rendered}");
    assert!(rendered.contains("live_addr: 10.0.0.5:8765"), "{rendered}");

    // Redacted values are placeholders, so the endpoint no longer validates.
    let reloaded = SamanvayConfig::from_yaml_str(&rendered).expect("rendering should reparse");
    assert!(matches!(
        reloaded.validate(),
        Err(ConfigError::InvalidServer(_))
    ));
}

#[test]
fn missing_file_reports_its_path() {
    let error = SamanvayConfig::load("/nonexistent/samanvay.yaml").expect_err("load should fail");
    assert!(matches!(error, ConfigError::Read { .. }));
    assert!(error.to_string().contains("/nonexistent/samanvay.yaml"));
}

#[test]
fn invalid_duration_text_is_a_parse_error() {
    let error = SamanvayConfig::from_yaml_str("transport:\n  write_timeout: soon\n")
        .expect_err("parse should fail");
    assert!(matches!(error, ConfigError::ParseYaml(_)));
}

#[test]
fn zero_session_buffer_fails_validation() {
    let config = SamanvayConfig::from_yaml_str("session:\n  event_buffer: 0\n")
        .expect("document should parse");
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidSession(_))
    ));
}

#[test]
fn schema_exposes_reconnect_policy() {
    let rendered = json_schema().to_string();
    assert!(rendered.contains("ReconnectPolicyDocument"), "{rendered}");
    assert!(rendered.contains("operator_location"), "{rendered}");
}
