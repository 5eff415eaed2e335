use std::fmt;
use std::time::Duration;

use thiserror::Error;

mod client;

pub use client::BackendClient;

#[derive(Clone, PartialEq, Eq)]
pub struct ServerClientConfig {
    pub endpoint: String,
    pub api_prefix: String,
    pub request_timeout: Duration,
    /// Sent as a bearer token when present.
    pub api_token: Option<String>,
}

impl Default for ServerClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8000".to_owned(),
            api_prefix: "/api".to_owned(),
            request_timeout: Duration::from_secs(30),
            api_token: None,
        }
    }
}

impl fmt::Debug for ServerClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerClientConfig")
            .field("endpoint", &self.endpoint)
            .field("api_prefix", &self.api_prefix)
            .field("request_timeout", &self.request_timeout)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ServerClientConfig {
    pub fn validate(&self) -> Result<(), ServerConfigError> {
        validate_endpoint(&self.endpoint)?;
        validate_api_prefix(&self.api_prefix)?;

        if self.request_timeout.is_zero() {
            return Err(ServerConfigError::ZeroRequestTimeout);
        }

        if let Some(token) = &self.api_token {
            if token.trim().is_empty() {
                return Err(ServerConfigError::EmptyApiToken);
            }
        }

        Ok(())
    }

    /// Absolute URL for an API resource such as `"convoys"`.
    #[must_use]
    pub fn resource_url(&self, resource: &str) -> String {
        let endpoint = self.endpoint.trim_end_matches('/');
        let prefix = self.api_prefix.trim_end_matches('/');
        let resource = resource.trim_start_matches('/');
        format!("{endpoint}{prefix}/{resource}")
    }
}

#[derive(Debug, Error)]
pub enum ServerConfigError {
    #[error("endpoint must not be empty")]
    EmptyEndpoint,

    #[error("endpoint must start with http:// or https://")]
    EndpointMustBeHttpOrHttps,

    #[error("api_prefix must start with '/'")]
    ApiPrefixMustStartWithSlash,

    #[error("request_timeout must be greater than zero")]
    ZeroRequestTimeout,

    #[error("api_token must not be blank when set")]
    EmptyApiToken,

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

fn validate_endpoint(endpoint: &str) -> Result<(), ServerConfigError> {
    if endpoint.trim().is_empty() {
        return Err(ServerConfigError::EmptyEndpoint);
    }

    if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
        return Err(ServerConfigError::EndpointMustBeHttpOrHttps);
    }

    Ok(())
}

fn validate_api_prefix(prefix: &str) -> Result<(), ServerConfigError> {
    // An empty prefix mounts the API at the root.
    if !prefix.is_empty() && !prefix.starts_with('/') {
        return Err(ServerConfigError::ApiPrefixMustStartWithSlash);
    }

    Ok(())
}
