use std::collections::BTreeMap;

use bytes::Bytes;
use futures::future::BoxFuture;
use samanvay_core::{ChatMessage, ConvoyRoute, Coordinate, Incident, ThreatZone};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Non-success response. `message` carries the server's own explanation
    /// when it sent one, so it can be shown to the operator verbatim.
    #[error("server returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("request timed out")]
    Timeout,

    #[error("request failed: {0}")]
    Request(String),

    #[error("malformed response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvoyPlanRequest {
    pub name: String,
    pub start: Coordinate,
    pub end: Coordinate,
}

pub trait RoutingService: Send + Sync {
    fn plan_convoy(
        &self,
        request: ConvoyPlanRequest,
    ) -> BoxFuture<'_, Result<ConvoyRoute, ServiceError>>;
}

pub trait ScenarioService: Send + Sync {
    fn initialize_scenario(&self, center: Coordinate) -> BoxFuture<'_, Result<(), ServiceError>>;

    fn fetch_incidents(&self) -> BoxFuture<'_, Result<Vec<Incident>, ServiceError>>;

    fn fetch_threat_zones(&self) -> BoxFuture<'_, Result<Vec<ThreatZone>, ServiceError>>;
}

pub trait MessageHistoryService: Send + Sync {
    fn fetch_messages(&self) -> BoxFuture<'_, Result<Vec<ChatMessage>, ServiceError>>;
}

#[derive(Debug, Clone)]
pub struct DetectionRequest {
    pub video: Bytes,
    pub file_name: String,
    pub location: Coordinate,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DetectionReport {
    pub message: String,
    pub detection_summary: BTreeMap<String, u64>,
    pub threat_detected: bool,
}

pub trait DetectionService: Send + Sync {
    fn detect(
        &self,
        request: DetectionRequest,
    ) -> BoxFuture<'_, Result<DetectionReport, ServiceError>>;
}
