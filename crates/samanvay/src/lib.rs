use thiserror::Error;

pub mod prelude {
    pub use samanvay_config::{LogFormat, LogLevel, LoggingConfig, SamanvayConfig};
    pub use samanvay_core::{
        ChatMessage, ConnectionState, ConvoyRoute, Coordinate, CoreError, Incident, Severity,
        ThreatZone, TimestampUtc,
    };
    pub use samanvay_geo::{
        distance_km, haversine_distance_meters, initial_bearing_degrees,
        interpolate_great_circle, route_exposure, zone_contains, ZoneExposure,
    };
    pub use samanvay_io::{
        ConvoyPlanRequest, DetectionReport, DetectionRequest, DetectionService, IoError,
        MessageEnvelope, MessageHistoryService, MessageSink, MessageSource, RoutingService,
        ScenarioService, ServiceError,
    };
    pub use samanvay_server::{BackendClient, ServerClientConfig};
    pub use samanvay_sync::{
        notification_channel, LiveHub, Notification, Notifier, OperatorConfirmation,
        PlanOutcome, SessionConfig, SessionExit, SessionHandle, SessionServices,
        SituationSession, SituationSnapshot, Subscription, SyncError,
    };
    pub use samanvay_transport::{spawn_live_channel, LiveChannel, ReconnectPolicy, TransportConfig};
    pub use samanvay_wire::{LiveEvent, LiveEventKind, OutboundEvent, SosPayload};
}

pub type Result<T> = std::result::Result<T, SamanvayError>;

#[derive(Debug, Error)]
pub enum SamanvayError {
    #[error(transparent)]
    Core(#[from] samanvay_core::CoreError),
    #[error(transparent)]
    Timestamp(#[from] samanvay_core::TimestampError),
    #[error(transparent)]
    Geo(#[from] samanvay_geo::GeoError),
    #[error(transparent)]
    Io(#[from] samanvay_io::IoError),
    #[error(transparent)]
    Service(#[from] samanvay_io::ServiceError),
    #[error(transparent)]
    Frame(#[from] samanvay_net::LineFrameError),
    #[error(transparent)]
    Wire(#[from] samanvay_wire::WireError),
    #[error(transparent)]
    Transport(#[from] samanvay_transport::TransportConfigError),
    #[error(transparent)]
    Server(#[from] samanvay_server::ServerConfigError),
    #[error(transparent)]
    Session(#[from] samanvay_sync::SessionConfigError),
    #[error(transparent)]
    Sync(#[from] samanvay_sync::SyncError),
    #[error(transparent)]
    Config(#[from] samanvay_config::ConfigError),
}

impl SamanvayError {
    /// True when retrying the same operation later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Io(_) | Self::Service(_) => true,
            Self::Sync(error) => error.is_transport(),
            _ => false,
        }
    }
}
