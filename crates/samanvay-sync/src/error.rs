use samanvay_core::CoreError;
use samanvay_io::{IoError, ServiceError};
use thiserror::Error;

/// Failure of an operator action. Discarded stale events are never errors;
/// they surface as outcomes on the component that discarded them.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid input: {0}")]
    Validation(#[from] CoreError),

    #[error("backend request failed: {0}")]
    Service(#[source] ServiceError),

    #[error("live channel send failed: {0}")]
    Channel(#[source] IoError),

    #[error("cannot {action} while the live channel is disconnected")]
    ConnectivityPrecondition { action: &'static str },

    #[error("operator location is unknown")]
    LocationUnknown,

    #[error("emergency broadcast was not confirmed by the operator")]
    SosDeclined,

    #[error("situation session has stopped")]
    SessionClosed,
}

impl SyncError {
    /// Request or transport failures. These are shown as dismissible notices
    /// and leave state at its last known good value.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Service(_) | Self::Channel(_))
    }
}

impl From<ServiceError> for SyncError {
    fn from(error: ServiceError) -> Self {
        Self::Service(error)
    }
}

impl From<IoError> for SyncError {
    fn from(error: IoError) -> Self {
        Self::Channel(error)
    }
}
