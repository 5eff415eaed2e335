use std::pin::Pin;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::Stream;
use samanvay_core::TimestampUtc;
use thiserror::Error;

pub mod services;

pub use services::{
    ConvoyPlanRequest, DetectionReport, DetectionRequest, DetectionService,
    MessageHistoryService, RoutingService, ScenarioService, ServiceError,
};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("channel closed")]
    Closed,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("outbound queue is full")]
    Overloaded,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// A received message stamped with its arrival.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEnvelope<T> {
    pub received_at: TimestampUtc,
    /// Arrival order within one source, starting at zero. Survives reconnects.
    pub sequence: u64,
    pub message: T,
}

impl<T> MessageEnvelope<T> {
    #[must_use]
    pub fn new(message: T) -> Self {
        Self::sequenced(0, message)
    }

    #[must_use]
    pub fn sequenced(sequence: u64, message: T) -> Self {
        Self {
            received_at: TimestampUtc::now(),
            sequence,
            message,
        }
    }
}

/// Outbound side of a channel (live transport, recorders, test doubles).
pub trait MessageSink<T>: Send + Sync {
    fn send(&self, msg: T) -> BoxFuture<'_, Result<(), IoError>>;
}

/// Inbound side of a channel.
pub trait MessageSource<T>: Send + Sync {
    fn recv(&mut self) -> BoxFuture<'_, Result<MessageEnvelope<T>, IoError>>;

    /// Object-safe stream adapter.
    fn into_stream(
        self: Box<Self>,
    ) -> Pin<Box<dyn Stream<Item = Result<MessageEnvelope<T>, IoError>> + Send>>;
}
