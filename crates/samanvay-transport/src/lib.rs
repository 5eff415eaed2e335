use std::net::SocketAddr;
use std::time::Duration;

use samanvay_net::LineFrameError;
use samanvay_wire::WireError;
use thiserror::Error;

pub mod connection;
pub mod supervisor;

pub use connection::{LiveChannelConnection, LiveEventReader, LiveEventWriter};
pub use supervisor::{
    spawn_live_channel, LiveChannel, LiveChannelHandle, LiveEventSource, SupervisorTask,
};

#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    pub live_addr: SocketAddr,
    pub max_frame_bytes: usize,
    pub connect_timeout: Duration,
    /// Drop the connection after this long without an inbound frame.
    pub read_timeout: Option<Duration>,
    pub write_timeout: Duration,
    pub reconnect_policy: ReconnectPolicy,
    pub outbound_queue: usize,
    pub inbound_queue: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            live_addr: SocketAddr::from(([127, 0, 0, 1], 8765)),
            max_frame_bytes: 64 * 1024,
            connect_timeout: Duration::from_secs(5),
            read_timeout: None,
            write_timeout: Duration::from_secs(15),
            reconnect_policy: ReconnectPolicy::default(),
            outbound_queue: 64,
            inbound_queue: 256,
        }
    }
}

impl TransportConfig {
    pub fn validate(&self) -> Result<(), TransportConfigError> {
        if self.max_frame_bytes == 0 {
            return Err(TransportConfigError::ZeroFrameLimit);
        }

        ensure_non_zero_duration("connect_timeout", self.connect_timeout)?;
        ensure_non_zero_duration("write_timeout", self.write_timeout)?;
        if let Some(read_timeout) = self.read_timeout {
            ensure_non_zero_duration("read_timeout", read_timeout)?;
        }

        self.reconnect_policy.validate()?;

        if self.outbound_queue == 0 {
            return Err(TransportConfigError::ZeroQueueCapacity {
                field: "outbound_queue",
            });
        }
        if self.inbound_queue == 0 {
            return Err(TransportConfigError::ZeroQueueCapacity {
                field: "inbound_queue",
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    pub jitter: f64,
    pub max_retries: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
            jitter: 0.2,
            max_retries: None,
        }
    }
}

impl ReconnectPolicy {
    fn validate(&self) -> Result<(), TransportConfigError> {
        if self.enabled {
            ensure_non_zero_duration("reconnect.initial_delay", self.initial_delay)?;
            ensure_non_zero_duration("reconnect.max_delay", self.max_delay)?;
            if self.max_delay < self.initial_delay {
                return Err(TransportConfigError::MaxDelayBelowInitial {
                    initial_delay: self.initial_delay,
                    max_delay: self.max_delay,
                });
            }
        }

        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(TransportConfigError::BackoffFactorTooSmall {
                backoff_factor: self.backoff_factor,
            });
        }

        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(TransportConfigError::JitterOutOfRange {
                jitter: self.jitter,
            });
        }

        Ok(())
    }

    /// Delay before reconnect attempt `attempt` (1-based).
    ///
    /// `unit_sample` is a uniform sample in `[0, 1)`; it spreads the delay over
    /// `±jitter` of the backed-off value. The result never exceeds `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32, unit_sample: f64) -> Duration {
        let exponent = attempt.saturating_sub(1).min(64) as i32;
        let base = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        let capped = base.min(self.max_delay.as_secs_f64());

        let spread = self.jitter * (unit_sample.clamp(0.0, 1.0) * 2.0 - 1.0);
        let jittered = (capped * (1.0 + spread)).clamp(0.0, self.max_delay.as_secs_f64());
        Duration::from_secs_f64(jittered)
    }

    #[must_use]
    pub fn retries_exhausted(&self, attempt: u32) -> bool {
        !self.enabled || self.max_retries.is_some_and(|max| attempt > max)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TransportConfigError {
    #[error("max_frame_bytes must be > 0")]
    ZeroFrameLimit,

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("{field} must be > 0")]
    ZeroQueueCapacity { field: &'static str },

    #[error(
        "reconnect.max_delay ({max_delay:?}) must be >= reconnect.initial_delay ({initial_delay:?})"
    )]
    MaxDelayBelowInitial {
        initial_delay: Duration,
        max_delay: Duration,
    },

    #[error("reconnect.backoff_factor must be >= 1.0, got {backoff_factor}")]
    BackoffFactorTooSmall { backoff_factor: f64 },

    #[error("reconnect.jitter must be within [0.0, 1.0], got {jitter}")]
    JitterOutOfRange { jitter: f64 },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    InvalidConfig(#[from] TransportConfigError),

    #[error(transparent)]
    Frame(#[from] LineFrameError),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("write did not complete within {0:?}")]
    WriteTimeout(Duration),
}

fn ensure_non_zero_duration(
    field: &'static str,
    duration: Duration,
) -> Result<(), TransportConfigError> {
    if duration.is_zero() {
        return Err(TransportConfigError::ZeroDuration { field });
    }

    Ok(())
}
