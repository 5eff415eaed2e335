use samanvay_core::{CoreError, TimestampError};
use thiserror::Error;

pub mod events;
pub mod http;
mod point;

pub use events::{
    decode_live_frame, decode_outbound, encode_live_event, encode_outbound, LiveEvent,
    LiveEventKind, OutboundEvent, SosPayload,
};
pub use point::PointBody;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("frame is not a JSON event object: {0}")]
    Frame(#[source] serde_json::Error),

    #[error("unknown live event `{event}`")]
    UnknownEvent { event: String },

    #[error("malformed `{event}` payload: {source}")]
    Payload {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode `{event}`: {source}")]
    Encode {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value in payload: {0}")]
    Core(#[from] CoreError),

    #[error("invalid timestamp in payload: {0}")]
    Timestamp(#[from] TimestampError),
}
