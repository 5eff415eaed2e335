pub mod model;
pub mod time;

pub use model::{
    ChatMessage, ConnectionState, ConvoyRoute, Coordinate, CoreError, Incident, Severity,
    ThreatZone,
};
pub use time::{TimestampError, TimestampUtc};
