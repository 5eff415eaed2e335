use std::fmt;

use samanvay_core::{Coordinate, Incident, Severity};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::IncidentBody;
use crate::point::{to_path, PointBody};
use crate::WireError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LiveEventKind {
    Connect,
    Disconnect,
    NewIncident,
    RerouteUpdate,
    ConvoyUpdate,
    Message,
}

impl LiveEventKind {
    pub const ALL: [Self; 6] = [
        Self::Connect,
        Self::Disconnect,
        Self::NewIncident,
        Self::RerouteUpdate,
        Self::ConvoyUpdate,
        Self::Message,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::NewIncident => "new_incident",
            Self::RerouteUpdate => "reroute_update",
            Self::ConvoyUpdate => "convoy_update",
            Self::Message => "message",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for LiveEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    Connect,
    Disconnect,
    NewIncident(Incident),
    /// Detour for a convoy; may name a convoy that is no longer active.
    RerouteUpdate {
        convoy_id: i64,
        path: Vec<Coordinate>,
    },
    /// Broadcast after any convoy is planned, including by other operators.
    ConvoyUpdate {
        convoy_id: i64,
        name: String,
        path: Vec<Coordinate>,
    },
    Message {
        sender_id: String,
        text: String,
    },
}

impl LiveEvent {
    #[must_use]
    pub const fn kind(&self) -> LiveEventKind {
        match self {
            Self::Connect => LiveEventKind::Connect,
            Self::Disconnect => LiveEventKind::Disconnect,
            Self::NewIncident(_) => LiveEventKind::NewIncident,
            Self::RerouteUpdate { .. } => LiveEventKind::RerouteUpdate,
            Self::ConvoyUpdate { .. } => LiveEventKind::ConvoyUpdate,
            Self::Message { .. } => LiveEventKind::Message,
        }
    }
}

/// Operator-originated events.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    Message { text: String },
    Sos(SosPayload),
}

impl OutboundEvent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Sos(_) => "sos",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SosPayload {
    pub location: Coordinate,
    pub severity: Severity,
    pub intensity: u8,
}

impl SosPayload {
    pub const EMERGENCY_INTENSITY: u8 = 10;

    /// Maximum-severity broadcast for the operator's position.
    #[must_use]
    pub const fn emergency(location: Coordinate) -> Self {
        Self {
            location,
            severity: Severity::MAX,
            intensity: Self::EMERGENCY_INTENSITY,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FrameDocument {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Serialize)]
struct FrameOut<'a, T> {
    event: &'a str,
    data: T,
}

#[derive(Debug, Serialize, Deserialize)]
struct RerouteDocument {
    #[serde(alias = "convoyId")]
    convoy_id: i64,
    path: Vec<PointBody>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConvoyUpdateDocument {
    #[serde(alias = "convoyId")]
    convoy_id: i64,
    name: String,
    route: Vec<PointBody>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MessageDocument {
    #[serde(alias = "senderId")]
    sid: String,
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SosDocument {
    lat: f64,
    lng: f64,
    severity: String,
    intensity: u8,
}

pub fn decode_live_frame(frame: &[u8]) -> Result<LiveEvent, WireError> {
    let document: FrameDocument = serde_json::from_slice(frame).map_err(WireError::Frame)?;
    let kind = LiveEventKind::from_name(&document.event).ok_or(WireError::UnknownEvent {
        event: document.event,
    })?;

    match kind {
        LiveEventKind::Connect => Ok(LiveEvent::Connect),
        LiveEventKind::Disconnect => Ok(LiveEvent::Disconnect),
        LiveEventKind::NewIncident => {
            let body: IncidentBody = payload(kind, document.data)?;
            Ok(LiveEvent::NewIncident(body.into_incident()?))
        }
        LiveEventKind::RerouteUpdate => {
            let body: RerouteDocument = payload(kind, document.data)?;
            Ok(LiveEvent::RerouteUpdate {
                convoy_id: body.convoy_id,
                path: to_path(body.path)?,
            })
        }
        LiveEventKind::ConvoyUpdate => {
            let body: ConvoyUpdateDocument = payload(kind, document.data)?;
            Ok(LiveEvent::ConvoyUpdate {
                convoy_id: body.convoy_id,
                name: body.name,
                path: to_path(body.route)?,
            })
        }
        LiveEventKind::Message => {
            let body: MessageDocument = payload(kind, document.data)?;
            Ok(LiveEvent::Message {
                sender_id: body.sid,
                text: body.text,
            })
        }
    }
}

/// Renders an inbound event as a frame payload (bridges and fixtures).
pub fn encode_live_event(event: &LiveEvent) -> Result<Vec<u8>, WireError> {
    let name = event.kind().as_str();
    match event {
        LiveEvent::Connect | LiveEvent::Disconnect => frame(name, Value::Null),
        LiveEvent::NewIncident(incident) => frame(name, IncidentBody::from(incident)),
        LiveEvent::RerouteUpdate { convoy_id, path } => frame(
            name,
            RerouteDocument {
                convoy_id: *convoy_id,
                path: path.iter().copied().map(PointBody::from).collect(),
            },
        ),
        LiveEvent::ConvoyUpdate {
            convoy_id,
            name: convoy_name,
            path,
        } => frame(
            name,
            ConvoyUpdateDocument {
                convoy_id: *convoy_id,
                name: convoy_name.clone(),
                route: path.iter().copied().map(PointBody::from).collect(),
            },
        ),
        LiveEvent::Message { sender_id, text } => frame(
            name,
            MessageDocument {
                sid: sender_id.clone(),
                text: text.clone(),
            },
        ),
    }
}

pub fn encode_outbound(event: &OutboundEvent) -> Result<Vec<u8>, WireError> {
    match event {
        // The message handler stores `data` as the text itself.
        OutboundEvent::Message { text } => frame(event.name(), text.as_str()),
        OutboundEvent::Sos(sos) => frame(
            event.name(),
            SosDocument {
                lat: sos.location.latitude(),
                lng: sos.location.longitude(),
                severity: sos.severity.as_str().to_owned(),
                intensity: sos.intensity,
            },
        ),
    }
}

/// Inverse of [`encode_outbound`], for bridges and recording fixtures.
pub fn decode_outbound(frame: &[u8]) -> Result<OutboundEvent, WireError> {
    let document: FrameDocument = serde_json::from_slice(frame).map_err(WireError::Frame)?;
    match document.event.as_str() {
        "message" => {
            let text: String = serde_json::from_value(document.data)
                .map_err(|source| WireError::Payload {
                    event: "message",
                    source,
                })?;
            Ok(OutboundEvent::Message { text })
        }
        "sos" => {
            let body: SosDocument =
                serde_json::from_value(document.data).map_err(|source| WireError::Payload {
                    event: "sos",
                    source,
                })?;
            Ok(OutboundEvent::Sos(SosPayload {
                location: Coordinate::new(body.lat, body.lng)?,
                severity: body.severity.parse()?,
                intensity: body.intensity,
            }))
        }
        _ => Err(WireError::UnknownEvent {
            event: document.event,
        }),
    }
}

fn payload<T: DeserializeOwned>(kind: LiveEventKind, data: Value) -> Result<T, WireError> {
    serde_json::from_value(data).map_err(|source| WireError::Payload {
        event: kind.as_str(),
        source,
    })
}

fn frame<T: Serialize>(event: &'static str, data: T) -> Result<Vec<u8>, WireError> {
    serde_json::to_vec(&FrameOut { event, data })
        .map_err(|source| WireError::Encode { event, source })
}
