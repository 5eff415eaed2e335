use std::collections::BTreeMap;

use samanvay_core::{ChatMessage, ConvoyRoute, Coordinate, Incident, ThreatZone, TimestampUtc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::point::{to_path, PointBody};
use crate::WireError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLngBody {
    pub lat: f64,
    pub lng: f64,
}

impl From<Coordinate> for LatLngBody {
    fn from(value: Coordinate) -> Self {
        Self {
            lat: value.latitude(),
            lng: value.longitude(),
        }
    }
}

/// `POST /convoys` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvoyPlanBody {
    pub name: String,
    pub start: LatLngBody,
    pub end: LatLngBody,
}

impl ConvoyPlanBody {
    #[must_use]
    pub fn new(name: impl Into<String>, start: Coordinate, end: Coordinate) -> Self {
        Self {
            name: name.into(),
            start: start.into(),
            end: end.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConvoyResponseBody {
    #[serde(alias = "convoyId")]
    pub convoy_id: i64,
    pub name: String,
    pub route: Vec<PointBody>,
}

impl ConvoyResponseBody {
    pub fn into_route(self) -> Result<ConvoyRoute, WireError> {
        Ok(ConvoyRoute::new(
            self.convoy_id,
            self.name,
            to_path(self.route)?,
        )?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentBody {
    pub id: i64,
    pub lat: f64,
    pub lng: f64,
    pub severity: String,
}

impl IncidentBody {
    pub fn into_incident(self) -> Result<Incident, WireError> {
        Ok(Incident::new(
            self.id,
            Coordinate::new(self.lat, self.lng)?,
            self.severity.parse()?,
        ))
    }
}

impl From<&Incident> for IncidentBody {
    fn from(value: &Incident) -> Self {
        Self {
            id: value.id,
            lat: value.coordinate.latitude(),
            lng: value.coordinate.longitude(),
            severity: value.severity.as_str().to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThreatZoneBody {
    pub id: i64,
    pub lat: f64,
    pub lng: f64,
    /// Metres.
    pub radius: f64,
    pub threat_score: f64,
}

impl ThreatZoneBody {
    pub fn into_zone(self) -> Result<ThreatZone, WireError> {
        Ok(ThreatZone::new(
            self.id,
            Coordinate::new(self.lat, self.lng)?,
            self.radius,
            self.threat_score,
        )?)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageRecordBody {
    pub id: i64,
    #[serde(alias = "senderId")]
    pub sid: String,
    pub text: String,
    pub timestamp: String,
}

impl MessageRecordBody {
    pub fn into_message(self) -> Result<ChatMessage, WireError> {
        let timestamp = TimestampUtc::parse_server_text(&self.timestamp)?;
        Ok(ChatMessage::new(
            Some(self.id),
            self.sid,
            self.text,
            timestamp,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DetectionResponseBody {
    pub message: String,
    #[serde(default)]
    pub detection_summary: BTreeMap<String, u64>,
    #[serde(default)]
    pub threat_detected: bool,
}

/// Error body. `detail` is a string for handler errors and a list of
/// field errors for request validation failures.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorDetailBody {
    pub detail: Value,
}

impl ErrorDetailBody {
    #[must_use]
    pub fn message(&self) -> String {
        match &self.detail {
            Value::String(text) => text.clone(),
            Value::Array(items) => items
                .iter()
                .map(|item| match item.get("msg").and_then(Value::as_str) {
                    Some(msg) => msg.to_owned(),
                    None => item.to_string(),
                })
                .collect::<Vec<_>>()
                .join("; "),
            other => other.to_string(),
        }
    }
}
