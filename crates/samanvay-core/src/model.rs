use std::fmt;
use std::str::FromStr;

use crate::TimestampUtc;

/// WGS84 latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoreError> {
        Ok(Self {
            latitude: validate_bounded("latitude", latitude, -90.0, 90.0)?,
            longitude: validate_bounded("longitude", longitude, -180.0, 180.0)?,
        })
    }

    #[must_use]
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    #[must_use]
    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const MAX: Self = Self::Critical;

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "Low" | "low" => Ok(Self::Low),
            "Medium" | "medium" => Ok(Self::Medium),
            "High" | "high" => Ok(Self::High),
            "Critical" | "critical" => Ok(Self::Critical),
            other => Err(CoreError::UnknownSeverity {
                value: other.to_owned(),
            }),
        }
    }
}

/// Reported incident. Never mutated once observed.
#[derive(Debug, Clone, PartialEq)]
pub struct Incident {
    pub id: i64,
    pub coordinate: Coordinate,
    pub severity: Severity,
}

impl Incident {
    #[must_use]
    pub const fn new(id: i64, coordinate: Coordinate, severity: Severity) -> Self {
        Self {
            id,
            coordinate,
            severity,
        }
    }
}

/// Circular geofence with a risk score, snapshotted once per scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreatZone {
    id: i64,
    center: Coordinate,
    radius_m: f64,
    threat_score: f64,
}

impl ThreatZone {
    pub const MAX_THREAT_SCORE: f64 = 10.0;

    pub fn new(
        id: i64,
        center: Coordinate,
        radius_m: f64,
        threat_score: f64,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            id,
            center,
            radius_m: validate_non_negative("radius", radius_m)?,
            threat_score: validate_bounded(
                "threat_score",
                threat_score,
                0.0,
                Self::MAX_THREAT_SCORE,
            )?,
        })
    }

    #[must_use]
    pub fn id(&self) -> i64 {
        self.id
    }

    #[must_use]
    pub fn center(&self) -> Coordinate {
        self.center
    }

    #[must_use]
    pub fn radius_m(&self) -> f64 {
        self.radius_m
    }

    #[must_use]
    pub fn threat_score(&self) -> f64 {
        self.threat_score
    }
}

/// Planned convoy path. The id is assigned by the routing service.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvoyRoute {
    convoy_id: i64,
    name: String,
    path: Vec<Coordinate>,
}

impl ConvoyRoute {
    pub const MIN_PATH_POINTS: usize = 2;

    pub fn new(
        convoy_id: i64,
        name: impl Into<String>,
        path: Vec<Coordinate>,
    ) -> Result<Self, CoreError> {
        let name = name.into();
        validate_name("convoy name", &name)?;
        validate_path(&path)?;
        Ok(Self {
            convoy_id,
            name,
            path,
        })
    }

    /// Same convoy, new path. Name and id are preserved.
    pub fn with_path(&self, path: Vec<Coordinate>) -> Result<Self, CoreError> {
        validate_path(&path)?;
        Ok(Self {
            convoy_id: self.convoy_id,
            name: self.name.clone(),
            path,
        })
    }

    #[must_use]
    pub fn convoy_id(&self) -> i64 {
        self.convoy_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn path(&self) -> &[Coordinate] {
        &self.path
    }

    #[must_use]
    pub fn start(&self) -> Coordinate {
        self.path[0]
    }

    #[must_use]
    pub fn end(&self) -> Coordinate {
        self.path[self.path.len() - 1]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    /// `None` for entries that have not been persisted by the server.
    pub id: Option<i64>,
    pub sender_id: String,
    pub text: String,
    pub timestamp: TimestampUtc,
}

impl ChatMessage {
    pub const MAX_TEXT_CHARS: usize = 500;

    #[must_use]
    pub fn new(
        id: Option<i64>,
        sender_id: impl Into<String>,
        text: impl Into<String>,
        timestamp: TimestampUtc,
    ) -> Self {
        Self {
            id,
            sender_id: sender_id.into(),
            text: text.into(),
            timestamp,
        }
    }

    /// Checks text an operator wants to send over the live channel.
    pub fn validate_outbound_text(text: &str) -> Result<(), CoreError> {
        if text.trim().is_empty() {
            return Err(CoreError::EmptyText { field: "message" });
        }

        let chars = text.chars().count();
        if chars > Self::MAX_TEXT_CHARS {
            return Err(CoreError::TextTooLong {
                field: "message",
                chars,
                max: Self::MAX_TEXT_CHARS,
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    Connected,
    #[default]
    Disconnected,
}

impl ConnectionState {
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoreError {
    NonFiniteValue {
        field: &'static str,
        value: f64,
    },
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    NegativeValue {
        field: &'static str,
        value: f64,
    },
    EmptyText {
        field: &'static str,
    },
    TextTooLong {
        field: &'static str,
        chars: usize,
        max: usize,
    },
    PathTooShort {
        points: usize,
    },
    UnknownSeverity {
        value: String,
    },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFiniteValue { field, value } => {
                write!(f, "{field} must be finite, got {value}")
            }
            Self::OutOfRange {
                field,
                value,
                min,
                max,
            } => write!(f, "{field} must be in [{min}, {max}], got {value}"),
            Self::NegativeValue { field, value } => {
                write!(f, "{field} must be >= 0.0, got {value}")
            }
            Self::EmptyText { field } => write!(f, "{field} must not be empty"),
            Self::TextTooLong { field, chars, max } => {
                write!(f, "{field} is {chars} characters long; at most {max} allowed")
            }
            Self::PathTooShort { points } => write!(
                f,
                "route path needs at least {} points, got {points}",
                ConvoyRoute::MIN_PATH_POINTS
            ),
            Self::UnknownSeverity { value } => write!(f, "unknown severity `{value}`"),
        }
    }
}

impl std::error::Error for CoreError {}

fn validate_name(field: &'static str, name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::EmptyText { field });
    }

    Ok(())
}

fn validate_path(path: &[Coordinate]) -> Result<(), CoreError> {
    if path.len() < ConvoyRoute::MIN_PATH_POINTS {
        return Err(CoreError::PathTooShort { points: path.len() });
    }

    Ok(())
}

fn validate_finite(field: &'static str, value: f64) -> Result<f64, CoreError> {
    if !value.is_finite() {
        return Err(CoreError::NonFiniteValue { field, value });
    }

    Ok(canonicalize_zero(value))
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<f64, CoreError> {
    let value = validate_finite(field, value)?;
    if value < 0.0 {
        return Err(CoreError::NegativeValue { field, value });
    }

    Ok(value)
}

fn validate_bounded(field: &'static str, value: f64, min: f64, max: f64) -> Result<f64, CoreError> {
    let value = validate_finite(field, value)?;
    if value < min || value > max {
        return Err(CoreError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }

    Ok(value)
}

fn canonicalize_zero(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ChatMessage, ConnectionState, ConvoyRoute, Coordinate, CoreError, Severity, ThreatZone,
    };

    fn point(latitude: f64, longitude: f64) -> Coordinate {
        Coordinate::new(latitude, longitude).expect("coordinate should validate")
    }

    #[test]
    fn coordinate_constructor_enforces_ranges() {
        assert!(Coordinate::new(20.30, 85.82).is_ok());
        assert_eq!(
            Coordinate::new(91.0, 0.0),
            Err(CoreError::OutOfRange {
                field: "latitude",
                value: 91.0,
                min: -90.0,
                max: 90.0
            })
        );
        assert_eq!(
            Coordinate::new(0.0, -181.0),
            Err(CoreError::OutOfRange {
                field: "longitude",
                value: -181.0,
                min: -180.0,
                max: 180.0
            })
        );
        assert!(matches!(
            Coordinate::new(f64::NAN, 0.0),
            Err(CoreError::NonFiniteValue {
                field: "latitude",
                ..
            })
        ));
    }

    #[test]
    fn severity_parses_backend_strings() {
        assert_eq!("High".parse::<Severity>(), Ok(Severity::High));
        assert_eq!("critical".parse::<Severity>(), Ok(Severity::Critical));
        assert_eq!(
            "Severe".parse::<Severity>(),
            Err(CoreError::UnknownSeverity {
                value: "Severe".to_owned()
            })
        );
        assert_eq!(Severity::MAX.as_str(), "Critical");
        assert!(Severity::Critical > Severity::Low);
    }

    #[test]
    fn threat_zone_validates_radius_and_score() {
        let center = point(20.32, 85.83);
        assert!(ThreatZone::new(1, center, 800.0, 8.0).is_ok());
        assert_eq!(
            ThreatZone::new(1, center, -1.0, 8.0),
            Err(CoreError::NegativeValue {
                field: "radius",
                value: -1.0
            })
        );
        assert!(matches!(
            ThreatZone::new(1, center, 10.0, 11.0),
            Err(CoreError::OutOfRange {
                field: "threat_score",
                ..
            })
        ));
    }

    #[test]
    fn convoy_route_requires_name_and_two_points() {
        let start = point(20.30, 85.82);
        let end = point(20.31, 85.83);

        assert_eq!(
            ConvoyRoute::new(1, "  ", vec![start, end]),
            Err(CoreError::EmptyText {
                field: "convoy name"
            })
        );
        assert_eq!(
            ConvoyRoute::new(1, "Relief-1", vec![start]),
            Err(CoreError::PathTooShort { points: 1 })
        );

        let route = ConvoyRoute::new(42, "Relief-1", vec![start, end]).expect("valid route");
        assert_eq!(route.start(), start);
        assert_eq!(route.end(), end);
    }

    #[test]
    fn with_path_preserves_identity() {
        let route = ConvoyRoute::new(7, "Relief-7", vec![point(1.0, 1.0), point(2.0, 2.0)])
            .expect("valid route");
        let detour = vec![point(1.0, 1.0), point(1.5, 1.8), point(2.0, 2.0)];

        let rerouted = route.with_path(detour.clone()).expect("valid detour");
        assert_eq!(rerouted.convoy_id(), 7);
        assert_eq!(rerouted.name(), "Relief-7");
        assert_eq!(rerouted.path(), detour.as_slice());
        assert_eq!(
            route.with_path(Vec::new()),
            Err(CoreError::PathTooShort { points: 0 })
        );
    }

    #[test]
    fn outbound_text_is_bounded() {
        assert!(ChatMessage::validate_outbound_text("ok").is_ok());
        assert_eq!(
            ChatMessage::validate_outbound_text(""),
            Err(CoreError::EmptyText { field: "message" })
        );
        assert!(ChatMessage::validate_outbound_text(&"a".repeat(500)).is_ok());
        assert_eq!(
            ChatMessage::validate_outbound_text(&"a".repeat(501)),
            Err(CoreError::TextTooLong {
                field: "message",
                chars: 501,
                max: 500
            })
        );
    }

    #[test]
    fn connection_state_defaults_to_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert!(ConnectionState::Connected.is_connected());
    }
}
