use samanvay_core::{Coordinate, CoreError};
use serde::{Deserialize, Serialize};

/// A waypoint as the backend writes it.
///
/// Route payloads carry `[lat, lng]` pairs; request bodies and some push
/// payloads use `{lat, lng}` objects. Both decode, and pairs are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointBody {
    Pair([f64; 2]),
    Object { lat: f64, lng: f64 },
}

impl PointBody {
    pub fn to_coordinate(self) -> Result<Coordinate, CoreError> {
        match self {
            Self::Pair([lat, lng]) | Self::Object { lat, lng } => Coordinate::new(lat, lng),
        }
    }
}

impl From<Coordinate> for PointBody {
    fn from(value: Coordinate) -> Self {
        Self::Pair([value.latitude(), value.longitude()])
    }
}

pub(crate) fn to_path(points: Vec<PointBody>) -> Result<Vec<Coordinate>, CoreError> {
    points.into_iter().map(PointBody::to_coordinate).collect()
}
