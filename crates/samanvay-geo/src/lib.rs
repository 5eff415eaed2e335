use samanvay_core::{Coordinate, ThreatZone};
use thiserror::Error;

/// Mean Earth radius used by the dashboard's distance readouts.
pub const EARTH_RADIUS_KM: f64 = 6_371.0;

const EPSILON: f64 = 1e-12;

#[derive(Debug, Error, PartialEq)]
pub enum GeoError {
    #[error("fraction must be in [0.0, 1.0], got {fraction}")]
    InvalidFraction { fraction: f64 },

    #[error("samples_per_leg must be greater than zero")]
    ZeroSamples,

    #[error(transparent)]
    Core(#[from] samanvay_core::CoreError),
}

/// Great-circle (haversine) distance in kilometres.
#[must_use]
pub fn distance_km(from: &Coordinate, to: &Coordinate) -> f64 {
    let lat1 = from.latitude().to_radians();
    let lon1 = from.longitude().to_radians();
    let lat2 = to.latitude().to_radians();
    let lon2 = to.longitude().to_radians();

    EARTH_RADIUS_KM * haversine_central_angle(lat1, lon1, lat2, lon2)
}

#[must_use]
pub fn haversine_distance_meters(from: &Coordinate, to: &Coordinate) -> f64 {
    distance_km(from, to) * 1_000.0
}

#[must_use]
pub fn initial_bearing_degrees(from: &Coordinate, to: &Coordinate) -> f64 {
    let lat1 = from.latitude().to_radians();
    let lon1 = from.longitude().to_radians();
    let lat2 = to.latitude().to_radians();
    let lon2 = to.longitude().to_radians();

    let delta_lon = lon2 - lon1;
    let y = delta_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos();
    y.atan2(x).to_degrees().rem_euclid(360.0)
}

pub fn interpolate_great_circle(
    from: &Coordinate,
    to: &Coordinate,
    fraction: f64,
) -> Result<Coordinate, GeoError> {
    if !(0.0..=1.0).contains(&fraction) {
        return Err(GeoError::InvalidFraction { fraction });
    }

    if fraction <= EPSILON {
        return Ok(*from);
    }

    if (1.0 - fraction).abs() <= EPSILON {
        return Ok(*to);
    }

    let lat1 = from.latitude().to_radians();
    let lon1 = from.longitude().to_radians();
    let lat2 = to.latitude().to_radians();
    let lon2 = to.longitude().to_radians();

    let central_angle = haversine_central_angle(lat1, lon1, lat2, lon2);
    let sin_angle = central_angle.sin();
    if central_angle.abs() <= EPSILON || sin_angle.abs() <= EPSILON {
        return interpolate_linearly(from, to, fraction);
    }

    let weight_a = ((1.0 - fraction) * central_angle).sin() / sin_angle;
    let weight_b = (fraction * central_angle).sin() / sin_angle;

    let x = weight_a * lat1.cos() * lon1.cos() + weight_b * lat2.cos() * lon2.cos();
    let y = weight_a * lat1.cos() * lon1.sin() + weight_b * lat2.cos() * lon2.sin();
    let z = weight_a * lat1.sin() + weight_b * lat2.sin();

    let latitude = z.atan2((x.powi(2) + y.powi(2)).sqrt()).to_degrees();
    let longitude = normalize_longitude_degrees(y.atan2(x).to_degrees());

    Ok(Coordinate::new(latitude, longitude)?)
}

/// True when `point` lies within the zone's radius.
#[must_use]
pub fn zone_contains(zone: &ThreatZone, point: &Coordinate) -> bool {
    haversine_distance_meters(&zone.center(), point) <= zone.radius_m()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZoneExposure {
    pub zone_id: i64,
    pub threat_score: f64,
    pub closest_approach_m: f64,
}

/// Samples every leg of `path` and reports the zones the route enters.
///
/// Each leg is split into `samples_per_leg` equal great-circle steps; both leg
/// endpoints are always checked. Exposures are returned in zone order.
pub fn route_exposure(
    path: &[Coordinate],
    zones: &[ThreatZone],
    samples_per_leg: usize,
) -> Result<Vec<ZoneExposure>, GeoError> {
    if samples_per_leg == 0 {
        return Err(GeoError::ZeroSamples);
    }

    let mut samples = Vec::with_capacity(path.len().saturating_mul(samples_per_leg) + 1);
    for leg in path.windows(2) {
        for step in 0..samples_per_leg {
            let fraction = step as f64 / samples_per_leg as f64;
            samples.push(interpolate_great_circle(&leg[0], &leg[1], fraction)?);
        }
    }
    if let Some(last) = path.last() {
        samples.push(*last);
    }

    let exposures = zones
        .iter()
        .filter_map(|zone| {
            let closest = samples
                .iter()
                .map(|sample| haversine_distance_meters(&zone.center(), sample))
                .fold(f64::INFINITY, f64::min);
            (closest <= zone.radius_m()).then(|| ZoneExposure {
                zone_id: zone.id(),
                threat_score: zone.threat_score(),
                closest_approach_m: closest,
            })
        })
        .collect();

    Ok(exposures)
}

fn interpolate_linearly(
    from: &Coordinate,
    to: &Coordinate,
    fraction: f64,
) -> Result<Coordinate, GeoError> {
    let latitude = from.latitude() + (to.latitude() - from.latitude()) * fraction;
    let longitude = normalize_longitude_degrees(
        from.longitude() + shortest_longitude_delta(from.longitude(), to.longitude()) * fraction,
    );

    Ok(Coordinate::new(latitude, longitude)?)
}

fn haversine_central_angle(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let delta_lat = (lat2 - lat1).abs();
    let delta_lon = (lon2 - lon1).abs();

    let haversine = ((delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2))
    .clamp(0.0, 1.0);
    2.0 * haversine.sqrt().asin()
}

fn shortest_longitude_delta(from: f64, to: f64) -> f64 {
    let mut delta = to - from;
    while delta > 180.0 {
        delta -= 360.0;
    }
    while delta < -180.0 {
        delta += 360.0;
    }
    delta
}

fn normalize_longitude_degrees(value: f64) -> f64 {
    let mut normalized = (value + 180.0).rem_euclid(360.0) - 180.0;
    if (normalized + 180.0).abs() <= EPSILON {
        normalized = 180.0;
    }
    normalized
}

#[cfg(test)]
mod tests {
    use samanvay_core::{Coordinate, ThreatZone};

    use crate::{
        distance_km, initial_bearing_degrees, interpolate_great_circle, route_exposure,
        zone_contains, GeoError, EARTH_RADIUS_KM,
    };

    fn point(latitude: f64, longitude: f64) -> Coordinate {
        Coordinate::new(latitude, longitude).expect("point should validate")
    }

    fn approx_equal(left: f64, right: f64, tolerance: f64) {
        let delta = (left - right).abs();
        assert!(
            delta <= tolerance,
            "expected {left} ~= {right} within {tolerance}, delta={delta}"
        );
    }

    #[test]
    fn distance_is_zero_for_identical_points() {
        let bhubaneswar = point(20.2961, 85.8245);
        assert_eq!(distance_km(&bhubaneswar, &bhubaneswar), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            (point(20.30, 85.82), point(20.31, 85.83)),
            (point(-33.86, 151.21), point(51.51, -0.13)),
            (point(89.9, 0.0), point(-89.9, 179.9)),
            (point(0.0, -179.5), point(0.0, 179.5)),
        ];

        for (a, b) in pairs {
            assert_eq!(distance_km(&a, &b), distance_km(&b, &a), "{a} <-> {b}");
        }
    }

    #[test]
    fn distance_matches_known_city_pair_within_tolerance() {
        let san_francisco = point(37.7749, -122.4194);
        let los_angeles = point(34.0522, -118.2437);

        approx_equal(distance_km(&san_francisco, &los_angeles), 559.0, 2.0);
    }

    #[test]
    fn antipodal_distance_is_half_circumference() {
        let distance = distance_km(&point(0.0, 0.0), &point(0.0, 180.0));
        approx_equal(distance, std::f64::consts::PI * EARTH_RADIUS_KM, 1e-6);
    }

    #[test]
    fn initial_bearing_matches_expected_reference_value() {
        let san_francisco = point(37.7749, -122.4194);
        let los_angeles = point(34.0522, -118.2437);

        approx_equal(
            initial_bearing_degrees(&san_francisco, &los_angeles),
            136.5,
            1.0,
        );
    }

    #[test]
    fn interpolation_returns_expected_equatorial_midpoint() {
        let midpoint = interpolate_great_circle(&point(0.0, 0.0), &point(0.0, 90.0), 0.5)
            .expect("midpoint should work");
        approx_equal(midpoint.latitude(), 0.0, 1e-9);
        approx_equal(midpoint.longitude(), 45.0, 1e-9);
    }

    #[test]
    fn interpolation_rejects_invalid_fraction() {
        let error = interpolate_great_circle(&point(0.0, 0.0), &point(1.0, 1.0), 1.1)
            .expect_err("fraction above one should be rejected");
        assert_eq!(error, GeoError::InvalidFraction { fraction: 1.1 });
    }

    #[test]
    fn zone_containment_uses_radius_in_meters() {
        let zone = ThreatZone::new(1, point(20.32, 85.83), 800.0, 8.0).expect("valid zone");
        assert!(zone_contains(&zone, &point(20.323, 85.83)));
        assert!(!zone_contains(&zone, &point(20.33, 85.83)));
    }

    #[test]
    fn exposure_reports_zones_crossed_mid_leg() {
        let crossed = ThreatZone::new(1, point(20.305, 85.825), 300.0, 8.0).expect("valid zone");
        let clear = ThreatZone::new(2, point(20.40, 85.90), 600.0, 10.0).expect("valid zone");
        let path = [point(20.30, 85.82), point(20.31, 85.83)];

        let exposures =
            route_exposure(&path, &[crossed, clear], 50).expect("exposure should compute");
        assert_eq!(exposures.len(), 1);
        assert_eq!(exposures[0].zone_id, 1);
        assert!(exposures[0].closest_approach_m <= 300.0);
    }

    #[test]
    fn exposure_rejects_zero_samples() {
        let path = [point(0.0, 0.0), point(1.0, 1.0)];
        assert_eq!(route_exposure(&path, &[], 0), Err(GeoError::ZeroSamples));
    }
}
