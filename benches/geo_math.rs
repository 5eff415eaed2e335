use criterion::{black_box, criterion_group, criterion_main, Criterion};
use samanvay::prelude::{distance_km, route_exposure, Coordinate, ThreatZone};

fn point(latitude: f64, longitude: f64) -> Coordinate {
    Coordinate::new(latitude, longitude).expect("coordinate")
}

fn bench_geo_math(criterion: &mut Criterion) {
    let start = point(20.2961, 85.8245);
    let end = point(20.4625, 85.8830);
    let path: Vec<Coordinate> = (0..=40)
        .map(|step| {
            let fraction = f64::from(step) / 40.0;
            point(20.2961 + 0.1664 * fraction, 85.8245 + 0.0585 * fraction)
        })
        .collect();
    let zones: Vec<ThreatZone> = (0..25)
        .map(|id| {
            let offset = f64::from(id) * 0.008;
            ThreatZone::new(i64::from(id), point(20.30 + offset, 85.83), 400.0, 5.0)
                .expect("zone")
        })
        .collect();

    let mut group = criterion.benchmark_group("geo_math");

    group.bench_function("haversine_distance", |bench| {
        bench.iter(|| black_box(distance_km(black_box(&start), black_box(&end))));
    });

    group.bench_function("route_exposure_40_legs_25_zones", |bench| {
        bench.iter(|| {
            let exposure = route_exposure(black_box(&path), black_box(&zones), 16)
                .expect("exposure");
            black_box(exposure);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_geo_math);
criterion_main!(benches);
