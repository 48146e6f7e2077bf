//! Unit and property tests for the geometry engine.

use super::*;
use geo::{Coord, CoordsIter, LineString, coord, line_string, point, polygon};
use proptest::prelude::*;
use rstest::{fixture, rstest};

#[fixture]
fn engine() -> GeoEngine {
    GeoEngine
}

#[fixture]
fn square() -> Polygon<f64> {
    polygon![
        (x: 0.0, y: 0.0),
        (x: 1.0, y: 0.0),
        (x: 1.0, y: 1.0),
        (x: 0.0, y: 1.0),
        (x: 0.0, y: 0.0),
    ]
}

/// A comb whose teeth are separated by slots narrower than the tolerance
/// used below, so naive reduction would fold teeth into each other.
fn comb(teeth: usize) -> Polygon<f64> {
    let mut coords = vec![coord! { x: 0.0, y: 0.0 }];
    for tooth in 0..teeth {
        let left = tooth as f64;
        coords.push(coord! { x: left, y: 1.0 });
        coords.push(coord! { x: left + 0.9, y: 1.0 });
        coords.push(coord! { x: left + 0.9, y: 0.1 });
        coords.push(coord! { x: left + 1.0, y: 0.1 });
    }
    coords.push(coord! { x: teeth as f64, y: 0.0 });
    Polygon::new(LineString::from(coords), vec![])
}

fn star(radii: &[f64]) -> Polygon<f64> {
    let count = radii.len() as f64;
    let coords: Vec<Coord<f64>> = radii
        .iter()
        .enumerate()
        .map(|(i, radius)| {
            let angle = std::f64::consts::TAU * (i as f64) / count;
            coord! { x: radius * angle.cos(), y: radius * angle.sin() }
        })
        .collect();
    Polygon::new(LineString::from(coords), vec![])
}

#[rstest]
fn polygon_becomes_singleton_multipolygon(engine: GeoEngine, square: Polygon<f64>) {
    let multi = engine
        .to_multipolygon(Geometry::Polygon(square.clone()))
        .expect("polygon converts");
    assert_eq!(multi, MultiPolygon::new(vec![square]));
}

#[rstest]
fn to_multipolygon_is_idempotent(engine: GeoEngine, square: Polygon<f64>) {
    let once = engine
        .to_multipolygon(Geometry::Polygon(square))
        .expect("polygon converts");
    let twice = engine
        .to_multipolygon(Geometry::MultiPolygon(once.clone()))
        .expect("multipolygon passes through");
    assert_eq!(once, twice);
}

#[rstest]
#[case(Geometry::Point(point!(x: 1.0, y: 2.0)), "Point")]
#[case(
    Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)]),
    "LineString"
)]
fn other_kinds_are_rejected(
    engine: GeoEngine,
    #[case] geometry: Geometry<f64>,
    #[case] expected: &str,
) {
    let err = engine
        .to_multipolygon(geometry)
        .expect_err("unsupported kind");
    match err {
        GeometryError::UnsupportedGeometryKind { kind } => assert_eq!(kind, expected),
        other => panic!("unexpected error {other:?}"),
    }
}

#[rstest]
fn centroid_of_square(engine: GeoEngine, square: Polygon<f64>) {
    let centroid = engine
        .centroid(&MultiPolygon::new(vec![square]))
        .expect("centroid");
    assert!((centroid.x() - 0.5).abs() < 1e-12 && (centroid.y() - 0.5).abs() < 1e-12);
}

#[rstest]
fn centroid_of_empty_geometry_fails(engine: GeoEngine) {
    let err = engine
        .centroid(&MultiPolygon::new(vec![]))
        .expect_err("empty geometry");
    assert!(matches!(err, GeometryError::EmptyGeometry));
    assert_eq!(engine.extent(&MultiPolygon::new(vec![])), None);
}

#[rstest]
#[case(0.0)]
#[case(-1.0)]
#[case(f64::NAN)]
fn non_positive_tolerance_keeps_geometry(engine: GeoEngine, #[case] tolerance: f64) {
    let geometry = MultiPolygon::new(vec![comb(5)]);
    assert_eq!(engine.simplify(&geometry, tolerance), geometry);
}

#[rstest]
fn reentrant_concavities_stay_simple(engine: GeoEngine) {
    let geometry = MultiPolygon::new(vec![comb(12)]);
    assert!(geometry.is_valid());
    let simplified = engine.simplify(&geometry, 2.0);
    assert!(simplified.is_valid(), "{simplified:?}");
    assert!(simplified.coords_count() <= geometry.coords_count());
}

#[rstest]
fn holes_survive_simplification(engine: GeoEngine) {
    let outer = star(&[2.0, 1.9, 2.1, 1.8, 2.0, 1.95, 2.05, 1.9, 2.0, 2.1]);
    let hole = LineString::from(vec![
        coord! { x: -1.0, y: -1.0 },
        coord! { x: 1.0, y: -1.0 },
        coord! { x: 1.0, y: 1.0 },
        coord! { x: -1.0, y: 1.0 },
        coord! { x: -1.0, y: -1.0 },
    ]);
    let geometry = MultiPolygon::new(vec![Polygon::new(outer.exterior().clone(), vec![hole])]);
    assert!(geometry.is_valid());
    let simplified = engine.simplify(&geometry, 1.0);
    assert!(simplified.is_valid(), "{simplified:?}");
    let polygon = simplified.0.first().expect("polygon kept");
    assert_eq!(polygon.interiors().len(), 1);
}

#[rstest]
fn reprojection_round_trips_through_utm(engine: GeoEngine) {
    let original = MultiPolygon::new(vec![polygon![
        (x: -79.40, y: 43.65),
        (x: -79.38, y: 43.65),
        (x: -79.38, y: 43.67),
        (x: -79.40, y: 43.65),
    ]]);
    let forward = CoordinateTransform::new(Crs::WGS84, Crs::Epsg(32617)).expect("forward");
    let inverse = CoordinateTransform::new(Crs::Epsg(32617), Crs::WGS84).expect("inverse");
    let projected = engine
        .reproject(original.clone(), &forward)
        .expect("project");
    let first = projected.coords_iter().next().expect("coordinate");
    assert!((first.x - 630_000.0).abs() < 10_000.0, "{first:?}");
    let restored = engine.reproject(projected, &inverse).expect("unproject");
    for (a, b) in original.coords_iter().zip(restored.coords_iter()) {
        assert!((a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9, "{a:?} vs {b:?}");
    }
}

#[rstest]
fn unknown_codes_fail_to_build() {
    let err = CoordinateTransform::new(Crs::Epsg(9999), Crs::WGS84).expect_err("unknown code");
    assert!(matches!(
        err,
        GeometryError::Crs(CrsError::UnknownEpsgCode { code: 9999 })
    ));
}

proptest! {
    #[test]
    fn simplification_is_monotonic_in_tolerance(
        radii in prop::collection::vec(0.5_f64..2.0, 8..40),
        low in 0.0_f64..0.5,
        extra in 0.0_f64..0.5,
    ) {
        let engine = GeoEngine;
        let geometry = MultiPolygon::new(vec![star(&radii)]);
        let fine = engine.simplify(&geometry, low);
        let coarse = engine.simplify(&geometry, low + extra);
        prop_assert!(coarse.coords_count() <= fine.coords_count());
        prop_assert!(fine.coords_count() <= geometry.coords_count());
        prop_assert!(coarse.is_valid());
    }

    #[test]
    fn mercator_round_trip_is_exact_to_nanodegrees(
        lon in -179.0_f64..179.0,
        lat in -80.0_f64..80.0,
    ) {
        let engine = GeoEngine;
        let forward = CoordinateTransform::new(Crs::WGS84, Crs::Epsg(3857)).expect("forward");
        let inverse = CoordinateTransform::new(Crs::Epsg(3857), Crs::WGS84).expect("inverse");
        let original = MultiPolygon::new(vec![polygon![
            (x: lon, y: lat),
            (x: lon + 0.5, y: lat),
            (x: lon, y: lat + 0.5),
            (x: lon, y: lat),
        ]]);
        let restored = engine
            .reproject(engine.reproject(original.clone(), &forward).expect("project"), &inverse)
            .expect("unproject");
        for (a, b) in original.coords_iter().zip(restored.coords_iter()) {
            prop_assert!((a.x - b.x).abs() < 1e-9);
            prop_assert!((a.y - b.y).abs() < 1e-9);
        }
    }

    #[test]
    fn to_multipolygon_idempotent_for_stars(radii in prop::collection::vec(0.5_f64..2.0, 3..20)) {
        let engine = GeoEngine;
        let once = engine
            .to_multipolygon(Geometry::Polygon(star(&radii)))
            .expect("polygon converts");
        let twice = engine
            .to_multipolygon(Geometry::MultiPolygon(once.clone()))
            .expect("passes through");
        prop_assert_eq!(once, twice);
    }
}
