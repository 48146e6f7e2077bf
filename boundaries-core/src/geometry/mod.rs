//! Geometry normalization: canonical multipolygons, reprojection,
//! topology-preserving simplification and centroids.

mod crs;

use geo::{
    BoundingRect, Centroid, Geometry, MultiPolygon, Point, Polygon, Rect, SimplifyVwPreserve,
    Validation,
};
use log::debug;
use thiserror::Error;

pub use crs::{CoordinateTransform, Crs, CrsError};

/// Errors raised while normalizing a feature's geometry.
#[derive(Debug, Error)]
pub enum GeometryError {
    /// The feature is not a polygon or multipolygon.
    #[error("unsupported geometry kind {kind}")]
    UnsupportedGeometryKind {
        /// Name of the geometry kind that was found.
        kind: &'static str,
    },
    /// The geometry has no coordinates, so no centroid exists.
    #[error("geometry is empty")]
    EmptyGeometry,
    /// The coordinate system could not be named.
    #[error(transparent)]
    Crs(#[from] CrsError),
    /// The PROJ definition of a coordinate system was rejected.
    #[error("failed to build projection for {crs}")]
    Projection {
        /// Display form of the coordinate system.
        crs: String,
        /// Source error returned by `proj4rs`.
        #[source]
        source: proj4rs::errors::Error,
    },
    /// Transforming coordinates between systems failed.
    #[error("failed to reproject from {from} to {to}")]
    Reprojection {
        /// Source coordinate system.
        from: String,
        /// Target coordinate system.
        to: String,
        /// Source error returned by `proj4rs`.
        #[source]
        source: proj4rs::errors::Error,
    },
}

/// Operations the loader needs from a geometry backend.
pub trait GeometryEngine {
    /// Wrap a polygon into a one-member multipolygon; pass multipolygons
    /// through; reject every other kind.
    fn to_multipolygon(&self, geometry: Geometry<f64>) -> Result<MultiPolygon<f64>, GeometryError>;

    /// Transform `geometry` with a transform built for the current load.
    fn reproject(
        &self,
        geometry: MultiPolygon<f64>,
        transform: &CoordinateTransform,
    ) -> Result<MultiPolygon<f64>, GeometryError>;

    /// Reduce vertex count without introducing self-intersections.
    fn simplify(&self, geometry: &MultiPolygon<f64>, tolerance: f64) -> MultiPolygon<f64>;

    /// Centroid of the full-resolution geometry.
    fn centroid(&self, geometry: &MultiPolygon<f64>) -> Result<Point<f64>, GeometryError>;

    /// Bounding box of the geometry, or `None` when it is empty.
    fn extent(&self, geometry: &MultiPolygon<f64>) -> Option<Rect<f64>>;
}

/// Default engine backed by `geo` and `proj4rs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeoEngine;

/// Name of a geometry kind as reported in errors.
#[must_use]
pub const fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

impl GeometryEngine for GeoEngine {
    fn to_multipolygon(&self, geometry: Geometry<f64>) -> Result<MultiPolygon<f64>, GeometryError> {
        match geometry {
            Geometry::Polygon(polygon) => Ok(MultiPolygon::new(vec![polygon])),
            Geometry::MultiPolygon(multi) => Ok(multi),
            other => Err(GeometryError::UnsupportedGeometryKind {
                kind: geometry_kind(&other),
            }),
        }
    }

    fn reproject(
        &self,
        mut geometry: MultiPolygon<f64>,
        transform: &CoordinateTransform,
    ) -> Result<MultiPolygon<f64>, GeometryError> {
        transform.apply(&mut geometry)?;
        Ok(geometry)
    }

    /// Visvalingam-Whyatt reduction with an area threshold of
    /// `tolerance²`. A polygon whose reduction fails validation keeps its
    /// original rings. A non-positive tolerance returns the input.
    fn simplify(&self, geometry: &MultiPolygon<f64>, tolerance: f64) -> MultiPolygon<f64> {
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return geometry.clone();
        }
        let epsilon = tolerance * tolerance;
        let simplified = MultiPolygon::new(
            geometry
                .iter()
                .map(|polygon| simplify_polygon(polygon, epsilon))
                .collect(),
        );
        if !simplified.is_valid() && geometry.is_valid() {
            debug!("simplified multipolygon failed validation; keeping full geometry");
            return geometry.clone();
        }
        simplified
    }

    fn centroid(&self, geometry: &MultiPolygon<f64>) -> Result<Point<f64>, GeometryError> {
        geometry.centroid().ok_or(GeometryError::EmptyGeometry)
    }

    fn extent(&self, geometry: &MultiPolygon<f64>) -> Option<Rect<f64>> {
        geometry.bounding_rect()
    }
}

fn simplify_polygon(polygon: &Polygon<f64>, epsilon: f64) -> Polygon<f64> {
    let reduced = polygon.simplify_vw_preserve(epsilon);
    if reduced.is_valid() || !polygon.is_valid() {
        reduced
    } else {
        debug!("simplified polygon failed validation; keeping original rings");
        polygon.clone()
    }
}

#[cfg(test)]
mod tests;
