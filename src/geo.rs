//! Segment geometries and the geographic distance between subgraphs

use ::geo::{CoordsIter, HaversineDistance as _, Point};
use wkt::TryFromWkt;

use crate::error::{DiscoveryError, DiscoveryResult};

/// Geometry of a street segment in WGS84 degrees (x = lon, y = lat).
///
/// The discovery core never looks inside a geometry; it only hands sets of
/// them to a [`GeometryDistance`] implementation.
pub type Geometry = ::geo::Geometry<f64>;

/// Parse a WKT `POINT`, `LINESTRING` or `MULTILINESTRING` with at least one
/// coordinate
pub fn parse_wkt(text: &str) -> DiscoveryResult<Geometry> {
    let text = text.trim();
    let geometry = <Geometry as TryFromWkt<f64>>::try_from_wkt_str(text)
        .map_err(|e| DiscoveryError::InvalidGeometry(format!("{text}: {e}")))?;

    match &geometry {
        Geometry::Point(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => {}
        _ => {
            return Err(DiscoveryError::InvalidGeometry(format!(
                "unsupported geometry type: {text}"
            )))
        }
    }

    if geometry.coords_count() == 0 {
        return Err(DiscoveryError::InvalidGeometry(format!(
            "geometry has no coordinates: {text}"
        )));
    }

    Ok(geometry)
}

/// Minimum vertex-to-vertex great-circle distance in metres; infinite when
/// either geometry is empty
pub fn min_vertex_distance(a: &Geometry, b: &Geometry) -> f64 {
    a.coords_iter()
        .flat_map(|p| {
            b.coords_iter()
                .map(move |q| Point::from(p).haversine_distance(&Point::from(q)))
        })
        .fold(f64::INFINITY, f64::min)
}

/// Minimum distance between two sets of geometries.
///
/// Returning `None` (or a non-finite / negative value) marks the distance as
/// undefined; the caller drops the pair instead of failing the run.
pub trait GeometryDistance: Sync {
    fn min_distance(&self, left: &[&Geometry], right: &[&Geometry]) -> Option<f64>;
}

impl<F> GeometryDistance for F
where
    F: Fn(&[&Geometry], &[&Geometry]) -> Option<f64> + Sync,
{
    fn min_distance(&self, left: &[&Geometry], right: &[&Geometry]) -> Option<f64> {
        self(left, right)
    }
}

/// Default distance: smallest haversine distance over all vertex pairs
#[derive(Debug, Clone, Copy, Default)]
pub struct HaversineDistance;

impl GeometryDistance for HaversineDistance {
    fn min_distance(&self, left: &[&Geometry], right: &[&Geometry]) -> Option<f64> {
        if left.is_empty() || right.is_empty() {
            return None;
        }

        let distance = left
            .iter()
            .flat_map(|l| right.iter().map(move |r| min_vertex_distance(l, r)))
            .fold(f64::INFINITY, f64::min);

        distance.is_finite().then_some(distance)
    }
}
