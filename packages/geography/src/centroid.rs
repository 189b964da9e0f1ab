//! Label anchor computation.
//!
//! A polygon's anchor is the area centroid of its exterior ring (shoelace
//! formula); holes are ignored. A zero-area ring falls back to the mean of
//! its distinct vertices. A multipolygon is anchored at the centroid of its
//! single largest part. Smaller parts do not contribute, so a neighborhood
//! split across several islands is labeled on the biggest one.

use geo::{BoundingRect, Coord, LineString, MultiPolygon, Polygon};
use survey_map_geography_models::{Boundary, LabelAnchor};

/// Signed shoelace area of a ring. Positive for counter-clockwise rings.
///
/// The ring may be open or closed; the closing edge is always included.
#[must_use]
pub fn ring_signed_area(ring: &LineString<f64>) -> f64 {
    edges(ring)
        .map(|(a, b)| cross(a, b))
        .sum::<f64>()
        * 0.5
}

/// Anchor for any boundary. `None` only for empty geometry.
#[must_use]
pub fn centroid(boundary: &Boundary) -> Option<LabelAnchor> {
    match boundary {
        Boundary::Polygon(polygon) => polygon_centroid(polygon),
        Boundary::MultiPolygon(multi) => multipolygon_centroid(multi),
    }
}

/// Shoelace centroid of a polygon's exterior ring.
#[must_use]
pub fn polygon_centroid(polygon: &Polygon<f64>) -> Option<LabelAnchor> {
    ring_centroid(polygon.exterior())
}

/// Centroid of the part with the largest absolute area.
///
/// Ties keep the first part encountered.
#[must_use]
pub fn multipolygon_centroid(multi: &MultiPolygon<f64>) -> Option<LabelAnchor> {
    let mut largest: Option<(&Polygon<f64>, f64)> = None;
    for polygon in &multi.0 {
        let area = ring_signed_area(polygon.exterior()).abs();
        if largest.is_none_or(|(_, best)| area > best) {
            largest = Some((polygon, area));
        }
    }
    largest.and_then(|(polygon, _)| polygon_centroid(polygon))
}

fn ring_centroid(ring: &LineString<f64>) -> Option<LabelAnchor> {
    let vertices = distinct_vertices(ring);
    if vertices.is_empty() {
        return None;
    }

    let mut area = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for (a, b) in edges(ring) {
        let term = cross(a, b);
        area += term;
        cx += (a.x + b.x) * term;
        cy += (a.y + b.y) * term;
    }
    area *= 0.5;

    if area.abs() <= f64::EPSILON * extent(ring).powi(2) {
        log::trace!("Degenerate ring with {} vertices, using vertex mean", vertices.len());
        return Some(vertex_mean(vertices));
    }

    Some(LabelAnchor::new(cx / (6.0 * area), cy / (6.0 * area)))
}

/// Larger side of the ring's bounding box. The zero-area tolerance scales
/// with its square.
fn extent(ring: &LineString<f64>) -> f64 {
    ring.bounding_rect().map_or(0.0, |rect| rect.width().max(rect.height()))
}

/// Ring vertices without the closing duplicate.
fn distinct_vertices(ring: &LineString<f64>) -> &[Coord<f64>] {
    let coords = ring.0.as_slice();
    match coords {
        [first, .., last] if first == last => &coords[..coords.len() - 1],
        _ => coords,
    }
}

/// Edges of the ring, including the edge back to the first vertex.
fn edges(ring: &LineString<f64>) -> impl Iterator<Item = (Coord<f64>, Coord<f64>)> + '_ {
    let vertices = distinct_vertices(ring);
    let n = vertices.len();
    (0..n).map(move |i| (vertices[i], vertices[(i + 1) % n]))
}

fn cross(a: Coord<f64>, b: Coord<f64>) -> f64 {
    a.x.mul_add(b.y, -(b.x * a.y))
}

#[allow(clippy::cast_precision_loss)]
fn vertex_mean(vertices: &[Coord<f64>]) -> LabelAnchor {
    let n = vertices.len() as f64;
    let (sx, sy) = vertices
        .iter()
        .fold((0.0, 0.0), |(sx, sy), c| (sx + c.x, sy + c.y));
    LabelAnchor::new(sx / n, sy / n)
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;

    fn square(x0: f64, y0: f64, side: f64) -> Polygon<f64> {
        polygon![
            (x: x0, y: y0),
            (x: x0 + side, y: y0),
            (x: x0 + side, y: y0 + side),
            (x: x0, y: y0 + side),
            (x: x0, y: y0),
        ]
    }

    fn assert_anchor(anchor: Option<LabelAnchor>, x: f64, y: f64) {
        let anchor = anchor.expect("anchor");
        assert!((anchor.x - x).abs() < 1e-9, "x = {}", anchor.x);
        assert!((anchor.y - y).abs() < 1e-9, "y = {}", anchor.y);
    }

    #[test]
    fn unit_square_centroid() {
        assert_anchor(polygon_centroid(&square(0.0, 0.0, 1.0)), 0.5, 0.5);
    }

    #[test]
    fn winding_order_does_not_matter() {
        let clockwise = polygon![
            (x: 0.0, y: 0.0),
            (x: 0.0, y: 2.0),
            (x: 4.0, y: 2.0),
            (x: 4.0, y: 0.0),
        ];
        assert!(ring_signed_area(clockwise.exterior()) < 0.0);
        assert_anchor(polygon_centroid(&clockwise), 2.0, 1.0);
    }

    #[test]
    fn triangle_centroid_is_vertex_average() {
        let triangle = polygon![(x: 0.0, y: 0.0), (x: 6.0, y: 0.0), (x: 0.0, y: 3.0)];
        assert_anchor(polygon_centroid(&triangle), 2.0, 1.0);
    }

    #[test]
    fn multipolygon_uses_largest_part_only() {
        let multi = MultiPolygon(vec![square(0.0, 0.0, 1.0), square(10.0, 10.0, 2.0)]);
        assert_anchor(multipolygon_centroid(&multi), 11.0, 11.0);

        let reversed = MultiPolygon(vec![square(10.0, 10.0, 2.0), square(0.0, 0.0, 1.0)]);
        assert_anchor(multipolygon_centroid(&reversed), 11.0, 11.0);
    }

    #[test]
    fn degenerate_ring_falls_back_to_vertex_mean() {
        let line = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 2.0, y: 2.0),
            (x: 0.0, y: 0.0),
        ];
        assert_anchor(polygon_centroid(&line), 1.0, 1.0);
    }

    #[test]
    fn tiny_rings_keep_their_area_centroid() {
        let scale = 1e-9;
        let quad = polygon![
            (x: 0.0, y: 0.0),
            (x: 2.0 * scale, y: 0.0),
            (x: 2.0 * scale, y: scale),
            (x: 0.0, y: 3.0 * scale),
        ];
        let anchor = polygon_centroid(&quad).unwrap();
        assert!((anchor.x / scale - 5.0 / 6.0).abs() < 1e-6, "x = {}", anchor.x);
        assert!((anchor.y / scale - 13.0 / 12.0).abs() < 1e-6, "y = {}", anchor.y);
    }

    #[test]
    fn degenerate_ring_far_from_origin_falls_back() {
        let line = polygon![
            (x: 1.0e6, y: 1.0e6),
            (x: 1.0e6 + 1.0, y: 1.0e6 + 1.0),
            (x: 1.0e6 + 2.0, y: 1.0e6 + 2.0),
        ];
        assert_anchor(polygon_centroid(&line), 1.0e6 + 1.0, 1.0e6 + 1.0);
    }

    #[test]
    fn empty_geometry_has_no_anchor() {
        let empty = Polygon::new(LineString::new(Vec::new()), Vec::new());
        assert_eq!(polygon_centroid(&empty), None);
        assert_eq!(multipolygon_centroid(&MultiPolygon(Vec::new())), None);
    }

    #[test]
    fn holes_are_ignored() {
        let with_hole = Polygon::new(
            square(0.0, 0.0, 4.0).exterior().clone(),
            vec![square(0.0, 0.0, 1.0).exterior().clone()],
        );
        assert_anchor(
            centroid(&Boundary::Polygon(with_hole)),
            2.0,
            2.0,
        );
    }
}
