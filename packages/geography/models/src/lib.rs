#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Neighborhood boundary and label anchor types.
//!
//! Boundaries are static reference data: loaded once at startup and never
//! mutated. They are independent of any filter or statistic.

use geo::{MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};

/// Outline of a neighborhood.
#[derive(Debug, Clone, PartialEq)]
pub enum Boundary {
    /// Single polygon; only the exterior ring is used for labeling.
    Polygon(Polygon<f64>),
    /// Several disjoint parts.
    MultiPolygon(MultiPolygon<f64>),
}

impl Boundary {
    /// Number of polygon parts.
    #[must_use]
    pub fn part_count(&self) -> usize {
        match self {
            Self::Polygon(_) => 1,
            Self::MultiPolygon(mp) => mp.0.len(),
        }
    }
}

/// A neighborhood name and its boundary, as read from the geometry source.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborhoodGeometry {
    /// Neighborhood name as it appears in the geometry source.
    pub barrio: String,
    /// Neighborhood outline.
    pub boundary: Boundary,
}

/// Point at which a neighborhood's label is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelAnchor {
    /// X coordinate (longitude).
    pub x: f64,
    /// Y coordinate (latitude).
    pub y: f64,
}

impl LabelAnchor {
    /// Creates an anchor at `(x, y)`.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}
