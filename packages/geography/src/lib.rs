#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Neighborhood geometry.
//!
//! Loads neighborhood outlines from `GeoJSON`, computes one label anchor
//! per neighborhood, and matches neighborhood names between the geometry
//! source and the survey store.

pub mod centroid;
pub mod index;
pub mod loader;
pub mod names;

pub use index::{GeometryEntry, GeometryIndex};
pub use loader::{DEFAULT_NAME_PROPERTY, boundary_geojson, load_boundaries, parse_boundaries};

use thiserror::Error;

/// Errors that can occur while loading geometry.
#[derive(Debug, Error)]
pub enum GeometryError {
    /// `GeoJSON` parsing failed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// Reading the geometry file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Data conversion error.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
