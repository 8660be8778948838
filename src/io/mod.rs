//! Field I/O collaborators.
//!
//! The simulation core never decodes or encodes rasters itself. It consumes
//! a [`FieldLoader`] that yields a normalized single-channel field and a
//! [`FieldSaver`] that writes the final field; [`PngField`] implements both
//! on top of the `image` crate.

pub mod png;

pub use png::{Palette, PngField};

use crate::data::grid::GridBuffer;
use crate::heat_error::HeatSimError;
use std::path::Path;

/// Temperature that a fully saturated input sample stands for.
pub const MAX_TEMP: f64 = 1000.0;

/// Source of the initial heat field.
pub trait FieldLoader {
    /// Load a padding-0 grid of samples normalized to `[0, 1]`.
    fn load(&self, path: &Path) -> Result<GridBuffer, HeatSimError>;
}

/// Sink for the final temperature field.
pub trait FieldSaver {
    /// Write `field` (absolute temperatures) to `path`.
    fn save(&self, field: &GridBuffer, path: &Path) -> Result<(), HeatSimError>;
}
