//! Observation geometry seen by the noise model.

use serde::{Deserialize, Serialize};

/// Where on the focal plane a measurement was taken.
///
/// Only the pushbroom noise model looks at this: when a spatial column is
/// present, its empirical covariance slice is used, otherwise the noise model
/// falls back to the column-averaged covariance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    /// Spatial column of the pushbroom frame, if known
    pub pushbroom_column: Option<usize>,
}

impl Geometry {
    /// Geometry with no spatial column information.
    pub fn new() -> Self {
        Self::default()
    }

    /// Geometry pinned to a specific pushbroom column.
    pub fn at_column(column: usize) -> Self {
        Self {
            pushbroom_column: Some(column),
        }
    }
}
