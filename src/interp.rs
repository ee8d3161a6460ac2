//! Piecewise-linear interpolation with linear extrapolation at the edges.
//!
//! Used to evaluate the parametric noise coefficient table at each instrument
//! channel center. Inside the table the value is linearly interpolated between
//! the bracketing nodes; outside, the slope of the nearest segment is
//! extended, so channels slightly beyond the tabulated spectral range still
//! receive sensible coefficients.

use thiserror::Error;

/// Errors that can occur when building an interpolant
#[derive(Debug, Error)]
pub enum InterpError {
    #[error("node and value vectors must have the same length ({nodes} vs {values})")]
    LengthMismatch { nodes: usize, values: usize },

    #[error("interpolation needs at least two nodes, got {0}")]
    TooFewNodes(usize),

    #[error("interpolation nodes must be strictly ascending")]
    NotAscending,
}

/// Piecewise-linear interpolant over strictly ascending nodes.
#[derive(Debug, Clone)]
pub struct LinearInterp {
    nodes: Vec<f64>,
    values: Vec<f64>,
}

impl LinearInterp {
    /// Build an interpolant from nodes and their values.
    ///
    /// # Errors
    ///
    /// Returns an error if the vectors disagree in length, hold fewer than
    /// two points, or the nodes are not strictly ascending.
    pub fn new(nodes: Vec<f64>, values: Vec<f64>) -> Result<Self, InterpError> {
        if nodes.len() != values.len() {
            return Err(InterpError::LengthMismatch {
                nodes: nodes.len(),
                values: values.len(),
            });
        }
        if nodes.len() < 2 {
            return Err(InterpError::TooFewNodes(nodes.len()));
        }
        for i in 1..nodes.len() {
            if nodes[i] <= nodes[i - 1] {
                return Err(InterpError::NotAscending);
            }
        }
        Ok(Self { nodes, values })
    }

    /// Evaluate the interpolant at `x`.
    ///
    /// Values beyond the first or last node are extrapolated linearly along
    /// the nearest segment.
    pub fn at(&self, x: f64) -> f64 {
        let n = self.nodes.len();

        // Pick the segment: the first one for points left of the table, the
        // last one for points right of it, the bracketing one otherwise.
        let seg = if x <= self.nodes[0] {
            0
        } else if x >= self.nodes[n - 1] {
            n - 2
        } else {
            // Interior x sits strictly between the first and last node, so
            // the partition point is in 1..n-1.
            self.nodes.partition_point(|&node| node <= x) - 1
        };

        let x0 = self.nodes[seg];
        let x1 = self.nodes[seg + 1];
        let y0 = self.values[seg];
        let y1 = self.values[seg + 1];

        y0 + (y1 - y0) * (x - x0) / (x1 - x0)
    }
}
