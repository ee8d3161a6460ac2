//! Stochastic measurement simulation.
//!
//! Draws one zero-mean multivariate-normal sample from the instrument's
//! measurement-error covariance and adds it to the true radiance. The draw is
//! seedable for reproducible simulations; without a seed, entropy comes from
//! the thread-local generator.

use log::warn;
use nalgebra::{Cholesky, DMatrix, DVector, SymmetricEigen};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{thread_rng, RngCore, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::geometry::Geometry;
use crate::instrument::InstrumentModel;

impl InstrumentModel {
    /// Simulate a measurement by this sensor for a true radiance.
    ///
    /// Computes the measurement covariance for `meas` and the given geometry,
    /// perturbs the radiance with one sample of the implied noise
    /// distribution, and returns the noisy spectrum.
    ///
    /// # Arguments
    /// * `meas` - Noise-free radiance in instrument channel space
    /// * `geom` - Observation geometry (pushbroom column, if any)
    /// * `rng_seed` - Optional seed for reproducible output
    pub fn simulate_measurement(
        &self,
        meas: &Array1<f64>,
        geom: &Geometry,
        rng_seed: Option<u64>,
    ) -> Array1<f64> {
        let seed = rng_seed.unwrap_or_else(|| thread_rng().next_u64());
        let mut rng = StdRng::seed_from_u64(seed);

        let cov = self.measurement_covariance(meas, geom);
        meas + &sample_zero_mean_mvn(&cov, &mut rng)
    }
}

/// Draw one sample from a zero-mean multivariate normal with covariance `cov`.
///
/// The covariance is factored with a Cholesky decomposition and applied to a
/// vector of independent standard-normal draws. Covariances that are only
/// positive-semidefinite (an all-zero matrix, or an empirical matrix with a
/// degenerate direction) have no Cholesky factor; those are factored with a
/// symmetric eigendecomposition instead, with any negative eigenvalues
/// clamped to zero, so degenerate correlation structure survives intact. A
/// fully zero covariance produces a zero perturbation.
fn sample_zero_mean_mvn(cov: &Array2<f64>, rng: &mut StdRng) -> Array1<f64> {
    let n = cov.nrows();
    let standard_normal =
        Normal::new(0.0, 1.0).expect("standard normal parameters are always valid");

    let na_cov = DMatrix::from_fn(n, n, |i, j| cov[[i, j]]);
    let correlated = match Cholesky::new(na_cov.clone()) {
        Some(factor) => {
            let z = DVector::from_fn(n, |_, _| standard_normal.sample(rng));
            factor.l() * z
        }
        None => {
            let eigen = SymmetricEigen::new(na_cov);
            if eigen.eigenvalues.iter().any(|&l| l < 0.0) {
                warn!("measurement covariance has negative eigenvalues; clamping to zero");
            }
            // Scale each eigen-direction by the square root of its
            // (clamped) eigenvalue, then rotate back to channel space.
            let z = DVector::from_fn(n, |i, _| {
                eigen.eigenvalues[i].max(0.0).sqrt() * standard_normal.sample(rng)
            });
            eigen.eigenvectors * z
        }
    };
    Array1::from_iter(correlated.iter().copied())
}
