//! Measurement-error covariance models.
//!
//! Three interchangeable formulations, selected once at construction and
//! stored as an owned enum variant:
//!
//! - **SNR**: a fixed signal-to-noise ratio turns the measurement itself into
//!   a diagonal noise-equivalent-delta-radiance (NEdL) covariance.
//! - **Parametric**: per-channel polynomial coefficients `(a, b, c)` model a
//!   shot-noise-like dependence of NEdL on signal level,
//!   `nedl = |a·sqrt(b + meas) + c|`.
//! - **Pushbroom**: one full empirical channel-to-channel covariance per
//!   spatial column, capturing correlations the diagonal models ignore.
//!
//! All variants share the `integrations` frame count: co-adding `k` frames
//! attenuates noise by `sqrt(k)`.

use log::debug;
use ndarray::{Array1, Array2, Array3, Axis};

use crate::config::{ConfigError, NoiseSpec};
use crate::geometry::Geometry;
use crate::interp::LinearInterp;

/// Radiance floor applied before SNR-based noise computation. Values below
/// this are clamped up to avoid division blow-up on near-zero or negative
/// radiance artifacts.
pub const RADIANCE_FLOOR: f64 = 1e-5;

/// Noise covariance formulation owned by an instrument model.
#[derive(Debug, Clone)]
pub enum NoiseModel {
    /// Fixed signal-to-noise ratio, identical for every channel
    Snr { snr: f64 },

    /// Per-channel `(a, b, c)` coefficients, one row per channel
    Parametric { coeffs: Array2<f64> },

    /// Per-column empirical covariances, shape `(ncols, n_chan, n_chan)`
    Pushbroom { covs: Array3<f64> },
}

impl NoiseModel {
    /// Build the noise model from its configuration payload.
    ///
    /// Coefficient tables are evaluated at each instrument channel center
    /// with piecewise-linear interpolation (linear extrapolation at the
    /// spectral edges). Pushbroom payloads are validated against the channel
    /// count and reshaped into the covariance tensor.
    pub fn from_spec(spec: &NoiseSpec, wl_init: &Array1<f64>) -> Result<Self, ConfigError> {
        let n_chan = wl_init.len();
        match spec {
            NoiseSpec::Snr(snr) => {
                debug!("noise model: fixed SNR {snr}");
                Ok(NoiseModel::Snr { snr: *snr })
            }

            NoiseSpec::CoefficientTable { wavelengths, coeffs } => {
                if wavelengths.len() < 2 {
                    return Err(ConfigError::CoefficientTableTooShort(wavelengths.len()));
                }
                if coeffs.nrows() != wavelengths.len() || coeffs.ncols() != 3 {
                    return Err(ConfigError::CoefficientTableShape {
                        rows: coeffs.nrows(),
                        wavelengths: wavelengths.len(),
                    });
                }

                let nodes = wavelengths.to_vec();
                let mut channel_coeffs = Array2::zeros((n_chan, 3));
                for col in 0..3 {
                    let interp =
                        LinearInterp::new(nodes.clone(), coeffs.column(col).to_vec()).map_err(
                            |_| ConfigError::CoefficientTableNotAscending,
                        )?;
                    for (c, &wl) in wl_init.iter().enumerate() {
                        channel_coeffs[[c, col]] = interp.at(wl);
                    }
                }
                debug!("noise model: parametric, {n_chan} channels");
                Ok(NoiseModel::Parametric {
                    coeffs: channel_coeffs,
                })
            }

            NoiseSpec::Pushbroom {
                columns,
                bands,
                covariances,
            } => {
                if *columns == 0 {
                    return Err(ConfigError::NoPushbroomColumns);
                }
                if *bands != n_chan * n_chan {
                    return Err(ConfigError::BandCountMismatch {
                        bands: *bands,
                        expected: n_chan * n_chan,
                    });
                }
                let expected = columns * n_chan * n_chan;
                if covariances.len() != expected {
                    return Err(ConfigError::CovarianceSizeMismatch {
                        len: covariances.len(),
                        expected,
                    });
                }
                let covs = Array3::from_shape_vec(
                    (*columns, n_chan, n_chan),
                    covariances.to_vec(),
                )
                .expect("covariance length was checked against its shape");
                debug!("noise model: pushbroom, {columns} columns x {n_chan} channels");
                Ok(NoiseModel::Pushbroom { covs })
            }
        }
    }

    /// Measurement-error covariance for a radiance measurement.
    ///
    /// Returns an `n_chan x n_chan` matrix. The SNR and parametric variants
    /// produce diagonal matrices (channels independent); the pushbroom
    /// variant returns the empirical covariance for the geometry's spatial
    /// column, or the column average when none is given. The result is
    /// symmetric positive-semidefinite by construction; empirical inputs are
    /// not re-validated here.
    pub fn covariance(&self, meas: &Array1<f64>, geom: &Geometry, integrations: u32) -> Array2<f64> {
        match self {
            NoiseModel::Snr { snr } => {
                let clamped = meas.mapv(|v| v.max(RADIANCE_FLOOR));
                let nedl = clamped / *snr;
                diag_squared(&nedl)
            }

            NoiseModel::Parametric { coeffs } => {
                let root_frames = f64::from(integrations).sqrt();
                let nedl = Array1::from_shape_fn(meas.len(), |c| {
                    let a = coeffs[[c, 0]];
                    let b = coeffs[[c, 1]];
                    let offset = coeffs[[c, 2]];
                    (a * (b + meas[c]).sqrt() + offset).abs() / root_frames
                });
                diag_squared(&nedl)
            }

            NoiseModel::Pushbroom { covs } => {
                let cov = match geom.pushbroom_column {
                    Some(col) => covs.index_axis(Axis(0), col).to_owned(),
                    None => covs
                        .mean_axis(Axis(0))
                        .expect("pushbroom model holds at least one column"),
                };
                cov / f64::from(integrations).sqrt()
            }
        }
    }
}

/// Diagonal covariance from a per-channel noise magnitude.
fn diag_squared(nedl: &Array1<f64>) -> Array2<f64> {
    let mut cov = Array2::zeros((nedl.len(), nedl.len()));
    for (c, &v) in nedl.iter().enumerate() {
        cov[[c, c]] = v * v;
    }
    cov
}
