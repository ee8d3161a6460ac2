//! Configuration structures consumed when building an [`InstrumentModel`].
//!
//! All arrays arrive already parsed and unit-normalized: the wavelength table
//! has been stripped of any leading index column, the parametric noise table
//! has been split into a wavelength grid and its coefficient rows, and the
//! pushbroom covariance tensor arrives as a flat array plus its declared
//! shape. File-format handling is a caller concern.
//!
//! [`InstrumentModel`]: crate::instrument::InstrumentModel

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// State-vector name for a uniform additive FWHM offset across all channels.
pub const FWHM_SCALE_NAME: &str = "FWHM_SCL";

/// State-vector name for a uniform wavelength shift across all channels.
pub const WL_SHIFT_NAME: &str = "WL_SHIFT";

/// Default finite-difference step for the calibration Jacobian.
pub const DEFAULT_FD_EPS: f64 = 1e-5;

fn default_fd_eps() -> f64 {
    DEFAULT_FD_EPS
}

fn default_integrations() -> u32 {
    1
}

/// Errors that abort instrument construction
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("wavelength table is empty")]
    EmptyWavelengths,

    #[error("wavelength and FWHM arrays must have the same length ({wavelengths} vs {fwhm})")]
    WavelengthFwhmMismatch { wavelengths: usize, fwhm: usize },

    #[error("noise model does not match wavelength band count: declared {bands} bands, expected {expected}")]
    BandCountMismatch { bands: usize, expected: usize },

    #[error("pushbroom covariance holds {len} values, expected {expected}")]
    CovarianceSizeMismatch { len: usize, expected: usize },

    #[error("pushbroom noise model declares zero spatial columns")]
    NoPushbroomColumns,

    #[error("noise coefficient table has {rows} rows but {wavelengths} wavelengths")]
    CoefficientTableShape { rows: usize, wavelengths: usize },

    #[error("noise coefficient table needs at least two rows, got {0}")]
    CoefficientTableTooShort(usize),

    #[error("noise coefficient table wavelengths must be strictly ascending")]
    CoefficientTableNotAscending,

    #[error("per-channel uncertainty has {len} entries, expected {n_chan}")]
    UncertaintyLengthMismatch { len: usize, n_chan: usize },

    #[error("integrations must be at least 1")]
    ZeroIntegrations,
}

/// One retrieved calibration state variable.
///
/// Insertion order in [`InstrumentConfig::statevector`] is significant: it
/// defines the index mapping into state vectors handed to the solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateVectorEntry {
    /// Variable name; `FWHM_SCL` and `WL_SHIFT` have calibration semantics
    pub name: String,
    /// Prior mean used to initialize the retrieval
    pub init: f64,
    /// Feasible (low, high) interval
    pub bounds: (f64, f64),
    /// Normalization scale; the prior standard deviation
    pub scale: f64,
}

/// Noise model selection, fixed at construction.
///
/// Exactly one of the three formulations is active for the lifetime of the
/// model. The coefficient-table and pushbroom payloads carry the raw arrays an
/// external loader produced; shape validation happens during construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NoiseSpec {
    /// Fixed signal-to-noise ratio applied to every channel
    Snr(f64),

    /// Parametric per-channel noise polynomial, interpolated from a table
    /// keyed by wavelength with coefficient rows `(a, b, c)`
    CoefficientTable {
        wavelengths: Array1<f64>,
        coeffs: Array2<f64>,
    },

    /// Empirical per-column covariance for a pushbroom sensor: `covariances`
    /// is a flat stack reshaped to `(columns, n_chan, n_chan)`, and `bands`
    /// must equal `n_chan^2`
    Pushbroom {
        columns: usize,
        bands: usize,
        covariances: Array1<f64>,
    },
}

/// One radiometric uncertainty contribution for the fixed bias variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChannelUncertainty {
    /// Single magnitude broadcast to every channel
    Scalar(f64),
    /// Per-channel magnitudes, length must equal the channel count
    PerChannel(Array1<f64>),
}

/// Uncertainties for instrument variables that are not retrieved.
///
/// Radiometric contributions combine by root sum square; the two spectral
/// scalars are copied directly into the last two bias slots. Absent entries
/// behave exactly like zeros.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Unknowns {
    /// Independent relative-calibration uncertainty sources
    #[serde(default)]
    pub channel_uncertainties: Vec<ChannelUncertainty>,

    /// Scalar spectral-shift (wavelength calibration) uncertainty
    #[serde(default)]
    pub wavelength_calibration_uncertainty: Option<f64>,

    /// Scalar spectral stray-light uncertainty
    #[serde(default)]
    pub stray_srf_uncertainty: Option<f64>,
}

/// Full construction-time configuration for an instrument model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Nominal per-channel center wavelengths; length defines the channel count
    pub wavelengths: Array1<f64>,

    /// Nominal per-channel full width at half maximum
    pub fwhm: Array1<f64>,

    /// Retrieved calibration state variables, in state-vector order
    #[serde(default)]
    pub statevector: Vec<StateVectorEntry>,

    /// Which of the three noise formulations to use
    pub noise: NoiseSpec,

    /// Number of co-added frames; noise attenuates by `sqrt(integrations)`
    #[serde(default = "default_integrations")]
    pub integrations: u32,

    /// Uncertainties for fixed, non-retrieved bias variables
    #[serde(default)]
    pub unknowns: Option<Unknowns>,

    /// Finite-difference step for the calibration Jacobian
    #[serde(default = "default_fd_eps")]
    pub fd_eps: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn unknowns_default_is_empty() {
        let u = Unknowns::default();
        assert!(u.channel_uncertainties.is_empty());
        assert!(u.wavelength_calibration_uncertainty.is_none());
        assert!(u.stray_srf_uncertainty.is_none());
    }

    #[test]
    fn config_clones_independently() {
        let config = InstrumentConfig {
            wavelengths: array![500.0, 510.0, 520.0],
            fwhm: array![8.0, 8.0, 8.0],
            statevector: vec![StateVectorEntry {
                name: WL_SHIFT_NAME.to_string(),
                init: 0.0,
                bounds: (-1.0, 1.0),
                scale: 0.1,
            }],
            noise: NoiseSpec::Snr(100.0),
            integrations: 1,
            unknowns: None,
            fd_eps: DEFAULT_FD_EPS,
        };

        let mut copy = config.clone();
        copy.integrations = 4;
        assert_eq!(config.integrations, 1);
        assert_eq!(copy.statevector[0].name, WL_SHIFT_NAME);
    }
}
