//! Imaging spectrometer instrument modeling
//!
//! This crate models how a high-resolution "true" radiance spectrum is
//! transformed into the lower-resolution, noisy spectrum an imaging
//! spectrometer actually reports, and how measurement uncertainty propagates
//! into an inverse-estimation pipeline. It provides a parameterized
//! noise-covariance model, a spectral response/calibration model mapping true
//! wavelengths to instrument channels, finite-difference and structured
//! Jacobians of the measurement, and a stochastic measurement simulator.
//!
//! Configuration-file parsing, generic table loading, and the retrieval loop
//! itself live outside this crate: construction consumes already-parsed
//! wavelength, coefficient, and covariance arrays, and the exposed covariance
//! matrices, Jacobians, and simulated spectra feed the external solver.

pub mod config;
pub mod geometry;
pub mod instrument;
pub mod interp;
pub mod jacobian;
pub mod noise;
pub mod resample;
pub mod simulate;

// Re-exports for easier access
pub use config::{
    ChannelUncertainty, ConfigError, InstrumentConfig, NoiseSpec, StateVectorEntry, Unknowns,
};
pub use geometry::Geometry;
pub use instrument::InstrumentModel;
pub use noise::NoiseModel;
pub use resample::resample_spectrum;
