//! The instrument model: calibration state, spectral sampling, and priors.
//!
//! [`InstrumentModel`] is a single long-lived object owned by whatever owns
//! the retrieval loop. Its configuration fields are immutable after
//! construction and no operation mutates the model, so a single instance is
//! safe to share across threads.
//!
//! The model tracks which calibration parameters are retrieved (a uniform
//! FWHM offset and a uniform wavelength shift are the two with built-in
//! semantics), converts high-resolution radiance into instrument channel
//! space through the spectral response function, and exposes the prior mean
//! and covariance the external solver needs.

use log::debug;
use ndarray::{Array1, Array2};

use crate::config::{
    ChannelUncertainty, ConfigError, InstrumentConfig, FWHM_SCALE_NAME, WL_SHIFT_NAME,
};
use crate::geometry::Geometry;
use crate::noise::NoiseModel;
use crate::resample::{resample_rows, resample_spectrum};

/// Max wavelength difference that does not trigger expensive resampling,
/// in the same units as the wavelength arrays.
pub const WL_TOL: f64 = 0.01;

/// A model of the spectrometer instrument, including spectral response and
/// noise covariance matrices.
///
/// Noise is typically calculated from a parametric model fit for the specific
/// instrument and is a function of the radiance level; see
/// [`NoiseModel`](crate::noise::NoiseModel) for the three formulations.
#[derive(Debug, Clone)]
pub struct InstrumentModel {
    wl_init: Array1<f64>,
    fwhm_init: Array1<f64>,
    n_chan: usize,

    statevec: Vec<String>,
    bounds: Vec<(f64, f64)>,
    scale: Vec<f64>,
    init_val: Vec<f64>,

    // Positions of the two built-in calibration variables, resolved once so
    // calibration() never searches the name list.
    fwhm_offset_index: Option<usize>,
    wl_shift_index: Option<usize>,

    noise: NoiseModel,
    integrations: u32,

    bvec: Vec<String>,
    bval: Array1<f64>,

    calibration_fixed: bool,
    fd_eps: f64,
}

impl InstrumentModel {
    /// Build an instrument model from an already-parsed configuration.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] aborts construction entirely: mismatched
    /// wavelength/FWHM lengths, a pushbroom band count inconsistent with the
    /// channel count, malformed coefficient tables, per-channel uncertainty
    /// arrays of the wrong length, or a zero integration count.
    pub fn new(config: &InstrumentConfig) -> Result<Self, ConfigError> {
        let n_chan = config.wavelengths.len();
        if n_chan == 0 {
            return Err(ConfigError::EmptyWavelengths);
        }
        if config.fwhm.len() != n_chan {
            return Err(ConfigError::WavelengthFwhmMismatch {
                wavelengths: n_chan,
                fwhm: config.fwhm.len(),
            });
        }
        if config.integrations == 0 {
            return Err(ConfigError::ZeroIntegrations);
        }

        let mut statevec = Vec::with_capacity(config.statevector.len());
        let mut bounds = Vec::with_capacity(config.statevector.len());
        let mut scale = Vec::with_capacity(config.statevector.len());
        let mut init_val = Vec::with_capacity(config.statevector.len());
        for entry in &config.statevector {
            statevec.push(entry.name.clone());
            bounds.push(entry.bounds);
            scale.push(entry.scale);
            init_val.push(entry.init);
        }

        let fwhm_offset_index = statevec.iter().position(|name| name == FWHM_SCALE_NAME);
        let wl_shift_index = statevec.iter().position(|name| name == WL_SHIFT_NAME);
        let calibration_fixed = fwhm_offset_index.is_none() && wl_shift_index.is_none();

        let noise = NoiseModel::from_spec(&config.noise, &config.wavelengths)?;

        // Fixed (non-retrieved) bias variables: per-channel relative
        // calibration, then spectral shift and stray light.
        let mut bvec: Vec<String> = config
            .wavelengths
            .iter()
            .map(|&wl| format!("Cal_Relative_{:04}", wl as i64))
            .collect();
        bvec.push("Cal_Spectral".to_string());
        bvec.push("Cal_Stray_SRF".to_string());

        let mut bval: Array1<f64> = Array1::zeros(n_chan + 2);
        if let Some(unknowns) = &config.unknowns {
            // Radiometric uncertainties from independent sources combine via
            // root sum square.
            for source in &unknowns.channel_uncertainties {
                match source {
                    ChannelUncertainty::Scalar(value) => {
                        for c in 0..n_chan {
                            bval[c] += value * value;
                        }
                    }
                    ChannelUncertainty::PerChannel(values) => {
                        if values.len() != n_chan {
                            return Err(ConfigError::UncertaintyLengthMismatch {
                                len: values.len(),
                                n_chan,
                            });
                        }
                        for (c, &value) in values.iter().enumerate() {
                            bval[c] += value * value;
                        }
                    }
                }
            }
            for c in 0..n_chan {
                bval[c] = bval[c].sqrt();
            }

            if let Some(spectral) = unknowns.wavelength_calibration_uncertainty {
                bval[n_chan] = spectral;
            }
            if let Some(stray) = unknowns.stray_srf_uncertainty {
                bval[n_chan + 1] = stray;
            }
        }

        debug!(
            "instrument model: {n_chan} channels, {} state variables, calibration_fixed={calibration_fixed}",
            statevec.len()
        );

        Ok(Self {
            wl_init: config.wavelengths.clone(),
            fwhm_init: config.fwhm.clone(),
            n_chan,
            statevec,
            bounds,
            scale,
            init_val,
            fwhm_offset_index,
            wl_shift_index,
            noise,
            integrations: config.integrations,
            bvec,
            bval,
            calibration_fixed,
            fd_eps: config.fd_eps,
        })
    }

    /// Effective per-channel wavelengths and FWHM for a calibration state.
    ///
    /// Starts from the nominal arrays; a `FWHM_SCL` state variable adds a
    /// uniform offset to every channel's FWHM and a `WL_SHIFT` variable adds
    /// a uniform wavelength shift. Only a single scalar of each is modeled.
    pub fn calibration(&self, state: &Array1<f64>) -> (Array1<f64>, Array1<f64>) {
        let mut wl = self.wl_init.clone();
        let mut fwhm = self.fwhm_init.clone();
        if let Some(index) = self.fwhm_offset_index {
            fwhm += state[index];
        }
        if let Some(index) = self.wl_shift_index {
            wl += state[index];
        }
        (wl, fwhm)
    }

    /// Apply instrument sampling to a high-resolution radiance spectrum.
    ///
    /// When no spectral calibration is being retrieved and the input grid
    /// already matches the instrument channels to within [`WL_TOL`], the
    /// spectrum passes through unchanged. Otherwise each channel integrates
    /// the spectrum against its response function at the calibrated
    /// wavelength and width.
    pub fn sample(
        &self,
        state: &Array1<f64>,
        wl_hi: &Array1<f64>,
        rdn_hi: &Array1<f64>,
    ) -> Array1<f64> {
        if self.grid_matches(wl_hi) {
            return rdn_hi.clone();
        }
        let (wl, fwhm) = self.calibration(state);
        resample_spectrum(rdn_hi, wl_hi, &wl, &fwhm)
    }

    /// Apply instrument sampling to every row of a spectrum stack.
    pub fn sample_rows(
        &self,
        state: &Array1<f64>,
        wl_hi: &Array1<f64>,
        rdn_hi: &Array2<f64>,
    ) -> Array2<f64> {
        if self.grid_matches(wl_hi) {
            return rdn_hi.clone();
        }
        let (wl, fwhm) = self.calibration(state);
        resample_rows(rdn_hi, wl_hi, &wl, &fwhm)
    }

    fn grid_matches(&self, wl_hi: &Array1<f64>) -> bool {
        self.calibration_fixed
            && wl_hi.len() == self.n_chan
            && self
                .wl_init
                .iter()
                .zip(wl_hi.iter())
                .all(|(a, b)| (a - b).abs() < WL_TOL)
    }

    /// Measurement-error covariance due to instrument noise, `n_chan x n_chan`.
    pub fn measurement_covariance(&self, meas: &Array1<f64>, geom: &Geometry) -> Array2<f64> {
        self.noise.covariance(meas, geom, self.integrations)
    }

    /// Mean of the calibration-state prior distribution.
    pub fn prior_mean(&self) -> Array1<f64> {
        Array1::from(self.init_val.clone())
    }

    /// Covariance of the calibration-state prior distribution (diagonal,
    /// squared per-variable scales); `0 x 0` when nothing is retrieved.
    pub fn prior_covariance(&self) -> Array2<f64> {
        let n = self.scale.len();
        let mut cov = Array2::zeros((n, n));
        for (i, &s) in self.scale.iter().enumerate() {
            cov[[i, i]] = s * s;
        }
        cov
    }

    /// Nominal channel center wavelengths.
    pub fn wavelengths(&self) -> &Array1<f64> {
        &self.wl_init
    }

    /// Nominal channel FWHM values.
    pub fn fwhm(&self) -> &Array1<f64> {
        &self.fwhm_init
    }

    /// Number of instrument channels.
    pub fn n_chan(&self) -> usize {
        self.n_chan
    }

    /// Number of retrieved calibration state variables.
    pub fn n_state(&self) -> usize {
        self.statevec.len()
    }

    /// Names of the retrieved calibration state variables, in order.
    pub fn statevec(&self) -> &[String] {
        &self.statevec
    }

    /// Feasible (low, high) interval per state variable.
    pub fn bounds(&self) -> &[(f64, f64)] {
        &self.bounds
    }

    /// Normalization scale per state variable.
    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    /// Names of the fixed bias variables: one relative-calibration entry per
    /// channel, then `Cal_Spectral` and `Cal_Stray_SRF`.
    pub fn bvec(&self) -> &[String] {
        &self.bvec
    }

    /// Uncertainty magnitudes aligned with [`bvec`](Self::bvec).
    pub fn bval(&self) -> &Array1<f64> {
        &self.bval
    }

    /// True when neither the FWHM offset nor the wavelength shift is retrieved.
    pub fn calibration_fixed(&self) -> bool {
        self.calibration_fixed
    }

    /// Finite-difference step used by the calibration Jacobian.
    pub fn fd_eps(&self) -> f64 {
        self.fd_eps
    }

    pub(crate) fn integrations(&self) -> u32 {
        self.integrations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NoiseSpec, StateVectorEntry, Unknowns, DEFAULT_FD_EPS};
    use approx::assert_relative_eq;
    use ndarray::{array, Array1};

    fn snr_config() -> InstrumentConfig {
        InstrumentConfig {
            wavelengths: array![500.0, 510.0, 520.0],
            fwhm: array![8.0, 8.0, 8.0],
            statevector: Vec::new(),
            noise: NoiseSpec::Snr(100.0),
            integrations: 1,
            unknowns: None,
            fd_eps: DEFAULT_FD_EPS,
        }
    }

    fn shift_entry(init: f64) -> StateVectorEntry {
        StateVectorEntry {
            name: WL_SHIFT_NAME.to_string(),
            init,
            bounds: (-1.0, 1.0),
            scale: 0.1,
        }
    }

    #[test]
    fn fixed_instrument_has_empty_prior() {
        let model = InstrumentModel::new(&snr_config()).unwrap();
        assert_eq!(model.n_state(), 0);
        assert_eq!(model.prior_mean().len(), 0);
        assert_eq!(model.prior_covariance().dim(), (0, 0));
        assert!(model.calibration_fixed());
    }

    #[test]
    fn prior_covariance_is_squared_scales() {
        let mut config = snr_config();
        config.statevector = vec![
            StateVectorEntry {
                name: FWHM_SCALE_NAME.to_string(),
                init: 0.5,
                bounds: (0.0, 2.0),
                scale: 0.2,
            },
            shift_entry(0.1),
        ];
        let model = InstrumentModel::new(&config).unwrap();

        let xa = model.prior_mean();
        assert_eq!(xa.to_vec(), vec![0.5, 0.1]);

        let sa = model.prior_covariance();
        assert_eq!(sa.dim(), (2, 2));
        assert_relative_eq!(sa[[0, 0]], 0.04, epsilon = 1e-12);
        assert_relative_eq!(sa[[1, 1]], 0.01, epsilon = 1e-12);
        assert_eq!(sa[[0, 1]], 0.0);
    }

    #[test]
    fn calibration_applies_uniform_offsets() {
        let mut config = snr_config();
        config.statevector = vec![
            StateVectorEntry {
                name: FWHM_SCALE_NAME.to_string(),
                init: 0.0,
                bounds: (-1.0, 1.0),
                scale: 0.1,
            },
            shift_entry(0.0),
        ];
        let model = InstrumentModel::new(&config).unwrap();
        assert!(!model.calibration_fixed());

        let (wl, fwhm) = model.calibration(&array![0.5, -2.0]);
        for (c, &nominal) in [500.0, 510.0, 520.0].iter().enumerate() {
            assert_relative_eq!(wl[c], nominal - 2.0, epsilon = 1e-12);
            assert_relative_eq!(fwhm[c], 8.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn sample_passes_matching_grid_through() {
        let model = InstrumentModel::new(&snr_config()).unwrap();
        let state = Array1::zeros(0);
        let rdn = array![0.2, 0.3, 0.4];

        let out = model.sample(&state, &array![500.0, 510.0, 520.0], &rdn);
        assert_eq!(out, rdn);

        // Differences inside the tolerance still short-circuit
        let out = model.sample(&state, &array![500.005, 509.995, 520.0], &rdn);
        assert_eq!(out, rdn);
    }

    #[test]
    fn sample_resamples_dense_grids() {
        let model = InstrumentModel::new(&snr_config()).unwrap();
        let state = Array1::zeros(0);
        let wl_hi = Array1::from_iter((450..=570).map(|wl| wl as f64));
        let rdn_hi = Array1::from_elem(wl_hi.len(), 0.3);

        let out = model.sample(&state, &wl_hi, &rdn_hi);
        assert_eq!(out.len(), 3);
        for &v in out.iter() {
            assert_relative_eq!(v, 0.3, epsilon = 1e-10);
        }
    }

    #[test]
    fn wl_shift_retrieval_disables_fast_path() {
        let mut config = snr_config();
        config.statevector = vec![shift_entry(0.0)];
        let model = InstrumentModel::new(&config).unwrap();

        let rdn = array![0.2, 0.3, 0.4];
        // Matching grid, but the shift is retrieved so resampling must run;
        // with a 3-sample grid the SRF sees truncated support, so the result
        // is not the identity.
        let out = model.sample(&array![0.0], &array![500.0, 510.0, 520.0], &rdn);
        assert_eq!(out.len(), 3);
        assert!(out
            .iter()
            .zip(rdn.iter())
            .any(|(a, b)| (a - b).abs() > 1e-6));
    }

    #[test]
    fn sample_rows_matches_per_row_sampling() {
        let model = InstrumentModel::new(&snr_config()).unwrap();
        let state = Array1::zeros(0);
        let wl_hi = Array1::from_iter((450..=570).map(|wl| wl as f64));
        let row0 = wl_hi.mapv(|w| 0.001 * w);
        let row1 = wl_hi.mapv(|w| 0.002 * w);
        let stack = ndarray::stack![ndarray::Axis(0), row0, row1];

        let rows = model.sample_rows(&state, &wl_hi, &stack);
        let single0 = model.sample(&state, &wl_hi, &row0);
        let single1 = model.sample(&state, &wl_hi, &row1);

        for c in 0..3 {
            assert_relative_eq!(rows[[0, c]], single0[c], epsilon = 1e-12);
            assert_relative_eq!(rows[[1, c]], single1[c], epsilon = 1e-12);
        }
    }

    #[test]
    fn bias_vector_combines_root_sum_square() {
        let mut config = snr_config();
        config.unknowns = Some(Unknowns {
            channel_uncertainties: vec![
                ChannelUncertainty::Scalar(0.3),
                ChannelUncertainty::PerChannel(array![0.4, 0.4, 0.4]),
            ],
            wavelength_calibration_uncertainty: Some(0.05),
            stray_srf_uncertainty: Some(0.02),
        });
        let model = InstrumentModel::new(&config).unwrap();

        let bval = model.bval();
        assert_eq!(bval.len(), 5);
        for c in 0..3 {
            assert_relative_eq!(bval[c], 0.5, epsilon = 1e-12);
        }
        assert_relative_eq!(bval[3], 0.05, epsilon = 1e-12);
        assert_relative_eq!(bval[4], 0.02, epsilon = 1e-12);

        let bvec = model.bvec();
        assert_eq!(bvec[0], "Cal_Relative_0500");
        assert_eq!(bvec[3], "Cal_Spectral");
        assert_eq!(bvec[4], "Cal_Stray_SRF");
    }

    #[test]
    fn absent_unknowns_behave_like_zeros() {
        let model = InstrumentModel::new(&snr_config()).unwrap();
        assert_eq!(model.bval().len(), 5);
        assert!(model.bval().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn construction_rejects_bad_shapes() {
        let mut config = snr_config();
        config.fwhm = array![8.0, 8.0];
        assert!(matches!(
            InstrumentModel::new(&config),
            Err(ConfigError::WavelengthFwhmMismatch { .. })
        ));

        let mut config = snr_config();
        config.wavelengths = Array1::zeros(0);
        config.fwhm = Array1::zeros(0);
        assert!(matches!(
            InstrumentModel::new(&config),
            Err(ConfigError::EmptyWavelengths)
        ));

        let mut config = snr_config();
        config.integrations = 0;
        assert!(matches!(
            InstrumentModel::new(&config),
            Err(ConfigError::ZeroIntegrations)
        ));

        let mut config = snr_config();
        config.unknowns = Some(Unknowns {
            channel_uncertainties: vec![ChannelUncertainty::PerChannel(array![0.1])],
            ..Unknowns::default()
        });
        assert!(matches!(
            InstrumentModel::new(&config),
            Err(ConfigError::UncertaintyLengthMismatch { len: 1, n_chan: 3 })
        ));
    }
}
