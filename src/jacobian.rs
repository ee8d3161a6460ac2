//! Sensitivity of the measurement to instrument variables.
//!
//! Two distinct Jacobians feed the error budget of the external retrieval:
//!
//! - the **calibration Jacobian** differentiates the sampled measurement with
//!   respect to the retrieved calibration state by finite differences, one
//!   forward-model evaluation per state variable;
//! - the **bias Jacobian** covers the fixed, non-retrieved variables with
//!   structured perturbations: each channel's relative-calibration bias
//!   scales that channel's own signal, a wavelength-shift bias acts to first
//!   order like the resampled derivative of the spectrum, and a stray-light
//!   bias acts like the residual of a fixed point-spread blur.
//!
//! Both are pure functions of their inputs; nothing is cached across calls.

use ndarray::{Array1, Array2};

use crate::instrument::InstrumentModel;
use crate::resample::{convolve_same, srf};

/// Bias columns below this magnitude are left zero.
const BIAS_THRESHOLD: f64 = 1e-6;

/// Half-span of the stray-light point-spread kernel, in samples.
const STRAY_KERNEL_HALF_SPAN: i32 = 10;

/// Width parameter of the stray-light point-spread kernel, in samples.
const STRAY_KERNEL_SIGMA: f64 = 4.0;

impl InstrumentModel {
    /// Jacobian of the measurement with respect to the retrieved calibration
    /// state, `n_chan x n_state`, by finite differences.
    ///
    /// Each state entry is perturbed by the configured step
    /// ([`fd_eps`](Self::fd_eps)) and the measurement delta divided by it.
    /// The result has zero width when no calibration state is retrieved. The
    /// per-variable evaluations are independent and write to disjoint
    /// columns.
    pub fn calibration_jacobian(
        &self,
        state: &Array1<f64>,
        wl_hi: &Array1<f64>,
        rdn_hi: &Array1<f64>,
    ) -> Array2<f64> {
        let n_state = self.n_state();
        let mut jac = Array2::zeros((self.n_chan(), n_state));
        if n_state == 0 {
            return jac;
        }

        let eps = self.fd_eps();
        let meas = self.sample(state, wl_hi, rdn_hi);
        for index in 0..n_state {
            let mut perturbed = state.clone();
            perturbed[index] += eps;
            let meas_perturbed = self.sample(&perturbed, wl_hi, rdn_hi);
            let column = (meas_perturbed - &meas) / eps;
            jac.column_mut(index).assign(&column);
        }
        jac
    }

    /// Jacobian of the measurement with respect to the fixed, non-retrieved
    /// bias variables, `n_chan x (n_chan + 2)`.
    ///
    /// The first `n_chan` columns form `diag(meas)`: relative-calibration
    /// error scales each channel multiplicatively. The spectral-shift column
    /// resamples the first difference of the high-resolution radiance, a
    /// first-order stand-in for a wavelength shift. The stray-light column is
    /// the difference between the measurement and a copy blurred by a fixed
    /// symmetric response. Either spectral column stays zero when its
    /// configured uncertainty is negligible.
    pub fn bias_jacobian(
        &self,
        state: &Array1<f64>,
        wl_hi: &Array1<f64>,
        rdn_hi: &Array1<f64>,
    ) -> Array2<f64> {
        let n_chan = self.n_chan();
        let meas = self.sample(state, wl_hi, rdn_hi);

        let mut jac = Array2::zeros((n_chan, n_chan + 2));
        for c in 0..n_chan {
            jac[[c, c]] = meas[c];
        }

        let bval = self.bval();

        // Uncertainty due to spectral calibration
        if bval[n_chan] > BIAS_THRESHOLD {
            let mut diff = Array1::zeros(rdn_hi.len());
            for i in 0..rdn_hi.len().saturating_sub(1) {
                diff[i] = rdn_hi[i + 1] - rdn_hi[i];
            }
            let column = self.sample(state, wl_hi, &diff);
            jac.column_mut(n_chan).assign(&column);
        }

        // Uncertainty due to spectral stray light
        if bval[n_chan + 1] > BIAS_THRESHOLD {
            let taps = Array1::from_iter(
                (-STRAY_KERNEL_HALF_SPAN..=STRAY_KERNEL_HALF_SPAN).map(f64::from),
            );
            let kernel = srf(&taps, 0.0, STRAY_KERNEL_SIGMA);
            let blur = convolve_same(&meas, &kernel);
            jac.column_mut(n_chan + 1).assign(&(&blur - &meas));
        }

        jac
    }
}
