//! Spectral response function resampling.
//!
//! Converts a spectrum defined on a dense wavelength grid into instrument
//! channel space: each channel integrates the high-resolution spectrum
//! against a normalized Gaussian response centered on the channel wavelength
//! with a width set by the channel FWHM. The same Gaussian kernel, evaluated
//! on integer sample offsets, doubles as the stray-light point-spread used by
//! the bias Jacobian.

use ndarray::{Array1, Array2};

/// Ratio between a Gaussian's FWHM and its standard deviation,
/// `2·sqrt(2·ln 2)` rounded to the conventional 2.355.
pub const FWHM_TO_SIGMA: f64 = 2.355;

/// Normalized Gaussian spectral response over the sample points `x`.
///
/// The returned weights sum to one, so integrating a constant spectrum
/// against them reproduces the constant.
pub fn srf(x: &Array1<f64>, mu: f64, sigma: f64) -> Array1<f64> {
    let sigma = sigma.abs();
    let norm = (2.0 * std::f64::consts::PI).sqrt() * sigma;
    let mut y = x.mapv(|xi| {
        let u = (xi - mu) / sigma;
        (-0.5 * u * u).exp() / norm
    });
    let total: f64 = y.sum();
    if total > 0.0 {
        y /= total;
    }
    y
}

/// Resample a spectrum from a source wavelength grid onto target channels.
///
/// # Arguments
/// * `spectrum` - Radiance values on the source grid
/// * `wl` - Source wavelength grid, same length as `spectrum`
/// * `wl2` - Target channel center wavelengths
/// * `fwhm2` - Target channel FWHM values, same length as `wl2`
///
/// # Returns
/// One radiance value per target channel
pub fn resample_spectrum(
    spectrum: &Array1<f64>,
    wl: &Array1<f64>,
    wl2: &Array1<f64>,
    fwhm2: &Array1<f64>,
) -> Array1<f64> {
    let mut resampled = Array1::zeros(wl2.len());
    for (c, (&center, &fwhm)) in wl2.iter().zip(fwhm2.iter()).enumerate() {
        let weights = srf(wl, center, fwhm / FWHM_TO_SIGMA);
        resampled[c] = weights.dot(spectrum);
    }
    resampled
}

/// Resample each row of a spectrum stack independently, preserving row order.
pub fn resample_rows(
    spectra: &Array2<f64>,
    wl: &Array1<f64>,
    wl2: &Array1<f64>,
    fwhm2: &Array1<f64>,
) -> Array2<f64> {
    let mut resampled = Array2::zeros((spectra.nrows(), wl2.len()));
    for (row_in, mut row_out) in spectra.rows().into_iter().zip(resampled.rows_mut()) {
        row_out.assign(&resample_spectrum(&row_in.to_owned(), wl, wl2, fwhm2));
    }
    resampled
}

/// 1-D convolution returning an output the same length as the signal.
///
/// The kernel is assumed to have odd length; its center tap aligns with each
/// signal sample and contributions that fall off either edge are dropped.
pub fn convolve_same(signal: &Array1<f64>, kernel: &Array1<f64>) -> Array1<f64> {
    let n = signal.len() as isize;
    let half = (kernel.len() / 2) as isize;

    let mut out = Array1::zeros(signal.len());
    for i in 0..n {
        let mut acc = 0.0;
        for (k, &tap) in kernel.iter().enumerate() {
            let j = i + half - k as isize;
            if j >= 0 && j < n {
                acc += signal[j as usize] * tap;
            }
        }
        out[i as usize] = acc;
    }
    out
}
