//! Threshold Shaping
//!
//! This module provides the numerical policy that turns the base relative
//! threshold (K0) into per-cell thresholds.
//!
//! # Dynamic thresholds
//!
//! With dynamic thresholding on, the detector precomputes two arrays:
//!
//! - **range**: an SNR floor that is held constant close to the sensor,
//!   ramps up linearly to a maximum, then decays with the cube of range
//!   down to a hard minimum.
//! - **Doppler/azimuth**: a bounded cosine-like taper, highest at the centre
//!   bin and lowest at the edges.
//!
//! The threshold of cell `(r, d)` is `range[r] * doppler[d]`.
//!
//! ```text
//!  thr
//!   |          max
//!   |         /\
//!   |        /  \
//!   | fixed /    '.
//!   |------'       '--.____________ min
//!   +------+---+--------------------> range (m)
//!         1.0 2.5
//! ```
//!
//! # Lookup table
//!
//! When K0 is configured as zero, [`K0Table`] resolves it from the desired
//! probability of false alarm and the search window size.

mod table;

pub use table::K0Table;

/// Range calibration of the dynamic SNR floor.
///
/// Immutable; build a custom one only to model a different sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnrProfile {
    /// Range (m) at which the base threshold applies unscaled
    pub nominal_allocation_range: f32,
    /// Range (m) where the SNR floor peaks
    pub max_snr_range: f32,
    /// Range (m) below which the SNR floor is held fixed
    pub fixed_snr_range: f32,
    /// Lowest SNR floor allowed at far range
    pub min_threshold: f32,
}

impl Default for SnrProfile {
    fn default() -> Self {
        SnrProfile {
            nominal_allocation_range: 6.0,
            max_snr_range: 2.5,
            fixed_snr_range: 1.0,
            min_threshold: 3.99,
        }
    }
}

impl SnrProfile {
    /// Peak SNR floor, reached at `max_snr_range`
    pub fn max_threshold(&self, rel_thr: f32) -> f32 {
        let ratio = self.nominal_allocation_range / self.max_snr_range;
        ratio * ratio * ratio * rel_thr
    }

    /// SNR floor held below `fixed_snr_range`
    pub fn fixed_threshold(&self, rel_thr: f32) -> f32 {
        self.max_threshold(rel_thr) / 3.0
    }

    /// SNR floor at an estimated range in meters
    pub fn range_threshold(&self, range_est: f32, rel_thr: f32) -> f32 {
        let snr_max = self.max_threshold(rel_thr);
        let snr_fixed = self.fixed_threshold(rel_thr);

        if range_est < self.fixed_snr_range {
            snr_fixed
        } else if range_est < self.max_snr_range {
            (range_est - self.fixed_snr_range) * (snr_max - snr_fixed)
                / (self.max_snr_range - self.fixed_snr_range)
                + snr_fixed
        } else {
            let ratio = self.nominal_allocation_range / range_est;
            (ratio * ratio * ratio * rel_thr).max(self.min_threshold)
        }
    }

    /// Fill `out[r]` with the floor of range bin `r`
    pub fn fill_range_thresholds(&self, out: &mut [f32], range_res: f32, rel_thr: f32) {
        for (idx, thr) in out.iter_mut().enumerate() {
            *thr = self.range_threshold(idx as f32 * range_res, rel_thr);
        }
    }
}

/// Cosine-like taper over `size` bins.
///
/// Uses the quartic expansion of `cos(pi x / 2)` on `x` in `[-1, 1)`, mapped
/// into `[0.5, 1.0]`: about 1.0 at the centre bin, about 0.51 at the edges.
pub fn doppler_taper(idx: usize, size: usize) -> f32 {
    if size == 0 {
        return 1.0;
    }
    let x = 2.0 * idx as f32 / size as f32 - 1.0;
    let x2 = x * x;
    let poly = 1.0 - 1.2337 * x2 + 0.2537 * x2 * x2;
    0.5 + 0.5 * poly
}

/// Fill `out[d]` with the taper of bin `d`
pub fn fill_doppler_thresholds(out: &mut [f32]) {
    let size = out.len();
    for (idx, thr) in out.iter_mut().enumerate() {
        *thr = doppler_taper(idx, size);
    }
}
