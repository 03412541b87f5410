//! CFAR Search Strategies
//!
//! Each CFAR variant is a strategy behind [`CfarStrategy`]. The detector
//! picks one [`Strategy`] at creation from the configured [`CfarType`] and
//! keeps it for its lifetime.
//!
//! # Contract
//!
//! - Reads the heatmap and the handle-derived [`SearchParams`].
//! - Writes at most `max_num_det_obj` entries through the
//!   [`DetectionSink`], and returns the number written.
//! - Works only in the handle scratch; never allocates.
//!
//! # Conventions
//!
//! - Range bins in `[left_skip, range_bins - right_skip)` are tested.
//! - Range windows are one-sided at the heatmap edges, Doppler windows wrap,
//!   azimuth windows stop at the azimuth skip region.
//! - Linear input detects on `cut > noise * thr`, log2-magnitude input on
//!   `cut > noise + thr`.
//!
//! | Variant | First pass | Second pass | Output order |
//! |---------|------------|-------------|--------------|
//! | [`OrderedStatistic`] | OS along range | CA along Doppler | Doppler row, then range |
//! | [`CellAveraging`] | CA/SO/CC/GO along range | CA along Doppler | Doppler row, then range |
//! | [`RangeAzimuth`] v1 | SO along range | SO along azimuth | range, then azimuth |
//! | [`RangeAzimuth`] v2 | SO along azimuth | SO along range | range, then azimuth |

use std::ops::Range;

use ndarray::{ArrayView1, ArrayView2};

use crate::config::{CaCfarKind, CfarType};
use crate::input::DetectionInput;
use crate::output::{CrossAxis, DetectedCell, DetectionSink};
use crate::scratch::Scratch;

mod cell_averaging;
mod ordered_statistic;
mod range_azimuth;

pub use cell_averaging::CellAveraging;
pub use ordered_statistic::OrderedStatistic;
pub use range_azimuth::{RangeAzimuth, RangeAzimuthVersion};

/// Capability shared by every CFAR variant
pub trait CfarStrategy {
    /// What the cross-axis output slot holds
    fn cross_axis(&self) -> CrossAxis {
        CrossAxis::Doppler
    }

    /// Search one frame, returning the number of detections written
    fn detect(
        &self,
        input: &DetectionInput<'_>,
        params: &SearchParams<'_>,
        scratch: &mut Scratch,
        sink: &mut DetectionSink<'_>,
    ) -> usize;
}

/// The closed set of CFAR variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    OrderedStatistic(OrderedStatistic),
    CellAveraging(CellAveraging),
    RangeAzimuth(RangeAzimuth),
}

impl Strategy {
    /// Strategy serving a CFAR type
    pub fn for_type(cfar_type: CfarType) -> Self {
        match cfar_type {
            CfarType::OrderedStatistic => Strategy::OrderedStatistic(OrderedStatistic),
            CfarType::RangeAzimuth => {
                Strategy::RangeAzimuth(RangeAzimuth::new(RangeAzimuthVersion::V1))
            }
            CfarType::RangeAzimuthV2 => {
                Strategy::RangeAzimuth(RangeAzimuth::new(RangeAzimuthVersion::V2))
            }
            CfarType::CellAveraging => Strategy::cell_averaging(CaCfarKind::Average),
            CfarType::SmallestOf => Strategy::cell_averaging(CaCfarKind::SmallestOf),
            CfarType::ClutterCancelling => Strategy::cell_averaging(CaCfarKind::ClutterCancelling),
            CfarType::GreatestOf => Strategy::cell_averaging(CaCfarKind::GreatestOf),
        }
    }

    fn cell_averaging(kind: CaCfarKind) -> Self {
        Strategy::CellAveraging(CellAveraging::new(kind))
    }

    /// Range-Doppler strategies write range/Doppler estimates
    pub fn writes_estimates(&self) -> bool {
        self.cross_axis() == CrossAxis::Doppler
    }
}

impl CfarStrategy for Strategy {
    fn cross_axis(&self) -> CrossAxis {
        match self {
            Strategy::OrderedStatistic(s) => s.cross_axis(),
            Strategy::CellAveraging(s) => s.cross_axis(),
            Strategy::RangeAzimuth(s) => s.cross_axis(),
        }
    }

    fn detect(
        &self,
        input: &DetectionInput<'_>,
        params: &SearchParams<'_>,
        scratch: &mut Scratch,
        sink: &mut DetectionSink<'_>,
    ) -> usize {
        match self {
            Strategy::OrderedStatistic(s) => s.detect(input, params, scratch, sink),
            Strategy::CellAveraging(s) => s.detect(input, params, scratch, sink),
            Strategy::RangeAzimuth(s) => s.detect(input, params, scratch, sink),
        }
    }
}

/// Handle-derived search parameters for one run
#[derive(Debug, Clone, Copy)]
pub struct SearchParams<'h> {
    /// Reference cells per side along range
    pub half_win_range: usize,
    /// Guard cells per side along range
    pub guard_range: usize,
    /// Reference cells per side along Doppler/azimuth
    pub half_win_cross: usize,
    /// Guard cells per side along Doppler/azimuth
    pub guard_cross: usize,
    pub left_skip: usize,
    pub right_skip: usize,
    pub left_skip_azimuth: usize,
    pub right_skip_azimuth: usize,
    /// Range-axis relative threshold (K0)
    pub rel_thr: f32,
    /// Cross-axis relative threshold
    pub cross_rel_thr: f32,
    pub log2_mag: bool,
    pub second_pass: bool,
    pub range_res: f32,
    pub doppler_res: f32,
    /// Dynamic range thresholds, when computed
    pub range_thresholds: Option<&'h [f32]>,
    /// Dynamic Doppler/azimuth thresholds, when computed
    pub doppler_thresholds: Option<&'h [f32]>,
}

impl<'h> SearchParams<'h> {
    /// Range-axis threshold of cell `(range, cross)`
    pub fn threshold(&self, range: usize, cross: usize) -> f32 {
        match (self.range_thresholds, self.doppler_thresholds) {
            (Some(rt), Some(dt)) => match (rt.get(range), dt.get(cross)) {
                (Some(r), Some(d)) => r * d,
                _ => self.rel_thr,
            },
            _ => self.rel_thr,
        }
    }

    /// Range bins to test in a heatmap of `range_bins` columns
    pub fn range_span(&self, range_bins: usize) -> Range<usize> {
        let end = range_bins.saturating_sub(self.right_skip);
        self.left_skip.min(end)..end
    }

    /// Azimuth bins to test in a heatmap of `cross_bins` rows
    pub fn azimuth_span(&self, cross_bins: usize) -> Range<usize> {
        let end = cross_bins.saturating_sub(self.right_skip_azimuth);
        self.left_skip_azimuth.min(end)..end
    }

    /// Detection rule of the configured input representation
    pub fn exceeds(&self, cut: f32, noise: f32, thr: f32) -> bool {
        if self.log2_mag {
            cut > noise + thr
        } else {
            cut > noise * thr
        }
    }

    /// SNR of a cell in the input representation
    pub fn snr(&self, cut: f32, noise: f32) -> f32 {
        if self.log2_mag {
            cut - noise
        } else if noise > 0.0 {
            cut / noise
        } else {
            f32::INFINITY
        }
    }

    /// Signed Doppler of bin `cross` out of `cross_bins`
    pub fn doppler_est(&self, cross: usize, cross_bins: usize) -> f32 {
        let signed = if cross < cross_bins / 2 {
            cross as f32
        } else {
            cross as f32 - cross_bins as f32
        };
        signed * self.doppler_res
    }

    /// Measurement variance for a bin of width `res` at the given SNR
    pub fn variance(&self, res: f32, snr: f32) -> f32 {
        let linear = if self.log2_mag { snr.exp2() } else { snr };
        res * res / (2.0 * linear.max(f32::EPSILON))
    }

    /// Range-Doppler detection with range and Doppler estimates
    pub fn range_doppler_cell(
        &self,
        range: usize,
        cross: usize,
        cross_bins: usize,
        snr: f32,
        noise: f32,
    ) -> DetectedCell {
        DetectedCell {
            range,
            cross,
            snr,
            noise,
            range_est: range as f32 * self.range_res,
            doppler_est: self.doppler_est(cross, cross_bins),
            range_var: None,
            doppler_var: None,
        }
    }

    /// Add the range and Doppler measurement variances to `cell`
    pub fn with_variances(&self, cell: DetectedCell) -> DetectedCell {
        DetectedCell {
            range_var: Some(self.variance(self.range_res, cell.snr)),
            doppler_var: Some(self.variance(self.doppler_res, cell.snr)),
            ..cell
        }
    }
}

/// Sum, maximum and count of one side of a reference window
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct SideStats {
    pub sum: f32,
    pub max: f32,
    pub count: usize,
}

impl SideStats {
    pub fn of(line: ArrayView1<'_, f32>, cells: Range<usize>) -> Self {
        let mut stats = SideStats {
            sum: 0.0,
            max: f32::NEG_INFINITY,
            count: 0,
        };
        for idx in cells {
            stats.add(line[idx]);
        }
        stats
    }

    pub fn add(&mut self, value: f32) {
        if self.count == 0 {
            self.max = value;
        }
        self.sum += value;
        self.max = self.max.max(value);
        self.count += 1;
    }

    pub fn mean(&self) -> Option<f32> {
        (self.count > 0).then(|| self.sum / self.count as f32)
    }

    /// Mean with the strongest cell removed
    pub fn censored_mean(&self) -> Option<f32> {
        match self.count {
            0 => None,
            1 => Some(self.sum),
            n => Some((self.sum - self.max) / (n - 1) as f32),
        }
    }
}

/// Combine leading and trailing statistics into a noise estimate
pub(crate) fn combine(kind: CaCfarKind, lead: SideStats, lag: SideStats) -> Option<f32> {
    let (lead_mean, lag_mean) = match kind {
        CaCfarKind::Average => {
            let count = lead.count + lag.count;
            return (count > 0).then(|| (lead.sum + lag.sum) / count as f32);
        }
        CaCfarKind::ClutterCancelling => (lead.censored_mean(), lag.censored_mean()),
        _ => (lead.mean(), lag.mean()),
    };

    match (lead_mean, lag_mean) {
        (Some(a), Some(b)) => Some(match kind {
            CaCfarKind::GreatestOf => a.max(b),
            CaCfarKind::ClutterCancelling => 0.5 * (a + b),
            _ => a.min(b),
        }),
        (Some(a), None) | (None, Some(a)) => Some(a),
        (None, None) => None,
    }
}

/// Leading reference cells of `cut`, stopping at `floor`
pub(crate) fn leading(cut: usize, guard: usize, half_win: usize, floor: usize) -> Range<usize> {
    let end = cut.saturating_sub(guard).max(floor);
    let start = cut.saturating_sub(guard + half_win).max(floor);
    start..end.max(start)
}

/// Trailing reference cells of `cut`, stopping before `ceil`
pub(crate) fn lagging(cut: usize, guard: usize, half_win: usize, ceil: usize) -> Range<usize> {
    let start = (cut + guard + 1).min(ceil);
    let end = (cut + guard + half_win + 1).min(ceil);
    start..end
}

/// Cell-averaged noise along a line, non-cyclic
pub(crate) fn line_noise(
    line: ArrayView1<'_, f32>,
    cut: usize,
    guard: usize,
    half_win: usize,
    bounds: Range<usize>,
    kind: CaCfarKind,
) -> Option<f32> {
    let lead = SideStats::of(line, leading(cut, guard, half_win, bounds.start));
    let lag = SideStats::of(line, lagging(cut, guard, half_win, bounds.end));
    combine(kind, lead, lag)
}

/// Cell-averaged Doppler noise of `(range, cross)`, wrapping around the
/// Doppler axis.
///
/// The window is shortened so that no offset reaches past half the axis:
/// each reference cell is counted once and never lands on a guard cell.
pub(crate) fn cyclic_doppler_noise(
    heatmap: &ArrayView2<'_, f32>,
    range: usize,
    cross: usize,
    guard: usize,
    half_win: usize,
) -> Option<f32> {
    let bins = heatmap.nrows();
    let half_win = half_win.min((bins.saturating_sub(1) / 2).saturating_sub(guard));
    let mut stats = SideStats::default();
    for offset in guard + 1..=guard + half_win {
        stats.add(heatmap[[(cross + bins - offset) % bins, range]]);
        stats.add(heatmap[[(cross + offset) % bins, range]]);
    }
    stats.mean()
}

/// Second pass of the range-Doppler searches: confirm along Doppler.
/// Passes when the window holds no reference cells.
pub(crate) fn confirm_doppler(
    heatmap: &ArrayView2<'_, f32>,
    params: &SearchParams<'_>,
    range: usize,
    cross: usize,
) -> bool {
    match cyclic_doppler_noise(heatmap, range, cross, params.guard_cross, params.half_win_cross) {
        Some(noise) => params.exceeds(heatmap[[cross, range]], noise, params.cross_rel_thr),
        None => true,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Heatmaps and parameters shared by the strategy tests

    use ndarray::Array2;

    use super::SearchParams;

    pub const RANGE_BINS: usize = 64;
    pub const CROSS_BINS: usize = 32;
    pub const FLOOR: f32 = 1.0;

    pub fn flat() -> Array2<f32> {
        Array2::from_elem((CROSS_BINS, RANGE_BINS), FLOOR)
    }

    pub fn single_peak(range: usize, cross: usize, power: f32) -> Array2<f32> {
        let mut heatmap = flat();
        heatmap[[cross, range]] = power;
        heatmap
    }

    pub fn params<'a>() -> SearchParams<'a> {
        SearchParams {
            half_win_range: 4,
            guard_range: 2,
            half_win_cross: 2,
            guard_cross: 1,
            left_skip: 0,
            right_skip: 0,
            left_skip_azimuth: 0,
            right_skip_azimuth: 0,
            rel_thr: 5.0,
            cross_rel_thr: 4.0,
            log2_mag: false,
            second_pass: false,
            range_res: 0.05,
            doppler_res: 0.1,
            range_thresholds: None,
            doppler_thresholds: None,
        }
    }
}
