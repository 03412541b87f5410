//! Range-azimuth two-pass CFAR
//!
//! The heatmap rows are azimuth bins. Each range bin is searched across
//! azimuth, and the surviving peaks of that range bin are reported together
//! in ascending azimuth order.
//!
//! | Step | v1 | v2 |
//! |------|----|----|
//! | First pass | smallest-of along range | smallest-of along azimuth |
//! | Second pass | smallest-of along azimuth | smallest-of along range |
//! | Neighbour check | 4 neighbours | 8 neighbours |
//!
//! The first pass uses K0 (or the dynamic threshold), the second pass the
//! cross-axis threshold. Azimuth windows stop at the azimuth skip region.

use std::ops::Range;

use ndarray::ArrayView2;

use super::{line_noise, CfarStrategy, SearchParams};
use crate::config::CaCfarKind;
use crate::input::DetectionInput;
use crate::output::{CrossAxis, DetectedCell, DetectionSink};
use crate::scratch::Scratch;

/// Upper bound on azimuth peaks kept per range bin
pub const MAX_PEAKS_PER_RANGE_BIN: usize = 50;

const KIND: CaCfarKind = CaCfarKind::RangeAzimuthSmallestOf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeAzimuthVersion {
    /// Range first, azimuth confirmation
    V1,
    /// Azimuth first, range confirmation
    V2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeAzimuth {
    version: RangeAzimuthVersion,
}

impl RangeAzimuth {
    pub fn new(version: RangeAzimuthVersion) -> Self {
        RangeAzimuth { version }
    }

    pub fn version(&self) -> RangeAzimuthVersion {
        self.version
    }

    fn first_pass_noise(
        &self,
        heatmap: &ArrayView2<'_, f32>,
        params: &SearchParams<'_>,
        range: usize,
        az: usize,
        az_span: &Range<usize>,
    ) -> Option<f32> {
        match self.version {
            RangeAzimuthVersion::V1 => range_noise(heatmap, params, range, az),
            RangeAzimuthVersion::V2 => azimuth_noise(heatmap, params, range, az, az_span),
        }
    }

    fn second_pass_noise(
        &self,
        heatmap: &ArrayView2<'_, f32>,
        params: &SearchParams<'_>,
        range: usize,
        az: usize,
        az_span: &Range<usize>,
    ) -> Option<f32> {
        match self.version {
            RangeAzimuthVersion::V1 => azimuth_noise(heatmap, params, range, az, az_span),
            RangeAzimuthVersion::V2 => range_noise(heatmap, params, range, az),
        }
    }

    /// Cell is not below any of its neighbours
    fn is_local_max(&self, heatmap: &ArrayView2<'_, f32>, range: usize, az: usize) -> bool {
        let cut = heatmap[[az, range]];
        let diagonal = self.version == RangeAzimuthVersion::V2;

        for da in -1isize..=1 {
            for dr in -1isize..=1 {
                if (da == 0 && dr == 0) || (!diagonal && da != 0 && dr != 0) {
                    continue;
                }
                let (Some(a), Some(r)) = (az.checked_add_signed(da), range.checked_add_signed(dr))
                else {
                    continue;
                };
                if let Some(&neighbour) = heatmap.get([a, r]) {
                    if neighbour > cut {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Smallest power a peak may have next to the strongest one
    fn sidelobe_floor(params: &SearchParams<'_>, strongest: f32, thr: f32) -> Option<f32> {
        if thr.is_nan() || thr <= 0.0 {
            return None;
        }
        let thr = thr.min(1.0);
        Some(if params.log2_mag {
            strongest + thr.log2()
        } else {
            strongest * thr
        })
    }
}

impl CfarStrategy for RangeAzimuth {
    fn cross_axis(&self) -> CrossAxis {
        CrossAxis::Azimuth
    }

    fn detect(
        &self,
        input: &DetectionInput<'_>,
        params: &SearchParams<'_>,
        scratch: &mut Scratch,
        sink: &mut DetectionSink<'_>,
    ) -> usize {
        let heatmap = &input.heatmap;
        let az_span = params.azimuth_span(heatmap.nrows());

        for range in params.range_span(heatmap.ncols()) {
            if sink.is_full() {
                break;
            }

            let mut peaks = PeakList::new(&mut scratch.aux, input.az_max_per_range_bin);
            for az in az_span.clone() {
                let cut = heatmap[[az, range]];
                let Some(noise) = self.first_pass_noise(heatmap, params, range, az, &az_span)
                else {
                    continue;
                };
                if !params.exceeds(cut, noise, params.threshold(range, az)) {
                    continue;
                }
                if input.second_pass() {
                    let rejected = self
                        .second_pass_noise(heatmap, params, range, az, &az_span)
                        .is_some_and(|n| !params.exceeds(cut, n, params.cross_rel_thr));
                    if rejected {
                        continue;
                    }
                }
                if input.neighbour_check() && !self.is_local_max(heatmap, range, az) {
                    continue;
                }
                peaks.offer(cut, az);
            }

            if let Some(floor) = peaks
                .strongest()
                .and_then(|s| Self::sidelobe_floor(params, s, input.sidelobe_thr))
            {
                peaks.retain_at_least(floor);
            }
            peaks.sort_by_azimuth();

            for i in 0..peaks.len() {
                let (cut, az) = peaks.get(i);
                let noise = self
                    .first_pass_noise(heatmap, params, range, az, &az_span)
                    .unwrap_or(0.0);
                let cell = DetectedCell {
                    range,
                    cross: az,
                    snr: params.snr(cut, noise),
                    noise,
                    ..DetectedCell::default()
                };
                if !sink.push(&cell) {
                    break;
                }
            }
        }

        sink.count()
    }
}

fn range_noise(
    heatmap: &ArrayView2<'_, f32>,
    params: &SearchParams<'_>,
    range: usize,
    az: usize,
) -> Option<f32> {
    line_noise(
        heatmap.row(az),
        range,
        params.guard_range,
        params.half_win_range,
        0..heatmap.ncols(),
        KIND,
    )
}

fn azimuth_noise(
    heatmap: &ArrayView2<'_, f32>,
    params: &SearchParams<'_>,
    range: usize,
    az: usize,
    az_span: &Range<usize>,
) -> Option<f32> {
    line_noise(
        heatmap.column(range),
        az,
        params.guard_cross,
        params.half_win_cross,
        az_span.clone(),
        KIND,
    )
}

/// Strongest peaks of one range bin, kept as `(power, azimuth)` pairs in
/// the scratch area, strongest first until re-sorted by azimuth.
struct PeakList<'s> {
    slots: &'s mut [f32],
    len: usize,
    capacity: usize,
}

impl<'s> PeakList<'s> {
    fn new(slots: &'s mut [f32], limit: usize) -> Self {
        let capacity = limit.min(MAX_PEAKS_PER_RANGE_BIN).min(slots.len() / 2);
        PeakList {
            slots,
            len: 0,
            capacity,
        }
    }

    fn len(&self) -> usize {
        self.len
    }

    fn get(&self, i: usize) -> (f32, usize) {
        (self.slots[2 * i], self.slots[2 * i + 1] as usize)
    }

    fn set(&mut self, i: usize, power: f32, az: usize) {
        self.slots[2 * i] = power;
        self.slots[2 * i + 1] = az as f32;
    }

    fn strongest(&self) -> Option<f32> {
        (self.len > 0).then(|| self.slots[0])
    }

    /// Insert in descending power order, dropping the weakest when full
    fn offer(&mut self, power: f32, az: usize) {
        let mut pos = self.len;
        while pos > 0 && self.get(pos - 1).0 < power {
            pos -= 1;
        }
        if pos >= self.capacity {
            return;
        }

        let end = if self.len < self.capacity {
            self.len
        } else {
            self.len - 1
        };
        for i in (pos..end).rev() {
            let (p, a) = self.get(i);
            self.set(i + 1, p, a);
        }
        self.set(pos, power, az);
        self.len = (self.len + 1).min(self.capacity);
    }

    fn retain_at_least(&mut self, floor: f32) {
        while self.len > 0 && self.get(self.len - 1).0 < floor {
            self.len -= 1;
        }
    }

    fn sort_by_azimuth(&mut self) {
        for i in 1..self.len {
            let (p, a) = self.get(i);
            let mut j = i;
            while j > 0 && self.get(j - 1).1 > a {
                let (pp, pa) = self.get(j - 1);
                self.set(j, pp, pa);
                j -= 1;
            }
            self.set(j, p, a);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::input::SearchFlags;
    use crate::output::DetectionBuffers;
    use ndarray::Array2;

    const CAPACITY: usize = 64;

    fn run(
        version: RangeAzimuthVersion,
        input: DetectionInput<'_>,
        params: &SearchParams<'_>,
    ) -> (usize, DetectionBuffers) {
        let mut scratch = Scratch::allocate(RANGE_BINS).unwrap();
        let mut buffers = DetectionBuffers::new(CAPACITY);
        let count = {
            let mut output = buffers.output();
            let mut sink = output.sink(CAPACITY, false).unwrap();
            RangeAzimuth::new(version).detect(&input, params, &mut scratch, &mut sink)
        };
        (count, buffers)
    }

    fn both() -> [RangeAzimuthVersion; 2] {
        [RangeAzimuthVersion::V1, RangeAzimuthVersion::V2]
    }

    #[test]
    fn test_flat_heatmap_detects_nothing() {
        let heatmap = flat();
        for version in both() {
            let (count, _) = run(version, DetectionInput::new(heatmap.view()), &params());
            assert_eq!(count, 0);
        }
    }

    #[test]
    fn test_single_peak() {
        let heatmap = single_peak(20, 10, 1000.0);
        for version in both() {
            let (count, buffers) = run(version, DetectionInput::new(heatmap.view()), &params());
            assert_eq!(count, 1, "{version:?}");
            assert_eq!(buffers.range_index[0], 20);
            assert_eq!(buffers.cross_index[0], 10);
            assert!((buffers.snr_est[0] - 1000.0).abs() < 1e-3);
            // Range-azimuth output carries no estimates
            assert_eq!(buffers.range_est[0], 0.0);
        }
    }

    #[test]
    fn test_strongest_peaks_emitted_by_azimuth() {
        let mut heatmap = flat();
        heatmap[[5, 20]] = 300.0;
        heatmap[[15, 20]] = 900.0;
        heatmap[[25, 20]] = 600.0;

        let input = DetectionInput::new(heatmap.view()).with_az_max_per_range_bin(2);
        let (count, buffers) = run(RangeAzimuthVersion::V1, input, &params());
        assert_eq!(count, 2);
        assert_eq!(&buffers.cross_index[..2], &[15, 25]);
        assert_eq!(&buffers.range_index[..2], &[20, 20]);
    }

    #[test]
    fn test_sidelobe_filter() {
        let mut heatmap = flat();
        heatmap[[5, 20]] = 1000.0;
        heatmap[[20, 20]] = 100.0;

        let input = DetectionInput::new(heatmap.view()).with_az_max_per_range_bin(4);
        let (count, _) = run(RangeAzimuthVersion::V1, input.clone(), &params());
        assert_eq!(count, 2);

        let filtered = input.clone().with_sidelobe_thr(0.3);
        let (count, buffers) = run(RangeAzimuthVersion::V1, filtered, &params());
        assert_eq!(count, 1);
        assert_eq!(buffers.cross_index[0], 5);

        // A NaN threshold disables the filter
        let unfiltered = input.with_sidelobe_thr(f32::NAN);
        let (count, _) = run(RangeAzimuthVersion::V1, unfiltered, &params());
        assert_eq!(count, 2);
    }

    #[test]
    fn test_neighbour_check_shape() {
        let mut heatmap = single_peak(20, 10, 1000.0);
        heatmap[[11, 21]] = 600.0;
        let input = DetectionInput::new(heatmap.view())
            .with_az_max_per_range_bin(4)
            .with_flags(SearchFlags::NEIGHBOUR_CHECK);

        // Diagonal neighbour only counts for v2
        let (v1, _) = run(RangeAzimuthVersion::V1, input.clone(), &params());
        let (v2, buffers) = run(RangeAzimuthVersion::V2, input, &params());
        assert_eq!(v1, 2);
        assert_eq!(v2, 1);
        assert_eq!(buffers.range_index[0], 20);
    }

    #[test]
    fn test_neighbour_check_removes_shoulder() {
        let mut heatmap = single_peak(20, 10, 1000.0);
        heatmap[[11, 20]] = 600.0;
        let input = DetectionInput::new(heatmap.view()).with_az_max_per_range_bin(4);

        let (without, _) = run(RangeAzimuthVersion::V1, input.clone(), &params());
        let checked = input.with_flags(SearchFlags::NEIGHBOUR_CHECK);
        let (with, buffers) = run(RangeAzimuthVersion::V1, checked, &params());
        assert_eq!(without, 2);
        assert_eq!(with, 1);
        assert_eq!(buffers.cross_index[0], 10);
    }

    #[test]
    fn test_v1_azimuth_confirmation() {
        // Ridge across all azimuths at one range
        let mut heatmap = flat();
        heatmap.column_mut(20).fill(1000.0);

        let input = DetectionInput::new(heatmap.view());
        let (count, _) = run(RangeAzimuthVersion::V1, input.clone(), &params());
        assert_eq!(count, 1);

        let confirmed = input.with_flags(SearchFlags::SECOND_PASS);
        let (count, _) = run(RangeAzimuthVersion::V1, confirmed, &params());
        assert_eq!(count, 0);
    }

    #[test]
    fn test_v2_range_confirmation() {
        // Ridge across all ranges at one azimuth
        let mut heatmap = flat();
        heatmap.row_mut(10).fill(1000.0);

        let input = DetectionInput::new(heatmap.view());
        let (count, _) = run(RangeAzimuthVersion::V2, input.clone(), &params());
        assert_eq!(count, RANGE_BINS);

        let confirmed = input.with_flags(SearchFlags::SECOND_PASS);
        let (count, _) = run(RangeAzimuthVersion::V2, confirmed, &params());
        assert_eq!(count, 0);
    }

    #[test]
    fn test_azimuth_skips() {
        let heatmap = single_peak(20, 1, 1000.0);
        let params = SearchParams {
            left_skip_azimuth: 2,
            ..params()
        };
        for version in both() {
            let (count, _) = run(version, DetectionInput::new(heatmap.view()), &params);
            assert_eq!(count, 0);
        }
    }

    #[test]
    fn test_log2_sidelobe_floor() {
        let mut heatmap = Array2::from_elem((CROSS_BINS, RANGE_BINS), 10.0f32);
        heatmap[[5, 20]] = 30.0;
        heatmap[[12, 20]] = 28.5;
        heatmap[[20, 20]] = 20.0;
        let params = SearchParams {
            log2_mag: true,
            ..params()
        };
        // Half power is one log2 unit below the strongest peak
        let input = DetectionInput::new(heatmap.view())
            .with_az_max_per_range_bin(4)
            .with_sidelobe_thr(0.5);
        let (count, buffers) = run(RangeAzimuthVersion::V1, input, &params);
        assert_eq!(count, 1);
        assert_eq!(buffers.cross_index[0], 5);
    }

    #[test]
    fn test_peak_list_keeps_strongest() {
        let mut slots = [0.0f32; 100];
        let mut peaks = PeakList::new(&mut slots, 3);
        for (power, az) in [(1.0, 0), (5.0, 1), (3.0, 2), (4.0, 3), (2.0, 4)] {
            peaks.offer(power, az);
        }
        assert_eq!(peaks.len(), 3);
        assert_eq!(peaks.get(0), (5.0, 1));
        assert_eq!(peaks.get(2), (3.0, 2));

        peaks.retain_at_least(3.5);
        assert_eq!(peaks.len(), 2);
        peaks.sort_by_azimuth();
        assert_eq!(peaks.get(0), (5.0, 1));
        assert_eq!(peaks.get(1), (4.0, 3));
    }

    #[test]
    fn test_peak_list_capped_by_scratch() {
        let mut slots = [0.0f32; 100];
        let peaks = PeakList::new(&mut slots, 500);
        assert_eq!(peaks.capacity, MAX_PEAKS_PER_RANGE_BIN);
    }
}
