//! Ordered-statistic CFAR along range

use ndarray::ArrayView1;

use super::{confirm_doppler, lagging, leading, CfarStrategy, SearchParams};
use crate::input::DetectionInput;
use crate::output::DetectionSink;
use crate::scratch::Scratch;

/// Noise is the sample of rank `3n/4` among the `n` reference cells
/// around the cell under test.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderedStatistic;

impl OrderedStatistic {
    /// Ranked noise estimate of `cut`, sorting the reference cells in `work`
    fn noise(
        line: ArrayView1<'_, f32>,
        cut: usize,
        params: &SearchParams<'_>,
        work: &mut [f32],
    ) -> Option<f32> {
        let bins = line.len();
        let lead = leading(cut, params.guard_range, params.half_win_range, 0);
        let lag = lagging(cut, params.guard_range, params.half_win_range, bins);

        let mut n = 0;
        for idx in lead.chain(lag) {
            if n == work.len() {
                break;
            }
            work[n] = line[idx];
            n += 1;
        }
        if n == 0 {
            return None;
        }

        let window = &mut work[..n];
        window.sort_unstable_by(|a, b| a.total_cmp(b));
        Some(window[(3 * n / 4).min(n - 1)])
    }
}

impl CfarStrategy for OrderedStatistic {
    fn detect(
        &self,
        input: &DetectionInput<'_>,
        params: &SearchParams<'_>,
        scratch: &mut Scratch,
        sink: &mut DetectionSink<'_>,
    ) -> usize {
        let heatmap = &input.heatmap;
        let cross_bins = heatmap.nrows();
        let span = params.range_span(heatmap.ncols());

        for (doppler, line) in heatmap.outer_iter().enumerate() {
            for range in span.clone() {
                if sink.is_full() {
                    return sink.count();
                }
                let Some(noise) = Self::noise(line, range, params, &mut scratch.aux) else {
                    continue;
                };
                let cut = line[range];
                if !params.exceeds(cut, noise, params.threshold(range, doppler)) {
                    continue;
                }
                if params.second_pass && !confirm_doppler(heatmap, params, range, doppler) {
                    continue;
                }
                let snr = params.snr(cut, noise);
                sink.push(&params.range_doppler_cell(range, doppler, cross_bins, snr, noise));
            }
        }

        sink.count()
    }
}
