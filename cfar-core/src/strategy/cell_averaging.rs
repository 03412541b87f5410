//! Cell-averaging CFAR family along range

use super::{confirm_doppler, line_noise, CfarStrategy, SearchParams};
use crate::config::CaCfarKind;
use crate::input::DetectionInput;
use crate::output::DetectionSink;
use crate::scratch::Scratch;

/// Average, smallest-of, clutter-cancelling or greatest-of search.
///
/// Each Doppler row is searched in two steps: the noise estimate of every
/// tested range bin goes into the scratch line, then the bins exceeding
/// their threshold are collected in the scratch index list and reported in
/// ascending range order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellAveraging {
    kind: CaCfarKind,
}

impl CellAveraging {
    pub fn new(kind: CaCfarKind) -> Self {
        CellAveraging { kind }
    }

    pub fn kind(&self) -> CaCfarKind {
        self.kind
    }
}

impl CfarStrategy for CellAveraging {
    fn detect(
        &self,
        input: &DetectionInput<'_>,
        params: &SearchParams<'_>,
        scratch: &mut Scratch,
        sink: &mut DetectionSink<'_>,
    ) -> usize {
        let heatmap = &input.heatmap;
        let range_bins = heatmap.ncols();
        let cross_bins = heatmap.nrows();
        let span = params.range_span(range_bins);
        if span.end > scratch.line.len() || span.len() > scratch.index.len() {
            return 0;
        }

        for (doppler, line) in heatmap.outer_iter().enumerate() {
            for range in span.clone() {
                scratch.line[range] = line_noise(
                    line,
                    range,
                    params.guard_range,
                    params.half_win_range,
                    0..range_bins,
                    self.kind,
                )
                .unwrap_or(f32::NAN);
            }

            let mut candidates = 0;
            for range in span.clone() {
                let noise = scratch.line[range];
                if noise.is_nan() {
                    continue;
                }
                if params.exceeds(line[range], noise, params.threshold(range, doppler)) {
                    scratch.index[candidates] = range as u16;
                    candidates += 1;
                }
            }

            for &range in &scratch.index[..candidates] {
                if sink.is_full() {
                    return sink.count();
                }
                let range = range as usize;
                if params.second_pass && !confirm_doppler(heatmap, params, range, doppler) {
                    continue;
                }
                let noise = scratch.line[range];
                let snr = params.snr(line[range], noise);
                let cell = params.range_doppler_cell(range, doppler, cross_bins, snr, noise);
                sink.push(&params.with_variances(cell));
            }
        }

        sink.count()
    }
}
