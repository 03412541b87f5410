//! Per-frame detection input

use bitflags::bitflags;
use ndarray::ArrayView2;

bitflags! {
    /// Per-call search options of the range-azimuth variants
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SearchFlags: u8 {
        /// Confirm candidates along the second axis.
        /// Overwritten from the handle configuration on every run.
        const SECOND_PASS = 0b0000_0001;
        /// Keep only cells that are local maxima among their neighbours
        const NEIGHBOUR_CHECK = 0b0000_0010;
    }
}

/// Heatmap of one frame plus per-call options.
///
/// The heatmap has shape `[doppler_bins, range_bins]`: one row per Doppler
/// (or azimuth) bin, range bins contiguous within a row.
#[derive(Debug, Clone)]
pub struct DetectionInput<'a> {
    /// Power or log2-magnitude samples
    pub heatmap: ArrayView2<'a, f32>,
    /// Search options (range-azimuth only)
    pub flags: SearchFlags,
    /// Fraction of the strongest peak in a range bin another peak must
    /// reach to survive (range-azimuth only). 0 disables the filter.
    pub sidelobe_thr: f32,
    /// Maximum azimuth peaks reported per range bin (range-azimuth only)
    pub az_max_per_range_bin: usize,
}

impl<'a> DetectionInput<'a> {
    /// Input with no options set and one azimuth peak per range bin
    pub fn new(heatmap: ArrayView2<'a, f32>) -> Self {
        DetectionInput {
            heatmap,
            flags: SearchFlags::empty(),
            sidelobe_thr: 0.0,
            az_max_per_range_bin: 1,
        }
    }

    pub fn with_flags(mut self, flags: SearchFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_sidelobe_thr(mut self, sidelobe_thr: f32) -> Self {
        self.sidelobe_thr = sidelobe_thr;
        self
    }

    pub fn with_az_max_per_range_bin(mut self, az_max: usize) -> Self {
        self.az_max_per_range_bin = az_max;
        self
    }

    /// Second pass requested
    pub fn second_pass(&self) -> bool {
        self.flags.contains(SearchFlags::SECOND_PASS)
    }

    /// Neighbour check requested
    pub fn neighbour_check(&self) -> bool {
        self.flags.contains(SearchFlags::NEIGHBOUR_CHECK)
    }

    /// Number of range bins in the heatmap
    pub fn range_bins(&self) -> usize {
        self.heatmap.ncols()
    }

    /// Number of Doppler/azimuth bins in the heatmap
    pub fn cross_bins(&self) -> usize {
        self.heatmap.nrows()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_input_builder() {
        let heatmap = Array2::<f32>::zeros((32, 64));
        let input = DetectionInput::new(heatmap.view())
            .with_flags(SearchFlags::NEIGHBOUR_CHECK)
            .with_sidelobe_thr(0.3)
            .with_az_max_per_range_bin(2);

        assert!(input.neighbour_check());
        assert!(!input.second_pass());
        assert_eq!(input.az_max_per_range_bin, 2);
        assert_eq!(input.range_bins(), 64);
        assert_eq!(input.cross_bins(), 32);
    }

    #[test]
    fn test_flags_toggle() {
        let mut flags = SearchFlags::NEIGHBOUR_CHECK;
        flags.set(SearchFlags::SECOND_PASS, true);
        assert_eq!(flags.bits(), 0b11);
        flags.set(SearchFlags::SECOND_PASS, false);
        assert_eq!(flags, SearchFlags::NEIGHBOUR_CHECK);
    }
}
