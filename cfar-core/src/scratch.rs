//! Per-handle scratch memory
//!
//! Allocated once at creation so that a detection run never allocates.

use std::collections::TryReserveError;

/// Fixed float overhead on top of the per-range-bin storage
pub const SCRATCH_OVERHEAD_FLOATS: usize = 100;

/// Working storage for one detector.
///
/// Sized `range_bins` floats plus `range_bins` 16-bit indices plus
/// [`SCRATCH_OVERHEAD_FLOATS`] floats.
#[derive(Debug, Clone)]
pub struct Scratch {
    /// One float per range bin (noise line of the row being searched)
    pub line: Vec<f32>,
    /// One index per range bin (candidate list of the row being searched)
    pub index: Vec<u16>,
    /// Small fixed area for window sorting and peak lists
    pub aux: Vec<f32>,
}

impl Scratch {
    /// Allocate scratch for `range_bins` range bins
    pub fn allocate(range_bins: usize) -> Result<Self, TryReserveError> {
        Ok(Scratch {
            line: zeroed(range_bins)?,
            index: zeroed(range_bins)?,
            aux: zeroed(SCRATCH_OVERHEAD_FLOATS)?,
        })
    }

    /// Total size in bytes
    pub fn size_bytes(&self) -> usize {
        (self.line.len() + self.aux.len()) * std::mem::size_of::<f32>()
            + self.index.len() * std::mem::size_of::<u16>()
    }
}

/// Fallible `vec![T::default(); len]`
pub(crate) fn zeroed<T: Default + Clone>(len: usize) -> Result<Vec<T>, TryReserveError> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)?;
    v.resize(len, T::default());
    Ok(v)
}
