//! False-alarm lookup table for the relative threshold

use serde::{Deserialize, Serialize};

use crate::config::CfarType;

/// Columns per cell-averaging row (one per false-alarm decade)
pub const CA_COLUMNS: usize = 7;

/// Columns per ordered-statistic rank group
pub const OS_COLUMNS: usize = 5;

/// Precomputed relative thresholds indexed by false-alarm probability and
/// search window size.
///
/// The contents are calibration data supplied by the caller, typically
/// loaded from JSON at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct K0Table {
    /// Cell-averaging thresholds, row-major with [`CA_COLUMNS`] per row.
    /// Row `i` serves a range window of `4 * (i + 1)` cells.
    pub ca: Vec<f32>,
    /// Ordered-statistic thresholds, one row per window size, each row
    /// grouped by rank in blocks of [`OS_COLUMNS`].
    pub os: Vec<Vec<f32>>,
}

impl K0Table {
    /// Parse a table from JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Resolve K0 for a variant.
    ///
    /// Only cell-averaging and ordered-statistic searches have table
    /// entries. Returns `None` when the indices fall outside the table.
    pub fn lookup(&self, cfar_type: CfarType, search_win_size_range: u16, pfa: f32) -> Option<f32> {
        match cfar_type {
            CfarType::CellAveraging => self.lookup_ca(search_win_size_range, pfa),
            CfarType::OrderedStatistic => self.lookup_os(search_win_size_range, pfa),
            _ => None,
        }
    }

    fn lookup_ca(&self, win: u16, pfa: f32) -> Option<f32> {
        if pfa.is_nan() || pfa <= 0.0 {
            return None;
        }
        let col = ((9.5 + pfa.log10()).floor() as i32 - 1).max(0) as usize;
        let row = window_row(win)?;
        if col >= CA_COLUMNS {
            return None;
        }
        self.ca.get(row * CA_COLUMNS + col).copied()
    }

    fn lookup_os(&self, win: u16, pfa: f32) -> Option<f32> {
        if pfa.is_nan() || pfa <= 0.0 {
            return None;
        }
        let col = (7.5 + pfa.log10()).floor() as i32 - 1;
        if col < 0 || col as usize >= OS_COLUMNS {
            return None;
        }
        let row = window_row(win)?;
        let rank = ((3 * (2 * win as usize)) >> 2).checked_sub(2)?;
        self.os.get(row)?.get(rank * OS_COLUMNS + col as usize).copied()
    }
}

/// Table row for a search window: windows come in steps of four cells
fn window_row(win: u16) -> Option<usize> {
    ((win as usize) >> 2).checked_sub(1)
}
