//! Detector Configuration
//!
//! The configuration record handed to [`DetectionCfar::create`](crate::DetectionCfar::create)
//! and the validation rules applied to it before anything is allocated.
//!
//! CFAR and input types arrive as raw codes, the way the upstream pipeline
//! stores them. Validation turns them into [`CfarType`] and [`InputType`].

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::error::{CfarError, CfarResult};

/// Range search window the ordered-statistic variant is built for
pub const OS_SEARCH_WINDOW: u16 = 16;

/// Largest FFT size whose bin indices fit the 16-bit output indices
pub const MAX_FFT_SIZE: usize = u16::MAX as usize + 1;

/// CFAR search variant
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
#[repr(u8)]
pub enum CfarType {
    /// Ordered-statistic CFAR along range
    OrderedStatistic = 0,
    /// Cell-averaging CFAR
    CellAveraging = 1,
    /// Cell-averaging, smallest of leading/trailing windows
    SmallestOf = 2,
    /// Cell-averaging with the largest reference cell of each side removed
    ClutterCancelling = 3,
    /// Cell-averaging, greatest of leading/trailing windows
    GreatestOf = 4,
    /// Range-azimuth two-pass smallest-of CFAR
    RangeAzimuth = 5,
    /// Range-azimuth two-pass CFAR, azimuth-first search
    RangeAzimuthV2 = 6,
}

impl CfarType {
    /// Wire code of this type
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Range-azimuth variants put azimuth in the cross-axis slot and skip
    /// the range/Doppler estimates.
    pub fn is_range_azimuth(self) -> bool {
        matches!(self, CfarType::RangeAzimuth | CfarType::RangeAzimuthV2)
    }

    /// Member of the cell-averaging family (CA, SO, CC, GO)
    pub fn is_cell_averaging(self) -> bool {
        matches!(
            self,
            CfarType::CellAveraging
                | CfarType::SmallestOf
                | CfarType::ClutterCancelling
                | CfarType::GreatestOf
        )
    }

    /// Cell-averaging sub-type, if any
    pub fn ca_kind(self) -> Option<CaCfarKind> {
        match self {
            CfarType::OrderedStatistic => None,
            CfarType::CellAveraging => Some(CaCfarKind::Average),
            CfarType::SmallestOf => Some(CaCfarKind::SmallestOf),
            CfarType::ClutterCancelling => Some(CaCfarKind::ClutterCancelling),
            CfarType::GreatestOf => Some(CaCfarKind::GreatestOf),
            CfarType::RangeAzimuth | CfarType::RangeAzimuthV2 => {
                Some(CaCfarKind::RangeAzimuthSmallestOf)
            }
        }
    }
}

impl TryFrom<u8> for CfarType {
    type Error = CfarError;

    fn try_from(code: u8) -> CfarResult<Self> {
        match code {
            0 => Ok(CfarType::OrderedStatistic),
            1 => Ok(CfarType::CellAveraging),
            2 => Ok(CfarType::SmallestOf),
            3 => Ok(CfarType::ClutterCancelling),
            4 => Ok(CfarType::GreatestOf),
            5 => Ok(CfarType::RangeAzimuth),
            6 => Ok(CfarType::RangeAzimuthV2),
            _ => Err(CfarError::CfarTypeNotSupported(code)),
        }
    }
}

/// How the noise estimate of a cell-averaging search is formed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum CaCfarKind {
    /// Mean of both sides
    Average,
    /// Smaller of the two side means
    SmallestOf,
    /// Side means with each side's strongest cell removed
    ClutterCancelling,
    /// Larger of the two side means
    GreatestOf,
    /// Smallest-of, as used by the range-azimuth searches
    RangeAzimuthSmallestOf,
}

/// Numeric representation of the heatmap samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
#[repr(u8)]
pub enum InputType {
    /// 32-bit float power or log-magnitude
    SinglePrecision = 0,
}

impl TryFrom<u8> for InputType {
    type Error = CfarError;

    fn try_from(code: u8) -> CfarResult<Self> {
        match code {
            0 => Ok(InputType::SinglePrecision),
            _ => Err(CfarError::InputTypeNotSupported(code)),
        }
    }
}

/// Detector configuration record.
///
/// Sizes are in bins. `fft1d_size` is the number of range bins and
/// `fft2d_size` the number of Doppler (or azimuth) bins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CfarConfig {
    /// Raw CFAR type code, see [`CfarType`]
    pub cfar_type: u8,
    /// Raw input type code, see [`InputType`]
    pub input_type: u8,
    /// Range FFT size
    pub fft1d_size: usize,
    /// Doppler FFT size, or azimuth bins in range-azimuth mode
    pub fft2d_size: usize,
    /// Meters per range bin
    pub range_res: f32,
    /// Meters per second per Doppler bin
    pub doppler_res: f32,
    /// Reference cells along range, both sides together
    pub search_win_size_range: u16,
    /// Guard cells along range, per side
    pub guard_size_range: u16,
    /// Reference cells along Doppler/azimuth, both sides together
    pub search_win_size_doppler: u16,
    /// Guard cells along Doppler/azimuth, per side
    pub guard_size_doppler: u16,
    /// Maximum number of detections reported per frame
    pub max_num_det_obj: usize,
    /// Range bins skipped at the near end
    pub left_skip_size: u16,
    /// Range bins skipped at the far end
    pub right_skip_size: u16,
    /// Azimuth bins skipped at the low end (range-azimuth only)
    pub left_skip_size_azimuth: u16,
    /// Azimuth bins skipped at the high end (range-azimuth only)
    pub right_skip_size_azimuth: u16,
    /// Confirm first-pass candidates along the cross axis
    pub enable_second_pass_search: bool,
    /// Relative threshold of the cross-axis pass
    pub doppler_search_rel_thr: f32,
    /// Heatmap holds log2 magnitude instead of linear power
    pub log2_mag_flag: bool,
    /// Angle bins in the first dimension
    pub angle_dim1: u16,
    /// Angle bins in the second dimension
    pub angle_dim2: u16,
    /// Relative threshold; 0 resolves it from the lookup table
    pub k0: f32,
    /// Desired probability of false alarm, used by the lookup table
    pub pfa: f32,
    /// Shape the threshold by range and Doppler
    pub dynamic_flag: bool,
}

impl Default for CfarConfig {
    fn default() -> Self {
        CfarConfig {
            cfar_type: CfarType::CellAveraging.code(),
            input_type: InputType::SinglePrecision as u8,
            fft1d_size: 64,
            fft2d_size: 32,
            range_res: 0.05,
            doppler_res: 0.1,
            search_win_size_range: 8,
            guard_size_range: 2,
            search_win_size_doppler: 4,
            guard_size_doppler: 1,
            max_num_det_obj: 64,
            left_skip_size: 0,
            right_skip_size: 0,
            left_skip_size_azimuth: 0,
            right_skip_size_azimuth: 0,
            enable_second_pass_search: false,
            doppler_search_rel_thr: 4.0,
            log2_mag_flag: false,
            angle_dim1: 0,
            angle_dim2: 0,
            k0: 5.0,
            pfa: 1e-6,
            dynamic_flag: false,
        }
    }
}

impl CfarConfig {
    /// Default configuration for the given variant, with the window rules
    /// of that variant satisfied.
    pub fn for_type(cfar_type: CfarType) -> Self {
        let mut config = CfarConfig {
            cfar_type: cfar_type.code(),
            ..CfarConfig::default()
        };
        if cfar_type == CfarType::OrderedStatistic {
            config.search_win_size_range = OS_SEARCH_WINDOW;
        }
        config
    }

    /// Parse a configuration from JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Validate the configuration.
    ///
    /// Every rule is evaluated in order. When several fail, the error of the
    /// last failing rule is returned.
    pub fn validate(&self) -> CfarResult<(CfarType, InputType)> {
        let cfar_type = CfarType::try_from(self.cfar_type);
        let input_type = InputType::try_from(self.input_type);
        let mut error = None;

        if let Err(e) = cfar_type {
            error = Some(e);
        }

        if let Err(e) = input_type {
            error = Some(e);
        }

        if matches!(cfar_type, Ok(CfarType::OrderedStatistic))
            && self.search_win_size_range != OS_SEARCH_WINDOW
        {
            error = Some(CfarError::OsWindowSizeNotSupported(
                self.search_win_size_range,
            ));
        }

        if matches!(cfar_type, Ok(CfarType::SmallestOf)) && self.search_win_size_doppler == 0 {
            error = Some(CfarError::CaWindowSizeNotSupported);
        }

        for size in [self.fft1d_size, self.fft2d_size] {
            if size > MAX_FFT_SIZE {
                error = Some(CfarError::FftSizeNotSupported(size));
            }
        }

        match error {
            Some(e) => Err(e),
            None => Ok((cfar_type?, input_type?)),
        }
    }
}
