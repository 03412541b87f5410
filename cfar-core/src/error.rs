//! Detection error types

use thiserror::Error;

/// Result type for detector operations
pub type CfarResult<T> = Result<T, CfarError>;

/// Errors reported by the CFAR detector.
///
/// Configuration errors are returned from creation and no handle exists
/// afterwards. [`CfarError::ScratchAllocation`] is the exception: the handle
/// is still built and carries the error as its status. Buffer errors are
/// local to one `run` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CfarError {
    /// CFAR type code outside the supported set
    #[error("CFAR type {0} is not supported")]
    CfarTypeNotSupported(u8),

    /// Input type code outside the supported set
    #[error("input type {0} is not supported")]
    InputTypeNotSupported(u8),

    /// Ordered-statistic CFAR only works with a 16 cell range window
    #[error("CFAR-OS range search window {0} is not supported, must be 16")]
    OsWindowSizeNotSupported(u16),

    /// Smallest-of CFAR needs a Doppler search window
    #[error("CFAR-CASO requires a nonzero Doppler search window")]
    CaWindowSizeNotSupported,

    /// Handle-owned arrays could not be allocated
    #[error("failed to allocate detector handle")]
    HandleAllocation,

    /// Scratch buffer could not be allocated
    #[error("failed to allocate scratch memory")]
    ScratchAllocation,

    /// A required input or output buffer is missing, too short or misshapen
    #[error("input/output buffer not correct")]
    InvalidBuffer,

    /// FFT size whose bin indices do not fit the 16-bit output indices
    #[error("FFT size {0} is not supported, must be at most 65536")]
    FftSizeNotSupported(usize),
}

impl CfarError {
    /// Stable numeric code, 0 being reserved for "no error".
    pub fn code(&self) -> u32 {
        match self {
            CfarError::CfarTypeNotSupported(_) => 1,
            CfarError::InputTypeNotSupported(_) => 2,
            CfarError::OsWindowSizeNotSupported(_) => 3,
            CfarError::CaWindowSizeNotSupported => 4,
            CfarError::HandleAllocation => 5,
            CfarError::ScratchAllocation => 6,
            CfarError::InvalidBuffer => 7,
            CfarError::FftSizeNotSupported(_) => 8,
        }
    }

    /// Whether the error was raised while validating the configuration
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            CfarError::CfarTypeNotSupported(_)
                | CfarError::InputTypeNotSupported(_)
                | CfarError::OsWindowSizeNotSupported(_)
                | CfarError::CaWindowSizeNotSupported
                | CfarError::FftSizeNotSupported(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            CfarError::CfarTypeNotSupported(9),
            CfarError::InputTypeNotSupported(3),
            CfarError::OsWindowSizeNotSupported(8),
            CfarError::CaWindowSizeNotSupported,
            CfarError::HandleAllocation,
            CfarError::ScratchAllocation,
            CfarError::InvalidBuffer,
            CfarError::FftSizeNotSupported(70_000),
        ];
        let mut codes: Vec<u32> = errors.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
        assert!(!codes.contains(&0));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            CfarError::OsWindowSizeNotSupported(8).to_string(),
            "CFAR-OS range search window 8 is not supported, must be 16"
        );
        assert_eq!(
            CfarError::InvalidBuffer.to_string(),
            "input/output buffer not correct"
        );
    }

    #[test]
    fn test_config_error_classification() {
        assert!(CfarError::CfarTypeNotSupported(7).is_config_error());
        assert!(CfarError::CaWindowSizeNotSupported.is_config_error());
        assert!(CfarError::FftSizeNotSupported(70_000).is_config_error());
        assert!(!CfarError::ScratchAllocation.is_config_error());
        assert!(!CfarError::InvalidBuffer.is_config_error());
    }
}
