//! CFAR Detector Handle
//!
//! [`DetectionCfar`] owns everything a detection stage needs between frames:
//! the validated configuration, the resolved relative threshold, the
//! optional dynamic threshold arrays and the scratch memory.
//!
//! # Lifecycle
//!
//! ```text
//! create ──► Created ──run──► Running ──run──► Running
//!               │                 │
//!               └─────destroy─────┴──► (consumed)
//! ```
//!
//! All allocation happens in `create`. `run` only touches the scratch
//! memory and the caller's buffers.
//!
//! # Example
//!
//! ```
//! use cfar_core::{CfarConfig, CfarType, DetectionCfar, DetectionInput};
//! use ndarray::Array2;
//!
//! let config = CfarConfig::for_type(CfarType::CellAveraging);
//! let mut cfar = DetectionCfar::create(&config).unwrap();
//!
//! let mut heatmap = Array2::from_elem((config.fft2d_size, config.fft1d_size), 1.0f32);
//! heatmap[[10, 20]] = 1000.0;
//!
//! let mut buffers = cfar.output_buffers();
//! let mut output = buffers.output();
//! let mut input = DetectionInput::new(heatmap.view());
//! cfar.run(&mut input, &mut output).unwrap();
//! assert_eq!(output.num_detected, 1);
//! ```

use serde::Serialize;

use crate::config::{CaCfarKind, CfarConfig, CfarType, InputType};
use crate::error::{CfarError, CfarResult};
use crate::input::{DetectionInput, SearchFlags};
use crate::output::{CrossAxis, DetectionBuffers, DetectionOutput};
use crate::scratch::{zeroed, Scratch};
use crate::strategy::{CfarStrategy, SearchParams, Strategy};
use crate::threshold::{fill_doppler_thresholds, K0Table, SnrProfile};

/// Where a handle is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorState {
    /// Built, never run
    Created,
    /// At least one successful run
    Running,
}

/// A configured CFAR detector
#[derive(Debug)]
pub struct DetectionCfar {
    config: CfarConfig,
    cfar_type: CfarType,
    input_type: InputType,
    ca_kind: Option<CaCfarKind>,
    left_skip_azimuth: u16,
    right_skip_azimuth: u16,
    rel_thr: f32,
    profile: SnrProfile,
    range_thresholds: Option<Vec<f32>>,
    doppler_thresholds: Option<Vec<f32>>,
    thresholds_ready: bool,
    scratch: Result<Scratch, CfarError>,
    strategy: Strategy,
    state: DetectorState,
}

impl DetectionCfar {
    /// Validate `config` and build a detector.
    ///
    /// Configuration errors return `Err` and allocate nothing. A scratch
    /// allocation failure still returns the handle; check
    /// [`scratch_status`](Self::scratch_status) before running.
    pub fn create(config: &CfarConfig) -> CfarResult<Self> {
        Self::build(config, None)
    }

    /// Like [`create`](Self::create), resolving a zero K0 from `table`
    #[cfg(feature = "k0-table")]
    pub fn create_with_table(config: &CfarConfig, table: &K0Table) -> CfarResult<Self> {
        Self::build(config, Some(table))
    }

    fn resolve_rel_thr(config: &CfarConfig, cfar_type: CfarType, table: Option<&K0Table>) -> f32 {
        if config.k0 != 0.0 {
            return config.k0;
        }
        let Some(table) = table else {
            return config.k0;
        };
        match table.lookup(cfar_type, config.search_win_size_range, config.pfa) {
            Some(k0) => {
                log::debug!("{}: K0 {} from table (pfa {:e})", cfar_type, k0, config.pfa);
                k0
            }
            None => {
                log::warn!(
                    "{}: no table entry for window {} pfa {:e}, K0 stays 0",
                    cfar_type,
                    config.search_win_size_range,
                    config.pfa
                );
                config.k0
            }
        }
    }

    fn build(config: &CfarConfig, table: Option<&K0Table>) -> CfarResult<Self> {
        let (cfar_type, input_type) = config.validate()?;
        let rel_thr = Self::resolve_rel_thr(config, cfar_type, table);

        let (range_thresholds, doppler_thresholds) = if config.dynamic_flag {
            (
                Some(zeroed(config.fft1d_size).map_err(|_| CfarError::HandleAllocation)?),
                Some(zeroed(config.fft2d_size).map_err(|_| CfarError::HandleAllocation)?),
            )
        } else {
            (None, None)
        };

        let (left_skip_azimuth, right_skip_azimuth) = if cfar_type.is_range_azimuth() {
            (config.left_skip_size_azimuth, config.right_skip_size_azimuth)
        } else {
            (0, 0)
        };

        let scratch = Scratch::allocate(config.fft1d_size).map_err(|e| {
            log::warn!("{}: scratch allocation failed: {}", cfar_type, e);
            CfarError::ScratchAllocation
        });

        log::debug!(
            "{}: created {}x{} detector, K0 {}, dynamic {}",
            cfar_type,
            config.fft1d_size,
            config.fft2d_size,
            rel_thr,
            config.dynamic_flag
        );

        Ok(DetectionCfar {
            config: config.clone(),
            cfar_type,
            input_type,
            ca_kind: cfar_type.ca_kind(),
            left_skip_azimuth,
            right_skip_azimuth,
            rel_thr,
            profile: SnrProfile::default(),
            range_thresholds,
            doppler_thresholds,
            thresholds_ready: false,
            scratch,
            strategy: Strategy::for_type(cfar_type),
            state: DetectorState::Created,
        })
    }

    /// Outcome of the scratch allocation done at creation
    pub fn scratch_status(&self) -> CfarResult<()> {
        match &self.scratch {
            Ok(_) => Ok(()),
            Err(e) => Err(*e),
        }
    }

    /// Fill the dynamic threshold arrays.
    ///
    /// Returns the number of cells covered, `range_bins * doppler_bins`,
    /// or 0 when the detector was created without dynamic thresholding.
    pub fn compute_dynamic_thresholds(&mut self) -> usize {
        let (Some(range), Some(doppler)) = (
            self.range_thresholds.as_deref_mut(),
            self.doppler_thresholds.as_deref_mut(),
        ) else {
            log::warn!("{}: dynamic thresholds not enabled", self.cfar_type);
            return 0;
        };

        self.profile
            .fill_range_thresholds(range, self.config.range_res, self.rel_thr);
        fill_doppler_thresholds(doppler);
        self.thresholds_ready = true;
        range.len() * doppler.len()
    }

    /// Search one heatmap.
    ///
    /// The heatmap must have shape `[fft2d_size, fft1d_size]`. For the
    /// range-azimuth variants the configured second-pass flag is written
    /// into `input.flags` before searching.
    pub fn run(
        &mut self,
        input: &mut DetectionInput<'_>,
        output: &mut DetectionOutput<'_>,
    ) -> CfarResult<()> {
        let scratch = self.scratch.as_mut().map_err(|e| *e)?;

        if input.heatmap.dim() != (self.config.fft2d_size, self.config.fft1d_size) {
            return Err(CfarError::InvalidBuffer);
        }

        let strategy = self.strategy;
        let thresholds = if self.thresholds_ready {
            (self.range_thresholds.as_deref(), self.doppler_thresholds.as_deref())
        } else {
            (None, None)
        };
        let params = search_params(
            &self.config,
            self.rel_thr,
            (self.left_skip_azimuth, self.right_skip_azimuth),
            thresholds,
        );

        let count = {
            let mut sink = output.sink(self.config.max_num_det_obj, strategy.writes_estimates())?;
            if self.cfar_type.is_range_azimuth() {
                input
                    .flags
                    .set(SearchFlags::SECOND_PASS, self.config.enable_second_pass_search);
            }
            strategy.detect(input, &params, scratch, &mut sink)
        };

        output.num_detected = count;
        output.cross_axis = strategy.cross_axis();
        self.state = DetectorState::Running;
        log::trace!("{}: {} detections", self.cfar_type, count);
        Ok(())
    }

    /// Release the detector
    pub fn destroy(self) {
        let DetectionCfar {
            cfar_type, scratch, ..
        } = self;
        drop(scratch);
        log::debug!("{}: destroyed", cfar_type);
    }

    /// Owned output storage sized for this detector
    pub fn output_buffers(&self) -> DetectionBuffers {
        DetectionBuffers::new(self.config.max_num_det_obj)
    }

    pub fn config(&self) -> &CfarConfig {
        &self.config
    }

    pub fn cfar_type(&self) -> CfarType {
        self.cfar_type
    }

    pub fn input_type(&self) -> InputType {
        self.input_type
    }

    /// Cell-averaging sub-type derived from the CFAR type
    pub fn ca_kind(&self) -> Option<CaCfarKind> {
        self.ca_kind
    }

    /// Resolved relative threshold
    pub fn rel_thr(&self) -> f32 {
        self.rel_thr
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn cross_axis(&self) -> CrossAxis {
        self.strategy.cross_axis()
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Azimuth skips, zero for range-Doppler variants
    pub fn azimuth_skips(&self) -> (u16, u16) {
        (self.left_skip_azimuth, self.right_skip_azimuth)
    }

    /// Dynamic range thresholds, present only with dynamic thresholding
    pub fn range_thresholds(&self) -> Option<&[f32]> {
        self.range_thresholds.as_deref()
    }

    /// Dynamic Doppler thresholds, present only with dynamic thresholding
    pub fn doppler_thresholds(&self) -> Option<&[f32]> {
        self.doppler_thresholds.as_deref()
    }

    /// Scratch size in bytes, 0 when allocation failed
    pub fn scratch_size_bytes(&self) -> usize {
        self.scratch.as_ref().map_or(0, Scratch::size_bytes)
    }
}

fn search_params<'h>(
    config: &CfarConfig,
    rel_thr: f32,
    (left_skip_azimuth, right_skip_azimuth): (u16, u16),
    (range_thresholds, doppler_thresholds): (Option<&'h [f32]>, Option<&'h [f32]>),
) -> SearchParams<'h> {
    SearchParams {
        half_win_range: half_window(config.search_win_size_range),
        guard_range: config.guard_size_range as usize,
        half_win_cross: half_window(config.search_win_size_doppler),
        guard_cross: config.guard_size_doppler as usize,
        left_skip: config.left_skip_size as usize,
        right_skip: config.right_skip_size as usize,
        left_skip_azimuth: left_skip_azimuth as usize,
        right_skip_azimuth: right_skip_azimuth as usize,
        rel_thr,
        cross_rel_thr: config.doppler_search_rel_thr,
        log2_mag: config.log2_mag_flag,
        second_pass: config.enable_second_pass_search,
        range_res: config.range_res,
        doppler_res: config.doppler_res,
        range_thresholds,
        doppler_thresholds,
    }
}

/// Reference cells per side for a window covering both sides
fn half_window(win: u16) -> usize {
    (win as usize + 1) / 2
}
