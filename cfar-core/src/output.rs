//! Detection Output Buffers
//!
//! Output is written into caller-owned parallel slices, one entry per
//! detection. [`DetectionOutput`] borrows those slices for one run;
//! [`DetectionBuffers`] owns a full set for callers that do not manage their
//! own memory.
//!
//! The cross-axis slot holds a Doppler index for range-Doppler searches and
//! an azimuth index for range-azimuth searches. `run` records which one in
//! [`DetectionOutput::cross_axis`], and [`Detection::bin`] carries it as a
//! [`BinIndex`].

use serde::{Deserialize, Serialize};

use crate::error::{CfarError, CfarResult};

/// Meaning of the cross-axis index slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossAxis {
    #[default]
    Doppler,
    Azimuth,
}

/// Cross-axis bin of a detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinIndex {
    Doppler(u16),
    Azimuth(u16),
}

impl BinIndex {
    /// Raw bin number regardless of axis
    pub fn index(&self) -> u16 {
        match self {
            BinIndex::Doppler(i) | BinIndex::Azimuth(i) => *i,
        }
    }
}

/// One detection read back from the output slices
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub range_index: u16,
    pub bin: BinIndex,
    /// Range in meters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range_est: Option<f32>,
    /// Radial velocity in meters per second
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doppler_est: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range_var: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doppler_var: Option<f32>,
    pub snr: f32,
    pub noise: f32,
}

/// Caller-owned output slices for one run.
///
/// Required: `range_index`, `cross_index`, `snr_est`, `noise`, plus
/// `range_est` and `doppler_est` for range-Doppler variants. The variances
/// are optional. Every slice present must hold at least `max_num_det_obj`
/// entries.
#[derive(Debug, Default)]
pub struct DetectionOutput<'a> {
    pub range_index: Option<&'a mut [u16]>,
    /// Doppler index, or azimuth index in range-azimuth mode
    pub cross_index: Option<&'a mut [u16]>,
    pub range_est: Option<&'a mut [f32]>,
    pub doppler_est: Option<&'a mut [f32]>,
    pub range_var: Option<&'a mut [f32]>,
    pub doppler_var: Option<&'a mut [f32]>,
    pub snr_est: Option<&'a mut [f32]>,
    pub noise: Option<&'a mut [f32]>,
    /// Entries written by the last successful run
    pub num_detected: usize,
    /// What `cross_index` holds after the last successful run
    pub cross_axis: CrossAxis,
}

impl<'a> DetectionOutput<'a> {
    /// Read back entry `i`, if it was written
    pub fn detection(&self, i: usize) -> Option<Detection> {
        if i >= self.num_detected {
            return None;
        }
        let cross = *self.cross_index.as_deref()?.get(i)?;
        let bin = match self.cross_axis {
            CrossAxis::Doppler => BinIndex::Doppler(cross),
            CrossAxis::Azimuth => BinIndex::Azimuth(cross),
        };
        let estimates = self.cross_axis == CrossAxis::Doppler;
        let read = |slice: &Option<&'a mut [f32]>| -> Option<f32> {
            if estimates {
                slice.as_deref().and_then(|s| s.get(i).copied())
            } else {
                None
            }
        };

        Some(Detection {
            range_index: *self.range_index.as_deref()?.get(i)?,
            bin,
            range_est: read(&self.range_est),
            doppler_est: read(&self.doppler_est),
            range_var: read(&self.range_var),
            doppler_var: read(&self.doppler_var),
            snr: *self.snr_est.as_deref()?.get(i)?,
            noise: *self.noise.as_deref()?.get(i)?,
        })
    }

    /// All entries written by the last run
    pub fn detections(&self) -> impl Iterator<Item = Detection> + '_ {
        (0..self.num_detected).filter_map(move |i| self.detection(i))
    }

    /// Check the slices and borrow them as a sink of `capacity` entries.
    /// Nothing is written when this fails.
    pub(crate) fn sink(
        &mut self,
        capacity: usize,
        with_estimates: bool,
    ) -> CfarResult<DetectionSink<'_>> {
        fn required<T>(slice: &Option<&mut [T]>, capacity: usize) -> bool {
            slice.as_ref().is_some_and(|s| s.len() >= capacity)
        }
        fn optional<T>(slice: &Option<&mut [T]>, capacity: usize) -> bool {
            !matches!(slice, Some(s) if s.len() < capacity)
        }

        let valid = required(&self.range_index, capacity)
            && required(&self.cross_index, capacity)
            && required(&self.snr_est, capacity)
            && required(&self.noise, capacity)
            && (!with_estimates
                || (required(&self.range_est, capacity)
                    && required(&self.doppler_est, capacity)
                    && optional(&self.range_var, capacity)
                    && optional(&self.doppler_var, capacity)));
        if !valid {
            return Err(CfarError::InvalidBuffer);
        }

        let DetectionOutput {
            range_index,
            cross_index,
            range_est,
            doppler_est,
            range_var,
            doppler_var,
            snr_est,
            noise,
            ..
        } = self;

        let estimates = if with_estimates {
            Some(Estimates {
                range: range_est.as_deref_mut().ok_or(CfarError::InvalidBuffer)?,
                doppler: doppler_est.as_deref_mut().ok_or(CfarError::InvalidBuffer)?,
                range_var: range_var.as_deref_mut(),
                doppler_var: doppler_var.as_deref_mut(),
            })
        } else {
            None
        };

        Ok(DetectionSink {
            range_index: range_index.as_deref_mut().ok_or(CfarError::InvalidBuffer)?,
            cross_index: cross_index.as_deref_mut().ok_or(CfarError::InvalidBuffer)?,
            snr: snr_est.as_deref_mut().ok_or(CfarError::InvalidBuffer)?,
            noise: noise.as_deref_mut().ok_or(CfarError::InvalidBuffer)?,
            estimates,
            capacity,
            count: 0,
        })
    }
}

/// A detected cell as produced by a strategy
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DetectedCell {
    pub range: usize,
    pub cross: usize,
    pub snr: f32,
    pub noise: f32,
    pub range_est: f32,
    pub doppler_est: f32,
    /// Only written by searches that estimate measurement variance
    pub range_var: Option<f32>,
    pub doppler_var: Option<f32>,
}

struct Estimates<'o> {
    range: &'o mut [f32],
    doppler: &'o mut [f32],
    range_var: Option<&'o mut [f32]>,
    doppler_var: Option<&'o mut [f32]>,
}

/// Validated output slices, filled in order by a strategy
pub struct DetectionSink<'o> {
    range_index: &'o mut [u16],
    cross_index: &'o mut [u16],
    snr: &'o mut [f32],
    noise: &'o mut [f32],
    estimates: Option<Estimates<'o>>,
    capacity: usize,
    count: usize,
}

impl<'o> DetectionSink<'o> {
    /// Entries written so far
    pub fn count(&self) -> usize {
        self.count
    }

    /// No room for another entry
    pub fn is_full(&self) -> bool {
        self.count >= self.capacity
    }

    /// Append a detection. Returns false, writing nothing, when full.
    pub fn push(&mut self, cell: &DetectedCell) -> bool {
        if self.is_full() {
            return false;
        }
        let i = self.count;
        self.range_index[i] = cell.range as u16;
        self.cross_index[i] = cell.cross as u16;
        self.snr[i] = cell.snr;
        self.noise[i] = cell.noise;
        if let Some(est) = self.estimates.as_mut() {
            est.range[i] = cell.range_est;
            est.doppler[i] = cell.doppler_est;
            if let (Some(var), Some(value)) = (est.range_var.as_deref_mut(), cell.range_var) {
                var[i] = value;
            }
            if let (Some(var), Some(value)) = (est.doppler_var.as_deref_mut(), cell.doppler_var) {
                var[i] = value;
            }
        }
        self.count += 1;
        true
    }
}

/// Owned storage for a complete output set
#[derive(Debug, Clone, Default)]
pub struct DetectionBuffers {
    pub range_index: Vec<u16>,
    pub cross_index: Vec<u16>,
    pub range_est: Vec<f32>,
    pub doppler_est: Vec<f32>,
    pub range_var: Vec<f32>,
    pub doppler_var: Vec<f32>,
    pub snr_est: Vec<f32>,
    pub noise: Vec<f32>,
}

impl DetectionBuffers {
    /// Buffers holding `capacity` detections
    pub fn new(capacity: usize) -> Self {
        DetectionBuffers {
            range_index: vec![0; capacity],
            cross_index: vec![0; capacity],
            range_est: vec![0.0; capacity],
            doppler_est: vec![0.0; capacity],
            range_var: vec![0.0; capacity],
            doppler_var: vec![0.0; capacity],
            snr_est: vec![0.0; capacity],
            noise: vec![0.0; capacity],
        }
    }

    /// Lend every slice as a run output
    pub fn output(&mut self) -> DetectionOutput<'_> {
        DetectionOutput {
            range_index: Some(self.range_index.as_mut_slice()),
            cross_index: Some(self.cross_index.as_mut_slice()),
            range_est: Some(self.range_est.as_mut_slice()),
            doppler_est: Some(self.doppler_est.as_mut_slice()),
            range_var: Some(self.range_var.as_mut_slice()),
            doppler_var: Some(self.doppler_var.as_mut_slice()),
            snr_est: Some(self.snr_est.as_mut_slice()),
            noise: Some(self.noise.as_mut_slice()),
            num_detected: 0,
            cross_axis: CrossAxis::Doppler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(range: usize, cross: usize) -> DetectedCell {
        DetectedCell {
            range,
            cross,
            snr: 10.0,
            noise: 1.0,
            range_est: range as f32 * 0.1,
            doppler_est: -0.5,
            range_var: Some(0.01),
            doppler_var: Some(0.02),
        }
    }

    #[test]
    fn test_sink_requires_core_slices() {
        let mut buffers = DetectionBuffers::new(4);
        let mut output = buffers.output();
        output.noise = None;
        assert!(matches!(output.sink(4, false), Err(CfarError::InvalidBuffer)));
    }

    #[test]
    fn test_sink_requires_estimates_when_asked() {
        let mut buffers = DetectionBuffers::new(4);
        let mut output = buffers.output();
        output.doppler_est = None;
        assert!(output.sink(4, false).is_ok());
        assert!(matches!(output.sink(4, true), Err(CfarError::InvalidBuffer)));
    }

    #[test]
    fn test_sink_checks_capacity() {
        let mut buffers = DetectionBuffers::new(4);
        let mut output = buffers.output();
        assert!(matches!(output.sink(5, false), Err(CfarError::InvalidBuffer)));

        // Short optional slice is rejected too
        let mut short = [0.0f32; 2];
        output.range_var = Some(&mut short[..]);
        assert!(matches!(output.sink(4, true), Err(CfarError::InvalidBuffer)));
    }

    #[test]
    fn test_sink_push_until_full() {
        let mut buffers = DetectionBuffers::new(2);
        {
            let mut output = buffers.output();
            let mut sink = output.sink(2, true).unwrap();
            assert!(sink.push(&cell(3, 4)));
            assert!(sink.push(&cell(5, 6)));
            assert!(sink.is_full());
            assert!(!sink.push(&cell(7, 8)));
            assert_eq!(sink.count(), 2);
        }
        assert_eq!(buffers.range_index, vec![3, 5]);
        assert_eq!(buffers.cross_index, vec![4, 6]);
        assert_eq!(buffers.doppler_var, vec![0.02, 0.02]);
    }

    #[test]
    fn test_sink_leaves_variances_without_estimate() {
        let mut buffers = DetectionBuffers::new(1);
        buffers.range_var[0] = -1.0;
        {
            let mut output = buffers.output();
            let mut sink = output.sink(1, true).unwrap();
            let cell = DetectedCell {
                range_var: None,
                doppler_var: None,
                ..cell(3, 4)
            };
            assert!(sink.push(&cell));
        }
        assert_eq!(buffers.range_index, vec![3]);
        assert_eq!(buffers.range_var, vec![-1.0]);
        assert_eq!(buffers.doppler_var, vec![0.0]);
    }

    #[test]
    fn test_read_back_detections() {
        let mut buffers = DetectionBuffers::new(2);
        let mut output = buffers.output();
        {
            let mut sink = output.sink(2, false).unwrap();
            sink.push(&cell(3, 4));
        }
        output.num_detected = 1;
        output.cross_axis = CrossAxis::Azimuth;

        let det = output.detection(0).unwrap();
        assert_eq!(det.range_index, 3);
        assert_eq!(det.bin, BinIndex::Azimuth(4));
        assert_eq!(det.range_est, None);
        assert_eq!(det.snr, 10.0);
        assert!(output.detection(1).is_none());
        assert_eq!(output.detections().count(), 1);
    }

    #[test]
    fn test_detection_serialization() {
        let det = Detection {
            range_index: 7,
            bin: BinIndex::Doppler(2),
            range_est: Some(0.35),
            doppler_est: None,
            range_var: None,
            doppler_var: None,
            snr: 12.0,
            noise: 1.5,
        };
        let json = serde_json::to_value(det).unwrap();
        assert_eq!(json["rangeIndex"], 7);
        assert_eq!(json["bin"]["doppler"], 2);
        assert!(json.get("dopplerEst").is_none());
    }
}
