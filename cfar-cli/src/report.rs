//! JSON report printed on stdout

use serde::Serialize;

use cfar_core::{CfarType, CrossAxis, Detection, DetectionOutput};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub cfar_type: CfarType,
    pub num_detected: usize,
    pub cross_axis: CrossAxis,
    pub detections: Vec<Detection>,
}

impl Report {
    pub fn new(cfar_type: CfarType, output: &DetectionOutput<'_>) -> Self {
        Report {
            cfar_type,
            num_detected: output.num_detected,
            cross_axis: output.cross_axis,
            detections: output.detections().collect(),
        }
    }
}
