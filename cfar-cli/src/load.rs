//! JSON inputs: detector configuration, heatmap and K0 table

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use ndarray::Array2;

use cfar_core::CfarConfig;
#[cfg(feature = "k0-table")]
use cfar_core::K0Table;

pub fn config(path: &Path) -> Result<CfarConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read config {}", path.display()))?;
    let config = CfarConfig::from_json(&text)
        .with_context(|| format!("Invalid config JSON in {}", path.display()))?;
    log::debug!("Loaded config from {}: {:?}", path.display(), config);
    Ok(config)
}

#[cfg(feature = "k0-table")]
pub fn table(path: &Path) -> Result<K0Table> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read K0 table {}", path.display()))?;
    K0Table::from_json(&text)
        .with_context(|| format!("Invalid K0 table JSON in {}", path.display()))
}

/// Heatmap stored as an array of equally long Doppler rows
pub fn heatmap(path: &Path) -> Result<Array2<f32>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read heatmap {}", path.display()))?;
    let rows: Vec<Vec<f32>> = serde_json::from_str(&text)
        .with_context(|| format!("Invalid heatmap JSON in {}", path.display()))?;
    rows_to_array(rows).with_context(|| format!("Bad heatmap in {}", path.display()))
}

fn rows_to_array(rows: Vec<Vec<f32>>) -> Result<Array2<f32>> {
    let nrows = rows.len();
    let ncols = rows.first().map_or(0, Vec::len);
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != ncols) {
        bail!("row {} has {} bins, expected {}", i, row.len(), ncols);
    }
    let flat: Vec<f32> = rows.into_iter().flatten().collect();
    Ok(Array2::from_shape_vec((nrows, ncols), flat)?)
}
