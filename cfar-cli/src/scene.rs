//! Synthetic heatmaps: a flat noise floor with point targets

use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use ndarray::Array2;

/// A point target at one cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub range: usize,
    /// Doppler bin, or azimuth bin for range-azimuth detectors
    pub cross: usize,
    pub power: f32,
}

impl FromStr for Target {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(',').map(str::trim);
        let mut next = |what: &str| {
            parts
                .next()
                .filter(|p| !p.is_empty())
                .ok_or_else(|| anyhow!("missing {} in target '{}'", what, s))
        };

        let range: usize = next("range")?.parse().context("bad range bin")?;
        let cross: usize = next("doppler")?.parse().context("bad doppler bin")?;
        let power: f32 = next("power")?.parse().context("bad power")?;
        if parts.next().is_some() {
            bail!("target '{}' has more than three fields", s);
        }
        Ok(Target {
            range,
            cross,
            power,
        })
    }
}

/// Heatmap of `cross_bins` rows by `range_bins` columns at `floor`, with
/// each target written into its cell
pub fn synthesise(
    cross_bins: usize,
    range_bins: usize,
    floor: f32,
    targets: &[Target],
) -> Result<Array2<f32>> {
    let mut heatmap = Array2::from_elem((cross_bins, range_bins), floor);
    for target in targets {
        let Some(cell) = heatmap.get_mut([target.cross, target.range]) else {
            bail!(
                "target at range {} doppler {} is outside the {}x{} heatmap",
                target.range,
                target.cross,
                range_bins,
                cross_bins
            );
        };
        *cell = target.power;
    }
    Ok(heatmap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target() {
        let target: Target = "20, 10, 1000".parse().unwrap();
        assert_eq!(
            target,
            Target {
                range: 20,
                cross: 10,
                power: 1000.0
            }
        );
    }

    #[test]
    fn test_parse_target_errors() {
        assert!("20,10".parse::<Target>().is_err());
        assert!("20,x,5".parse::<Target>().is_err());
        assert!("1,2,3,4".parse::<Target>().is_err());
        assert!("".parse::<Target>().is_err());
    }

    #[test]
    fn test_synthesise() {
        let targets = [Target {
            range: 3,
            cross: 1,
            power: 50.0,
        }];
        let map = synthesise(4, 8, 2.0, &targets).unwrap();
        assert_eq!(map.dim(), (4, 8));
        assert_eq!(map[[1, 3]], 50.0);
        assert_eq!(map.sum(), 2.0 * 31.0 + 50.0);
    }

    #[test]
    fn test_synthesise_out_of_bounds() {
        let targets = [Target {
            range: 8,
            cross: 0,
            power: 50.0,
        }];
        assert!(synthesise(4, 8, 1.0, &targets).is_err());
    }
}
