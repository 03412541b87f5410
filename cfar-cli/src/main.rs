//! `cfar-cli`: run a CFAR detector over one heatmap and print the detections
//! as JSON.
//!
//! The heatmap is either read from a JSON file (an array of Doppler rows) or
//! synthesised as a flat noise floor with point targets.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use ndarray::Array2;

use cfar_core::{DetectionCfar, DetectionInput, SearchFlags};

mod load;
mod report;
mod scene;

use report::Report;
use scene::Target;

#[derive(Parser, Debug)]
#[command(name = "cfar-cli", version, about = "Run CFAR detection over a radar heatmap")]
struct Cli {
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,

    /// Detector configuration (JSON)
    #[arg(long)]
    config: PathBuf,

    /// Heatmap to search (JSON array of Doppler rows)
    #[arg(long)]
    heatmap: Option<PathBuf>,

    /// Point target `range,doppler,power` added to a synthesised heatmap
    #[arg(long = "target", value_name = "R,D,POWER")]
    targets: Vec<Target>,

    /// Noise floor of a synthesised heatmap
    #[arg(long, default_value_t = 1.0)]
    floor: f32,

    /// K0 lookup table (JSON), used when the configured K0 is 0
    #[arg(long)]
    table: Option<PathBuf>,

    /// Enable and compute dynamic thresholds
    #[arg(long)]
    dynamic: bool,

    /// Only report local maxima (range-azimuth only)
    #[arg(long)]
    neighbour_check: bool,

    /// Sidelobe threshold (range-azimuth only)
    #[arg(long, default_value_t = 0.0)]
    sidelobe_thr: f32,

    /// Azimuth peaks reported per range bin (range-azimuth only)
    #[arg(long, default_value_t = 1)]
    az_max: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .init();

    let report = detect(&cli)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn create_detector(cli: &Cli) -> Result<DetectionCfar> {
    let mut config = load::config(&cli.config)?;
    if cli.dynamic {
        config.dynamic_flag = true;
    }

    let cfar = match &cli.table {
        #[cfg(feature = "k0-table")]
        Some(path) => {
            let table = load::table(path)?;
            DetectionCfar::create_with_table(&config, &table)
        }
        #[cfg(not(feature = "k0-table"))]
        Some(path) => {
            log::warn!("Built without k0-table, ignoring {}", path.display());
            DetectionCfar::create(&config)
        }
        None => DetectionCfar::create(&config),
    }
    .context("Invalid detector configuration")?;

    cfar.scratch_status()
        .context("Detector has no scratch memory")?;
    Ok(cfar)
}

fn detect(cli: &Cli) -> Result<Report> {
    let mut cfar = create_detector(cli)?;
    let config = cfar.config().clone();

    if config.dynamic_flag {
        let cells = cfar.compute_dynamic_thresholds();
        log::info!("Computed dynamic thresholds for {} cells", cells);
    }

    let heatmap: Array2<f32> = match &cli.heatmap {
        Some(path) => load::heatmap(path)?,
        None => scene::synthesise(
            config.fft2d_size,
            config.fft1d_size,
            cli.floor,
            &cli.targets,
        )?,
    };
    log::debug!("Heatmap: {} range bins, {} rows", heatmap.ncols(), heatmap.nrows());

    let mut flags = SearchFlags::empty();
    flags.set(SearchFlags::NEIGHBOUR_CHECK, cli.neighbour_check);
    let mut input = DetectionInput::new(heatmap.view())
        .with_flags(flags)
        .with_sidelobe_thr(cli.sidelobe_thr)
        .with_az_max_per_range_bin(cli.az_max);

    let mut buffers = cfar.output_buffers();
    let mut output = buffers.output();
    cfar.run(&mut input, &mut output)
        .context("Detection run failed")?;
    log::info!("{}: {} detections", cfar.cfar_type(), output.num_detected);

    let report = Report::new(cfar.cfar_type(), &output);
    cfar.destroy();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config_file(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("cfar-cli").chain(args.iter().copied()))
    }

    #[test]
    fn test_synthesised_target_is_detected() {
        let config = config_file(r#"{"cfarType": 1}"#);
        let path = config.path().to_str().unwrap();
        let cli = cli(&["--config", path, "--target", "20,10,1000"]);

        let report = detect(&cli).unwrap();
        assert_eq!(report.num_detected, 1);
        assert_eq!(report.detections[0].range_index, 20);
        assert_eq!(report.detections[0].bin.index(), 10);
    }

    #[test]
    fn test_dynamic_flag_enables_thresholds() {
        let config = config_file(r#"{"cfarType": 2}"#);
        let path = config.path().to_str().unwrap();
        // 15x floor clears K0 but not the near-range dynamic floor
        let cli = cli(&["--config", path, "--target", "20,16,15", "--dynamic"]);

        let report = detect(&cli).unwrap();
        assert_eq!(report.num_detected, 0);
    }

    #[test]
    fn test_bad_config_is_reported() {
        let config = config_file(r#"{"cfarType": 0, "searchWinSizeRange": 8}"#);
        let path = config.path().to_str().unwrap();
        let err = detect(&cli(&["--config", path])).unwrap_err();
        assert!(format!("{err:#}").contains("16"));
    }

    #[test]
    fn test_heatmap_shape_must_match() {
        let config = config_file(r#"{"cfarType": 1, "fft1dSize": 4, "fft2dSize": 2}"#);
        let heatmap = config_file("[[1.0, 1.0, 1.0], [1.0, 1.0, 1.0]]");
        let cli = cli(&[
            "--config",
            config.path().to_str().unwrap(),
            "--heatmap",
            heatmap.path().to_str().unwrap(),
        ]);
        assert!(detect(&cli).is_err());
    }

    #[test]
    fn test_range_azimuth_options() {
        let config = config_file(r#"{"cfarType": 5}"#);
        let path = config.path().to_str().unwrap();
        let cli = cli(&[
            "--config",
            path,
            "--target",
            "20,5,900",
            "--target",
            "20,15,800",
            "--az-max",
            "2",
            "--neighbour-check",
        ]);

        let report = detect(&cli).unwrap();
        assert_eq!(report.num_detected, 2);
        assert_eq!(report.cross_axis, cfar_core::CrossAxis::Azimuth);
    }
}
