//! Create a GeoTIFF from a Sentinel-1 EW scene with applied calibration.

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use std::path::PathBuf;
use std::time::Instant;

use ewcal::products::{calibrated, BandSelection};

#[derive(Parser, Debug)]
#[command(
    name = "apply_calibration",
    about = "create a GeoTIFF from a Sentinel-1 EW scene with applied calibration"
)]
struct Args {
    /// input Sentinel-1 scene (.SAFE directory or zip archive)
    #[arg(short = 'i', value_name = "INPUT")]
    input: PathBuf,

    /// output GeoTIFF path
    #[arg(short = 'o', value_name = "OUTPUT")]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    log::info!("processing {}", args.input.display());
    let started = Instant::now();

    calibrated(&args.input, &args.output, BandSelection::Both, false)
        .with_context(|| format!("failed to convert {}", args.input.display()))?;

    log::info!(
        "wrote {} in {} seconds",
        args.output.display(),
        started.elapsed().as_secs()
    );
    Ok(())
}
