use std::path::PathBuf;

use clap::Parser;
use dicom_volume_assembly::{
    AggregationConfig, VolumeAggregator, VolumeLoader, VolumeLoaderError,
    config::{MAX_DECIMAL_PLACES, ORIGIN_TOLERANCE, SPACING_DECIMAL_PLACES},
};

#[derive(Parser)]
#[command(name = "dicom-volume-assembly")]
#[command(about = "Reconstruct volumes from a directory of DICOM slices")]
struct Cli {
    /// Directory containing .dcm files
    #[arg(default_value = "dicom")]
    directory: PathBuf,

    /// Decimal places used when comparing spacing and orientation
    #[arg(
        long,
        default_value_t = SPACING_DECIMAL_PLACES,
        value_parser = clap::value_parser!(u32).range(0..=MAX_DECIMAL_PLACES as i64)
    )]
    decimal_places: u32,

    /// Maximum per-axis distance for two origins to be the same position
    #[arg(long, default_value_t = ORIGIN_TOLERANCE)]
    origin_tolerance: f64,
}

fn main() -> Result<(), VolumeLoaderError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let aggregator = VolumeAggregator::new(AggregationConfig {
        decimal_places: cli.decimal_places,
        origin_tolerance: cli.origin_tolerance,
    });

    let records = VolumeLoader::load_from_directory(&cli.directory)?;
    let aggregation = aggregator.aggregate(&records);

    for (index, volume) in aggregation.volumes.iter().enumerate() {
        println!(
            "volume {index}: {} ({}D) {} slices x {} time samples, spacing [{:.3}, {:.3}, {:.3}]",
            volume.series_description,
            volume.dimensionality.rank(),
            volume.number_of_slices(),
            volume.number_of_time_samples(),
            volume.spacing.x,
            volume.spacing.y,
            volume.spacing.z,
        );
    }
    for rejection in &aggregation.rejections {
        let files: Vec<_> = rejection.payloads().map(|path| path.display().to_string()).collect();
        println!("rejected: {} [{}]", rejection.error, files.join(", "));
    }

    Ok(())
}
