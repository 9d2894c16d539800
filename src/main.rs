//! Command-line front end: histogram two DICOM series, then label the
//! clusters picked from the histogram.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use thiserror::Error;

use dect_explorer::{
    DectError, ExplorerSettings, HistogramBuilder, MemoryStore, Orientation, Processor, Region,
    RegionLabeler, RegionTable, SortBy, VolumeLoader, VolumeLoaderError, VolumeSample,
    export::{histogram_to_image, label_slice_to_image},
};

type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Loader error: {0}")]
    Loader(#[from] VolumeLoaderError),

    #[error("{0}")]
    Dect(#[from] DectError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Settings error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("slice {0} is outside the label volume")]
    SliceOutOfRange(usize),
}

/// Dual-energy CT joint histograms and region labeling.
#[derive(Parser)]
#[command(name = "dect-explorer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (JSON key-value store)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Write the effective settings back to the settings file
    #[arg(long, global = true, requires = "settings")]
    save_settings: bool,

    /// Run single-threaded (`serial`) or on the thread pool (`parallel`)
    #[arg(long, global = true, value_parser = parse_processor)]
    processor: Option<Processor>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the joint histogram of two series and save it as a PNG
    Histogram {
        /// Directory with the first (A) series
        #[arg(long)]
        a: PathBuf,

        /// Directory with the second (B) series
        #[arg(long)]
        b: PathBuf,

        /// Bins per axis
        #[arg(long)]
        bins: Option<usize>,

        /// Output image
        #[arg(short, long, default_value = "histogram.png")]
        output: PathBuf,
    },

    /// Label voxels by the picked (A,B) regions and save one slice as a PNG
    Label {
        /// Directory with the first (A) series
        #[arg(long)]
        a: PathBuf,

        /// Directory with the second (B) series
        #[arg(long)]
        b: PathBuf,

        /// Region anchor as `A,B`; repeat for more regions, later ones win overlaps
        #[arg(short, long = "region", required = true)]
        regions: Vec<Region>,

        /// Half-width of each region's box, applied to both axes
        #[arg(short, long)]
        tolerance: Option<f64>,

        /// Axial slice to render (defaults to the middle one)
        #[arg(long)]
        slice: Option<usize>,

        /// Output image
        #[arg(short, long, default_value = "labels.png")]
        output: PathBuf,
    },
}

fn parse_processor(value: &str) -> std::result::Result<Processor, String> {
    Processor::parse(value).ok_or_else(|| format!("unknown processor `{value}`"))
}

fn load_store(path: Option<&Path>) -> Result<MemoryStore> {
    match path {
        Some(path) if path.exists() => Ok(MemoryStore::from_json(&fs::read_to_string(path)?)?),
        _ => Ok(MemoryStore::new()),
    }
}

fn load_pair(a: &Path, b: &Path) -> Result<(VolumeSample<f32>, VolumeSample<f32>)> {
    let volume_a = VolumeLoader::load_from_directory(a, SortBy::ImagePositionPatient)?;
    let volume_b = VolumeLoader::load_from_directory(b, SortBy::ImagePositionPatient)?;
    Ok((volume_a, volume_b))
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut store = load_store(cli.settings.as_deref())?;
    let mut settings = ExplorerSettings::load(&store);
    if let Some(processor) = cli.processor {
        settings.processor = processor;
    }

    match cli.command {
        Commands::Histogram { a, b, bins, output } => {
            if let Some(bins) = bins {
                settings.bins = bins;
            }
            let (volume_a, volume_b) = load_pair(&a, &b)?;

            let start = Instant::now();
            let (histogram, image) =
                HistogramBuilder::from_settings(&settings).build(&volume_a, &volume_b)?;
            let elapsed = start.elapsed();

            histogram_to_image(&image).save(&output)?;

            let spacing = image.geometry.spacing;
            let origin = image.geometry.origin;
            println!(
                "Histogrammed {} voxels into {}x{} bins in {:.2}s",
                histogram.total(),
                histogram.bins_a(),
                histogram.bins_b(),
                elapsed.as_secs_f64()
            );
            println!("A: origin {:.3}, bin width {:.3}", origin.0, spacing.0);
            println!(
                "B: origin {:.3}, bin width {:.3} (image rows run bottom to top)",
                origin.1, spacing.1
            );
            println!("Wrote {}", output.display());
        }

        Commands::Label {
            a,
            b,
            regions,
            tolerance,
            slice,
            output,
        } => {
            if let Some(tolerance) = tolerance {
                settings.tolerance = tolerance;
            }
            let regions = RegionTable::from(regions);
            let (volume_a, volume_b) = load_pair(&a, &b)?;

            let start = Instant::now();
            let labels = RegionLabeler::new(settings.processor).label(
                &volume_a,
                &volume_b,
                regions.as_slice(),
                settings.tolerance,
            )?;
            let elapsed = start.elapsed();

            let index = slice.unwrap_or(labels.dim().0 / 2);
            let image = label_slice_to_image(&labels, index, Orientation::Axial)
                .ok_or(CliError::SliceOutOfRange(index))?;
            image.save(&output)?;

            println!(
                "Labeled {} voxels with {} regions in {:.2}s",
                labels.voxel_count(),
                regions.len(),
                elapsed.as_secs_f64()
            );
            let counts = labels.label_counts(regions.len());
            println!("{:<8} | {:<20} | {:<12}", "Label", "Anchor (A,B)", "Voxels");
            println!("{:-<46}", "");
            println!("{:<8} | {:<20} | {:<12}", 0, "background", counts[0]);
            for (position, region) in regions.as_slice().iter().enumerate() {
                println!(
                    "{:<8} | {:<20} | {:<12}",
                    position + 1,
                    region.to_string(),
                    counts[position + 1]
                );
            }
            println!("Wrote slice {} to {}", index, output.display());
        }
    }

    if cli.save_settings {
        if let Some(path) = &cli.settings {
            settings.persist(&mut store);
            fs::write(path, store.to_json()?)?;
        }
    }

    Ok(())
}
