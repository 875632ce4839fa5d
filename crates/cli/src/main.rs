//! hydrotopo CLI - DEM conditioning and hydro-topological features

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use hydrotopo_core::io::read_geotiff;
use hydrotopo_core::Raster;
use hydrotopo_pipeline::{run_site, FileWaterSource, ProcessingConfig};

#[derive(Parser)]
#[command(name = "hydrotopo")]
#[command(author, version, about = "Hydro-topological terrain features from DEM tiles", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline for one site
    Run {
        /// Site identifier (names the output subdirectory)
        #[arg(long)]
        site_id: String,
        /// AOI boundary vector file
        #[arg(long)]
        aoi: PathBuf,
        /// Directory containing DEM tiles (GeoTIFF)
        #[arg(long)]
        dem_dir: PathBuf,
        /// Pre-extracted water features vector file
        #[arg(long)]
        water: PathBuf,
        /// Output root directory
        #[arg(short, long)]
        output: PathBuf,
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Override the configured stream burn depth (meters)
        #[arg(long)]
        burn_depth: Option<f64>,
    },
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn load_config(path: Option<&PathBuf>) -> Result<ProcessingConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        }
        None => Ok(ProcessingConfig::default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            site_id,
            aoi,
            dem_dir,
            water,
            output,
            config,
            burn_depth,
        } => {
            let mut config = load_config(config.as_ref())?;
            if let Some(depth) = burn_depth {
                config.burn_depth = depth;
            }

            let water_source = FileWaterSource::new(water);

            let pb = spinner("Running site pipeline...");
            let start = Instant::now();

            let result = run_site(&site_id, &aoi, &dem_dir, &output, &water_source, &config);
            pb.finish_and_clear();

            match result {
                Ok(products) => {
                    println!("Site {} complete in {:.2?}", site_id, start.elapsed());
                    for (name, path) in &products {
                        println!("  {:<18} {}", name, path.display());
                    }
                }
                Err(err) => {
                    if !err.partial_outputs.is_empty() {
                        eprintln!("Products written before the failure:");
                        for (name, path) in &err.partial_outputs {
                            eprintln!("  {:<18} {}", name, path.display());
                        }
                    }
                    return Err(err).context("Pipeline failed");
                }
            }
        }

        Commands::Info { input } => {
            let pb = spinner("Reading raster...");
            let raster: Raster<f64> =
                read_geotiff(&input, None).context("Failed to read raster")?;
            pb.finish_and_clear();

            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {}", raster.cell_size());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            if let Some(crs) = raster.crs() {
                println!("CRS: {}", crs);
            }
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            println!(
                "  Valid cells: {} ({:.1}%)",
                stats.valid_count,
                100.0 * stats.valid_count as f64 / raster.len() as f64
            );
        }
    }

    Ok(())
}
