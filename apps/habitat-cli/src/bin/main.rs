//! `habitat`: train a habitat signature for a species, scan a region for
//! candidate locations, and query stored results.
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use habitat_cache::ResultCache;
use habitat_core::artifact::read_occurrences;
use habitat_core::config::{resolve_with_base, Config, Settings};
use habitat_core::species::species_dir;
use habitat_core::types::BoundingBox;
use habitat_scan::{run_pipeline, RunRequest};
use habitat_tiles::{inventory, TileStore};

/// Used when `RUST_LOG` is unset. Covers every workspace crate, including the
/// tile store's missing-directory warning.
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Parser, Debug)]
#[command(name = "habitat")]
#[command(about = "Find candidate locations for a species from satellite embedding tiles")]
#[command(version)]
struct Args {
    /// Config environment (selects config.<env>.toml)
    #[arg(long, env = "RUST_ENV", default_value = "dev", global = true)]
    env: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train on occurrences and scan a region for candidates
    Run {
        species: String,
        /// Named region from the [regions] config table
        #[arg(long, conflicts_with = "bbox", required_unless_present = "bbox")]
        region: Option<String>,
        /// min_lon,min_lat,max_lon,max_lat
        #[arg(long, allow_hyphen_values = true)]
        bbox: Option<BoundingBox>,
        /// JSON file: [[lon, lat], ...] or a GeoJSON FeatureCollection of points
        #[arg(long)]
        occurrences: PathBuf,
        /// Defaults to <results_dir>/<species slug>
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long)]
        resolution: Option<f64>,
    },
    /// Print stored candidates for a species as GeoJSON
    Query {
        species: String,
        #[arg(long)]
        min_probability: Option<f64>,
    },
    /// Summarize the tiles available in the tile directory
    Tiles,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = Config::load_for_env(&args.env).context("Failed to load configuration")?;
    let mut settings = config.settings()?;
    let base = std::env::current_dir()?;

    match args.command {
        Command::Run { species, region, bbox, occurrences, output, threshold, resolution } => {
            let bbox = match (region, bbox) {
                (_, Some(bbox)) => bbox,
                (Some(name), None) => settings.regions.get(&name).ok_or_else(|| {
                    let known: Vec<&str> = settings.regions.names().collect();
                    anyhow!("Unknown region '{name}' (configured: {})", known.join(", "))
                })?,
                (None, None) => bail!("Either --region or --bbox is required"),
            };
            if let Some(t) = threshold {
                settings.scan.threshold = t;
            }
            if let Some(r) = resolution {
                settings.scan.resolution = r;
            }
            let output_dir = output.unwrap_or_else(|| species_dir(&results_dir(&settings, &base), &species));
            run(&species, bbox, &occurrences, output_dir, settings, base).await
        }
        Command::Query { species, min_probability } => {
            let cache = ResultCache::new(results_dir(&settings, &base));
            match cache.get(&species, min_probability).await? {
                Some(collection) => println!("{}", serde_json::to_string_pretty(&*collection)?),
                None => bail!("No candidate data for '{species}' under {}", cache.results_dir().display()),
            }
            Ok(())
        }
        Command::Tiles => {
            let dir = resolve_with_base(&base, &settings.tiles.dir);
            let inv = inventory(&dir, settings.tiles.tile_size);
            println!("Tile directory: {}", dir.display());
            println!("Tiles: {}", inv.keys.len());
            match inv.bounds {
                Some(b) => println!("Extent: {b}"),
                None => println!("Extent: (empty)"),
            }
            Ok(())
        }
    }
}

fn results_dir(settings: &Settings, base: &Path) -> PathBuf {
    resolve_with_base(base, &settings.output.results_dir)
}

async fn run(
    species: &str,
    bbox: BoundingBox,
    occurrences_file: &Path,
    output_dir: PathBuf,
    settings: Settings,
    base: PathBuf,
) -> Result<()> {
    let occurrences = read_occurrences(occurrences_file)
        .with_context(|| format!("Failed to read occurrences from {}", occurrences_file.display()))?;
    info!(species, occurrences = occurrences.len(), "loaded occurrences");

    let species = species.to_string();
    let summary = tokio::task::spawn_blocking(move || -> Result<_> {
        let store = TileStore::from_settings(&settings.tiles, &base)?;
        let request = RunRequest { species: &species, occurrences: &occurrences, bbox, output_dir };
        Ok(run_pipeline(&store, &request, &settings)?)
    })
    .await??;

    let meta = &summary.collection.metadata;
    println!("Species:        {}", meta.species.as_deref().unwrap_or("-"));
    println!("Model:          {}", summary.model_id);
    println!("Positives:      {} ({} dropped)", summary.positives, summary.dropped_occurrences);
    println!("Negatives:      {}", summary.negatives);
    println!("Grid points:    {} total, {} valid", meta.total_grid_points, meta.valid_grid_points);
    println!("Candidates:     {} (p >= {})", meta.n_candidates, meta.probability_threshold);
    println!("Output:         {}", summary.candidates_path().display());
    Ok(())
}
