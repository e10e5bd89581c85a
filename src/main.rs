use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use st_discovery::cluster::growing::GrowthStrategy;
use st_discovery::config::Config;
use st_discovery::data::parquet::{load_outlier_events, load_street_graph};
use st_discovery::geo::HaversineDistance;
use st_discovery::{pipeline, storage};

#[derive(Parser, Debug)]
#[clap(
    name = "st-discovery",
    about = "Spatio-temporal dependency discovery on street networks"
)]
struct Cli {
    /// Street graph Parquet file (id, source, target, geometry)
    #[clap(long)]
    graph: String,

    /// Outlier events Parquet file (id, time)
    #[clap(long)]
    outliers: String,

    /// Output directory for results
    #[clap(long, default_value = "discovery_results")]
    output_dir: String,

    /// JSON config file; flags below override its values
    #[clap(long)]
    config: Option<PathBuf>,

    /// Maximum hop count between close segments
    #[clap(long)]
    hop_tolerance: Option<u16>,

    /// Minimum number of segments per region
    #[clap(long)]
    min_cluster_size: Option<usize>,

    /// Similarity threshold (0.0-1.0) for merging subgraphs
    #[clap(long)]
    similarity_threshold: Option<f64>,

    /// Minimum distance in metres between scored subgraphs
    #[clap(long)]
    min_distance: Option<f64>,

    /// Hop-distance cache file
    #[clap(long)]
    distance_cache: Option<PathBuf>,

    /// Region growing strategy
    #[clap(long, value_enum)]
    growth_strategy: Option<GrowthStrategy>,

    /// Write the final subgraphs as TSV
    #[clap(long)]
    write_subgraphs: bool,

    /// Write the per-timepoint regions as JSON
    #[clap(long)]
    write_regions: bool,

    /// Do not draw progress bars
    #[clap(long)]
    no_progress: bool,

    /// Number of worker threads (0 = use all available cores)
    #[clap(long, default_value = "0")]
    threads: usize,

    /// Verbose logging
    #[clap(long, short)]
    verbose: bool,
}

impl Cli {
    fn to_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_json_file(path)?,
            None => Config::default(),
        };

        if let Some(v) = self.hop_tolerance {
            config.hop_tolerance = v;
        }
        if let Some(v) = self.min_cluster_size {
            config.min_cluster_size = v;
        }
        if let Some(v) = self.similarity_threshold {
            config.similarity_threshold = v;
        }
        if let Some(v) = self.min_distance {
            config.min_distance = v;
        }
        if let Some(path) = &self.distance_cache {
            config.distance_cache = Some(path.clone());
        }
        if let Some(strategy) = self.growth_strategy {
            config.growth_strategy = strategy;
        }
        config.write_subgraphs |= self.write_subgraphs;
        config.write_regions |= self.write_regions;
        config.show_progress = !self.no_progress;

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Cli::parse();

    // Configure logging
    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();

    // Set number of threads
    let num_threads = if args.threads > 0 {
        args.threads
    } else {
        // If threads = 0, use all available cores
        num_cpus::get()
    };

    log::info!("Using {} worker threads", num_threads);
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()?;

    let config = args.to_config()?;

    log::info!("Starting dependency discovery");
    log::info!("Graph: {}", args.graph);
    log::info!("Outliers: {}", args.outliers);
    log::info!("Output: {}", args.output_dir);
    log::debug!("Config: {:?}", config);

    // Create output directory
    std::fs::create_dir_all(&args.output_dir)?;

    // 1. Load data
    let events = load_outlier_events(&args.outliers)?;
    let mut builder = load_street_graph(&args.graph)?;
    let marked = builder.mark_anomalous(events.iter().map(|e| e.segment));
    let graph = builder.build();

    log::info!(
        "Loaded street graph with {} vertices and {} segments ({} anomalous)",
        graph.vertex_count(),
        graph.edge_count(),
        marked
    );

    // 2. Discover dependencies
    let output = pipeline::run(&config, &graph, &events, &HaversineDistance)?;

    log::info!(
        "Found {} subgraphs and {} dependencies",
        output.subgraphs.len(),
        output.records.len()
    );

    // 3. Save results
    storage::save_results(&output, &graph, &config, &args.output_dir)?;

    log::info!("Discovery complete. Results saved to {}", args.output_dir);

    Ok(())
}
