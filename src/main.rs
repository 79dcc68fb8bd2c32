use anyhow::{Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand, ValueEnum};
use sekolah_export::config::{
    default_config_path, get_config, load_config, Config, LogFormat,
};
use sekolah_export::export::{assemble, build_output_path, write_csv_file};
use sekolah_export::harvest::{clamp_workers, HarvestOptions, Harvester};
use sekolah_export::logging::init_logging;
use sekolah_export::sources::{SchoolDirectory, SekolahKitaApi};
use std::path::PathBuf;
use std::sync::Arc;

/// Sekolah Export - Export the Sekolah Kita school directory to CSV
#[derive(Parser, Debug)]
#[command(name = "sekolah-export")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Export the Sekolah Kita school directory with phone numbers to CSV", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormatArg>,

    #[command(subcommand)]
    command: Commands,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormatArg {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Export schools (with phone numbers) to a CSV file
    #[command(alias = "e")]
    Export(ExportArgs),

    /// List regency/city names matching a keyword
    #[command(alias = "r")]
    Regions {
        /// Keyword to search for, e.g. "Bandung"
        keyword: String,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Write the default configuration
    Init {
        /// Destination (defaults to the platform config directory)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long, short)]
        force: bool,
    },
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Output CSV path (defaults to a timestamped file in the current directory)
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Records per page; 0 or negative auto-detects the total
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    page_size: i64,

    /// Maximum number of pages to fetch
    #[arg(long)]
    max_pages: Option<u32>,

    /// Concurrent listing page requests
    #[arg(long)]
    metadata_workers: Option<usize>,

    /// Concurrent detail requests
    #[arg(long)]
    detail_workers: Option<usize>,

    /// Skip the phone number lookup
    #[arg(long)]
    skip_phone: bool,

    /// Regency/city filter, e.g. "Kota Bandung"
    #[arg(long)]
    kabupaten_kota: Option<String>,

    /// Free-text keyword filter
    #[arg(long)]
    keyword: Option<String>,

    /// Comma-separated education level codes, e.g. "TK,KB"
    #[arg(long)]
    category: Option<String>,

    /// School status filter
    #[arg(long)]
    status: Option<String>,

    /// Disable the randomized delay before each request
    #[arg(long)]
    no_rate_limit: bool,
}

impl ExportArgs {
    /// Merge command-line flags over configured defaults
    fn harvest_options(&self, config: &Config) -> HarvestOptions {
        let mut options = HarvestOptions::from_config(config);
        let mut filter = options.filter;
        if let Some(keyword) = &self.keyword {
            filter = filter.keyword(keyword.trim());
        }
        if let Some(region) = &self.kabupaten_kota {
            filter = filter.region(region.trim());
        }
        if let Some(category) = &self.category {
            filter = filter.category(category.trim());
        }
        if let Some(status) = &self.status {
            filter = filter.status(status.trim());
        }
        options.filter = filter;

        options.page_size = self.page_size;
        options.max_pages = self.max_pages.filter(|max| *max > 0);
        options.fetch_contacts = !self.skip_phone;
        options.metadata_workers = capped_workers(
            "metadata",
            self.metadata_workers.unwrap_or(options.metadata_workers),
            config.workers.max_metadata,
        );
        options.detail_workers = capped_workers(
            "detail",
            self.detail_workers.unwrap_or(options.detail_workers),
            config.workers.max_detail,
        );
        options
    }
}

fn capped_workers(phase: &str, requested: usize, max: usize) -> usize {
    let workers = clamp_workers(requested, max);
    if workers != requested {
        tracing::warn!(
            "Requested {} {} workers; using {} (allowed range 1..={})",
            requested,
            phase,
            workers,
            max.max(1)
        );
    }
    workers
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration from file if specified or found in default locations
    let mut config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => get_config().context("Failed to load configuration")?,
    };
    if let Some(format) = cli.log_format {
        config.logging.format = format.into();
    }

    init_logging(cli.verbose, cli.quiet, &config.logging)
        .context("Failed to initialize logging")?;

    match cli.command {
        Commands::Export(args) => run_export(config, args).await,
        Commands::Regions { keyword } => run_regions(&config, &keyword).await,
        Commands::Config {
            action: ConfigCommands::Init { path, force },
        } => init_config(path, force),
    }
}

async fn run_export(mut config: Config, args: ExportArgs) -> Result<()> {
    if args.no_rate_limit {
        config.rate_limit.enabled = false;
    }
    if !config.rate_limit.enabled {
        tracing::warn!("Rate limiting disabled; requests are sent without delay");
    }

    let options = args.harvest_options(&config);
    let output = match args.output {
        Some(path) => path,
        None => {
            let dir = std::env::current_dir().context("Failed to resolve current directory")?;
            build_output_path(&dir, &options.filter.region, Local::now())
        }
    };

    let api = SekolahKitaApi::from_config(&config).context("Failed to create API client")?;
    tracing::info!(
        "Exporting from {} (region: {:?}, category: {:?})",
        api.name(),
        options.filter.region,
        options.filter.category
    );
    let harvester = Harvester::new(Arc::new(api), &config);

    let harvest = harvester
        .run(&options)
        .await
        .context("Failed to list schools")?;

    let collection = &harvest.collection;
    if !collection.is_complete() {
        eprintln!(
            "Warning: {} page(s) could not be fetched; exporting {} of {} reported schools",
            collection.failed_pages.len(),
            collection.records.len(),
            collection.reported_total
        );
    }
    if !harvest.enrichment.failed.is_empty() {
        eprintln!(
            "Warning: phone lookup failed for {} school(s)",
            harvest.enrichment.failed.len()
        );
    }

    let rows = assemble(&collection.records, &harvest.enrichment);
    write_csv_file(&output, &rows)
        .with_context(|| format!("Failed to write CSV to {}", output.display()))?;

    eprintln!("Wrote CSV to {}", output.display());
    Ok(())
}

async fn run_regions(config: &Config, keyword: &str) -> Result<()> {
    let api = SekolahKitaApi::from_config(config).context("Failed to create API client")?;

    eprintln!("Searching for regions matching '{}'...", keyword);
    let regions = api
        .suggest_regions(keyword)
        .await
        .context("Failed to fetch region suggestions")?;

    if regions.is_empty() {
        eprintln!("No regions found matching '{}'", keyword);
    }
    for region in regions {
        println!("{}", region);
    }
    Ok(())
}

fn init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => default_config_path().context("Could not determine the config directory")?,
    };

    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    Config::default()
        .save(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
