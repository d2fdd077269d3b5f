//! epd-pull CLI
//!
//! Pulls EPD records per region and persists them as YAML and CSV files.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use epd_pull::{
    error::{AppError, Result},
    models::{Config, EnvCredentials, EpdRecord},
    pipeline::{self, EmissionsAnalyzer, analyze, merge},
    services::{AuthClient, HttpEpdApi, SecondaryLookup},
    storage::{EpdStorage, LocalStorage, yaml},
    utils::http,
};

/// epd-pull - EPD records by region
#[derive(Parser, Debug)]
#[command(
    name = "epd-pull",
    version,
    about = "Pull Environmental Product Declarations into YAML and CSV files"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "epd-pull.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch every region and write YAML and CSV files
    Pull {
        /// Region to pull instead of the configured list (repeatable)
        #[arg(long = "region")]
        regions: Vec<String>,

        /// Output root (default: output.root from config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate the configuration file
    Validate,

    /// Merge a record with its counterpart from a second source
    Merge {
        /// Primary record file (YAML or JSON)
        primary: PathBuf,

        /// Secondary record file
        #[arg(long, conflicts_with = "lookup")]
        secondary: Option<PathBuf>,

        /// Look the secondary record up in the openEPD listing
        #[arg(long)]
        lookup: bool,

        /// Write the merged record here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare indicator coverage of two record files
    Compare { primary: PathBuf, secondary: PathBuf },

    /// Report emissions data coverage of persisted records
    Analyze {
        /// Analyze at most this many files
        #[arg(long)]
        max_files: Option<usize>,

        /// Also write the report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Log in with the configured credentials and return a client for `base_url`.
async fn connect(config: &Config, base_url: &str) -> Result<HttpEpdApi> {
    let client = http::create_client(&config.api)?;
    let credentials = EnvCredentials::new(&config.credentials);
    let token = AuthClient::new(client.clone(), &config.api.base_url)?
        .authenticate(&credentials)
        .await?;
    log::info!("Authenticated against {}", config.api.base_url);
    HttpEpdApi::new(client, base_url, token)
}

async fn pull(mut config: Config, regions: Vec<String>, output: Option<PathBuf>) -> Result<ExitCode> {
    if !regions.is_empty() {
        config.regions = regions;
    }
    if let Some(output) = output {
        config.output.root = output.to_string_lossy().into_owned();
    }
    config.validate()?;

    let api = connect(&config, &config.api.base_url).await?;
    let storage = LocalStorage::new(config.output_root(), config.output.path_scheme);
    let mirror = config
        .csv
        .cement_mirror_dir
        .as_ref()
        .map(|dir| LocalStorage::new(dir, config.output.path_scheme));

    let summary = pipeline::run_pull(
        &config,
        &api,
        &storage,
        mirror.as_ref().map(|m| m as &dyn EpdStorage),
    )
    .await?;

    if summary.is_partial() {
        log::warn!("Run finished with missing pages or unsaved records");
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}

async fn merge_records(
    config: &Config,
    primary: &Path,
    secondary: Option<&Path>,
    lookup: bool,
    output: Option<&Path>,
) -> Result<()> {
    let primary = yaml::load(primary)?;

    let secondary: Option<EpdRecord> = match (secondary, lookup) {
        (Some(path), _) => Some(yaml::load(path)?),
        (None, true) if !merge::should_fetch_secondary(&primary) => {
            log::info!("Primary record already has impact and resource data");
            None
        }
        (None, true) => {
            let id = merge::lookup_id(&primary)
                .ok_or_else(|| AppError::validation("primary record has no identifier"))?;
            let api = connect(config, &config.api.openepd_base_url).await?;
            SecondaryLookup::new(&api, &config.lookup, &config.fetch)
                .find_by_id(id)
                .await?
        }
        (None, false) => None,
    };

    if let Some(secondary) = &secondary {
        if !merge::match_ids(&primary, secondary) {
            log::warn!("Primary and secondary records share no identifier");
        }
    }

    let merged = pipeline::merge(&primary, secondary.as_ref());
    let text = yaml::to_yaml(&merged)?;
    match output {
        Some(path) => {
            std::fs::write(path, text)?;
            log::info!("Merged record saved to {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load_or_default(&cli.config)?;
    log::info!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Pull { regions, output } => return pull(config, regions, output).await,

        Command::Validate => {
            log::info!("Validating configuration...");
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "Config OK: {} regions, {} tariff keywords, indicator tables v{}",
                config.regions.len(),
                config.tariff.keywords.len(),
                config.indicators.version
            );
        }

        Command::Merge {
            primary,
            secondary,
            lookup,
            output,
        } => {
            merge_records(
                &config,
                &primary,
                secondary.as_deref(),
                lookup,
                output.as_deref(),
            )
            .await?;
        }

        Command::Compare { primary, secondary } => {
            let primary = yaml::load(&primary)?;
            let secondary = yaml::load(&secondary)?;
            let comparison = pipeline::compare_records(&primary, &secondary, &config.indicators);
            merge::log_comparison(&comparison);
        }

        Command::Analyze { max_files, report } => {
            let analysis = EmissionsAnalyzer::new(config.output_root(), &config.regions)
                .with_max_files(max_files)
                .run()?;
            analyze::log_report(&analysis);
            if let Some(path) = report {
                analyze::save_report(&analysis, &path)?;
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
