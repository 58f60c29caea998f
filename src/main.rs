use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::error;
use tracing_subscriber::EnvFilter;

use peps_maja::catalog::CatalogFilter;
use peps_maja::config::{config_template, PepsConfig};
use peps_maja::credential::Credential;
use peps_maja::job_request::JobRequest;
use peps_maja::provider::Peps;
use peps_maja::search::{CatalogQuery, DateRange, GeometryParts, OpenEnd, SearchGeometry};
use peps_maja::workflow::{self, DownloadRequest, FullMajaRequest, SearchRequest};
use peps_maja::PepsError;

#[derive(Parser)]
#[command(name = "peps-maja")]
#[command(version, about = "Search the PEPS catalog, run MAJA on it and fetch the results")]
struct Cli {
    /// Service configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search the catalog and start MAJA on every selected product
    Search(SearchArgs),
    /// Start MAJA over a tile and a 2 to 12 month period
    Process(ProcessArgs),
    /// Start MAJA over a tile without period checks, naming the log after the request
    TimeSeries(TimeSeriesArgs),
    /// Check a submitted job and download its results
    Download(DownloadArgs),
    /// Write the default service configuration
    WriteConfig {
        #[arg(default_value = "peps.toml")]
        path: PathBuf,
    },
}

#[derive(Args)]
struct AuthArgs {
    /// Peps account and password file
    #[arg(short, long)]
    auth: Option<PathBuf>,
}

#[derive(Args)]
struct DateArgs {
    /// Start date, fmt('2015-12-22')
    #[arg(short = 'd', long)]
    start_date: String,

    /// End date, fmt('2015-12-23')
    #[arg(short = 'f', long)]
    end_date: Option<String>,
}

#[derive(Args)]
struct SearchArgs {
    #[command(flatten)]
    auth: AuthArgs,

    #[command(flatten)]
    dates: DateArgs,

    /// Town name (pick one which is not too frequent to avoid confusions)
    #[arg(short, long)]
    location: Option<String>,

    /// Latitude in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Longitude in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    lon: Option<f64>,

    #[arg(long, allow_hyphen_values = true)]
    latmin: Option<f64>,

    #[arg(long, allow_hyphen_values = true)]
    latmax: Option<f64>,

    #[arg(long, allow_hyphen_values = true)]
    lonmin: Option<f64>,

    #[arg(long, allow_hyphen_values = true)]
    lonmax: Option<f64>,

    /// Relative orbit number
    #[arg(short, long)]
    orbit: Option<u32>,

    /// Platform prefix, e.g. S2A
    #[arg(long)]
    platform: Option<String>,

    /// Keep only products of this tile
    #[arg(short, long)]
    tile: Option<String>,

    /// Catalog collection (S1, S2, S2ST, S3, ...)
    #[arg(short, long)]
    collection: Option<String>,

    /// Product type, e.g. S2MSI1C or GRD
    #[arg(short, long)]
    product_type: Option<String>,

    #[arg(long)]
    max_records: Option<u32>,

    /// Output search JSON filename
    #[arg(long = "json", default_value = "search.json")]
    json_path: PathBuf,

    /// Where job logs are written
    #[arg(short, long, default_value = ".")]
    write_dir: PathBuf,

    /// Do not start MAJA on the selected products, just print the requests
    #[arg(short, long)]
    no_download: bool,
}

#[derive(Args)]
struct ProcessArgs {
    #[command(flatten)]
    auth: AuthArgs,

    #[command(flatten)]
    dates: DateArgs,

    /// Tile name like 31TCK
    #[arg(short, long)]
    tile: String,

    /// Relative orbit number
    #[arg(short, long)]
    orbit: Option<u32>,

    /// Log file name
    #[arg(short = 'g', long = "log", default_value = "Full_Maja.log")]
    log_path: PathBuf,

    /// Do not submit, just print the request
    #[arg(short, long)]
    no_download: bool,
}

#[derive(Args)]
struct TimeSeriesArgs {
    #[command(flatten)]
    auth: AuthArgs,

    #[command(flatten)]
    dates: DateArgs,

    /// Tile name like 31TCK
    #[arg(short, long)]
    tile: String,

    /// Relative orbit number
    #[arg(short, long)]
    orbit: Option<u32>,

    /// Where the log file is written
    #[arg(short, long, default_value = ".")]
    write_dir: PathBuf,

    /// Do not submit, just print the request
    #[arg(short, long)]
    no_download: bool,
}

#[derive(Args)]
struct DownloadArgs {
    #[command(flatten)]
    auth: AuthArgs,

    /// Log file written by `process`
    #[arg(short = 'g', long = "log", default_value = "Full_Maja.log")]
    log_path: PathBuf,

    /// Path where the products should be downloaded
    #[arg(short, long, default_value = ".")]
    write_dir: PathBuf,
}

impl AuthArgs {
    fn path(&self) -> Result<&Path, PepsError> {
        self.auth
            .as_deref()
            .ok_or(PepsError::MissingArgument("--auth"))
    }

    fn read(&self) -> Result<Credential, PepsError> {
        Credential::read(self.path()?)
    }
}

fn load_config(path: Option<&Path>) -> Result<PepsConfig, PepsError> {
    match path {
        Some(path) => PepsConfig::read(path)
            .map_err(|e| PepsError::Configuration(format!("{}: {e:#}", path.display()))),
        None => Ok(PepsConfig::default()),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn exit_code(e: &anyhow::Error) -> i32 {
    e.downcast_ref::<PepsError>()
        .map(PepsError::exit_code)
        .unwrap_or(-11)
}

async fn run_search(config: PepsConfig, args: SearchArgs) -> Result<()> {
    // arguments are checked before the credential file is touched
    let auth_path = args.auth.path()?.to_path_buf();
    let mut config = config;
    if let Some(collection) = args.collection {
        config.collection = collection;
    }

    let geometry = SearchGeometry::from_parts(&GeometryParts {
        lat: args.lat,
        lon: args.lon,
        lat_min: args.latmin,
        lat_max: args.latmax,
        lon_min: args.lonmin,
        lon_max: args.lonmax,
        location: args.location,
    })?;
    let dates = DateRange::parse(
        &args.dates.start_date,
        args.dates.end_date.as_deref(),
        OpenEnd::FarFuture,
    )?;

    let request = SearchRequest {
        query: CatalogQuery {
            geometry,
            dates,
            product_type: args.product_type,
            max_records: args.max_records,
        },
        filter: CatalogFilter {
            orbit: args.orbit,
            platform: args.platform,
            tile: args.tile,
        },
        json_path: args.json_path,
        write_dir: args.write_dir,
        submit: true,
        dry_run: args.no_download,
    };

    let provider = Peps::new(&config, Credential::read(auth_path)?)?;
    workflow::search(&config, &provider, &request).await?;
    Ok(())
}

async fn run_full_maja(
    config: &PepsConfig,
    auth: &AuthArgs,
    request: FullMajaRequest,
) -> Result<()> {
    let auth_path = auth.path()?;
    let provider = Peps::new(config, auth.read()?)?;

    let submission = workflow::process(config, &provider, &request).await?;
    if let Some(submission) = submission.filter(|s| s.accepted) {
        println!("To check completion and download results:");
        println!(
            "     peps-maja download -a {} -g {}",
            auth_path.display(),
            submission.log_path.display()
        );
    }
    Ok(())
}

async fn run_download(config: &PepsConfig, args: DownloadArgs) -> Result<()> {
    let provider = Peps::new(config, args.auth.read()?)?;
    let request = DownloadRequest {
        log_path: args.log_path,
        write_dir: args.write_dir,
    };
    let report = workflow::download(config, &provider, &request).await?;
    for (name, reason) in report.summary.failed.iter() {
        println!("failed {name}: {reason}");
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Search(args) => run_search(config, args).await,
        Command::Process(args) => {
            let dates = DateRange::parse(
                &args.dates.start_date,
                args.dates.end_date.as_deref(),
                OpenEnd::Today,
            )?;
            let request = FullMajaRequest {
                job: JobRequest::full_maja(&args.tile, dates, args.orbit),
                log_path: args.log_path,
                validate: true,
                dry_run: args.no_download,
            };
            run_full_maja(&config, &args.auth, request).await
        }
        Command::TimeSeries(args) => {
            let mut request = FullMajaRequest::time_series(
                &args.tile,
                &args.dates.start_date,
                args.dates.end_date.as_deref(),
                args.orbit,
                &args.write_dir,
            )?;
            request.dry_run = args.no_download;
            run_full_maja(&config, &args.auth, request).await
        }
        Command::Download(args) => run_download(&config, args).await,
        Command::WriteConfig { path } => {
            let template = PepsConfig::from_template(&config_template())?;
            template.write(&path)?;
            println!("Configuration written to {}", path.display());
            Ok(())
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    println!("---------------------------------------------------------------------------");
    let result = run(cli).await;
    println!("---------------------------------------------------------------------------");

    if let Err(e) = result {
        error!("{e:#}");
        std::process::exit(exit_code(&e));
    }
}
