use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use zinc_harvest::app::{App, LogSink};
use zinc_harvest::catalog::CatalogHttpClient;
use zinc_harvest::config::{BucketRequest, ConfigLoader, ResolvedConfig, default_ligand_base_url};
use zinc_harvest::domain::{LigandFormat, ZincVersion};
use zinc_harvest::error::HarvestError;
use zinc_harvest::ligand::LigandHttpClient;
use zinc_harvest::output::{JsonOutput, OutputMode, Summary};

#[derive(Parser)]
#[command(name = "zinc-harvest")]
#[command(about = "Scrape ZINC catalog buckets, sample work lists and download ligands")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[arg(long, global = true)]
    config: Option<String>,

    /// Catalog generation to download ligands from (overrides the config)
    #[arg(long, global = true)]
    zinc_version: Option<ZincVersion>,

    #[arg(long, global = true)]
    format: Option<LigandFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Scrape listing pages into one id file per bucket")]
    Scrape(BucketArgs),
    #[command(about = "Sample ids from bucket files into the work list")]
    Sample(BucketArgs),
    #[command(about = "Download every ligand of the work list")]
    Download(DownloadArgs),
    #[command(about = "Download again whenever the work list is rewritten")]
    Watch,
    #[command(about = "Scrape, sample and download in one go")]
    Run(BucketArgs),
    #[command(about = "Concatenate downloaded SDF files into one file")]
    Merge(MergeArgs),
}

#[derive(Args, Clone)]
struct BucketArgs {
    /// MW:LOGP or MW:LOGP:QUANTITY, e.g. 350:3:25 (repeatable, at most 5)
    #[arg(long = "bucket")]
    buckets: Vec<String>,
}

#[derive(Args, Clone)]
struct DownloadArgs {
    /// Keep the output directory and skip ligands already present
    #[arg(long)]
    resume: bool,
}

#[derive(Args, Clone)]
struct MergeArgs {
    #[arg(long)]
    output: Option<Utf8PathBuf>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(harvest) = report.downcast_ref::<HarvestError>() {
            return ExitCode::from(map_exit_code(harvest));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &HarvestError) -> u8 {
    match error {
        HarvestError::InvalidZincId(_)
        | HarvestError::InvalidBucket(_)
        | HarvestError::NoBuckets
        | HarvestError::TooManyBuckets { .. }
        | HarvestError::InvalidZincVersion(_)
        | HarvestError::InvalidSetting { .. }
        | HarvestError::ConfigRead(_)
        | HarvestError::ConfigParse(_)
        | HarvestError::SupplyShortfall { .. }
        | HarvestError::EmptyWorkList(_) => 2,
        HarvestError::CatalogHttp(_)
        | HarvestError::CatalogStatus { .. }
        | HarvestError::LigandHttp(_)
        | HarvestError::LigandStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;
    if let Some(version) = cli.zinc_version {
        config.zinc_version = version;
        config.download.base_url = default_ligand_base_url(version);
    }
    if let Some(format) = cli.format {
        config.download.format = format;
    }
    let app = build_app(config)?;

    match cli.command {
        Commands::Scrape(args) => run_scrape(&app, args, output_mode),
        Commands::Sample(args) => run_sample(&app, args, output_mode),
        Commands::Download(args) => run_download(&app, args, output_mode),
        Commands::Watch => run_watch(&app, output_mode),
        Commands::Run(args) => run_all(&app, args, output_mode),
        Commands::Merge(args) => run_merge(&app, args, output_mode),
    }
}

type HttpApp = App<CatalogHttpClient, LigandHttpClient>;

fn build_app(config: ResolvedConfig) -> Result<HttpApp, HarvestError> {
    let catalog = CatalogHttpClient::new(&config.catalog.base_url, &config.http)?;
    let ligands = LigandHttpClient::new(&config.download.base_url, &config.http)?;
    Ok(App::new(config, catalog, ligands))
}

fn parse_buckets(app: &HttpApp, args: BucketArgs) -> Result<Vec<BucketRequest>, HarvestError> {
    let default_quantity = app.config().default_quantity;
    let requests = args
        .buckets
        .iter()
        .map(|value| BucketRequest::parse(value, default_quantity))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(app.requests_or_configured(requests))
}

fn run_scrape(app: &HttpApp, args: BucketArgs, output_mode: OutputMode) -> miette::Result<()> {
    let requests = parse_buckets(app, args)?;
    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.scrape(&requests, &JsonOutput)?;
            JsonOutput::print_scrape(&result).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            let result = app.scrape(&requests, &LogSink)?;
            Summary::print_scrape(&result);
        }
    }
    Ok(())
}

fn run_sample(app: &HttpApp, args: BucketArgs, output_mode: OutputMode) -> miette::Result<()> {
    let requests = parse_buckets(app, args)?;
    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.sample(&requests, &JsonOutput)?;
            JsonOutput::print_sample(&result).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            let result = app.sample(&requests, &LogSink)?;
            Summary::print_sample(&result);
        }
    }
    Ok(())
}

fn run_download(app: &HttpApp, args: DownloadArgs, output_mode: OutputMode) -> miette::Result<()> {
    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.download(args.resume, &JsonOutput)?;
            JsonOutput::print_download(&result).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            let result = app.download(args.resume, &LogSink)?;
            Summary::print_download(&result);
        }
    }
    Ok(())
}

fn run_watch(app: &HttpApp, output_mode: OutputMode) -> miette::Result<()> {
    match output_mode {
        OutputMode::NonInteractive => app.watch(&JsonOutput, |result| {
            if let Err(err) = JsonOutput::print_download(result) {
                tracing::error!(error = %err, "cannot write download report");
            }
        })?,
        OutputMode::Interactive => app.watch(&LogSink, Summary::print_download)?,
    }
    Ok(())
}

fn run_all(app: &HttpApp, args: BucketArgs, output_mode: OutputMode) -> miette::Result<()> {
    let requests = parse_buckets(app, args)?;
    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.run(&requests, &JsonOutput)?;
            JsonOutput::print_run(&result).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            let result = app.run(&requests, &LogSink)?;
            Summary::print_run(&result);
        }
    }
    Ok(())
}

fn run_merge(app: &HttpApp, args: MergeArgs, output_mode: OutputMode) -> miette::Result<()> {
    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.merge(args.output.as_deref(), &JsonOutput)?;
            JsonOutput::print_merge(&result).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            let result = app.merge(args.output.as_deref(), &LogSink)?;
            Summary::print_merge(&result);
        }
    }
    Ok(())
}
