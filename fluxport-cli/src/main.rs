//! CLI for the fluxport bucket migrator.
//!
//! Exports an InfluxDB 2.x bucket into a VictoriaMetrics-compatible
//! line-protocol write endpoint. Source connection settings can be given as
//! flags or through the `INFLUXDB_V2_URL`, `INFLUXDB_V2_ORG`, and
//! `INFLUXDB_V2_TOKEN` environment variables.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use fluxport::{
    DateRange, Grouping, HttpSink, InfluxClient, MigrationConfig, Migrator, NullSink, SourceConfig,
};
use tracing_subscriber::EnvFilter;

/// fluxport — export InfluxDB 2.x buckets as line protocol.
#[derive(Parser)]
#[command(name = "fluxport", version, about)]
struct Cli {
    /// Source bucket to migrate.
    bucket: String,

    /// Source server URL (falls back to INFLUXDB_V2_URL).
    #[arg(short = 'u', long)]
    url: Option<String>,

    /// Source organization (falls back to INFLUXDB_V2_ORG).
    #[arg(short = 'o', long)]
    org: Option<String>,

    /// Source access token (falls back to INFLUXDB_V2_TOKEN).
    #[arg(short = 't', long)]
    token: Option<String>,

    /// Target server accepting line-protocol writes.
    #[arg(short = 'a', long, default_value = "http://localhost:8428")]
    target: String,

    /// First day to migrate (YYYY-MM-DD, UTC). Default: 100 days back.
    #[arg(long)]
    start: Option<String>,

    /// Last day to migrate, inclusive (YYYY-MM-DD, UTC). Default: now.
    #[arg(long)]
    end: Option<String>,

    /// Rows fetched per paginated query.
    #[arg(long, default_value_t = 5000)]
    chunk_size: usize,

    /// Maximum protocol lines per write request.
    #[arg(long, default_value_t = 10_000)]
    max_lines: usize,

    /// Print encoded batches to stdout instead of writing to the target.
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Use domain.entity_id as the measurement and carry the native
    /// measurement as a unit_of_measurement tag (Home Assistant layout).
    #[arg(short = 'P', long)]
    pivot: bool,

    /// Series whitelist file, one series per line. When omitted,
    /// ./whitelist.txt is used if it exists.
    #[arg(long)]
    whitelist: Option<PathBuf>,

    /// Print the final run report as JSON.
    #[arg(long)]
    json: bool,

    /// Append-only diagnostic log file.
    #[arg(long, default_value = "fluxport.log")]
    log_file: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(&cli.log_file)?;

    // Malformed dates must abort before anything talks to a database.
    let range = DateRange::parse(cli.start.as_deref(), cli.end.as_deref())?;
    let source = SourceConfig::resolve(cli.url, cli.org, cli.token)?;

    let grouping = if cli.pivot {
        Grouping::PivotedEntity
    } else {
        Grouping::Native
    };
    eprintln!("Dry run {} Pivot {}", cli.dry_run, cli.pivot);
    tracing::info!(
        "migrating bucket '{}' to {} (dry_run={}, pivot={})",
        cli.bucket,
        cli.target,
        cli.dry_run,
        cli.pivot
    );

    let config = MigrationConfig::new(cli.bucket.clone())
        .with_chunk_size(cli.chunk_size)
        .with_max_lines_per_request(cli.max_lines)
        .with_dry_run(cli.dry_run)
        .with_grouping(grouping)
        .with_range(range)
        .with_whitelist(resolve_whitelist(cli.whitelist));

    let client = InfluxClient::connect(&source)?;
    let mut migrator = Migrator::new(client, config);

    let report = if cli.dry_run {
        migrator.migrate(&NullSink)?
    } else {
        let sink = HttpSink::new(&cli.target, &cli.bucket)?;
        migrator.migrate(&sink)?
    };

    eprintln!(
        "Migrated {} series: {} lines, {} in {} write requests",
        report.series,
        report.lines,
        migrator.stats().humanized_bytes(),
        report.requests
    );
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    println!("All done");
    Ok(())
}

/// Uses the explicit whitelist path, or ./whitelist.txt when present.
fn resolve_whitelist(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if explicit.is_some() {
        return explicit;
    }
    let default = PathBuf::from("whitelist.txt");
    default.exists().then_some(default)
}

/// Installs the tracing subscriber writing to the append-only log file.
fn init_logging(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_ansi(false)
        .with_writer(Arc::new(file))
        .init();

    Ok(())
}
