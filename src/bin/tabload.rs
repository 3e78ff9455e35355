//! `tabload` command-line front end.
//!
//! ```bash
//! tabload import --kind csv --dir ./exports --host db --dbname warehouse --user loader --schema staging
//! tabload import --kind excel --dir ./workbooks --config tabload.toml --json
//! tabload test-connection --host db --dbname warehouse --user loader
//! ```
//!
//! The password comes from `--password`, the `PGPASSWORD` environment variable, or the
//! config file, in that order.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tabload::destination::ConnectOptions;
use tabload::execution::{
    CompositeSink, FileSink, ImportOptions, Importer, ProgressSink, progress_channel,
    spawn_import,
};
use tabload::naming::DEFAULT_NAMESPACE;
use tabload::types::{
    ConnectionDescriptor, ImportOutcome, ImportRequest, ImportTarget, SourceKind, Summary,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const PROGRESS_CAPACITY: usize = 1024;
const TEST_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "tabload", version)]
#[command(about = "Bulk-load CSV files or spreadsheet workbooks into PostgreSQL tables")]
struct Cli {
    /// TOML file with `schema`, `staging_dir` and a `[connection]` table. Flags win.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also append progress lines to this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import every source file in a directory, one table per file or sheet.
    Import(ImportArgs),
    /// Open and close one connection to check the credentials.
    TestConnection(ConnectionArgs),
}

#[derive(Args, Debug, Default)]
struct ConnectionArgs {
    /// Database host.
    #[arg(long)]
    host: Option<String>,

    /// Database port.
    #[arg(long)]
    port: Option<u16>,

    /// Database name.
    #[arg(long = "dbname")]
    database: Option<String>,

    /// Role to connect as.
    #[arg(long)]
    user: Option<String>,

    /// Password.
    #[arg(long, env = "PGPASSWORD", hide_env_values = true)]
    password: Option<String>,
}

impl ConnectionArgs {
    /// Overlay the flags onto `base`.
    fn resolve(self, base: ConnectionDescriptor) -> ConnectionDescriptor {
        ConnectionDescriptor {
            host: self.host.unwrap_or(base.host),
            port: self.port.unwrap_or(base.port),
            database: self.database.unwrap_or(base.database),
            user: self.user.unwrap_or(base.user),
            password: self.password.or(base.password),
        }
    }
}

#[derive(Args)]
struct ImportArgs {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Which files to import: `csv` or `excel`.
    #[arg(long)]
    kind: SourceKind,

    /// Directory to scan (not recursive).
    #[arg(long)]
    dir: PathBuf,

    /// Destination schema. Created if missing.
    #[arg(long)]
    schema: Option<String>,

    /// Where staging files are written. Defaults to the system temp directory.
    #[arg(long)]
    staging_dir: Option<PathBuf>,

    /// Print the outcome as JSON on stdout; progress goes to stderr.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    connection: ConnectionDescriptor,
    schema: Option<String>,
    staging_dir: Option<PathBuf>,
}

impl FileConfig {
    fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid config file {}", path.display()))
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    overall_success: bool,
    summary: Summary,
    message: String,
    outcome: &'a ImportOutcome,
}

fn main() -> Result<ExitCode> {
    init_tracing();

    let cli = Cli::parse();
    let file = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };

    match cli.command {
        Command::Import(args) => import(args, file, cli.log_file),
        Command::TestConnection(args) => test_connection(args, file),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn import(args: ImportArgs, file: FileConfig, log_file: Option<PathBuf>) -> Result<ExitCode> {
    let connection = args.connection.resolve(file.connection);
    let namespace = args
        .schema
        .or(file.schema)
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
    let request = ImportRequest::new(ImportTarget::new(connection, namespace), args.dir, args.kind);
    let options = ImportOptions {
        staging_dir: args.staging_dir.or(file.staging_dir),
        ..ImportOptions::default()
    };

    let (channel, events) = progress_channel(PROGRESS_CAPACITY);
    let mut sinks: Vec<Arc<dyn ProgressSink>> = vec![Arc::new(channel)];
    if let Some(path) = log_file {
        sinks.push(Arc::new(FileSink::new(path)));
    }

    let handle = spawn_import(
        Importer::new(options),
        request,
        Arc::new(CompositeSink::new(sinks)),
    )
    .context("cannot start the import worker")?;

    let json = args.json;
    let result = handle.wait_polling(POLL_INTERVAL, || {
        for event in events.try_iter() {
            if json {
                eprintln!("{event}");
            } else {
                println!("{event}");
            }
        }
    });

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) => {
            // Already reported as a progress line; keep the exit code distinct.
            error!(error = %err, "import aborted");
            return Ok(ExitCode::from(2));
        }
    };

    if json {
        let report = JsonReport {
            overall_success: outcome.overall_success(),
            summary: outcome.summary(),
            message: outcome.summary().to_string(),
            outcome: &outcome,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(if outcome.overall_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn test_connection(args: ConnectionArgs, file: FileConfig) -> Result<ExitCode> {
    let descriptor = args.resolve(file.connection);
    let importer = Importer::new(ImportOptions {
        connect: ConnectOptions {
            connect_timeout: Some(TEST_CONNECT_TIMEOUT),
            ..ConnectOptions::default()
        },
        ..ImportOptions::default()
    });

    importer
        .test_connection(&descriptor)
        .with_context(|| format!("connection to {} failed", descriptor.endpoint()))?;
    info!(endpoint = %descriptor.endpoint(), "connection succeeded");
    println!("connection to {} succeeded", descriptor.endpoint());
    Ok(ExitCode::SUCCESS)
}
