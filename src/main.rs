//! `loterecon` command line: reconcile one batch, reconcile the backlog,
//! inspect header completeness, or parse a single XML file.
//!
//! Exit codes: 0 success, 1 at least one batch failed, 2 fatal (configuration,
//! store unreachable, backlog selection failed).

use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use loterecon::{
    config::{LogFormat, ReconcileOptions, ReportFormat},
    document::{DocumentParser, tiss::TissParser},
    engine::reconciler::Reconciler,
    files::UploadDir,
    logging,
    persist::{BatchStore, sqlite::SqliteBatchStore},
    report::{self, TextReport},
    runtime::{
        events::ReconcileEvent,
        handle::{ReconcilerHandle, RuntimeError, spawn_reconciler},
    },
    types::BatchId,
};
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, error, info};

const EXIT_OK: u8 = 0;
const EXIT_DEGRADED: u8 = 1;
const EXIT_FATAL: u8 = 2;

#[derive(Parser)]
#[command(
    name = "loterecon",
    about = "Reconcile TISS batch XML headers into batch records",
    version,
    arg_required_else_help = true
)]
struct Cli {
    /// SQLite database holding the batch records.
    #[arg(long, env = "LOTERECON_DATABASE", value_name = "PATH", global = true)]
    database: Option<PathBuf>,
    /// Log line format (logs go to stderr).
    #[arg(long, env = "LOTERECON_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ReconcileArgs {
    /// Directory that stored XML filenames are relative to.
    #[arg(long, env = "LOTERECON_UPLOAD_ROOT", value_name = "DIR")]
    upload_root: PathBuf,
    /// Skip the write when the stored header is complete and its hash matches the file.
    #[arg(long)]
    skip_unchanged: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the header of one batch.
    ReconcileOne {
        /// Batch id.
        id: BatchId,
        #[command(flatten)]
        args: ReconcileArgs,
    },
    /// Reconcile every batch whose header is incomplete.
    ReconcileAll {
        /// Reconcile only these ids, in the given order. Repeatable.
        #[arg(long = "id", value_name = "ID")]
        ids: Vec<BatchId>,
        /// Report format on stdout.
        #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
        report: ReportFormat,
        #[command(flatten)]
        args: ReconcileArgs,
    },
    /// List batch records and their header completeness. Read-only.
    Inspect {
        /// Only list records still in the backlog.
        #[arg(long)]
        incomplete_only: bool,
    },
    /// Parse one XML file and print the extracted document as JSON. Read-only.
    Parse {
        /// Path to the XML file.
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = logging::init_logging(cli.log_format).context("cannot initialise logging") {
        eprintln!("error: {err:#}");
        return ExitCode::from(EXIT_FATAL);
    }

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            error!(error = %format!("{err:#}"), "fatal");
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let Cli {
        database, command, ..
    } = cli;

    match command {
        Commands::Parse { file } => parse_file(&file),
        Commands::Inspect { incomplete_only } => {
            let store = open_store(database.as_deref(), Access::ReadOnly)?;
            inspect(&store, incomplete_only)
        }
        Commands::ReconcileOne { id, args } => {
            let handle = open_runtime(database.as_deref(), &args)?;
            let code = reconcile_one(&handle, id).await;
            handle.shutdown().await?;
            Ok(code)
        }
        Commands::ReconcileAll { ids, report, args } => {
            let handle = open_runtime(database.as_deref(), &args)?;
            let code = reconcile_all(&handle, &ids, report).await;
            handle.shutdown().await?;
            code
        }
    }
}

#[derive(Clone, Copy)]
enum Access {
    ReadWrite,
    ReadOnly,
}

// Never creates the database: a mistyped path must be fatal, not an empty backlog.
fn open_store(database: Option<&Path>, access: Access) -> Result<SqliteBatchStore> {
    let Some(path) = database else {
        bail!("no batch database given; pass --database or set LOTERECON_DATABASE");
    };
    let store = match access {
        Access::ReadWrite => SqliteBatchStore::open_existing(path),
        Access::ReadOnly => SqliteBatchStore::open_read_only(path),
    };
    store.with_context(|| format!("cannot open batch database {}", path.display()))
}

fn open_runtime(database: Option<&Path>, args: &ReconcileArgs) -> Result<ReconcilerHandle> {
    if !args.upload_root.is_dir() {
        bail!("upload root {} is not a directory", args.upload_root.display());
    }
    let store = open_store(database, Access::ReadWrite)?;
    let options = ReconcileOptions {
        skip_unchanged_hash: args.skip_unchanged,
    };
    info!(
        upload_root = %args.upload_root.display(),
        skip_unchanged = options.skip_unchanged_hash,
        "reconciler ready"
    );

    let reconciler = Reconciler::new(
        Box::new(store),
        Box::new(UploadDir::new(args.upload_root.clone())),
        Box::new(TissParser),
        options,
    );
    Ok(spawn_reconciler(reconciler))
}

async fn reconcile_one(handle: &ReconcilerHandle, id: BatchId) -> u8 {
    match handle.reconcile_one(id).await {
        Ok(done) => {
            println!("{}", report::success_line(&done));
            EXIT_OK
        }
        Err(RuntimeError::Reconcile(err)) => {
            eprintln!(
                "FAIL  batch {} stage={} cause={}: {err}",
                err.id(),
                err.stage(),
                err.cause()
            );
            EXIT_DEGRADED
        }
        Err(err) => {
            eprintln!("error: {err}");
            EXIT_FATAL
        }
    }
}

async fn reconcile_all(handle: &ReconcilerHandle, ids: &[BatchId], format: ReportFormat) -> Result<u8> {
    let progress = (format == ReportFormat::Text).then(|| spawn_progress_printer(handle.subscribe()));

    let result = if ids.is_empty() {
        handle.reconcile_backlog().await
    } else {
        handle.reconcile_ids(ids).await
    };

    let report = match result {
        Ok(report) => report,
        Err(err) => {
            if let Some(printer) = progress {
                printer.abort();
            }
            return Err(err).context("bulk reconciliation aborted before any batch was attempted");
        }
    };

    match format {
        ReportFormat::Text => {
            if let Some(printer) = progress {
                let _ = printer.await;
            }
            if report.header_absent > 0 {
                println!("batches without a header (still in the backlog):");
                for absent in report.header_absent_items() {
                    println!("{}", report::success_line(absent));
                }
            }
            if !report.is_clean() {
                println!("failed batches:");
                for failure in report.failures() {
                    println!("{}", report::failure_line(failure));
                }
            }
            println!("{}", report::summary_line(&report));
        }
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    if report.is_clean() {
        Ok(EXIT_OK)
    } else {
        debug!(report = %TextReport(&report), "degraded run");
        Ok(EXIT_DEGRADED)
    }
}

fn spawn_progress_printer(mut rx: broadcast::Receiver<ReconcileEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    println!("{}", report::event_line(&event));
                    if matches!(event, ReconcileEvent::RunFinished { .. }) {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    eprintln!("({n} progress lines dropped)");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn inspect(store: &SqliteBatchStore, incomplete_only: bool) -> Result<u8> {
    let records = store.list_batches().context("cannot list batch records")?;

    let mut shown = 0usize;
    let mut pending = 0usize;
    for record in &records {
        let needs = record.header.needs_reconciliation();
        if needs {
            pending += 1;
        }
        if incomplete_only && !needs {
            continue;
        }
        println!("{}", report::inspect_line(record));
        shown += 1;
    }
    println!(
        "batches={} pending={} listed={shown}",
        records.len(),
        pending
    );
    Ok(EXIT_OK)
}

fn parse_file(path: &Path) -> Result<u8> {
    let bytes = fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    match TissParser.parse(&bytes) {
        Ok(doc) => {
            println!("{}", serde_json::to_string_pretty(&doc)?);
            Ok(EXIT_OK)
        }
        Err(err) => {
            eprintln!("malformed document {}: {err}", path.display());
            Ok(EXIT_DEGRADED)
        }
    }
}
