//! qcapi command-line interface
//!
//! Inspect IBM Quantum (Qiskit Runtime) backends and jobs from a terminal.
//!
//! ```text
//! qcapi backends
//! qcapi latest-job
//! qcapi recent-quantum-jobs --limit 10 --json
//! qcapi job-cancel d1abc2def3
//! qcapi request GET /backends/ibm_fez/properties --raw
//! ```

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

use qcapi_runtime::QcapiError;
use qcapi_runtime::diagnostics::truncate;

mod commands;

use commands::common::{Context, Output};
use commands::{backends, config, jobs, programs, request, version, versions};

/// qcapi - IBM Quantum (Qiskit Runtime) REST client
#[derive(Parser)]
#[command(name = "qcapi")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Account name in the Qiskit config file (QCAPI_QISKIT_ACCOUNT wins)
    #[arg(long, global = true)]
    account: Option<String>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Print compact single-line JSON
    #[arg(long, global = true)]
    raw: bool,

    /// Write the full log to this file instead of the terminal
    #[arg(long, global = true, env = "QCAPI_LOG_FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the resolved configuration (secrets omitted)
    Config,

    /// List supported API versions (no authentication)
    Versions,

    /// List backends
    Backends,

    /// Show the status of one backend
    BackendStatus {
        /// Backend name
        name: String,
    },

    /// Show the calibration properties of one backend
    BackendProperties {
        /// Backend name
        name: String,
    },

    /// List programs
    Programs,

    /// Show one program
    Program {
        /// Program ID
        program_id: String,
    },

    /// List jobs
    Jobs {
        /// Maximum number of jobs
        #[arg(long)]
        limit: Option<u32>,

        /// Number of jobs to skip
        #[arg(long)]
        skip: Option<u32>,

        /// Only jobs on this backend
        #[arg(long)]
        backend: Option<String>,

        /// Only jobs of this program
        #[arg(long)]
        program_id: Option<String>,

        /// Pending filter (true or false)
        #[arg(long, value_parser = ["true", "false"])]
        pending: Option<String>,
    },

    /// Show one job
    Job {
        /// Job ID
        id: String,
    },

    /// Show the results of one job
    JobResults {
        /// Job ID
        id: String,
    },

    /// Request cancellation of one job
    JobCancel {
        /// Job ID
        id: String,
    },

    /// Show the most recent finished job on a quantum (non-simulator) backend
    LatestJob {
        /// Accept jobs on any backend, simulators included
        #[arg(long)]
        any_backend: bool,
    },

    /// List recent finished jobs on quantum (non-simulator) backends
    RecentQuantumJobs {
        /// Number of jobs to show
        #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..))]
        limit: u32,
    },

    /// Send an arbitrary request relative to the API base URL
    Request {
        /// HTTP method (GET, POST, ...)
        method: String,

        /// Path relative to the base URL, e.g. /backends
        path: String,

        /// Do not send an Authorization header
        #[arg(long)]
        no_auth: bool,

        /// Do not send the Service-CRN header
        #[arg(long)]
        no_crn: bool,

        /// Do not send the IBM-API-Version header
        #[arg(long)]
        no_api_version: bool,

        /// Query parameter as key=value (repeatable)
        #[arg(long = "param", value_name = "KEY=VALUE", value_parser = request::parse_param)]
        params: Vec<(String, String)>,

        /// JSON file to send as the request body
        #[arg(long)]
        json_file: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

/// Install the tracing subscriber.
///
/// With a log file, everything down to `debug` goes to the file and the
/// terminal only shows command output and short error messages.
fn init_logging(verbose: u8, log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| anyhow::anyhow!("Cannot open log file {}: {e}", path.display()))?;
            let filter = if verbose >= 3 { "trace" } else { "debug" };
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new(filter))
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new(filter))
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

/// Print an error and the HTTP detail lines when there are any.
fn report_error(e: &anyhow::Error) {
    eprintln!("{} {}", style("Error:").red().bold(), e);

    if let Some(QcapiError::Http { status, url, body }) = e.downcast_ref::<QcapiError>() {
        eprintln!("  {} {status}", style("Status:").dim());
        eprintln!("  {} {url}", style("URL:").dim());
        if !body.trim().is_empty() {
            eprintln!("  {} {}", style("Body:").dim(), truncate(body, 2000));
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.log_file.as_ref()) {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    let ctx = Context::new(
        cli.account,
        Output {
            json: cli.json || cli.raw,
            compact: cli.raw,
        },
    );

    // Execute command
    let result = match cli.command {
        Commands::Config => config::execute(&ctx),
        Commands::Versions => versions::execute(&ctx).await,
        Commands::Backends => backends::execute_list(&ctx).await,
        Commands::BackendStatus { name } => backends::execute_status(&ctx, &name).await,
        Commands::BackendProperties { name } => backends::execute_properties(&ctx, &name).await,

        Commands::Programs => programs::execute_list(&ctx).await,
        Commands::Program { program_id } => programs::execute_show(&ctx, &program_id).await,

        Commands::Jobs {
            limit,
            skip,
            backend,
            program_id,
            pending,
        } => {
            let query = qcapi_runtime::JobQuery {
                limit,
                skip,
                backend,
                program_id,
                pending,
            };
            jobs::execute_list(&ctx, &query).await
        }

        Commands::Job { id } => jobs::execute_show(&ctx, &id).await,
        Commands::JobResults { id } => jobs::execute_results(&ctx, &id).await,
        Commands::JobCancel { id } => jobs::execute_cancel(&ctx, &id).await,
        Commands::LatestJob { any_backend } => jobs::execute_latest(&ctx, any_backend).await,
        Commands::RecentQuantumJobs { limit } => jobs::execute_recent(&ctx, limit).await,

        Commands::Request {
            method,
            path,
            no_auth,
            no_crn,
            no_api_version,
            params,
            json_file,
        } => {
            let args = request::RequestArgs {
                method,
                path,
                no_auth,
                no_crn,
                no_api_version,
                params,
                json_file,
            };
            request::execute(&ctx, args).await
        }

        Commands::Version => {
            version::execute();
            Ok(())
        }
    };

    // Handle errors
    if let Err(e) = result {
        if matches!(e.downcast_ref::<QcapiError>(), Some(QcapiError::Cancelled)) {
            eprintln!("{}", style("Cancelled.").yellow());
            std::process::exit(130);
        }
        report_error(&e);
        std::process::exit(1);
    }

    Ok(())
}
