//! # Docket CLI (`docket`)
//!
//! Loads VTR ledger files into the case store and inspects the result.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docket init` | Create the SQLite database and run schema migrations |
//! | `docket load <files>...` | Ingest ledger files under a new load job |
//! | `docket jobs` | List load jobs, newest first |
//! | `docket job <id>` | Show one job and its errors as JSON |
//! | `docket case <id>` | Show one stored case as JSON |
//! | `docket search` | Search participants by encoded name |
//!
//! ## Examples
//!
//! ```bash
//! docket init --config ./config/docket.toml
//! docket load --reset ledgers/*.vtr
//! docket search -f Charley -l Thomas -e metaphone -s 1903-01-01
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use docket_core::encoding::Encoding;
use tracing_subscriber::EnvFilter;

use docket::config;
use docket::get;
use docket::ingest;
use docket::jobs;
use docket::migrate;
use docket::search::{self, SearchRequest};

/// Docket: load legacy VTR court-docket ledgers into a searchable case store.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docket.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "docket", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docket.toml")]
    config: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only report errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it again is safe.
    Init,

    /// Load VTR files under a new job.
    ///
    /// Prints the number of cases processed per file and every recorded
    /// error. Exits non-zero when a file could not be read or yielded no
    /// cases.
    Load {
        /// Ledger files to load.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Drop all stored documents before loading.
        #[arg(long)]
        reset: bool,
    },

    /// List load jobs, newest first.
    Jobs,

    /// Show a load job and its errors.
    Job {
        /// Job id.
        id: String,
    },

    /// Show a stored case.
    Case {
        /// Case id, `<year>/<book>/<number>`.
        id: String,
    },

    /// Search participants by name.
    Search {
        /// First name.
        #[arg(short, long)]
        first: Option<String>,

        /// Middle name.
        #[arg(short, long)]
        middle: Option<String>,

        /// Last name.
        #[arg(short, long)]
        last: Option<String>,

        /// Which form of the name to search. Defaults to `search.default_encoding`.
        #[arg(short, long)]
        encoding: Option<Encoding>,

        /// Earliest arrest date (inclusive), YYYY-MM-DD.
        #[arg(short, long, value_parser = search::parse_date_arg)]
        start: Option<chrono::NaiveDate>,

        /// Latest arrest date (inclusive), YYYY-MM-DD.
        #[arg(short = 'S', long, value_parser = search::parse_date_arg)]
        stop: Option<chrono::NaiveDate>,
    },
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.is_empty() => EnvFilter::new(directives),
        _ if quiet => EnvFilter::new("error"),
        _ => match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        },
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Load { files, reset } => {
            return ingest::run_load_files(&cfg, &files, reset).await;
        }
        Commands::Jobs => {
            jobs::run_list_jobs(&cfg).await?;
        }
        Commands::Job { id } => {
            jobs::run_show_job(&cfg, &id).await?;
        }
        Commands::Case { id } => {
            get::run_get(&cfg, &id).await?;
        }
        Commands::Search {
            first,
            middle,
            last,
            encoding,
            start,
            stop,
        } => {
            let request = SearchRequest {
                first,
                middle,
                last,
                start,
                stop,
            };
            search::run_search(&cfg, &request, encoding).await?;
        }
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}
