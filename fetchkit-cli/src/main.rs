//! FetchKit CLI - command-line front end for the fetchkit library.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use console::style;
use fetchkit::cache::LoadPolicy;
use fetchkit::config::ConfigFile;
use fetchkit::logging::{self, LogGuard};

use commands::cache::CacheAction;
use commands::config::ConfigCommands;
use commands::thumb::ThumbAction;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "fetchkit", version, about = "Tiered image cache, downloads and thumbnails")]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Look up an image through the memory, disk and network tiers
    Get {
        /// Image URL, also the cache key
        url: String,

        /// How far to go on a miss: memory, disk or network
        #[arg(long, default_value_t = LoadPolicy::Network)]
        policy: LoadPolicy,

        /// Save the decoded image here; the extension selects the format
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Download several URLs as one group with a combined progress bar
    Fetch {
        /// URLs to download
        #[arg(required = true)]
        urls: Vec<String>,

        /// Extra request header as 'Name: Value' (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Write each body into this directory
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },

    /// Encode or decode thumbnail packets
    Thumb {
        #[command(subcommand)]
        action: ThumbAction,
    },

    /// Manage the disk cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// View or change configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn init_logging(verbose: bool) -> Option<LogGuard> {
    // A broken config file is reported by the command itself
    let mut log_config = ConfigFile::load().unwrap_or_default().log_config();
    if verbose {
        log_config = log_config.with_level("debug");
    }
    match logging::init(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("{} {}", style("Warning:").yellow(), e);
            None
        }
    }
}

fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Get { url, policy, out } => commands::get::run(&url, policy, out),
        Commands::Fetch {
            urls,
            headers,
            out_dir,
        } => commands::fetch::run(&urls, &headers, out_dir),
        Commands::Thumb { action } => commands::thumb::run(action),
        Commands::Cache { action } => commands::cache::run(action),
        Commands::Config { command } => commands::config::run(command),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
