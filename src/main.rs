//! Demo service: structured logging plus per-request access records.
//!
//! # Usage
//!
//! ```bash
//! # JSON records on stdout, mirrored into service.log
//! LOG_FILE_ENABLED=true cargo run
//!
//! # Console output at debug level
//! cargo run -- --pretty --log-level debug
//! ```
//!
//! Environment variables are documented in [`reqlog::config`]; flags given on
//! the command line take precedence.

use anyhow::Result;
use clap::Parser;

/// Structured request-logging demo server.
#[derive(Parser)]
#[command(name = "reqlog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Bind address, overrides LISTEN
    #[arg(long)]
    listen: Option<String>,

    /// Minimum severity, overrides LOG_LEVEL
    #[arg(long)]
    log_level: Option<String>,

    /// Human-readable console output instead of JSON
    #[arg(long)]
    pretty: bool,

    /// Add caller file/line to every record
    #[arg(long)]
    debug: bool,

    /// Mirror records into this file
    #[arg(long)]
    log_file: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = reqlog::config::Config::from_env()?;
    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if cli.pretty {
        config.json_log = false;
    }
    if cli.debug {
        config.dev_mode = true;
    }
    if let Some(path) = cli.log_file {
        config.log_file_enabled = true;
        config.log_file = path;
    }
    config.validate()?;

    reqlog::server::run(config).await
}
