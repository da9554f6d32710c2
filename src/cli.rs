use clap::Parser;
use std::path::PathBuf;

// Build version with target info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "HTTP:   ureq 2 (blocking)\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Interactive product-tour engine
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Catalog JSON file (defaults to settings, then the built-in tour)
    #[arg(short = 'C', long = "catalog", value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// REST API port (overrides settings)
    #[arg(short = 'p', long = "port", value_name = "PORT")]
    pub port: Option<u16>,

    /// Preload once, report and exit instead of serving the tour
    #[arg(long = "no-server")]
    pub no_server: bool,

    /// Fixed synthetic loading duration in milliseconds
    #[arg(long = "duration-ms", value_name = "MS")]
    pub duration_ms: Option<u64>,

    /// Print the effective catalog as JSON and exit
    #[arg(long = "dump-catalog")]
    pub dump_catalog: bool,

    /// Enable debug logging to file (default: tourplay.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}
