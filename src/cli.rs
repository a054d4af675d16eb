//! Command-line interface for the monitor daemon.
use clap::Parser;

/// Command-line interface for `onemonitord`.
///
/// Install locations come from `ONE_LOCATION`; everything else from
/// `monitor.conf`.
#[derive(Debug, Parser)]
#[command(name = "onemonitord", version)]
#[command(about = "Monitoring daemon of the cluster manager", long_about = None)]
pub struct Cli {
    /// Validate monitor.conf, print the effective settings as JSON and exit.
    #[arg(long)]
    pub check: bool,
}

/// Parses command-line arguments.
pub fn parse_args() -> Cli {
    Cli::parse()
}
