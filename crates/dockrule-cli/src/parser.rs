//! Main CLI parser and top-level argument handling.

use clap::Parser;

use crate::commands::Commands;

/// Run a program and wait until it is ready.
#[derive(Parser, Debug)]
#[command(name = "dockrule")]
#[command(about = "Start a program, stream its output and wait for readiness conditions")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log filter used when `RUST_LOG` is not set.
    pub const fn default_log_filter(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}
