//! `dockrule` command line: run a program, stream its output and gate on
//! readiness conditions.
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Silence unused dev-dependency warnings
#[cfg(test)]
use tokio_test as _;

// Used by the binary only
use anyhow as _;
use dotenvy as _;
use tracing_subscriber as _;

pub mod commands;
pub mod error;
pub mod handlers;
pub mod parser;

pub use commands::{Commands, LogOutput, RunArgs};
pub use error::CliError;
pub use parser::Cli;
