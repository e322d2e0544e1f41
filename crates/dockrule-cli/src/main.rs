//! CLI entry point - the composition root.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dockrule_cli::{Cli, Commands, handlers};
use dockrule_core::WaitSettings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before clap reads them
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.default_log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = WaitSettings::from_env()?;

    match cli.command {
        Commands::Run(args) => {
            if let Err(e) = handlers::run::execute(&args, settings).await {
                eprintln!("Error: {e}");
                std::process::exit(e.exit_code());
            }
        }
    }

    Ok(())
}
