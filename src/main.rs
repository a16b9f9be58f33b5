//! reelcast - browse a video catalog and play it locally or on a Chromecast
//!
//! # Usage
//!
//! ```bash
//! reelcast browse
//! reelcast info "Big Buck Bunny"
//! reelcast play "Big Buck Bunny" --device "Living Room TV"
//! reelcast devices --json
//! ```

use clap::Parser;

use reelcast::cli::{Cli, Command, ExitCode, Output};
use reelcast::commands;
use reelcast::config::Config;
use reelcast::logging;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logging(cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    run_cli(cli).await.into()
}

/// Run CLI command and return exit code
async fn run_cli(cli: Cli) -> ExitCode {
    let output = Output::new(&cli);
    let device = cli.device.as_deref();

    let config = match &cli.config {
        Some(path) => match Config::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                return output.error(
                    format!("Failed to read config {}: {}", path.display(), e),
                    ExitCode::InvalidArgs,
                )
            }
        },
        None => Config::load(),
    };
    let catalog_url = cli
        .catalog
        .clone()
        .unwrap_or_else(|| config.effective_catalog_url());
    tracing::debug!(%catalog_url, "Resolved catalog URL");

    match cli.command {
        Command::Browse(cmd) => commands::browse_cmd(cmd, &catalog_url, &output).await,

        Command::Info(cmd) => commands::info_cmd(cmd, &catalog_url, &output).await,

        Command::Play(cmd) => {
            commands::play_cmd(cmd, device, &config, &catalog_url, &output).await
        }

        Command::Devices(cmd) => commands::devices_cmd(cmd, &config, &output).await,
    }
}
