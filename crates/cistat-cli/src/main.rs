//! cistat CLI - TeamCity build metrics for Graphite
//!
//! Usage:
//!   cistat                      Poll using ./config.yml
//!   cistat <config>             Poll using the given config file
//!   cistat <config> --once      Run a single iteration and exit

use anyhow::{Context, Result};
use clap::Parser;
use cistat_core::config::DEFAULT_CONFIG_PATH;
use cistat_core::Settings;
use cistat_graphite::GraphiteSender;
use cistat_poller::{PollState, Poller};
use cistat_teamcity::TeamCityClient;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Process exit status when the config file cannot be loaded
const CONFIG_ERROR_EXIT: u8 = 1;

#[derive(Parser)]
#[command(name = "cistat")]
#[command(author, version, about = "Poll TeamCity and report build metrics to Graphite")]
struct Cli {
    /// Path to the config file
    #[arg(default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Run a single poll iteration and exit
    #[arg(long)]
    once: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install logger: {}", e);
    }

    let settings = match load_settings(&cli.config) {
        Ok(settings) => settings,
        Err(code) => return ExitCode::from(code),
    };

    match run(settings, cli.once) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR - {:#}", e);
            ExitCode::from(1)
        }
    }
}

/// Load settings or yield the exit status the process should stop with
fn load_settings(path: &Path) -> std::result::Result<Settings, u8> {
    Settings::load(path).map_err(|e| {
        tracing::error!("{}", e);
        println!("ERROR - Configuration error!");
        CONFIG_ERROR_EXIT
    })
}

fn run(settings: Settings, once: bool) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;

    runtime.block_on(async move {
        let ci = TeamCityClient::from_settings(&settings)
            .context("Failed to create TeamCity client")?;
        let sink = GraphiteSender::from_settings(&settings);

        info!(
            "Polling {} every {:?}, reporting to {}",
            settings.teamcity_server,
            settings.poll_interval,
            sink.addr()
        );

        let poller = Poller::new(&settings, ci, sink);
        let state = PollState::starting_now();

        if once {
            let state = poller.run_iterations(state, 1).await;
            info!("Watermark now {}", state.watermark);
        } else {
            poller.run(state).await;
        }

        Ok(())
    })
}
