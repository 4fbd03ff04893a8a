//! Mediabridge entry point.
//!
//! `run` starts the long-running bridge; every other invocation is a one-shot
//! command routed through the CLI registry.

use std::{env, error::Error, fs, process};

use clap::Parser;
use mediabridge::{
    cli::{CliService, CommandEnv, formatting::format_error},
    config::{BridgeConfig, ConfigPaths},
    daemon::{self, RunOptions},
    store::BridgeStore,
    tracing_config,
};
use tracing::{Level, info, instrument, span};

#[derive(Parser)]
#[command(name = "mediabridge run")]
#[command(about = "Run the bridge until interrupted")]
struct RunArgs {
    /// Do not open the panel
    #[arg(long)]
    headless: bool,

    /// Store this backend base URL before starting
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().collect();

    ensure_directories()?;

    match args.get(1).map(String::as_str) {
        Some("run") => run_daemon(&args[1..]).await,
        _ => run_cli_command(args.get(1..).unwrap_or(&[])).await,
    }
}

async fn run_daemon(args: &[String]) -> Result<(), Box<dyn Error>> {
    let run_args = RunArgs::parse_from(args);
    let config = BridgeConfig::load()?;

    tracing_config::init_with_file(config.general.log_level)?;
    let _span = span!(Level::INFO, "mediabridge").entered();
    info!("Starting media bridge");

    daemon::run(
        config,
        RunOptions {
            headless: run_args.headless,
            base_url: run_args.base_url,
        },
    )
    .await?;

    Ok(())
}

/// Executes one CLI command.
///
/// The first argument is the category, the second the command name and the
/// rest are passed to the command. No category prints help.
///
/// # Errors
/// Returns error if the config or the store cannot be loaded.
async fn run_cli_command(args: &[String]) -> Result<(), Box<dyn Error>> {
    tracing_config::init_cli_mode()?;

    let config = BridgeConfig::load()?;
    let store =
        BridgeStore::open(&ConfigPaths::store_file()?, &config.backend.default_base_url).await?;
    let cli_service = CliService::new(CommandEnv::new(config, store));

    let category = args.first().map(String::as_str).unwrap_or("help");
    if matches!(category, "help" | "--help" | "-h") {
        println!("{}", cli_service.help_text());
        return Ok(());
    }

    let command = args.get(1).map(String::as_str).unwrap_or("");
    let command_args = args.get(2..).unwrap_or(&[]);

    match cli_service
        .execute_command(category, command, command_args)
        .await
    {
        Ok(output) => {
            if !output.trim().is_empty() {
                println!("{output}");
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", format_error(&e.to_string()));
            process::exit(1);
        }
    }
}

#[instrument]
fn ensure_directories() -> Result<(), Box<dyn Error>> {
    let config_dir = ConfigPaths::config_dir()?;
    if !config_dir.exists() {
        info!("Creating config directory: {}", config_dir.display());
        fs::create_dir_all(&config_dir)?;
    }
    Ok(())
}
