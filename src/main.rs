use std::path::PathBuf;

use anyhow::Result;
use bt_device_monitor_lib::{commands, config::AppConfig, logging};
use clap::{Parser, Subcommand};
use log::{info, warn};

#[derive(Parser)]
#[command(name = "bt-device-monitor")]
#[command(about = "Tracks the connection state of Bluetooth devices", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file, defaults to the per-user config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a recorded adapter session and print the resulting device lists
    Replay {
        /// JSON script with the adapter's devices and events
        script: PathBuf,
        /// Print a snapshot after every event
        #[arg(long)]
        each: bool,
    },
    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => AppConfig::default_path()?,
    };
    // init-config must work even when the existing file no longer parses
    let reads_config = !matches!(cli.command, Commands::InitConfig { .. });
    let loaded = if reads_config {
        AppConfig::try_load(&config_path).await?
    } else {
        None
    };
    let found = loaded.is_some();
    let config = loaded.unwrap_or_default();

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    logging::init(level)?;
    if found {
        info!("Config loaded from {:?}", config_path);
    } else if reads_config {
        warn!("Config file not found at {:?}, using default.", config_path);
    }

    match cli.command {
        Commands::Replay { script, each } => {
            for snapshot in commands::replay(&config, &script, each).await? {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            }
        }
        Commands::InitConfig { force } => {
            commands::init_config(&config_path, force).await?;
            println!("Wrote {}", config_path.display());
        }
        Commands::ShowConfig => println!("{}", commands::show_config(&config)?),
    }
    Ok(())
}
