mod logging;
mod simulate;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use huddle_session::SessionConfig;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "huddle")]
#[command(about = "Run and inspect mesh room sessions")]
struct Cli {
    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join several local members to one room and report the resulting mesh.
    Simulate(simulate::SimulateArgs),

    /// Print the effective session configuration as JSON.
    Config {
        #[arg(long)]
        config: Option<PathBuf>,

        /// Drop the STUN servers and gather host candidates only.
        #[arg(long)]
        no_stun: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::setup_tracing_subscriber(&cli.log_level)?;

    match cli.command {
        Commands::Simulate(args) => simulate::run(args).await?,
        Commands::Config { config, no_stun } => {
            let config = load_config(config.as_deref(), no_stun)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

pub(crate) fn load_config(path: Option<&Path>, no_stun: bool) -> Result<SessionConfig> {
    let mut config = match path {
        Some(path) => SessionConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => SessionConfig::default(),
    };
    if no_stun {
        config.ice_servers.clear();
    }
    Ok(config)
}
