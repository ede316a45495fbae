//! Persona Relay daemon - HTTP relay in front of the Gemini API

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use persona_relay::config::Config;
use persona_relay::error::Result;
use persona_relay::relay::RelayServer;

/// Persona Relay - frames chat messages with a persona prompt and forwards them to Gemini
#[derive(Parser)]
#[command(name = "persona-relay")]
#[command(about = "An HTTP relay that forwards persona-framed chat messages to Gemini")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the relay server (default command)
    #[command(name = "serve")]
    Serve {
        /// Override the configured listen address
        #[arg(long, short = 'l')]
        listen: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        None => serve(cli.config, None).await,
        Some(Command::Serve { listen }) => serve(cli.config, listen).await,
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,persona_relay=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn serve(config_path: Option<PathBuf>, listen: Option<String>) -> Result<()> {
    tracing::info!("Starting persona relay");

    let mut config = Config::load(config_path.as_deref())?;
    if let Some(listen) = listen {
        config.server.listen_addr = listen;
    }
    tracing::debug!("Config loaded: {:?}", config);

    if std::env::var(&config.upstream.api_key_env).is_err() {
        tracing::warn!(
            "{} is not set; requests will fail until it is",
            config.upstream.api_key_env
        );
    }

    RelayServer::new(config).serve().await?;

    tracing::info!("Persona relay stopped");
    Ok(())
}
