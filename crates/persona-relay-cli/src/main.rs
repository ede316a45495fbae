use std::path::PathBuf;

use clap::{Parser, Subcommand};
use persona_relay_cli::commands::{AskCommand, PersonasCommand};
use persona_relay_cli::error::CliResult;
use persona_relay_cli::output::OutputFormat;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Relay CLI - Talk to a running persona relay and inspect its personas")]
#[command(version)]
pub struct Cli {
    #[clap(long, short, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[clap(long, short = 'c', global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Send a message through the relay")]
    Ask(AskCommand),

    #[clap(about = "List the configured personas")]
    Personas(PersonasCommand),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };

    match &cli.command {
        Command::Ask(cmd) => cmd.execute(format).await,
        Command::Personas(cmd) => cmd.execute(cli.config.as_deref(), format).await,
    }
}
