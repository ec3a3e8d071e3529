//! Agora CLI - serve debate sessions over HTTP or simulate one locally
//!
//! # Usage
//!
//! ```bash
//! # Run the HTTP API
//! agora serve --port 8080
//!
//! # Watch two agents debate a motion
//! agora simulate "Cities should ban private cars downtown"
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

mod commands;

use commands::{serve, simulate};

/// Agora - timed, turn-based debates between humans and AI agents
#[derive(Parser)]
#[command(
    name = "agora",
    version,
    about = "Agora CLI - debate session orchestrator",
    long_about = "Agora runs timed, turn-based debate sessions.\n\n\
                  Sessions move through setup, preparation, debate and evaluation;\n\
                  every speech is scored and the session ends with a ranking."
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    #[command(name = "serve")]
    Serve(serve::ServeArgs),

    /// Run an all-agent debate in process and print the outcome
    #[command(name = "simulate")]
    Simulate(simulate::SimulateArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match (&cli.command, cli.verbose) {
        // The server logs like a service unless asked otherwise
        (Commands::Serve(_), 0) => agora_api::init_tracing(),
        (_, verbosity) => setup_logging(verbosity),
    }

    match cli.command {
        Commands::Serve(args) => serve::run(args).await,
        Commands::Simulate(args) => simulate::run(args).await,
    }
}

/// Setup logging based on verbosity level
fn setup_logging(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = match verbosity {
        0 => "warn",
        1 => "info,agora=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();
}

/// Print an error message with an X
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg);
}

/// Print an info message
pub fn print_info(msg: &str) {
    println!("{} {}", "ℹ".blue().bold(), msg);
}
