use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod sink;

use commands::demo::{execute_demo, DemoArgs};
use commands::session::{execute_join, execute_mint, JoinArgs, MintArgs};

/// Causeway Command Line Interface
///
/// Mint session tokens, join them in a fresh context, or walk through a
/// two-context propagation demo.
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// TOML file with context configuration
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Show debug diagnostics on stderr
    #[clap(long, short, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mint a session and print its token
    Mint(MintArgs),

    /// Join a session from a token and print its identity
    Join(JoinArgs),

    /// Walk a session through two contexts
    Demo(DemoArgs),
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let context_config = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Mint(args) => execute_mint(&args, context_config),
        Commands::Join(args) => execute_join(&args, context_config),
        Commands::Demo(args) => execute_demo(&args, context_config),
    }
}
