//! Command-line interface for repo-migrate
//!
//! Provides `prune` and `rewrite` subcommands plus shell completion
//! generation.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod prune;
mod rewrite;
mod utils;

/// Rewrite imports and prune transitively dead files across a source tree
#[derive(Parser)]
#[command(name = "repo-migrate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (sets log level to DEBUG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Delete every file depending, transitively, on a deprecated module
    Prune(Box<prune::PruneArgs>),

    /// Apply rewrite rules across the tree without deleting anything
    Rewrite(rewrite::RewriteArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // Wire verbose flag to the tracing log level.
    // RUST_LOG in the environment always takes precedence; --verbose falls back to DEBUG.
    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    match cli.command {
        Commands::Prune(args) => prune::run(*args),
        Commands::Rewrite(args) => rewrite::run(args),
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "repo-migrate",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}
