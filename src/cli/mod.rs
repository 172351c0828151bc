//! Command-line interface for arxiv-pack
//!
//! Provides `pack`, `list`, `strip` and `completions` subcommands.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod list;
mod pack;
mod strip;
mod utils;

/// Prepare a LaTeX project for arXiv submission
#[derive(Parser)]
#[command(name = "arxiv-pack")]
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
    /// Strip comments, drop unused files, compile for the .bbl and write the archive
    Pack(Box<pack::PackArgs>),

    /// Show which files would be packed, without writing anything
    List(list::ListArgs),

    /// Print a LaTeX file with its comments removed
    Strip(strip::StripArgs),

    /// Generate a shell completion script
    Completions {
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
        Commands::Pack(args) => pack::run(*args),
        Commands::List(args) => list::run(args),
        Commands::Strip(args) => strip::run(args),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "arxiv-pack", &mut std::io::stdout().lock());
            Ok(())
        }
    }
}
