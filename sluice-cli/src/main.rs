//! Sluice CLI - run and validate pipeline definition scripts.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Sluice - slot-pooled dataflow pipeline engine.
#[derive(Parser)]
#[command(name = "sluice")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline definition, feeding lines from stdin through the
    /// memory ingress and printing each round's output
    Run {
        /// Path to the pipeline definition script
        file: String,

        /// Graph to run when the script defines several
        #[arg(short, long)]
        graph: Option<String>,

        /// Runtime build arguments, repeatable (key=value)
        #[arg(short, long = "arg", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        args: Vec<(String, String)>,
    },

    /// Parse and cross-reference a definition script without running it
    Check {
        /// Path to the pipeline definition script
        file: String,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run { file, graph, args } => commands::run::execute(&file, graph.as_deref(), args),
        Commands::Check { file } => commands::check::execute(&file),
    }
}
