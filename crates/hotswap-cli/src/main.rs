//! Hotswap developer tool
//!
//! Builds annotation proxy classes from JSON, prints the annotations a
//! class file carries, and runs the structural verifier over class files.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hotswap")]
#[command(about = "Annotation proxy tooling for the hotswap agent", long_about = None)]
#[command(version)]
struct Cli {
    /// Agent configuration file (hotswap.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize a proxy class from annotations given as JSON
    Proxy {
        /// JSON file: a list of annotations, or with --parameters a list per parameter
        input: PathBuf,
        /// Output class file
        #[arg(short, long)]
        output: PathBuf,
        /// Internal name for the proxy (default: next name under the configured prefix)
        #[arg(long)]
        name: Option<String>,
        /// Build a parameter proxy
        #[arg(long)]
        parameters: bool,
    },

    /// Print the annotations carried by a class file as JSON
    Dump {
        /// Class file
        file: PathBuf,
    },

    /// Verify class file structure
    Verify {
        /// Class files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Proxy {
            input,
            output,
            name,
            parameters,
        } => commands::proxy::execute(&config, &input, &output, name, parameters),
        Commands::Dump { file } => commands::dump::execute(&file),
        Commands::Verify { files } => commands::verify::execute(&files),
    }
}
