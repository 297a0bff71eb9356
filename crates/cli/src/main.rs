mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "custodia",
    version,
    about = "Normalize custodian cash statements into one canonical layout"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Csv,
    Jsonl,
}

#[derive(Subcommand)]
enum Commands {
    /// Transform statement files into canonical records
    Process {
        /// Configuration file (.json or .toml)
        #[arg(short, long)]
        config: PathBuf,
        /// Source id to use for every input instead of detecting it from the file name
        #[arg(short, long)]
        source: Option<String>,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,
        /// Statement files, or directories whose files are all processed
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Check that a statement file can be processed, without transforming it
    Validate {
        /// Configuration file (.json or .toml)
        #[arg(short, long)]
        config: PathBuf,
        /// Source id to use instead of detecting it from the file name
        #[arg(short, long)]
        source: Option<String>,
        /// Also write the verdict to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Statement file
        file: PathBuf,
    },
    /// Load and validate a configuration file
    Check {
        /// Configuration file (.json or .toml)
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Process {
            config,
            source,
            output,
            format,
            inputs,
        } => commands::process::execute(&config, source.as_deref(), output.as_deref(), format, &inputs),
        Commands::Validate {
            config,
            source,
            output,
            file,
        } => commands::validate::execute(&config, source.as_deref(), output.as_deref(), &file),
        Commands::Check { config } => commands::check::execute(&config),
    }
}
