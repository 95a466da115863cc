use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "sealkeep",
    about = "Sealkeep: ledger-referenced secret storage",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML config file; defaults apply when omitted.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Save, list and retrieve a secret against in-memory collaborators
    Demo(DemoArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Args)]
pub struct DemoArgs {
    #[arg(long)]
    pub label: String,
    #[arg(long)]
    pub secret: String,
    #[arg(long)]
    pub context: Option<String>,
    /// Decline the first wallet signing prompt
    #[arg(long)]
    pub reject: bool,
}
