use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tfmirror")]
#[command(about = "Caching mirror for Terraform's provider and module registries", long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file; overrides `TFM_CONFIG` and the
    /// default `config/tfmirror.toml` lookup.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the protocol server and the background job engine in-process.
    Serve,

    /// Apply pending Metadata Store migrations and exit.
    Migrate,

    /// Trigger an online database backup and exit.
    Backup,
}
