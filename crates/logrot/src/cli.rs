//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "logrot")]
#[command(version, about = "Rotate, compress, replicate and prune log files")]
pub struct Cli {
    /// Path to the config file (.yaml, .yml, .json or .toml)
    #[arg(short, long)]
    pub config: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
