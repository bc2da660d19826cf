use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "redline",
    about = "Redline: structural diff and merge for legal documents",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Engine configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check a document's tree and identity fields
    Validate(ValidateArgs),
    /// Compare two documents block by block
    Diff(DiffArgs),
    /// Merge an incoming document into a base document
    Merge(MergeArgs),
    /// Recompute anchors and hashes under the current hash contract
    Rehash(RehashArgs),
    /// Rebuild a workflow from its event history and verify it
    Replay(ReplayArgs),
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Document JSON file
    pub document: PathBuf,
}

#[derive(Args)]
pub struct DiffArgs {
    pub left: PathBuf,
    pub right: PathBuf,
    /// Also list unchanged blocks
    #[arg(long)]
    pub all: bool,
}

#[derive(Args)]
pub struct MergeArgs {
    pub base: PathBuf,
    pub incoming: PathBuf,
    /// Common ancestor for a three-way merge
    #[arg(long)]
    pub ancestor: Option<PathBuf>,
    /// Surface every deletion as a conflict
    #[arg(long)]
    pub preserve_deletions: bool,
    /// Write the merged document here
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct RehashArgs {
    pub document: PathBuf,
    /// Write the rehashed document here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct ReplayArgs {
    /// Workflow state JSON file
    pub workflow: PathBuf,
}
