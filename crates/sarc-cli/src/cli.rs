use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use sarc_pipeline::ForceStage;
use sarc_registry::ConflictChoice;
use sarc_types::CompressionMethod;

#[derive(Parser)]
#[command(
    name = "sarc",
    about = "Secret archive: compress and encrypt files into a local vault",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Vault root holding import/, vault/, out/ and keys/
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the vault layout and a default sarc.toml
    Init(InitArgs),
    /// Compress and encrypt a file or directory into the vault
    Ingest(IngestArgs),
    /// Restore a vault entry to the out directory
    Egress(EgressArgs),
    /// List vault entries
    List(ListArgs),
    /// Show entries and drift between registry and vault
    Status(StatusArgs),
    /// Report drift and optionally prune dangling entries
    Reconcile(ReconcileArgs),
    /// Run a single pipeline stage by hand
    Force(ForceArgs),
}

#[derive(Args)]
pub struct InitArgs {}

#[derive(Args)]
pub struct IngestArgs {
    /// File or directory to ingest; relative paths are looked up in import/ first
    pub source: Option<PathBuf>,
    #[arg(short, long)]
    pub method: Option<CompressionMethod>,
    /// Logical name to use instead of the source's stem
    #[arg(long)]
    pub name: Option<String>,
    /// Settle a name collision without asking
    #[arg(long, value_enum)]
    pub on_conflict: Option<ConflictPolicy>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ConflictPolicy {
    Replace,
    KeepBoth,
}

impl From<ConflictPolicy> for ConflictChoice {
    fn from(policy: ConflictPolicy) -> Self {
        match policy {
            ConflictPolicy::Replace => ConflictChoice::Replace,
            ConflictPolicy::KeepBoth => ConflictChoice::KeepBoth,
        }
    }
}

#[derive(Args)]
pub struct EgressArgs {
    pub name: Option<String>,
}

#[derive(Args)]
pub struct ListArgs {}

#[derive(Args)]
pub struct StatusArgs {}

#[derive(Args)]
pub struct ReconcileArgs {
    /// Remove registry entries whose vault object is missing
    #[arg(long)]
    pub prune: bool,
    #[arg(short, long, requires = "prune")]
    pub yes: bool,
}

#[derive(Args)]
pub struct ForceArgs {
    /// containerize, compress, encrypt, decrypt, decompress or extract
    pub stage: ForceStage,
    pub input: PathBuf,
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    #[arg(short, long)]
    pub method: Option<CompressionMethod>,
}
