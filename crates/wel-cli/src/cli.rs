use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "wel",
    about = "World Event Ledger: audit, inspect, and replay exported ledgers",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Refuse appends that would leave an event index gap
    #[arg(long, global = true)]
    pub strict: bool,

    /// Ledger configuration file (TOML)
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
    /// Verify hash chains and index contiguity of an exported ledger
    Verify(VerifyArgs),
    /// List the entries of an exported ledger
    Inspect(InspectArgs),
    /// Print the canonical form and digest of a JSON value
    Canonicalize(CanonicalizeArgs),
    /// Replay one world instance of an exported ledger
    Replay(ReplayArgs),
    /// Append event drafts to a ledger and write the result
    Append(AppendArgs),
}

#[derive(Args)]
pub struct VerifyArgs {
    /// JSON array of ledger entries
    pub file: PathBuf,
}

#[derive(Args)]
pub struct InspectArgs {
    pub file: PathBuf,
    /// Only show this world instance
    #[arg(long)]
    pub world: Option<String>,
    /// Hide REJECTION entries
    #[arg(long)]
    pub replayable: bool,
}

#[derive(Args)]
pub struct CanonicalizeArgs {
    /// JSON document to canonicalize
    pub file: PathBuf,
}

#[derive(Args)]
pub struct ReplayArgs {
    pub file: PathBuf,
    #[arg(long)]
    pub world: String,
    /// Print the replayable entries instead of the folded state
    #[arg(long)]
    pub view: bool,
}

#[derive(Args)]
pub struct AppendArgs {
    /// JSON array of event drafts
    pub drafts: PathBuf,
    /// Existing exported ledger to append to
    #[arg(long)]
    pub ledger: Option<PathBuf>,
    /// Where to write the resulting ledger (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
