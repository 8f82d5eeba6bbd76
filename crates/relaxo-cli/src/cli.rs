use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "relaxo",
    about = "Relaxo: transactional document database on a content-addressed object graph",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Database directory
    #[arg(long, global = true, default_value = ".relaxo")]
    pub db: PathBuf,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a database (or open an existing one) and show its layout
    Init,
    /// Show commit history of a branch
    Log(LogArgs),
    /// List a directory
    Ls(LsArgs),
    /// Print the document at a path
    Cat(CatArgs),
    /// Store a JSON document at a path and commit
    Put(PutArgs),
    /// Remove a path and commit
    Rm(RmArgs),
    /// Show document-level changes between two revisions
    Diff(DiffArgs),
    /// List branches, or delete one
    Branches(BranchesArgs),
}

/// Options shared by commands that read one revision.
#[derive(Args)]
pub struct RevisionArgs {
    /// Branch name or full commit id; defaults to the default branch
    #[arg(short, long)]
    pub rev: Option<String>,
}

#[derive(Args)]
pub struct LogArgs {
    #[arg(short, long)]
    pub branch: Option<String>,
    /// Only commits that changed this path
    #[arg(short, long)]
    pub path: Option<String>,
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
    #[arg(long)]
    pub oneline: bool,
}

#[derive(Args)]
pub struct LsArgs {
    #[arg(default_value = "")]
    pub dir: String,
    /// List every document beneath DIR
    #[arg(short = 'R', long)]
    pub recursive: bool,
    #[command(flatten)]
    pub revision: RevisionArgs,
}

#[derive(Args)]
pub struct CatArgs {
    pub path: String,
    #[command(flatten)]
    pub revision: RevisionArgs,
}

#[derive(Args)]
pub struct PutArgs {
    pub path: String,
    /// Document as JSON text
    pub json: String,
    #[arg(short, long)]
    pub message: Option<String>,
    #[arg(short, long)]
    pub branch: Option<String>,
}

#[derive(Args)]
pub struct RmArgs {
    pub path: String,
    #[arg(short, long)]
    pub message: Option<String>,
    #[arg(short, long)]
    pub branch: Option<String>,
}

#[derive(Args)]
pub struct BranchesArgs {
    /// Delete this branch; its commits stay readable by id
    #[arg(short, long, value_name = "BRANCH")]
    pub delete: Option<String>,
}

#[derive(Args)]
pub struct DiffArgs {
    pub old: String,
    pub new: String,
}
