use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::model::task::Priority;

#[derive(Parser)]
#[command(
    name = "tagscan",
    about = concat!(
        "tagscan v",
        env!("CARGO_PKG_VERSION"),
        " - TODO, FIXME, BUG and NOTE comments as a task list"
    ),
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Scan a different workspace directory
    #[arg(short = 'C', long = "project-dir", global = true)]
    pub project_dir: Option<String>,

    /// Tag to recognize instead of the configured set (repeatable)
    #[arg(long = "tag", global = true)]
    pub tags: Vec<String>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan the workspace and print annotations grouped by file (default)
    Scan(ScanArgs),
    /// List annotations one per line
    List(FilterArgs),
    /// Set or clear an annotation's priority in its source file
    Priority(PriorityArgs),
    /// Toggle an annotation's pin marker in its source file
    Pin(PinArgs),
    /// Ask a local model for a suggestion on an annotation
    Suggest(SuggestArgs),
    /// Rescan whenever workspace files change
    Watch(FilterArgs),
}

// ---------------------------------------------------------------------------
// Read command args
// ---------------------------------------------------------------------------

/// Filters shared by the read commands
#[derive(Args, Clone, Default)]
pub struct FilterArgs {
    /// Only this tag (case-insensitive; `all` for every tag)
    #[arg(long = "type")]
    pub task_type: Option<String>,
    /// Only this priority: low, medium, high or all
    #[arg(long)]
    pub priority: Option<String>,
    /// Case-insensitive search over text, tag, priority and file name
    #[arg(long)]
    pub search: Option<String>,
}

#[derive(Args)]
pub struct ScanArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
    /// Show advisory suggestions under each annotation
    #[arg(long)]
    pub suggestions: bool,
}

// ---------------------------------------------------------------------------
// Write command args
// ---------------------------------------------------------------------------

/// Priority level accepted on the command line. `none` clears it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LevelArg {
    Low,
    Medium,
    High,
    None,
}

impl LevelArg {
    pub fn priority(self) -> Option<Priority> {
        match self {
            LevelArg::Low => Some(Priority::Low),
            LevelArg::Medium => Some(Priority::Medium),
            LevelArg::High => Some(Priority::High),
            LevelArg::None => None,
        }
    }
}

#[derive(Args)]
pub struct PriorityArgs {
    /// Annotation identity, or `path:line`
    pub task: String,
    /// New priority
    #[arg(value_enum)]
    pub level: LevelArg,
}

#[derive(Args)]
pub struct PinArgs {
    /// Annotation identity, or `path:line`
    pub task: String,
}

#[derive(Args)]
pub struct SuggestArgs {
    /// Annotation identity, or `path:line`
    pub task: String,
    /// Model to use instead of the configured one
    #[arg(long)]
    pub model: Option<String>,
    /// Seconds to wait for the model
    #[arg(long, default_value_t = 120)]
    pub timeout: u64,
}
