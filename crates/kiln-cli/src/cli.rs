//! Argument grammar: one `Cli` top-level parser plus a `Commands`/
//! `QuerySub` split matching §6's command set, styled after `cuenv`'s own
//! `Cli`/`Commands` derive (global flags on the top struct, one
//! `#[command(subcommand)]` enum per level).

use crate::output::OutputFormat;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "kiln")]
#[command(about = "A content-addressed, hermetic build engine")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Labels or selectors to include; empty means "all".
    #[arg(long, global = true)]
    pub include: Vec<String>,

    /// Labels or selectors to exclude; wins over `--include` on overlap.
    #[arg(long, global = true)]
    pub exclude: Vec<String>,

    /// Bound on concurrent target runs. `0` means unbounded.
    #[arg(long, global = true, default_value_t = 0)]
    pub workers: usize,

    /// Disable the interactive renderer.
    #[arg(long, global = true)]
    pub plain: bool,

    /// Output format for machine consumption.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Path to a target-spec document, array, or directory of
    /// `*.kiln.json` files. Defaults to the workspace root.
    #[arg(long, global = true)]
    pub graph: Option<std::path::PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect the linked target graph without running anything.
    Query {
        #[command(subcommand)]
        sub: QuerySub,
    },
    /// Run one or more targets and their dependencies.
    Run {
        /// Target selectors (`//pkg:name`, `:name`, `//pkg/...`,
        /// `label=foo`). Read from stdin (newline-delimited) when empty
        /// and stdin is not a tty.
        fqns: Vec<String>,
    },
    /// Search the linked target set by FQN, package, name, or label.
    Search {
        /// Free-form query, matched by substring or fuzzy edit distance.
        query: String,

        /// Maximum number of hits to display.
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Subcommand, Debug)]
pub enum QuerySub {
    /// Print the resolved cache root and workspace root.
    Config,
    /// List every linked target's FQN.
    Alltargets,
    /// Print one target's direct and transitive dependencies.
    Graph {
        /// The target to inspect.
        fqn: String,
    },
    /// Render the whole target graph as Graphviz dot.
    Graphdot,
    /// Print the on-disk output directory a target would stage into.
    Outdir {
        /// The target to inspect.
        fqn: String,
    },
    /// List targets whose hash-dep files changed since `since`.
    Changes {
        /// A git ref (branch, tag, or commit) to diff against.
        since: String,
    },
}
