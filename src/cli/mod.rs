//! CLI module for ares-research
//!
//! Command-line parsing for the `ares-research` binary. Uses clap for
//! argument parsing and owo-colors for colored terminal output.

pub mod commands;
pub mod init;
pub mod output;

use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;

/// ares-research - branching, AI-assisted web research
///
/// Every research round (optimize, search, rank, select, fetch, report,
/// follow-up) is recorded as nodes of a persistent research graph that can
/// be branched and consolidated.
#[derive(Parser, Debug)]
#[command(
    name = "ares-research",
    author = "Dirmacs <build@dirmacs.com>",
    version,
    about = "ares-research - branching, AI-assisted web research",
    long_about = "Runs multi-step research rounds and records them as a persistent graph.\n\
                  Reports can be branched into new rounds from their follow-up terms\n\
                  and consolidated into combined reports.",
    after_help = "EXAMPLES:\n    \
                  ares-research init                          # Scaffold research.toml\n    \
                  ares-research research \"rust async runtimes\" # Run a full round\n    \
                  ares-research research test --test          # Offline canned round\n    \
                  ares-research branch <report-id> --term 0   # Follow up on a report\n    \
                  ares-research consolidate --selected        # Merge selected reports\n    \
                  ares-research show                          # Print the research graph"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "research.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scaffold research.toml, .env.example and the data directory
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,

        /// Model provider to configure (openai, ollama, or both)
        #[arg(long, default_value = "openai")]
        provider: String,
    },

    /// Show configuration information
    Config {
        /// Validate the configuration file
        #[arg(long)]
        validate: bool,
    },

    /// Manage research projects
    #[command(subcommand)]
    Project(ProjectCommands),

    /// Start a research round and generate its report
    Research(ResearchArgs),

    /// Generate a report for a selection node
    Report {
        /// Selection node id
        selection: String,

        /// Use exactly these result ids instead of ranking (repeatable)
        #[arg(long = "pick", value_name = "RESULT_ID")]
        picks: Vec<String>,
    },

    /// Retry a failed report
    Retry {
        /// Failed report node id
        report: String,
    },

    /// Start a new round under a report
    Branch(BranchArgs),

    /// Toggle a report in the consolidation selection
    Select {
        /// Report node id
        report: String,
    },

    /// Merge two or more reports into a consolidated report
    #[command(group(ArgGroup::new("source").required(true).args(["reports", "selected"])))]
    Consolidate {
        /// Report node ids
        reports: Vec<String>,

        /// Use the reports currently selected for consolidation
        #[arg(long)]
        selected: bool,
    },

    /// Add a URL of your own to a selection
    AddUrl {
        /// Selection node id
        selection: String,
        url: String,
    },

    /// Add a local document to a selection; its text is used as-is
    AddDoc {
        /// Selection node id
        selection: String,
        /// Text file to read
        file: PathBuf,
    },

    /// Delete a node and everything below it
    Delete {
        /// Node id
        node: String,
    },

    /// Show the research graph, or one node in detail
    Show {
        /// Node id
        node: Option<String>,
    },
}

/// Project management subcommands
#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Create a project and make it current
    New {
        name: String,

        /// Copy the graph of an existing project
        #[arg(long, value_name = "PROJECT_ID")]
        from: Option<String>,
    },

    /// List all projects
    List,

    /// Make a project current
    Open { id: String },

    /// Rename the current project
    Rename { name: String },

    /// Delete a project
    Delete { id: String },

    /// Write every project as JSON (stdout when no file is given)
    Export { file: Option<PathBuf> },

    /// Import projects from an export file
    Import { file: PathBuf },
}

#[derive(Args, Debug)]
pub struct ResearchArgs {
    /// Research topic
    pub topic: String,

    /// Report node to branch from
    #[arg(long)]
    pub parent: Option<String>,

    /// Stop after the search stage; pick sources with `report --pick`
    #[arg(long)]
    pub manual: bool,

    /// Recency filter: 24h, week, month, year or all
    #[arg(long)]
    pub time_filter: Option<String>,

    /// Search provider: duckduckgo or bing
    #[arg(long)]
    pub provider: Option<String>,

    /// Use canned data only (no network)
    #[arg(long)]
    pub test: bool,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("target").required(true).args(["term", "query"])))]
pub struct BranchArgs {
    /// Report node id
    pub report: String,

    /// Index of the follow-up term to research
    #[arg(long)]
    pub term: Option<usize>,

    /// Research this query instead of a follow-up term
    #[arg(long)]
    pub query: Option<String>,

    /// Also generate the report for the new round
    #[arg(long)]
    pub report_now: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
