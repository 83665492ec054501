//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::api::SortOrder;

/// planstream - streaming travel-plan generation client
#[derive(Parser)]
#[command(
    name = "planstream",
    about = "Generate travel itineraries over a streaming connection",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a plan from a prompt, streaming updates until completion
    Generate {
        /// What to plan, e.g. "5 days in Pokhara"
        prompt: String,

        /// Auth token (defaults to the configured token env var)
        #[arg(short, long)]
        token: Option<String>,

        /// Write the final snapshot as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Don't record the session's events
        #[arg(long)]
        no_log: bool,
    },

    /// Replay recorded frames through the dispatcher offline
    Replay {
        /// JSONL file with one raw frame per line
        #[arg(required_unless_present = "session", conflicts_with = "session")]
        file: Option<PathBuf>,

        /// Replay the frames recorded for a logged session
        #[arg(short, long)]
        session: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the recorded events of a session
    Events {
        /// Session ID
        session_id: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Query stored plans over the REST API
    Plans {
        #[command(subcommand)]
        command: PlansCommand,
    },

    /// Show logs
    Logs {
        /// Number of lines to show
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },
}

/// Stored-plan subcommands
#[derive(Debug, Subcommand)]
pub enum PlansCommand {
    /// List plans
    List {
        /// Page number (1-based)
        #[arg(short, long, default_value = "1")]
        page: u32,

        /// Plans per page
        #[arg(short = 'n', long, default_value = "10")]
        limit: u32,

        /// Free-text search
        #[arg(short, long)]
        search: Option<String>,

        /// Field to sort by
        #[arg(long)]
        sort: Option<String>,

        /// Sort direction (asc, desc)
        #[arg(long)]
        order: Option<SortOrder>,

        /// Auth token
        #[arg(short, long)]
        token: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Fetch one plan
    Get {
        /// Plan ID
        id: String,

        /// Auth token
        #[arg(short, long)]
        token: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("planstream")
        .join("logs")
        .join("planstream.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// Generate the after_help text with config file lookup and log location
pub fn generate_after_help() -> String {
    debug!("generate_after_help: called");
    let mut help = String::new();

    help.push_str("Config files (first found wins):\n");
    let mut candidates = vec![PathBuf::from(".planstream.yml")];
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("planstream").join("planstream.yml"));
    }
    for path in &candidates {
        let icon = if path.exists() { "\u{2705}" } else { "\u{274C}" };
        help.push_str(&format!("  {} {}\n", icon, path.display()));
    }

    help.push('\n');
    help.push_str(&format!("Logs are written to: {}\n", get_log_path().display()));

    debug!("generate_after_help: returning help text");
    help
}

/// Output format for command results
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => {
                debug!(%s, "OutputFormat::from_str: unknown format");
                Err(format!("Unknown format: {}. Use: text or json", s))
            }
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}
