//! CLI module for Spor.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand, ValueEnum};

/// Spor - ask questions about what is said in a video
///
/// Answers are grounded in the video's captions, translated to English when
/// the video has no English track.
#[derive(Parser, Debug)]
#[command(name = "spor")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a question about a video
    Ask {
        /// YouTube URL or video ID
        video: String,

        /// The question to ask
        question: String,

        /// Transcript language to answer from
        #[arg(short, long, default_value = "en")]
        language: String,
    },

    /// Print a video's transcript
    Transcript {
        /// YouTube URL or video ID
        video: String,

        /// Preferred languages, in order (defaults to the configured list)
        #[arg(short, long)]
        language: Vec<String>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: TranscriptFormat,
    },

    /// List the languages a video can be served in
    Languages {
        /// YouTube URL or video ID
        video: String,
    },

    /// Rank a video's transcript chunks for a query
    Search {
        /// YouTube URL or video ID
        video: String,

        /// Search query
        query: String,

        /// Ranking method
        #[arg(short, long, value_enum, default_value = "lexical")]
        method: SearchMethod,

        /// Maximum number of results
        #[arg(short = 'k', long, default_value = "3")]
        limit: usize,

        /// Transcript language
        #[arg(short, long, default_value = "en")]
        language: String,
    },

    /// Start HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage the artifact cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum TranscriptFormat {
    /// Timestamped lines
    Text,
    /// Full transcript as JSON
    Json,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum SearchMethod {
    Lexical,
    Semantic,
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Delete every cached artifact of a video
    Purge {
        /// YouTube URL or video ID
        video: String,
    },

    /// Drop expired entries
    PurgeExpired,

    /// Show cache location and size
    Stats,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Write the current configuration to the config file
    Init,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
