//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "claritas",
    version,
    about = "Passage retrieval over the God Speaks and Life Eternal corpora",
    long_about = "Claritas embeds a question, finds the closest passages in one book's partition, \
                  rescores them with router hints and returns the best few. When similarity search \
                  is unavailable it falls back to a literal term-overlap scan."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/claritas/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Retrieve the passages most relevant to a question
    Retrieve {
        /// Question text
        query: String,

        /// Book to search ("God Speaks" or "Life Eternal")
        #[arg(short, long)]
        book: String,

        /// Router topic hint (repeatable)
        #[arg(short, long = "topic")]
        topics: Vec<String>,

        /// Router keyword hint (repeatable)
        #[arg(short, long = "keyword")]
        keywords: Vec<String>,

        /// Maximum number of passages (defaults to retrieval.top_k)
        #[arg(short = 'n', long)]
        top_k: Option<usize>,

        /// Minimum raw similarity (defaults to retrieval.score_threshold)
        #[arg(long)]
        threshold: Option<f32>,

        /// Profile to apply (e.g. "broad", "precise")
        #[arg(short, long)]
        profile: Option<String>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Convert raw chunk files into canonical passages
    Normalize {
        /// Book the chunks belong to
        #[arg(short, long)]
        book: String,

        /// Raw chunk JSON file, or a directory of them
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the normalized passages
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Embed normalized passages and load them into the book's partition
    Ingest {
        /// Book the passages belong to
        #[arg(short, long)]
        book: String,

        /// Normalized passages JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Speaker for passages that carry none (defaults to ranking.primary_speaker)
        #[arg(short, long)]
        speaker: Option<String>,
    },

    /// List partitions with their dimension and passage count
    Partitions {
        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
