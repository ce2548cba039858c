//! Command-line interface definitions.
//!
//! Every subcommand prints its result as JSON on stdout; logs go to stderr.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to config.toml (defaults to the platform config directory)
    #[arg(short, long, global = true, env = "HEADLINE_KEEPER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Fetch the configured source page and store any new articles
    Scrape,

    /// List stored articles
    List {
        /// Only articles that have been saved
        #[arg(long)]
        saved: bool,
    },

    /// Show one article with its note
    Show { id: i64 },

    /// Mark an article as saved
    Save { id: i64 },

    /// Attach a note to an article (also marks it saved)
    Note {
        id: i64,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long)]
        body: String,
    },

    /// Clear an article's saved flag and note reference
    Unsave { id: i64 },

    /// Show a note by its own id
    ShowNote { id: i64 },

    /// Delete every article and every note
    Clear,
}
