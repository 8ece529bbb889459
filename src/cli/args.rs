//! Command-line argument parsing for courtside
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// courtside - Hybrid question answering over basketball stats and discussion
#[derive(Parser, Debug)]
#[command(name = "courtside")]
#[command(version)]
#[command(about = "Route basketball questions to stats, discussion threads, or both", long_about = None)]
pub struct Args {
    /// Configuration file path (defaults to ~/.courtside/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: default (info), -v (debug), -vv (trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (warnings and errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a single question
    Ask {
        /// The question to answer
        #[arg(value_name = "QUESTION")]
        question: String,

        /// JSON file holding earlier turns of the conversation
        #[arg(long)]
        history: Option<PathBuf>,

        /// Print the classification and retrieved context
        #[arg(long)]
        explain: bool,
    },

    /// Run a batch evaluation over a JSONL dataset
    Eval {
        /// Dataset file, one question per line
        #[arg(value_name = "DATASET")]
        dataset: PathBuf,

        /// Skip questions already in the checkpoint
        #[arg(long)]
        resume: bool,

        /// Checkpoint file (overrides the config)
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Questions in flight at once (overrides the config)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Write the report as JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Check that Ollama is running and the model is pulled
    Doctor,

    /// Show or initialize the configuration file
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }
}

impl Verbosity {
    /// Default tracing filter when `RUST_LOG` is unset
    pub fn log_filter(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "warn",
            Verbosity::Normal => "info",
            Verbosity::Verbose => "courtside=debug,info",
            Verbosity::VeryVerbose => "courtside=trace,debug",
        }
    }

    /// Check if should show progress bars
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }
}
