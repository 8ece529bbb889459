//! CLI module for courtside
//!
//! Argument parsing and terminal rendering of answers and batch reports.

pub mod args;
pub mod output;

pub use args::{Args, Commands, ConfigCommand, Verbosity};
pub use output::{eval_progress_bar, format_answer, format_report, format_stats};
