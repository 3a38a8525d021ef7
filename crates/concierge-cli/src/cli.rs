//! CLI argument definitions for the `concierge` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Concierge -- a rule-based hotel chat assistant.
#[derive(Parser)]
#[command(
    name = "concierge",
    version,
    about = "Concierge -- rule-based hotel chat assistant",
    long_about = "Classifies guest messages, runs booking, spa, room service and complaint \
                  dialogues, and hands guests to staff when it cannot help."
)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = crate::config::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Chat with the assistant in the terminal.
    Chat {
        /// SQLite database for the conversation log (overrides the config).
        #[arg(long)]
        db: Option<PathBuf>,

        /// Keep the conversation log in memory only.
        #[arg(long, conflicts_with = "db")]
        ephemeral: bool,
    },

    /// Classify a single message and print the result as JSON.
    Classify {
        /// The guest message to classify.
        text: String,
    },

    /// List the registered conversation flows and their steps.
    Flows {
        /// Print full definitions as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show configuration and collaborator status.
    Status,
}
