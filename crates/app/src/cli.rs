//! Command-line interface for `ae-chat`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// AE Chat - send prompts to hosted LLMs and keep the conversations
#[derive(Parser, Debug, Clone)]
#[command(name = "ae-chat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Directory holding conversations and settings
    #[arg(long, global = true, env = "AE_CHAT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start a new conversation and print its id
    New {
        /// Conversation title; taken from the first message when empty
        #[arg(default_value = "")]
        title: String,
    },

    /// Send a prompt and print the reply
    Send {
        /// Conversation to append to (defaults to the most recent one)
        #[arg(short, long)]
        conversation: Option<String>,

        /// Image to attach (png, jpeg, gif, webp)
        #[arg(long)]
        image: Option<PathBuf>,

        /// Print the rendered HTML instead of the raw reply
        #[arg(long)]
        html: bool,

        /// Prompt text
        text: String,
    },

    /// List conversations, most recent first
    List,

    /// Print every message in a conversation
    Show { id: String },

    /// Export one conversation, or all of them as JSON when no id is given
    Export {
        id: Option<String>,

        #[arg(short, long, default_value = "markdown")]
        format: String,
    },

    /// Merge conversations from a file produced by `export`
    Import { file: PathBuf },

    /// Search message text across conversations
    Search { query: String },

    /// Delete one conversation
    Delete { id: String },

    /// Delete every conversation
    Clear,

    /// Render a markdown file (or `-` for stdin) to HTML
    Render { file: PathBuf },

    /// Show or change settings
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Check that an API key is accepted by its provider
    ValidateKey {
        /// Provider to check (defaults to the configured one)
        provider: Option<String>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Print current settings with keys redacted
    Show,

    /// Set one value, e.g. `config set provider claude`
    Set { key: String, value: String },
}
