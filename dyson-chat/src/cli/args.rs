//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Dyson - chat with a DysonASI service from the terminal
#[derive(Parser, Debug)]
#[command(name = "dyson")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Chat service endpoint (overrides the config file)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Config file to use instead of ~/.dyson/config.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding saved chats
    #[arg(long, global = true)]
    pub library_dir: Option<PathBuf>,

    /// Do not save transcripts to the library
    #[arg(long, global = true)]
    pub no_save: bool,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Message to send once (starts an interactive chat when omitted)
    #[arg(trailing_var_arg = true)]
    pub message: Vec<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive chat (the default without a message)
    Chat,

    /// Format reply text as HTML
    Format {
        /// File to read (stdin when omitted)
        file: Option<PathBuf>,
    },

    /// Browse saved chats
    Library {
        #[command(subcommand)]
        action: LibraryAction,
    },

    /// Run the local development chat endpoint
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "5000")]
        port: u16,
    },
}

/// Library actions
#[derive(Subcommand, Debug, Clone)]
pub enum LibraryAction {
    /// List saved chats, newest first
    List,
    /// Print one saved chat
    Show {
        /// Saved chat ID
        id: String,
    },
}
