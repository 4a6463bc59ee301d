use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "policypilot", version, about = "PolicyPilot insurance advisor server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the config file path globally
    #[arg(short, long, global = true, default_value = "config.yaml")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server
    Serve,

    /// Ask questions from the terminal
    Ask {
        /// Chat to continue; without it every question is stateless
        #[arg(long)]
        chat: Option<Uuid>,
        /// Owner check for --chat
        #[arg(long)]
        user: Option<String>,
    },

    /// Manage stored chats
    Chats {
        #[command(subcommand)]
        action: ChatAction,
    },

    /// Prepare and upload insurer documents to the vector index
    Ingest {
        #[command(subcommand)]
        action: IngestAction,
    },
}

#[derive(Subcommand)]
pub enum ChatAction {
    /// Create a new chat
    Create {
        #[arg(short, long)]
        user: String,
        #[arg(short, long, default_value = "New Chat")]
        name: String,
    },

    /// List a user's chats, most recent first
    List {
        #[arg(short, long)]
        user: String,
    },

    /// Rename a chat
    Rename {
        id: Uuid,
        #[arg(short, long)]
        name: String,
    },

    /// Delete a chat and its messages
    Delete { id: Uuid },

    /// Export a chat transcript to a .txt file
    Export {
        id: Uuid,
        /// Output file (defaults to chat_<id>.txt)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum IngestAction {
    /// Chunk one insurer JSON document
    Chunk {
        input: PathBuf,
        /// Defaults to <input stem>_preprocessed.json next to the input
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Merge every *_preprocessed.json in a directory
    Combine {
        dir: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Embed chunks and upsert them into the vector index
    Upload {
        path: PathBuf,
        #[arg(short, long, default_value_t = 100)]
        batch_size: usize,
    },
}
