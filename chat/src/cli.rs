use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command line interface for pipeline chat.
#[derive(Parser, Debug, Default)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Path to the record store database.
    #[arg(long)]
    pub store: Option<PathBuf>,
    /// Act as this user id.
    #[arg(long)]
    pub user: Option<String>,
    /// Enable or disable logging (true/false).
    #[arg(long)]
    pub logging: Option<bool>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Register the current user.
    Register { username: String, nickname: String },
    /// Change the current user's nickname.
    Nickname { nickname: String },
    /// Open the direct conversation with another user.
    Dm { username: String },
    /// Create a group with the given members.
    Group {
        title: String,
        #[arg(num_args = 0..)]
        members: Vec<String>,
    },
    /// Add a user to a group.
    Add { conversation: String, username: String },
    /// Remove a user from a group (yourself to leave).
    Remove { conversation: String, username: String },
    /// Send a message to a conversation.
    Send { conversation: String, text: String },
    /// Print the messages of a conversation.
    History {
        conversation: String,
        /// Keep printing new messages.
        #[arg(long)]
        follow: bool,
    },
    /// List your conversations.
    Inbox,
}
