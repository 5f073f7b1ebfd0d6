//! Command-line interface for strictly_chess.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Strictly Chess - synchronized two-player chess sessions
#[derive(Parser, Debug)]
#[command(name = "strictly_chess")]
#[command(about = "Play chess against another person over a shared session store", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Who is running the command
    #[command(flatten)]
    pub identity: Identity,

    /// Path to the TOML config file
    #[arg(long, global = true, default_value = "strictly_chess.toml")]
    pub config: PathBuf,

    /// Override the database file from the config
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Identity handed over by the identity provider
#[derive(Args, Debug)]
pub struct Identity {
    /// Stable user id
    #[arg(long, global = true, env = "STRICTLY_CHESS_USER_ID", default_value = "anonymous")]
    pub user_id: String,

    /// Display name shown to the other player
    #[arg(long, global = true, env = "STRICTLY_CHESS_NAME")]
    pub name: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new session and print its share link
    Create,

    /// Join a session by id or share link
    Join {
        /// Session id or share link
        target: String,
    },

    /// Submit a move
    Move {
        /// Session id
        session_id: String,

        /// Origin square, e.g. e2
        from: String,

        /// Target square, e.g. e4
        to: String,

        /// Promotion piece (q, r, b, n)
        #[arg(long)]
        promotion: Option<char>,
    },

    /// Print the current status of a session
    Status {
        /// Session id
        session_id: String,
    },

    /// Follow a session live until Ctrl-C
    Watch {
        /// Session id
        session_id: String,
    },

    /// Check that the move history replays to the stored position
    Replay {
        /// Session id
        session_id: String,
    },
}
