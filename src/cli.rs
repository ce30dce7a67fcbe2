use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bookclub")]
#[command(author, version, about = "Telegram bot that coordinates a reading club", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot in normal mode
    Run,

    /// Run the bot in staging mode (uses staging environment variables)
    RunStaging,

    /// Add a club admin, or promote an existing member
    AddAdmin {
        /// Telegram username, with or without the leading @
        handle: String,

        /// Display name shown in progress reports
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Put a member stuck in a conversation back to idle
    ResetStatus {
        /// Telegram username, with or without the leading @
        handle: String,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
