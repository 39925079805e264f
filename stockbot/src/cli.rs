use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "stockbot", version, about = "Watch a storefront for restocks and shout about it in Discord")]
pub struct Args {
    /// Config file (defaults to ./stockbot.toml, then the user config directory)
    #[arg(short, long, global = true, env = "STOCKBOT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Debug-level logging for the bot's own modules
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Connect to chat and start watching (the default)
    Watch,
    /// Print the resolved configuration with secrets redacted, then exit
    CheckConfig,
}
