use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "guild-sync-bot", about = "Guild schedule sync bot")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to Discord and run every sync loop (the default).
    Run,
    /// Parse a single thread title and print the result, without touching
    /// Discord or the remote store.
    ParseTitle {
        /// The thread title to parse.
        title: String,
    },
    /// Drop the cached state for one resource so the next poll rebuilds it.
    ClearCache {
        #[arg(value_enum)]
        resource: CacheResource,
    },
    /// Remove past entries from the offnight file on the remote store.
    Cleanup,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum CacheResource {
    Raid,
    Offnight,
}
