pub mod seed;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "realty-api", version, about = "Multi-tenant real estate backend")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server (default when no subcommand is given)
    Serve {
        /// Port to bind; falls back to PORT env, then 3000
        #[arg(long)]
        port: Option<u16>,
    },
    /// Apply pending database migrations and exit
    Migrate,
    /// Insert the baseline currency set (idempotent)
    Seed,
}
