use clap::{Parser, Subcommand};

/// Token Broker — short-lived GitHub App installation tokens
#[derive(Parser)]
#[command(name = "token-broker", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the broker server
    Serve {
        /// Port to bind (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the installation's current API rate limit and exit
    RateLimit,
}
