//! vpnexiter CLI
//!
//! Browse the configured VPN vendors' server directories and point the
//! router at a chosen exit.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vpnexiter::commands;
use vpnexiter::context::Context;

#[derive(Parser)]
#[command(name = "vpnexiter")]
#[command(author, version, about = "Select the VPN exit your router tunnels through")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "VPNEXITER_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured vendors
    Vendors,

    /// Show a vendor's server tree
    Tree {
        /// Vendor name
        vendor: String,
        /// Print the tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show where an exit sits in a vendor's tree
    Find {
        /// Vendor name
        vendor: String,
        /// Exit hostname or address
        exit: String,
    },

    /// List the keys of the next level down a vendor's tree
    Levels {
        /// Vendor name
        vendor: String,
        /// Keys of the levels already chosen, outermost first
        path: Vec<String>,
    },

    /// List the servers under a full key path, with resolved addresses
    Servers {
        /// Vendor name
        vendor: String,
        /// One key per vendor level, outermost first
        path: Vec<String>,
        /// Print the servers as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reconfigure the router to use an exit
    Select {
        /// Vendor name
        vendor: String,
        /// Exit hostname or address
        exit: String,
        /// Print the resulting state as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check whether the VPN is up
    Check,

    /// Show the router's VPN status output
    Status,

    /// Keep directories loaded and refreshed until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => cli.log_level.as_str(),
        (false, 1) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let ctx = Context::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Vendors => commands::vendors_command(&ctx).await,
        Commands::Tree { vendor, json } => commands::tree_command(&ctx, &vendor, json).await,
        Commands::Find { vendor, exit } => commands::find_command(&ctx, &vendor, &exit).await,
        Commands::Levels { vendor, path } => commands::levels_command(&ctx, &vendor, &path).await,
        Commands::Servers { vendor, path, json } => {
            commands::servers_command(&ctx, &vendor, &path, json).await
        }
        Commands::Select { vendor, exit, json } => {
            commands::select_command(&ctx, &vendor, &exit, json).await
        }
        Commands::Check => commands::check_command(&ctx).await,
        Commands::Status => commands::status_command(&ctx).await,
        Commands::Watch => commands::watch_command(&ctx).await,
    }
}
