use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "nodres", version, about = "Node reservation tool", long_about = None)]
pub struct Cli {
    /// Verbose mode (-v, -vv, -vvv)
    #[arg(short, action = ArgAction::Count, global = true)]
    pub verbosity: u8,

    /// Path to the config file
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Shows reservation status for a cluster
    /// Accepts a cluster name or a node range (atom1-10, 1..20)
    #[command(alias = "ls")]
    Status {
        /// Print status in list view
        #[arg(short, long)]
        list: bool,
        cluster: Option<String>,
    },
    /// Leases nodes until the given time (ex: 6pm, 18:00, 24h, 1d)
    #[command(alias = "l")]
    Lease {
        time: String,
        /// Node ids or ranges (ex: atom1-20, mmatom)
        #[arg(required = true)]
        ids: Vec<String>,
        /// Message attached to the lease
        #[arg(short, long, default_value = "")]
        message: String,
    },
    /// Releases your own leases
    /// With no ids, releases everything you own
    #[command(alias = "ul")]
    Unlease { ids: Vec<String> },
    /// Permanently locks nodes into a new lock group (admin only)
    #[command(alias = "pl")]
    Permalock {
        #[arg(required = true)]
        ids: Vec<String>,
        /// Message attached to the lock
        #[arg(short, long, default_value = "")]
        message: String,
    },
    /// Force-releases any ids: nodes, users, or lock groups (admin only)
    #[command(alias = "upl")]
    Unlock {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}
