//! Command-line interface definitions for the `gantry` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser, Subcommand};

/// Top-level CLI for the `gantry` binary.
#[derive(Debug, Parser)]
#[command(
    name = "gantry",
    version,
    about = "Provision, inspect, and tear down GKE clusters running the gantry operator",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Log debug detail to stderr.
    #[arg(short, long, global = true)]
    pub(crate) verbose: bool,
    /// Command to run.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Lifecycle subcommands.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Create a cluster, install the operator, and configure an environment.
    #[command(name = "up")]
    Up(ClusterArgs),
    /// Show the operator's view of a cluster, or collect a debug bundle.
    #[command(name = "info")]
    Info(InfoArgs),
    /// Delete a cluster, its state bucket, and environments pointing at it.
    #[command(name = "down")]
    Down(ClusterArgs),
}

/// Arguments shared by every subcommand.
#[derive(Debug, Args)]
pub(crate) struct ClusterArgs {
    /// Cluster configuration file (TOML).
    #[arg(short = 'c', long, value_name = "PATH")]
    pub(crate) config: Option<String>,
    /// Cluster name.
    #[arg(short = 'n', long, value_name = "NAME")]
    pub(crate) name: Option<String>,
    /// Google Cloud project.
    #[arg(short = 'p', long, value_name = "PROJECT")]
    pub(crate) project: Option<String>,
    /// Zone, for example `us-central1-a`.
    #[arg(short = 'z', long, value_name = "ZONE")]
    pub(crate) zone: Option<String>,
    /// Environment to create or repoint at this cluster.
    #[arg(short = 'e', long = "configure-env", value_name = "ENV")]
    pub(crate) configure_env: Option<String>,
    /// Never prompt; use explicit flags and safe defaults instead.
    #[arg(short = 'y', long)]
    pub(crate) yes: bool,
}

/// Arguments for `gantry info`.
#[derive(Debug, Args)]
pub(crate) struct InfoArgs {
    /// Cluster selection.
    #[command(flatten)]
    pub(crate) cluster: ClusterArgs,
    /// Collect a diagnostic bundle into the current directory instead.
    #[arg(short = 'd', long, conflicts_with = "configure_env")]
    pub(crate) debug: bool,
}
