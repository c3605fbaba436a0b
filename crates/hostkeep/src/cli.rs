//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "hostkeep", version)]
#[command(about = "Inspect a host and keep its services and containers in shape", long_about = None)]
pub struct Cli {
    /// Configuration file (overrides the default lookup)
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Gather and print host facts
    Facts {
        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Control a system service
    Service {
        #[arg(value_enum)]
        action: ServiceAction,
        /// Service name (not needed for daemon-reload)
        name: Option<String>,
    },

    /// Control a container
    Container {
        #[arg(value_enum)]
        action: ContainerAction,
        /// Container ID
        id: String,
        /// Use crictl instead of ctr
        #[arg(long)]
        cri: bool,
    },

    /// Control a pod sandbox through crictl
    Pod {
        #[arg(value_enum)]
        action: PodAction,
        /// Pod sandbox ID
        id: String,
    },

    /// Manage images
    Image {
        #[arg(value_enum)]
        action: ImageAction,
        /// Image reference
        reference: String,
        /// Use crictl instead of ctr
        #[arg(long)]
        cri: bool,
    },

    /// Set one value in a TOML file
    #[command(name = "patch-toml")]
    PatchToml {
        /// File to edit
        path: String,
        /// Table header, without brackets
        table: String,
        /// Key inside the table
        key: String,
        /// TOML literal, e.g. '"overlayfs"' or true
        value: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
    Enable,
    Disable,
    Status,
    DaemonReload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ContainerAction {
    Start,
    Stop,
    Rm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PodAction {
    Stop,
    Rm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImageAction {
    Rm,
}
