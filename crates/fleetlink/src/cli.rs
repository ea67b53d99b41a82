//! Clap derive structures for the `fleetlink` CLI.
//!
//! Connection flags overlay the config file and `FLEETLINK_*` environment;
//! unset flags leave the lower layers alone.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use fleetlink_core::JobState;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// fleetlink -- talk to a fleet cluster over HTTP, etcd or an SSH tunnel
#[derive(Debug, Parser)]
#[command(
    name = "fleetlink",
    version,
    about = "Inspect and manage units on a fleet cluster",
    long_about = "Connects to a fleet cluster through its HTTP API (TCP or Unix socket),\n\
        directly through its etcd registry, or through an SSH tunnel to either.\n\n\
        Settings come from the config file, then FLEETLINK_* variables, then flags.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "FLEETLINK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Connection driver: direct, registry (etcd) or tunnel
    #[arg(long, short = 'd', global = true)]
    pub driver: Option<String>,

    /// fleet API endpoint, or comma-separated etcd endpoints
    #[arg(long, short = 'e', global = true)]
    pub endpoint: Option<String>,

    /// CA bundle for https endpoints
    #[arg(long, global = true)]
    pub ca_file: Option<String>,

    /// Client certificate (PEM)
    #[arg(long, global = true)]
    pub cert_file: Option<String>,

    /// Client private key (PEM)
    #[arg(long, global = true)]
    pub key_file: Option<String>,

    /// SSH tunnel host, `host` or `host:port`
    #[arg(long, short = 't', global = true)]
    pub tunnel: Option<String>,

    /// SSH user for the tunnel
    #[arg(long, global = true)]
    pub ssh_username: Option<String>,

    /// SSH private key; the agent is used when unset
    #[arg(long, global = true)]
    pub ssh_identity_file: Option<String>,

    /// known_hosts file for tunnel host key checks
    #[arg(long, global = true)]
    pub known_hosts_file: Option<String>,

    /// Verify the tunnel host key against known_hosts
    #[arg(long, value_name = "BOOL", global = true)]
    pub strict_host_key_checking: Option<bool>,

    /// SSH connection timeout in seconds
    #[arg(long, value_name = "SECONDS", global = true)]
    pub ssh_timeout: Option<f64>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECONDS", global = true)]
    pub request_timeout: Option<f64>,

    /// Attempts at reaching the tunnel host before giving up
    #[arg(long, global = true)]
    pub max_connection_retries: Option<u32>,

    /// Keyspace for fleet data in etcd
    #[arg(long, global = true)]
    pub registry_key_prefix: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "FLEETLINK_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List machines in the cluster
    #[command(alias = "m")]
    Machines,

    /// Manage units
    #[command(alias = "u")]
    Units(UnitsArgs),

    /// List unit states reported by the machines
    States,

    /// Show the effective configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Units ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct UnitsArgs {
    #[command(subcommand)]
    pub command: UnitsCommand,
}

#[derive(Debug, Subcommand)]
pub enum UnitsCommand {
    /// List units
    #[command(alias = "ls")]
    List,

    /// Show a unit's desired and current state
    Get {
        /// Unit name
        name: String,
    },

    /// Print a unit's file contents
    Cat {
        /// Unit name
        name: String,
    },

    /// Submit a unit from a unit file
    Create {
        /// Unit name, e.g. web.service
        name: String,

        /// Desired state
        #[arg(long, short = 's', default_value = "launched")]
        state: JobState,

        /// systemd unit file to submit
        #[arg(long, short = 'f')]
        file: PathBuf,
    },

    /// Change a unit's desired state
    SetState {
        /// Unit name
        name: String,

        /// inactive, loaded or launched
        state: JobState,
    },

    /// Remove a unit from the cluster
    #[command(alias = "rm")]
    Destroy {
        /// Unit name
        name: String,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective settings as TOML
    Show,

    /// Print the config file path
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
