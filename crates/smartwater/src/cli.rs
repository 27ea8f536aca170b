//! Clap derive structures for the `smartwater` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// smartwater -- poll Smart Water tanks and gateways from the command line
#[derive(Debug, Parser)]
#[command(
    name = "smartwater",
    version,
    about = "Poll Smart Water tanks and gateways from the command line",
    long_about = "Authenticates against the Smart Water cloud, discovers gateways and\n\
        tanks, and prints normalized readings. `watch` keeps polling on a\n\
        schedule and reports every published snapshot.",
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
    /// Account profile to use
    #[arg(long, short = 'p', env = "SMARTWATER_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "SMARTWATER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Cloud API base URL (overrides profile)
    #[arg(long, env = "SMARTWATER_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Account username (overrides profile)
    #[arg(long, short = 'u', env = "SMARTWATER_USERNAME", global = true)]
    pub username: Option<String>,

    /// Account password
    #[arg(long, env = "SMARTWATER_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "SMARTWATER_OUTPUT",
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

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "SMARTWATER_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
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
    /// Verify credentials and show the account profile
    Check,

    /// Run one refresh cycle and print devices and readings
    #[command(alias = "snap", alias = "s")]
    Snapshot(SnapshotArgs),

    /// Poll on a schedule and print a line per published snapshot
    Watch(WatchArgs),

    /// Run one refresh cycle and print the redacted diagnostics report
    #[command(alias = "diag")]
    Diagnostics,

    /// Manage configuration profiles
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    /// Only show readings for this device id
    #[arg(long, short = 'd')]
    pub device: Option<String>,

    /// Include readings that are disabled by default
    #[arg(long, short = 'a')]
    pub all: bool,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Seconds between refresh cycles (overrides profile)
    #[arg(long, short = 'i')]
    pub interval: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Show the active profile (password redacted)
    Show,

    /// Create or update a profile
    Init {
        /// Cloud API base URL
        #[arg(long)]
        url: String,

        /// Account username
        #[arg(long)]
        user: String,

        /// Prompt for the password and store it in the system keyring
        #[arg(long)]
        store_password: bool,
    },

    /// Prompt for a password and store it in the system keyring
    SetPassword,
}
