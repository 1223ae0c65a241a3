//! Clap derive structures for the `fleetdash` CLI.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// fleetdash -- live view of an IoT fleet from the terminal
#[derive(Debug, Parser)]
#[command(
    name = "fleetdash",
    version,
    about = "Watch a fleet dashboard's live data from the command line",
    long_about = "Connects to a fleet dashboard backend over REST and Socket.IO,\n\
        keeps local views in sync with pushed events, and prints them.",
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
    /// Backend profile to use
    #[arg(long, short = 'p', env = "FLEETDASH_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Backend URL (overrides profile)
    #[arg(long, short = 'u', env = "FLEETDASH_URL", global = true)]
    pub url: Option<String>,

    /// Bearer token (overrides profile)
    #[arg(long, env = "FLEETDASH_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "FLEETDASH_OUTPUT",
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

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "FLEETDASH_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "FLEETDASH_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Never upgrade the push channel to WebSocket
    #[arg(long, global = true)]
    pub polling_only: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON, one document per update
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
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
    /// Keep a view in sync and print it on every change
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Tail decoded push events
    #[command(alias = "tail")]
    Events(EventsArgs),

    /// Ask the server for a heartbeat and report the round trip
    Ping(PingArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// View to keep in sync
    pub view: WatchTarget,

    /// Room to join once connected (repeatable)
    #[arg(long = "room", value_name = "ROOM")]
    pub rooms: Vec<String>,

    /// Device type filter (devices view)
    #[arg(long, default_value = "all")]
    pub kind: KindFilter,

    /// Alert status filter (alerts view)
    #[arg(long, default_value = "active")]
    pub status: StatusFilter,

    /// History rows to load and keep (sensors view)
    #[arg(long, short = 'l')]
    pub limit: Option<u32>,

    /// Only readings from this node (sensors view)
    #[arg(long)]
    pub node: Option<String>,

    /// Only readings from this gateway (sensors view)
    #[arg(long)]
    pub gateway: Option<String>,

    /// Only readings from this ADC channel (sensors view)
    #[arg(long)]
    pub channel: Option<u32>,

    /// Print the initial state and exit without connecting
    #[arg(long)]
    pub once: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WatchTarget {
    /// Fleet-wide counters
    Dashboard,
    /// Device list with live status
    Devices,
    /// Gateway list with live status
    Gateways,
    /// Alert list
    Alerts,
    /// Live sensor readings
    #[value(alias = "sensor-data")]
    Sensors,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindFilter {
    All,
    Gateway,
    Node,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusFilter {
    Active,
    Resolved,
    All,
}

// ── Events ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct EventsArgs {
    /// Only show these events, by wire name (repeatable)
    #[arg(long = "filter", short = 'f', value_name = "EVENT")]
    pub filters: Vec<String>,

    /// Room to join once connected (repeatable)
    #[arg(long = "room", value_name = "ROOM")]
    pub rooms: Vec<String>,

    /// Exit after this many events
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

// ── Ping ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PingArgs {
    /// Seconds to wait for the connection and the heartbeat
    #[arg(long, default_value = "10")]
    pub wait: u64,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Display current configuration (tokens masked)
    Show,

    /// Create or overwrite a profile
    Init {
        /// Backend URL, e.g. http://fleet.local:5000
        #[arg(long)]
        url: String,

        /// Profile name
        #[arg(long, default_value = "default")]
        name: String,

        /// Environment variable holding the bearer token
        #[arg(long)]
        token_env: Option<String>,

        /// Rooms to join on connect (repeatable)
        #[arg(long = "room", value_name = "ROOM")]
        rooms: Vec<String>,

        /// Replace an existing profile of the same name
        #[arg(long)]
        force: bool,
    },

    /// Set a value on the active profile
    Set {
        /// Profile key (url, token, token_env, ca_cert, insecure, timeout,
        /// transport, send_credentials, reconnect_max_secs, max_retries)
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
