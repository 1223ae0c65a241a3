//! Configuration for fleetdash.
//!
//! TOML profiles, token resolution (env var + plaintext), and translation
//! to `fleetdash_core::SyncConfig`. The CLI layers its flag overrides on
//! top of what this crate produces.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fleetdash_core::{SyncConfig, TlsVerification, TransportPolicy};

/// Prefix for environment overrides. Nested keys use a double
/// underscore, e.g. `FLEETDASH_DEFAULTS__TIMEOUT=10`.
pub const ENV_PREFIX: &str = "FLEETDASH_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named backend profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Pick a profile: `name` if given, else `default_profile`, else
    /// `"default"`.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = name
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into());
        self.profiles
            .get(&name)
            .map(|p| (name.clone(), p))
            .ok_or(ConfigError::UnknownProfile { profile: name })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    /// REST timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Dashboard re-poll period in seconds; 0 disables polling.
    #[serde(default = "default_dashboard_poll")]
    pub dashboard_poll_secs: u64,

    #[serde(default = "default_sensor_table_limit")]
    pub sensor_table_limit: usize,

    #[serde(default = "default_chart_window")]
    pub chart_window: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
            dashboard_poll_secs: default_dashboard_poll(),
            sensor_table_limit: default_sensor_table_limit(),
            chart_window: default_chart_window(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_dashboard_poll() -> u64 {
    30
}
fn default_sensor_table_limit() -> usize {
    100
}
fn default_chart_window() -> usize {
    50
}

/// A named backend profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Backend root URL (e.g., "http://fleet.local:5000").
    pub url: String,

    /// Bearer token (plaintext, prefer `token_env`).
    pub token: Option<String>,

    /// Environment variable name containing the bearer token.
    pub token_env: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override REST timeout (seconds).
    pub timeout: Option<u64>,

    /// Push transports: "auto", "websocket", or "polling".
    pub transport: Option<String>,

    /// Send the token in the push handshake.
    pub send_credentials: Option<bool>,

    /// Backoff ceiling between reconnect attempts (seconds).
    pub reconnect_max_secs: Option<u64>,

    /// Stop reconnecting after this many consecutive failures.
    pub max_retries: Option<u32>,

    /// Rooms to join once connected.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rooms: Vec<String>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "fleetdash", "fleetdash").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("fleetdash");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist or fails
/// to parse.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the bearer token: the profile's `token_env` variable first,
/// then the plaintext `token`. No token means anonymous requests.
pub fn resolve_token(profile: &Profile) -> Option<SecretString> {
    // 1. Profile's token_env → env var lookup
    if let Some(ref env_name) = profile.token_env {
        if let Ok(val) = std::env::var(env_name) {
            if !val.is_empty() {
                return Some(SecretString::from(val));
            }
        }
    }

    // 2. Plaintext in config
    profile
        .token
        .as_ref()
        .filter(|t| !t.is_empty())
        .map(|t| SecretString::from(t.clone()))
}

/// Parse a transport name as used in profiles and on the command line.
pub fn parse_transport(raw: &str) -> Result<TransportPolicy, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "auto" => Ok(TransportPolicy::Auto),
        "websocket" | "ws" => Ok(TransportPolicy::WebSocketOnly),
        "polling" => Ok(TransportPolicy::PollingOnly),
        other => Err(ConfigError::Validation {
            field: "transport".into(),
            reason: format!("expected 'auto', 'websocket', or 'polling', got '{other}'"),
        }),
    }
}

/// Build a `SyncConfig` from a profile and the global defaults, with no
/// CLI overrides applied.
pub fn profile_to_sync_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<SyncConfig, ConfigError> {
    let url: url::Url = profile.url.parse().map_err(|_| ConfigError::Validation {
        field: "url".into(),
        reason: format!("invalid URL: {}", profile.url),
    })?;

    let mut cfg = SyncConfig::new(url);
    cfg.token = resolve_token(profile);

    cfg.tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    cfg.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));

    if let Some(ref transport) = profile.transport {
        cfg.push.transports = parse_transport(transport)?;
    }
    if let Some(send) = profile.send_credentials {
        cfg.push.send_credentials = send;
    }
    if let Some(secs) = profile.reconnect_max_secs {
        cfg.push.reconnect_max = Duration::from_secs(secs).max(cfg.push.reconnect_initial);
    }
    cfg.push.max_retries = profile.max_retries;

    cfg.views.dashboard_poll_interval = Duration::from_secs(defaults.dashboard_poll_secs);
    cfg.views.sensor_table_limit = defaults.sensor_table_limit.max(1);
    cfg.views.chart_window = defaults.chart_window.max(1);

    Ok(cfg)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    const SAMPLE: &str = r#"
default_profile = "lab"

[defaults]
timeout = 12
chart_window = 20

[profiles.lab]
url = "http://fleet.lab:5000"
token = "plain-token"
transport = "polling"
rooms = ["site-1"]

[profiles.prod]
url = "https://fleet.example.com"
ca_cert = "/etc/fleet/ca.pem"
send_credentials = true
"#;

    fn write_sample() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        (dir, path)
    }

    #[test]
    fn loads_profiles_and_defaults_from_file() {
        let (_dir, path) = write_sample();
        let cfg = load_config_from(&path).unwrap();

        assert_eq!(cfg.default_profile.as_deref(), Some("lab"));
        assert_eq!(cfg.defaults.timeout, 12);
        assert_eq!(cfg.defaults.chart_window, 20);
        assert_eq!(cfg.defaults.sensor_table_limit, 100);
        assert_eq!(cfg.profiles.len(), 2);

        let (name, lab) = cfg.profile(None).unwrap();
        assert_eq!(name, "lab");
        assert_eq!(lab.rooms, vec!["site-1"]);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert!(cfg.profiles.is_empty());
        assert!(matches!(
            cfg.profile(None),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn profile_translates_to_sync_config() {
        let (_dir, path) = write_sample();
        let cfg = load_config_from(&path).unwrap();

        let (_, lab) = cfg.profile(Some("lab")).unwrap();
        let sync = profile_to_sync_config(lab, &cfg.defaults).unwrap();
        assert_eq!(sync.url.as_str(), "http://fleet.lab:5000/");
        assert!(sync.token.is_some());
        assert_eq!(sync.timeout, Duration::from_secs(12));
        assert_eq!(sync.push.transports, TransportPolicy::PollingOnly);
        assert_eq!(sync.views.chart_window, 20);
        assert_eq!(sync.tls, TlsVerification::SystemDefaults);

        let (_, prod) = cfg.profile(Some("prod")).unwrap();
        let sync = profile_to_sync_config(prod, &cfg.defaults).unwrap();
        assert!(sync.token.is_none());
        assert!(sync.push.send_credentials);
        assert_eq!(
            sync.tls,
            TlsVerification::CustomCa(PathBuf::from("/etc/fleet/ca.pem"))
        );
    }

    #[test]
    fn bad_url_and_transport_are_rejected() {
        let defaults = Defaults::default();
        let bad_url = Profile {
            url: "not a url".into(),
            ..Profile::default()
        };
        assert!(matches!(
            profile_to_sync_config(&bad_url, &defaults),
            Err(ConfigError::Validation { ref field, .. }) if field == "url"
        ));

        let bad_transport = Profile {
            url: "http://fleet.local".into(),
            transport: Some("carrier-pigeon".into()),
            ..Profile::default()
        };
        assert!(matches!(
            profile_to_sync_config(&bad_transport, &defaults),
            Err(ConfigError::Validation { ref field, .. }) if field == "transport"
        ));
    }

    #[test]
    fn token_env_wins_over_plaintext() {
        // PATH is set in any environment the tests run in.
        let expected = std::env::var("PATH").unwrap();
        let profile = Profile {
            url: "http://fleet.local".into(),
            token: Some("from-file".into()),
            token_env: Some("PATH".into()),
            ..Profile::default()
        };
        let token = resolve_token(&profile).unwrap();
        assert_eq!(token.expose_secret(), expected);

        let unset = Profile {
            token_env: Some("FLEETDASH_TEST_TOKEN_UNSET".into()),
            ..profile
        };
        let token = resolve_token(&unset).unwrap();
        assert_eq!(token.expose_secret(), "from-file");

        let anonymous = Profile {
            token: Some(String::new()),
            ..unset
        };
        assert!(resolve_token(&anonymous).is_none());
    }

    #[test]
    fn save_round_trips_through_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "default".into(),
            Profile {
                url: "http://fleet.local:5000".into(),
                token_env: Some("FLEET_TOKEN".into()),
                ..Profile::default()
            },
        );

        save_config_to(&cfg, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        let (_, profile) = loaded.profile(None).unwrap();
        assert_eq!(profile.url, "http://fleet.local:5000");
        assert_eq!(profile.token_env.as_deref(), Some("FLEET_TOKEN"));
    }
}
