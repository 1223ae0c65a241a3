// ── Runtime sync configuration ──
//
// These types describe *how* to reach a dashboard backend and how the
// views behave once connected. They never touch disk: the CLI (via
// `fleetdash-config`) builds a `SyncConfig` and hands it in.

use std::time::Duration;

use fleetdash_api::{PushOptions, ReconnectConfig, TlsMode, TransportConfig, TransportPolicy};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use url::Url;

/// TLS verification strategy.
#[derive(Debug, Clone, Default)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (lab gateways with self-signed certs).
    DangerAcceptInvalid,
}

impl PartialEq for TlsVerification {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::SystemDefaults, Self::SystemDefaults)
            | (Self::DangerAcceptInvalid, Self::DangerAcceptInvalid) => true,
            (Self::CustomCa(a), Self::CustomCa(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for TlsVerification {}

impl From<&TlsVerification> for TlsMode {
    fn from(tls: &TlsVerification) -> Self {
        match tls {
            TlsVerification::SystemDefaults => Self::System,
            TlsVerification::CustomCa(path) => Self::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => Self::DangerAcceptInvalid,
        }
    }
}

/// Push channel tuning.
#[derive(Debug, Clone)]
pub struct PushSettings {
    /// Which transports the link may use.
    pub transports: TransportPolicy,
    /// First reconnect delay.
    pub reconnect_initial: Duration,
    /// Backoff ceiling.
    pub reconnect_max: Duration,
    /// Give up after this many consecutive failures. `None` retries forever.
    pub max_retries: Option<u32>,
    /// Send the bearer token in the Socket.IO CONNECT payload.
    pub send_credentials: bool,
    /// Per-attempt handshake timeout.
    pub connect_timeout: Duration,
}

impl Default for PushSettings {
    fn default() -> Self {
        let reconnect = ReconnectConfig::default();
        Self {
            transports: TransportPolicy::default(),
            reconnect_initial: reconnect.initial_delay,
            reconnect_max: reconnect.max_delay,
            max_retries: reconnect.max_retries,
            send_credentials: false,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Per-view behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSettings {
    /// Rows kept in the live sensor table (also the history query limit).
    pub sensor_table_limit: usize,
    /// Points kept in the live sensor chart series.
    pub chart_window: usize,
    /// Dashboard re-poll period. Zero disables the poller.
    pub dashboard_poll_interval: Duration,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            sensor_table_limit: 100,
            chart_window: 50,
            dashboard_poll_interval: Duration::from_secs(30),
        }
    }
}

/// Configuration for syncing with a single dashboard backend.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Backend root (e.g., `http://fleet.local:5000`). REST lives under
    /// `/api/v1`, Socket.IO under `/socket.io`.
    pub url: Url,
    /// Bearer token. `None` sends anonymous requests.
    pub token: Option<SecretString>,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// REST request timeout.
    pub timeout: Duration,
    pub push: PushSettings,
    pub views: ViewSettings,
}

impl SyncConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            token: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            push: PushSettings::default(),
            views: ViewSettings::default(),
        }
    }

    /// Transport settings for the REST client.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: TlsMode::from(&self.tls),
            timeout: self.timeout,
        }
    }

    /// Options for the push link.
    pub fn push_options(&self) -> PushOptions {
        let auth = if self.push.send_credentials {
            self.token
                .as_ref()
                .map(|t| json!({ "token": t.expose_secret() }))
        } else {
            None
        };

        PushOptions {
            transports: self.push.transports,
            reconnect: ReconnectConfig {
                initial_delay: self.push.reconnect_initial,
                max_delay: self.push.reconnect_max,
                max_retries: self.push.max_retries,
            },
            tls: TlsMode::from(&self.tls),
            connect_timeout: self.push.connect_timeout,
            auth,
        }
    }
}
