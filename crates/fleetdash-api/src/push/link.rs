//! Socket.IO push link with auto-reconnect.
//!
//! Maintains one Engine.IO session against the dashboard server, trying a
//! WebSocket first and falling back to HTTP long-polling when the upgrade
//! fails. Inbound events are forwarded as [`PushFrame`]s through an mpsc
//! channel in arrival order. Reconnection uses exponential backoff with
//! jitter.
//!
//! # Example
//!
//! ```rust,ignore
//! use fleetdash_api::push::{PushHandle, PushOptions};
//! use tokio::sync::mpsc;
//! use tokio_util::sync::CancellationToken;
//!
//! let (frames_tx, mut frames_rx) = mpsc::unbounded_channel();
//! let base = url::Url::parse("http://fleet.local:5000")?;
//! let handle = PushHandle::spawn(&base, PushOptions::default(), frames_tx, CancellationToken::new())?;
//! handle.emit("join", serde_json::json!({"room": "site-1"}))?;
//!
//! while let Some(frame) = frames_rx.recv().await {
//!     println!("{}: {}", frame.event, frame.payload);
//! }
//! ```

use std::fmt;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::Error;
use crate::push::packet::{EnginePacket, SocketPacket};
use crate::push::session::LinkContext;
use crate::push::{polling, websocket};
use crate::transport::{TlsMode, TransportConfig};

// ── Public types ─────────────────────────────────────────────────────

/// One inbound Socket.IO event: the wire name and its first argument.
#[derive(Debug, Clone, PartialEq)]
pub struct PushFrame {
    pub event: String,
    pub payload: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    WebSocket,
    Polling,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::WebSocket => "websocket",
            Self::Polling => "polling",
        })
    }
}

/// Lifecycle of the background link task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    /// First attempt in progress.
    Connecting,
    /// Socket.IO CONNECT acknowledged; frames are flowing.
    Open { transport: TransportKind },
    /// Waiting out a backoff delay before attempt number `attempt`.
    Reconnecting { attempt: u32 },
    /// The task has exited (shutdown, retry limit, or fatal setup error).
    Closed,
}

/// Which Engine.IO transports the link may use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransportPolicy {
    /// WebSocket first, long-polling when the upgrade fails.
    #[default]
    Auto,
    WebSocketOnly,
    PollingOnly,
}

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum consecutive failed attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PushOptions {
    pub transports: TransportPolicy,
    pub reconnect: ReconnectConfig,
    pub tls: TlsMode,
    /// Bound on TCP/TLS connect plus the Engine.IO open handshake.
    pub connect_timeout: Duration,
    /// Payload of the Socket.IO CONNECT packet, if any.
    pub auth: Option<Value>,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self {
            transports: TransportPolicy::Auto,
            reconnect: ReconnectConfig::default(),
            tls: TlsMode::System,
            connect_timeout: Duration::from_secs(10),
            auth: None,
        }
    }
}

/// An outbound Socket.IO event queued for the live session.
#[derive(Debug, Clone)]
pub(crate) struct Outbound {
    pub(crate) event: String,
    pub(crate) data: Value,
}

impl Outbound {
    pub(crate) fn into_packet(self) -> EnginePacket {
        EnginePacket::Message(SocketPacket::event(&self.event, self.data).encode())
    }
}

// ── Endpoint ─────────────────────────────────────────────────────────

/// Socket.IO URLs derived from the server root.
#[derive(Debug, Clone)]
pub(crate) struct Endpoint {
    root: Url,
}

impl Endpoint {
    pub(crate) fn new(base_url: &Url) -> Result<Self, Error> {
        let mut root = base_url.clone();
        match root.scheme() {
            "http" | "https" => {}
            "ws" => set_scheme(&mut root, "http")?,
            "wss" => set_scheme(&mut root, "https")?,
            other => {
                return Err(Error::WebSocketConnect(format!(
                    "unsupported URL scheme {other:?}"
                )));
            }
        }
        let path = format!("{}/socket.io/", root.path().trim_end_matches('/'));
        root.set_path(&path);
        root.set_query(None);
        Ok(Self { root })
    }

    pub(crate) fn websocket_url(&self) -> Result<Url, Error> {
        let mut url = self.root.clone();
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        set_scheme(&mut url, scheme)?;
        url.query_pairs_mut()
            .append_pair("EIO", "4")
            .append_pair("transport", "websocket");
        Ok(url)
    }

    pub(crate) fn polling_url(&self, sid: Option<&str>) -> Url {
        let mut url = self.root.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("EIO", "4").append_pair("transport", "polling");
            if let Some(sid) = sid {
                query.append_pair("sid", sid);
            }
        }
        url
    }
}

fn set_scheme(url: &mut Url, scheme: &str) -> Result<(), Error> {
    url.set_scheme(scheme)
        .map_err(|()| Error::WebSocketConnect(format!("cannot switch URL scheme to {scheme}")))
}

// ── PushHandle ───────────────────────────────────────────────────────

/// Handle to a running push link.
///
/// Dropping the handle does not stop the task; call
/// [`shutdown`](Self::shutdown) or cancel the token passed to
/// [`spawn`](Self::spawn).
pub struct PushHandle {
    commands: mpsc::UnboundedSender<Outbound>,
    status: watch::Receiver<LinkStatus>,
    cancel: CancellationToken,
}

impl PushHandle {
    /// Spawn the link task on the current tokio runtime.
    ///
    /// Returns once the task is spawned; the first connection attempt
    /// happens asynchronously. Watch [`status`](Self::status) for progress.
    pub fn spawn(
        base_url: &Url,
        options: PushOptions,
        frames: mpsc::UnboundedSender<PushFrame>,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        let endpoint = Endpoint::new(base_url)?;
        let http = TransportConfig {
            tls: options.tls.clone(),
            timeout: options.connect_timeout,
        }
        .build_streaming_client()?;

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(LinkStatus::Connecting);

        let ctx = LinkContext {
            frames,
            commands: commands_rx,
            status: status_tx,
            cancel: cancel.clone(),
            auth: options.auth.clone(),
            opened: false,
        };

        tokio::spawn(link_loop(endpoint, options, http, ctx));

        Ok(Self {
            commands: commands_tx,
            status: status_rx,
            cancel,
        })
    }

    /// Queue an outbound event. It is written once a session is open;
    /// events queued while reconnecting wait for the next session.
    pub fn emit(&self, event: &str, data: Value) -> Result<(), Error> {
        self.commands
            .send(Outbound {
                event: event.to_owned(),
                data,
            })
            .map_err(|_| Error::LinkClosed)
    }

    /// Subscribe to link status changes.
    pub fn status(&self) -> watch::Receiver<LinkStatus> {
        self.status.clone()
    }

    /// Signal the background task to shut down.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: open a session → run it → on drop, backoff → retry.
async fn link_loop(
    endpoint: Endpoint,
    options: PushOptions,
    http: reqwest::Client,
    mut ctx: LinkContext,
) {
    let cancel = ctx.cancel.clone();
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() || ctx.frames.is_closed() {
            break;
        }
        ctx.opened = false;

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = run_session(&endpoint, &options, &http, &mut ctx) => result,
        };

        if cancel.is_cancelled() || ctx.frames.is_closed() {
            break;
        }

        match result {
            Ok(()) => info!("push session ended, reconnecting"),
            Err(e) => warn!(error = %e, attempt, "push session failed"),
        }

        // A session that got as far as CONNECT resets the failure count.
        if ctx.opened {
            attempt = 0;
        } else if let Some(max) = options.reconnect.max_retries {
            if attempt >= max {
                error!(max_retries = max, "push reconnection limit reached, giving up");
                break;
            }
        }

        let delay = calculate_backoff(attempt, &options.reconnect);
        attempt = attempt.saturating_add(1);
        ctx.status.send_replace(LinkStatus::Reconnecting { attempt });
        info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    ctx.status.send_replace(LinkStatus::Closed);
    debug!("push link exiting");
}

/// One connection attempt under the configured transport policy.
async fn run_session(
    endpoint: &Endpoint,
    options: &PushOptions,
    http: &reqwest::Client,
    ctx: &mut LinkContext,
) -> Result<(), Error> {
    match options.transports {
        TransportPolicy::WebSocketOnly => websocket::run(endpoint, options, ctx).await,
        TransportPolicy::PollingOnly => polling::run(endpoint, http, options, ctx).await,
        TransportPolicy::Auto => match websocket::run(endpoint, options, ctx).await {
            Err(e) if !ctx.opened && !ctx.cancel.is_cancelled() => {
                warn!(error = %e, "websocket unavailable, falling back to long-polling");
                polling::run(endpoint, http, options, ctx).await
            }
            other => other,
        },
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 ± 0.25)`
///
/// The jitter is seeded from the attempt number, which is enough to keep
/// a fleet of dashboards from reconnecting in lockstep.
pub(crate) fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        // Jitter can push the cap up to 12.5s.
        for attempt in [10, 40, u32::MAX] {
            let delay = calculate_backoff(attempt, &config);
            assert!(delay <= Duration::from_millis(12_500), "{attempt}: {delay:?}");
        }
    }

    #[test]
    fn endpoint_builds_socketio_urls() {
        let endpoint = Endpoint::new(&Url::parse("https://fleet.example.com/").unwrap()).unwrap();
        assert_eq!(
            endpoint.websocket_url().unwrap().as_str(),
            "wss://fleet.example.com/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            endpoint.polling_url(Some("abc")).as_str(),
            "https://fleet.example.com/socket.io/?EIO=4&transport=polling&sid=abc"
        );
    }

    #[test]
    fn endpoint_keeps_path_prefix_and_accepts_ws_scheme() {
        let endpoint = Endpoint::new(&Url::parse("ws://10.0.0.5:5000/fleet").unwrap()).unwrap();
        assert_eq!(
            endpoint.websocket_url().unwrap().as_str(),
            "ws://10.0.0.5:5000/fleet/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            endpoint.polling_url(None).as_str(),
            "http://10.0.0.5:5000/fleet/socket.io/?EIO=4&transport=polling"
        );
    }

    #[test]
    fn endpoint_rejects_other_schemes() {
        assert!(Endpoint::new(&Url::parse("ftp://fleet.local").unwrap()).is_err());
    }

    #[test]
    fn outbound_encodes_as_event_message() {
        let packet = Outbound {
            event: "request_update".into(),
            data: serde_json::json!({}),
        }
        .into_packet();
        assert_eq!(packet.encode(), r#"42["request_update",{}]"#);
    }
}
