use thiserror::Error;

/// Top-level error type for the `fleetdash-api` crate.
///
/// Covers every failure mode across both surfaces: the REST API and the
/// Socket.IO push channel. `fleetdash-core` maps these into user-facing
/// diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The server rejected the bearer token (missing, expired, revoked).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The credential provider could not supply a token.
    #[error("No credential available: {0}")]
    MissingCredential(String),

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── REST API ────────────────────────────────────────────────────
    /// Non-success HTTP status from the REST API. `message` is taken from
    /// the `{"message": ...}` body when present.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Push channel ────────────────────────────────────────────────
    /// Engine.IO / Socket.IO handshake did not complete.
    #[error("Push handshake failed: {0}")]
    Handshake(String),

    /// The server sent a frame that does not follow the Engine.IO or
    /// Socket.IO framing rules.
    #[error("Push protocol error: {0}")]
    Protocol(String),

    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed unexpectedly.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// The long-polling fallback failed.
    #[error("Polling transport error: {0}")]
    Polling(String),

    /// The push link task has exited; nothing can be sent.
    #[error("Push link is not running")]
    LinkClosed,

    /// No heartbeat ping arrived within the negotiated window.
    #[error("Heartbeat timed out after {timeout_ms}ms")]
    HeartbeatTimeout { timeout_ms: u64 },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates the credential has expired
    /// and re-authentication might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => *status >= 500,
            Self::Timeout { .. }
            | Self::WebSocketConnect(_)
            | Self::WebSocketClosed { .. }
            | Self::Polling(_)
            | Self::HeartbeatTimeout { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Api { status: 404, .. } => true,
            _ => false,
        }
    }
}
