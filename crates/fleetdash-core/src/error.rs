// ── Core error types ──
//
// User-facing errors from fleetdash-core. Consumers never see HTTP status
// codes or Engine.IO framing failures directly; the
// `From<fleetdash_api::Error>` impl folds transport-layer errors into
// domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach dashboard at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Push connection is not running")]
    Disconnected,

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Entity not found: {entity_type} with id {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    #[error("Unexpected payload: {message}")]
    Payload { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// `true` for failures a later retry may clear (server hiccup,
    /// dropped connection). Views keep their cached value on these.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } | Self::Disconnected => true,
            Self::Api { status, .. } => status.is_some_and(|s| s >= 500),
            _ => false,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<fleetdash_api::Error> for CoreError {
    fn from(err: fleetdash_api::Error) -> Self {
        use fleetdash_api::Error as ApiError;

        match err {
            ApiError::Authentication { message } | ApiError::MissingCredential(message) => {
                CoreError::AuthenticationFailed { message }
            }
            ApiError::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            ApiError::InvalidUrl(e) => CoreError::Config {
                message: format!("invalid URL: {e}"),
            },
            ApiError::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            ApiError::Tls(message) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {message}"),
            },
            ApiError::Api {
                status: 404,
                message,
            } => CoreError::NotFound {
                entity_type: "resource".into(),
                identifier: message,
            },
            ApiError::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            ApiError::Handshake(reason)
            | ApiError::Protocol(reason)
            | ApiError::WebSocketConnect(reason)
            | ApiError::Polling(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason,
            },
            ApiError::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("closed with code {code}: {reason}"),
            },
            ApiError::HeartbeatTimeout { timeout_ms } => CoreError::Timeout {
                timeout_secs: timeout_ms / 1000,
            },
            ApiError::LinkClosed => CoreError::Disconnected,
            ApiError::Deserialization { message, body: _ } => CoreError::Payload { message },
        }
    }
}
