// Engine.IO v4 / Socket.IO v5 packet codec
//
// Engine.IO frames are a single type digit followed by an optional payload.
// Socket.IO packets ride inside Engine.IO `message` frames:
//
//   <type>[<namespace>,][<ack id>][<json payload>]
//
// Binary attachments (Socket.IO types 5 and 6) are not used by the
// dashboard server and are rejected as protocol errors.

use serde::Deserialize;
use serde_json::Value;

use crate::error::Error;

/// Separator between packets in a long-polling payload.
pub const RECORD_SEPARATOR: char = '\u{1e}';

// ── Engine.IO ────────────────────────────────────────────────────────

/// Parameters the server sends in the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings.
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong before dropping us.
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

impl OpenHandshake {
    /// How long to wait for any inbound packet before declaring the
    /// session dead.
    pub fn heartbeat_window(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenHandshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(raw: &str) -> Result<Self, Error> {
        let mut chars = raw.chars();
        let kind = chars
            .next()
            .ok_or_else(|| Error::Protocol("empty Engine.IO packet".into()))?;
        let body = chars.as_str();

        Ok(match kind {
            '0' => Self::Open(serde_json::from_str(body).map_err(|e| {
                Error::Handshake(format!("malformed open packet: {e}"))
            })?),
            '1' => Self::Close,
            '2' => Self::Ping(body.to_owned()),
            '3' => Self::Pong(body.to_owned()),
            '4' => Self::Message(body.to_owned()),
            '5' => Self::Upgrade,
            '6' => Self::Noop,
            other => {
                return Err(Error::Protocol(format!(
                    "unknown Engine.IO packet type {other:?}"
                )));
            }
        })
    }

    pub fn encode(&self) -> String {
        match self {
            // Clients never send `open`; encode it anyway for test servers.
            Self::Open(h) => format!(
                "0{{\"sid\":\"{}\",\"upgrades\":[],\"pingInterval\":{},\"pingTimeout\":{}}}",
                h.sid, h.ping_interval, h.ping_timeout
            ),
            Self::Close => "1".into(),
            Self::Ping(data) => format!("2{data}"),
            Self::Pong(data) => format!("3{data}"),
            Self::Message(data) => format!("4{data}"),
            Self::Upgrade => "5".into(),
            Self::Noop => "6".into(),
        }
    }
}

/// Split a long-polling response body into Engine.IO packets.
pub fn decode_payload(body: &str) -> Result<Vec<EnginePacket>, Error> {
    body.split(RECORD_SEPARATOR)
        .filter(|part| !part.is_empty())
        .map(EnginePacket::decode)
        .collect()
}

// ── Socket.IO ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    Ack {
        namespace: String,
        id: u64,
        args: Vec<Value>,
    },
    ConnectError {
        namespace: String,
        data: Value,
    },
}

impl SocketPacket {
    /// Build an event on the default namespace.
    pub fn event(name: &str, data: Value) -> Self {
        Self::Event {
            namespace: "/".into(),
            id: None,
            name: name.to_owned(),
            args: vec![data],
        }
    }

    pub fn decode(raw: &str) -> Result<Self, Error> {
        let mut chars = raw.chars();
        let kind = chars
            .next()
            .ok_or_else(|| Error::Protocol("empty Socket.IO packet".into()))?;
        let mut rest = chars.as_str();

        let mut namespace = String::from("/");
        if rest.starts_with('/') {
            let end = rest.find(',').unwrap_or(rest.len());
            namespace = rest[..end].to_owned();
            rest = rest.get(end + 1..).unwrap_or("");
        }

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let id = if digits > 0 {
            Some(
                rest[..digits]
                    .parse::<u64>()
                    .map_err(|e| Error::Protocol(format!("bad ack id: {e}")))?,
            )
        } else {
            None
        };
        let body = &rest[digits..];

        let json = || -> Result<Option<Value>, Error> {
            if body.is_empty() {
                Ok(None)
            } else {
                serde_json::from_str(body)
                    .map(Some)
                    .map_err(|e| Error::Protocol(format!("bad Socket.IO payload: {e}")))
            }
        };

        match kind {
            '0' => Ok(Self::Connect {
                namespace,
                data: json()?,
            }),
            '1' => Ok(Self::Disconnect { namespace }),
            '2' => {
                let Some(Value::Array(mut items)) = json()? else {
                    return Err(Error::Protocol("event payload is not an array".into()));
                };
                if items.is_empty() {
                    return Err(Error::Protocol("event payload has no name".into()));
                }
                let Value::String(name) = items.remove(0) else {
                    return Err(Error::Protocol("event name is not a string".into()));
                };
                Ok(Self::Event {
                    namespace,
                    id,
                    name,
                    args: items,
                })
            }
            '3' => {
                let id = id.ok_or_else(|| Error::Protocol("ack without id".into()))?;
                let args = match json()? {
                    Some(Value::Array(items)) => items,
                    _ => return Err(Error::Protocol("ack payload is not an array".into())),
                };
                Ok(Self::Ack {
                    namespace,
                    id,
                    args,
                })
            }
            '4' => Ok(Self::ConnectError {
                namespace,
                data: json()?.unwrap_or(Value::Null),
            }),
            '5' | '6' => Err(Error::Protocol("binary Socket.IO packets are not supported".into())),
            other => Err(Error::Protocol(format!(
                "unknown Socket.IO packet type {other:?}"
            ))),
        }
    }

    pub fn encode(&self) -> String {
        fn prefix(kind: char, namespace: &str) -> String {
            if namespace == "/" {
                kind.to_string()
            } else {
                format!("{kind}{namespace},")
            }
        }

        match self {
            Self::Connect { namespace, data } => {
                let mut out = prefix('0', namespace);
                if let Some(data) = data {
                    out.push_str(&data.to_string());
                }
                out
            }
            Self::Disconnect { namespace } => prefix('1', namespace),
            Self::Event {
                namespace,
                id,
                name,
                args,
            } => {
                let mut out = prefix('2', namespace);
                if let Some(id) = id {
                    out.push_str(&id.to_string());
                }
                let mut items = Vec::with_capacity(args.len() + 1);
                items.push(Value::String(name.clone()));
                items.extend(args.iter().cloned());
                out.push_str(&Value::Array(items).to_string());
                out
            }
            Self::Ack {
                namespace,
                id,
                args,
            } => format!(
                "{}{id}{}",
                prefix('3', namespace),
                Value::Array(args.clone())
            ),
            Self::ConnectError { namespace, data } => format!("{}{data}", prefix('4', namespace)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn decodes_open_handshake() {
        let raw = r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":["websocket"],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;
        let EnginePacket::Open(open) = EnginePacket::decode(raw).unwrap() else {
            panic!("expected open packet");
        };
        assert_eq!(open.sid, "lv_VI97HAXpY6yYWAAAC");
        assert_eq!(open.upgrades, vec!["websocket".to_string()]);
        assert_eq!(open.heartbeat_window().as_millis(), 45_000);
    }

    #[test]
    fn ping_pong_keep_probe_payload() {
        assert_eq!(EnginePacket::decode("2").unwrap(), EnginePacket::Ping(String::new()));
        assert_eq!(EnginePacket::decode("2probe").unwrap(), EnginePacket::Ping("probe".into()));
        assert_eq!(EnginePacket::Pong("probe".into()).encode(), "3probe");
    }

    #[test]
    fn rejects_unknown_engine_type() {
        assert!(matches!(EnginePacket::decode("9"), Err(Error::Protocol(_))));
        assert!(matches!(EnginePacket::decode(""), Err(Error::Protocol(_))));
    }

    #[test]
    fn splits_polling_payload() {
        let body = "2\u{1e}42[\"gateway_status\",{\"gateway_id\":\"GW-01\"}]\u{1e}6";
        let packets = decode_payload(body).unwrap();
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0], EnginePacket::Ping(String::new()));
        assert!(matches!(&packets[1], EnginePacket::Message(m) if m.starts_with("2[")));
        assert_eq!(packets[2], EnginePacket::Noop);
    }

    #[test]
    fn decodes_event_with_payload() {
        let packet =
            SocketPacket::decode(r#"2["device:status_change",{"device_id":"N1","status":"offline"}]"#)
                .unwrap();
        assert_eq!(
            packet,
            SocketPacket::Event {
                namespace: "/".into(),
                id: None,
                name: "device:status_change".into(),
                args: vec![json!({"device_id": "N1", "status": "offline"})],
            }
        );
    }

    #[test]
    fn decodes_namespace_and_ack_id() {
        let packet = SocketPacket::decode(r#"2/admin,13["join",{"room":"site-1"}]"#).unwrap();
        let SocketPacket::Event {
            namespace, id, name, ..
        } = packet
        else {
            panic!("expected event");
        };
        assert_eq!(namespace, "/admin");
        assert_eq!(id, Some(13));
        assert_eq!(name, "join");
    }

    #[test]
    fn decodes_connect_ack_and_error() {
        assert_eq!(
            SocketPacket::decode(r#"0{"sid":"abc"}"#).unwrap(),
            SocketPacket::Connect {
                namespace: "/".into(),
                data: Some(json!({"sid": "abc"})),
            }
        );
        assert_eq!(
            SocketPacket::decode(r#"4{"message":"Not authorized"}"#).unwrap(),
            SocketPacket::ConnectError {
                namespace: "/".into(),
                data: json!({"message": "Not authorized"}),
            }
        );
    }

    #[test]
    fn event_without_name_is_protocol_error() {
        assert!(SocketPacket::decode("2[]").is_err());
        assert!(SocketPacket::decode("2[42]").is_err());
        assert!(SocketPacket::decode("2{}").is_err());
    }

    #[test]
    fn binary_packets_are_rejected() {
        assert!(matches!(
            SocketPacket::decode(r#"51-["upload",{"_placeholder":true,"num":0}]"#),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn encodes_outbound_packets() {
        assert_eq!(
            SocketPacket::event("join", json!({"room": "site-1"})).encode(),
            r#"2["join",{"room":"site-1"}]"#
        );
        assert_eq!(
            SocketPacket::Connect {
                namespace: "/".into(),
                data: None
            }
            .encode(),
            "0"
        );
        assert_eq!(
            SocketPacket::Connect {
                namespace: "/".into(),
                data: Some(json!({"token": "t"})),
            }
            .encode(),
            r#"0{"token":"t"}"#
        );
    }
}
