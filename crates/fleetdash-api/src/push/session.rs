// Socket.IO session state shared by both transports
//
// The transports own the I/O; this module owns what a packet means. Each
// inbound Engine.IO packet is folded into the session and yields at most
// one reply packet for the transport to write back.

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::Error;
use crate::push::link::{LinkStatus, Outbound, PushFrame, TransportKind};
use crate::push::packet::{EnginePacket, OpenHandshake, SocketPacket};

/// One Engine.IO session with the default Socket.IO namespace on top.
#[derive(Debug)]
pub(crate) struct SocketSession {
    handshake: OpenHandshake,
    connected: bool,
}

/// What the transport should do after absorbing a packet.
#[derive(Debug, PartialEq)]
pub(crate) enum Flow {
    Continue,
    Reply(EnginePacket),
    Closed,
}

impl SocketSession {
    /// Start a session from the server's `open` packet. Returns the
    /// Socket.IO CONNECT packet the transport must send next.
    pub(crate) fn open(handshake: OpenHandshake, auth: Option<Value>) -> (Self, EnginePacket) {
        debug!(
            sid = %handshake.sid,
            ping_interval = handshake.ping_interval,
            ping_timeout = handshake.ping_timeout,
            "Engine.IO session opened"
        );
        let connect = SocketPacket::Connect {
            namespace: "/".into(),
            data: auth,
        };
        (
            Self {
                handshake,
                connected: false,
            },
            EnginePacket::Message(connect.encode()),
        )
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected
    }

    pub(crate) fn heartbeat_window(&self) -> std::time::Duration {
        self.handshake.heartbeat_window()
    }

    pub(crate) fn sid(&self) -> &str {
        &self.handshake.sid
    }
}

/// Transport-independent half of a running link: where frames go, where
/// outbound intents come from, and who is told about status changes.
pub(crate) struct LinkContext {
    pub(crate) frames: mpsc::UnboundedSender<PushFrame>,
    pub(crate) commands: mpsc::UnboundedReceiver<Outbound>,
    pub(crate) status: watch::Sender<LinkStatus>,
    pub(crate) cancel: CancellationToken,
    pub(crate) auth: Option<Value>,
    /// Set once the current attempt reached a Socket.IO CONNECT ack.
    pub(crate) opened: bool,
}

impl LinkContext {
    /// Fold one inbound packet into `session`.
    pub(crate) fn absorb(
        &mut self,
        session: &mut SocketSession,
        packet: EnginePacket,
        transport: TransportKind,
    ) -> Result<Flow, Error> {
        match packet {
            EnginePacket::Ping(data) => {
                trace!("Engine.IO ping");
                Ok(Flow::Reply(EnginePacket::Pong(data)))
            }
            EnginePacket::Close => {
                info!("server closed the Engine.IO session");
                Ok(Flow::Closed)
            }
            EnginePacket::Message(body) => self.absorb_message(session, &body, transport),
            EnginePacket::Open(_) => Err(Error::Protocol(
                "second open packet inside a live session".into(),
            )),
            EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => Ok(Flow::Continue),
        }
    }

    fn absorb_message(
        &mut self,
        session: &mut SocketSession,
        body: &str,
        transport: TransportKind,
    ) -> Result<Flow, Error> {
        let packet = match SocketPacket::decode(body) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "skipping malformed Socket.IO packet");
                return Ok(Flow::Continue);
            }
        };

        match packet {
            SocketPacket::Connect { data, .. } => {
                session.connected = true;
                self.opened = true;
                let sid = data
                    .as_ref()
                    .and_then(|d| d.get("sid"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                info!(%transport, engine_sid = session.sid(), socket_sid = sid, "push channel connected");
                self.status.send_replace(LinkStatus::Open { transport });
                Ok(Flow::Continue)
            }
            SocketPacket::ConnectError { data, .. } => {
                let message = data
                    .get("message")
                    .and_then(Value::as_str)
                    .map_or_else(|| data.to_string(), str::to_owned);
                Err(Error::Handshake(format!("server refused connect: {message}")))
            }
            SocketPacket::Disconnect { .. } => {
                info!("server disconnected the Socket.IO namespace");
                Ok(Flow::Closed)
            }
            SocketPacket::Event { name, args, .. } => {
                let payload = args.into_iter().next().unwrap_or(Value::Null);
                if self
                    .frames
                    .send(PushFrame {
                        event: name,
                        payload,
                    })
                    .is_err()
                {
                    debug!("frame receiver dropped, closing session");
                    return Ok(Flow::Closed);
                }
                Ok(Flow::Continue)
            }
            SocketPacket::Ack { id, .. } => {
                trace!(id, "ignoring unsolicited ack");
                Ok(Flow::Continue)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn handshake() -> OpenHandshake {
        OpenHandshake {
            sid: "e1".into(),
            upgrades: vec![],
            ping_interval: 25_000,
            ping_timeout: 20_000,
            max_payload: None,
        }
    }

    fn context() -> (
        LinkContext,
        mpsc::UnboundedReceiver<PushFrame>,
        watch::Receiver<LinkStatus>,
    ) {
        let (frames, frames_rx) = mpsc::unbounded_channel();
        let (_commands_tx, commands) = mpsc::unbounded_channel();
        let (status, status_rx) = watch::channel(LinkStatus::Connecting);
        (
            LinkContext {
                frames,
                commands,
                status,
                cancel: CancellationToken::new(),
                auth: None,
                opened: false,
            },
            frames_rx,
            status_rx,
        )
    }

    #[test]
    fn open_emits_connect_with_auth() {
        let (_, connect) = SocketSession::open(handshake(), Some(json!({"token": "abc"})));
        assert_eq!(connect.encode(), r#"40{"token":"abc"}"#);
        let (_, bare) = SocketSession::open(handshake(), None);
        assert_eq!(bare.encode(), "40");
    }

    #[test]
    fn ping_is_answered_with_pong() {
        let (mut ctx, _frames, _status) = context();
        let (mut session, _) = SocketSession::open(handshake(), None);
        let flow = ctx
            .absorb(&mut session, EnginePacket::Ping(String::new()), TransportKind::WebSocket)
            .unwrap();
        assert_eq!(flow, Flow::Reply(EnginePacket::Pong(String::new())));
    }

    #[test]
    fn connect_ack_marks_link_open() {
        let (mut ctx, _frames, status) = context();
        let (mut session, _) = SocketSession::open(handshake(), None);
        ctx.absorb(
            &mut session,
            EnginePacket::Message(r#"0{"sid":"s1"}"#.into()),
            TransportKind::Polling,
        )
        .unwrap();
        assert!(session.is_connected());
        assert!(ctx.opened);
        assert_eq!(
            *status.borrow(),
            LinkStatus::Open {
                transport: TransportKind::Polling
            }
        );
    }

    #[test]
    fn events_become_frames() {
        let (mut ctx, mut frames, _status) = context();
        let (mut session, _) = SocketSession::open(handshake(), None);
        ctx.absorb(
            &mut session,
            EnginePacket::Message(r#"2["gateway_status",{"gateway_id":"GW-01","status":"offline"}]"#.into()),
            TransportKind::WebSocket,
        )
        .unwrap();
        let frame = frames.try_recv().unwrap();
        assert_eq!(frame.event, "gateway_status");
        assert_eq!(frame.payload["status"], "offline");
    }

    #[test]
    fn event_without_args_has_null_payload() {
        let (mut ctx, mut frames, _status) = context();
        let (mut session, _) = SocketSession::open(handshake(), None);
        ctx.absorb(
            &mut session,
            EnginePacket::Message(r#"2["alert:new"]"#.into()),
            TransportKind::WebSocket,
        )
        .unwrap();
        assert_eq!(frames.try_recv().unwrap().payload, Value::Null);
    }

    #[test]
    fn connect_error_fails_the_attempt() {
        let (mut ctx, _frames, _status) = context();
        let (mut session, _) = SocketSession::open(handshake(), None);
        let err = ctx
            .absorb(
                &mut session,
                EnginePacket::Message(r#"4{"message":"Not authorized"}"#.into()),
                TransportKind::WebSocket,
            )
            .unwrap_err();
        assert!(err.to_string().contains("Not authorized"));
        assert!(!ctx.opened);
    }

    #[test]
    fn malformed_message_is_skipped() {
        let (mut ctx, mut frames, _status) = context();
        let (mut session, _) = SocketSession::open(handshake(), None);
        let flow = ctx
            .absorb(
                &mut session,
                EnginePacket::Message("2not-json".into()),
                TransportKind::WebSocket,
            )
            .unwrap();
        assert_eq!(flow, Flow::Continue);
        assert!(frames.try_recv().is_err());
    }

    #[test]
    fn close_and_disconnect_end_the_session() {
        let (mut ctx, _frames, _status) = context();
        let (mut session, _) = SocketSession::open(handshake(), None);
        assert_eq!(
            ctx.absorb(&mut session, EnginePacket::Close, TransportKind::WebSocket)
                .unwrap(),
            Flow::Closed
        );
        assert_eq!(
            ctx.absorb(
                &mut session,
                EnginePacket::Message("1".into()),
                TransportKind::WebSocket
            )
            .unwrap(),
            Flow::Closed
        );
    }
}
