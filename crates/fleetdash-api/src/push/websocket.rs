// WebSocket transport
//
// Opens `ws(s)://…/socket.io/?EIO=4&transport=websocket`, reads the
// Engine.IO open packet, sends the Socket.IO CONNECT, then pumps frames
// until the server goes away, the heartbeat lapses, or the link is
// cancelled.

use futures_util::{SinkExt, StreamExt};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder, Message};
use tracing::{debug, info, trace, warn};

use crate::error::Error;
use crate::push::link::{Endpoint, PushOptions, TransportKind};
use crate::push::packet::EnginePacket;
use crate::push::session::{Flow, LinkContext, SocketSession};
use crate::push::tls;

const KIND: TransportKind = TransportKind::WebSocket;

pub(crate) async fn run(
    endpoint: &Endpoint,
    options: &PushOptions,
    ctx: &mut LinkContext,
) -> Result<(), Error> {
    let url = endpoint.websocket_url()?;
    info!(url = %url, "connecting push websocket");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;
    let connector = tls::websocket_connector(&options.tls)?;

    let timeout_secs = options.connect_timeout.as_secs();
    let (ws_stream, _response) = tokio::time::timeout(
        options.connect_timeout,
        tokio_tungstenite::connect_async_tls_with_config(
            ClientRequestBuilder::new(uri),
            None,
            false,
            connector,
        ),
    )
    .await
    .map_err(|_| Error::Timeout { timeout_secs })?
    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    let (mut write, mut read) = ws_stream.split();

    // The server speaks first with the Engine.IO open packet.
    let handshake = tokio::time::timeout(options.connect_timeout, async {
        loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => {
                    return match EnginePacket::decode(text.as_str())? {
                        EnginePacket::Open(handshake) => Ok(handshake),
                        other => Err(Error::Handshake(format!(
                            "expected open packet, got {other:?}"
                        ))),
                    };
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(Error::Handshake("closed before open packet".into()));
                }
                Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
                Some(Ok(_)) => {}
            }
        }
    })
    .await
    .map_err(|_| Error::Timeout { timeout_secs })??;

    let (mut session, connect) = SocketSession::open(handshake, ctx.auth.clone());
    write
        .send(text_message(&connect))
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    let window = session.heartbeat_window();
    let timeout_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
    let deadline = tokio::time::sleep(window);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return Ok(());
            }
            () = &mut deadline => {
                return Err(Error::HeartbeatTimeout { timeout_ms });
            }
            Some(outbound) = ctx.commands.recv(), if session.is_connected() => {
                debug!(event = %outbound.event, "emitting push event");
                write
                    .send(text_message(&outbound.into_packet()))
                    .await
                    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        deadline.as_mut().reset(Instant::now() + window);
                        let packet = match EnginePacket::decode(text.as_str()) {
                            Ok(packet) => packet,
                            Err(e) => {
                                warn!(error = %e, "skipping malformed Engine.IO frame");
                                continue;
                            }
                        };
                        match ctx.absorb(&mut session, packet, KIND)? {
                            Flow::Continue => {}
                            Flow::Reply(reply) => {
                                write
                                    .send(text_message(&reply))
                                    .await
                                    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
                            }
                            Flow::Closed => {
                                let _ = write.send(Message::Close(None)).await;
                                return Ok(());
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) => {
                        // tungstenite answers control pings itself
                        trace!("WebSocket ping");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let Some(cf) = frame else {
                            info!("WebSocket close frame received (no payload)");
                            return Ok(());
                        };
                        info!(code = %cf.code, reason = %cf.reason, "WebSocket close frame received");
                        return match cf.code {
                            CloseCode::Normal | CloseCode::Away => Ok(()),
                            code => Err(Error::WebSocketClosed {
                                code: code.into(),
                                reason: cf.reason.to_string(),
                            }),
                        };
                    }
                    Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
                    None => {
                        info!("WebSocket stream ended");
                        return Ok(());
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

fn text_message(packet: &EnginePacket) -> Message {
    Message::Text(packet.encode().into())
}
