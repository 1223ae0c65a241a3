// HTTP long-polling transport
//
// Fallback for networks that block the WebSocket upgrade. The handshake GET
// returns the open packet; afterwards one GET is always in flight and is
// held by the server until it has packets (or a ping) for us. Outbound
// packets go out as POSTs. Multiple packets in one body are separated by
// the ASCII record separator.

use std::future::Future;
use std::pin::Pin;

use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::Error;
use crate::push::link::{Endpoint, PushOptions, TransportKind};
use crate::push::packet::{EnginePacket, RECORD_SEPARATOR, decode_payload};
use crate::push::session::{Flow, LinkContext, SocketSession};

const KIND: TransportKind = TransportKind::Polling;

type PollFuture = Pin<Box<dyn Future<Output = Result<String, Error>> + Send>>;

pub(crate) async fn run(
    endpoint: &Endpoint,
    http: &reqwest::Client,
    options: &PushOptions,
    ctx: &mut LinkContext,
) -> Result<(), Error> {
    let url = endpoint.polling_url(None);
    info!(url = %url, "opening push long-polling session");

    let timeout_secs = options.connect_timeout.as_secs();
    let body = tokio::time::timeout(options.connect_timeout, fetch(http.clone(), url))
        .await
        .map_err(|_| Error::Timeout { timeout_secs })??;

    let mut packets = decode_payload(&body)?.into_iter();
    let Some(EnginePacket::Open(handshake)) = packets.next() else {
        return Err(Error::Handshake("polling handshake did not start with open".into()));
    };

    let session_url = endpoint.polling_url(Some(&handshake.sid));
    let (mut session, connect) = SocketSession::open(handshake, ctx.auth.clone());
    send(http, &session_url, &[connect]).await?;

    // Anything the server piggybacked on the handshake body.
    for packet in packets {
        if absorb_and_reply(ctx, &mut session, packet, http, &session_url).await? == Flow::Closed {
            return Ok(());
        }
    }

    let window = session.heartbeat_window();
    let timeout_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
    let deadline = tokio::time::sleep(window);
    tokio::pin!(deadline);

    let mut poll: PollFuture = Box::pin(fetch(http.clone(), session_url.clone()));

    loop {
        tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => {
                let _ = send(http, &session_url, &[EnginePacket::Close]).await;
                return Ok(());
            }
            () = &mut deadline => {
                return Err(Error::HeartbeatTimeout { timeout_ms });
            }
            Some(outbound) = ctx.commands.recv(), if session.is_connected() => {
                debug!(event = %outbound.event, "emitting push event");
                send(http, &session_url, &[outbound.into_packet()]).await?;
            }
            body = &mut poll => {
                let body = body?;
                deadline.as_mut().reset(Instant::now() + window);
                poll = Box::pin(fetch(http.clone(), session_url.clone()));

                let packets = match decode_payload(&body) {
                    Ok(packets) => packets,
                    Err(e) => {
                        warn!(error = %e, "skipping malformed polling payload");
                        continue;
                    }
                };
                for packet in packets {
                    if absorb_and_reply(ctx, &mut session, packet, http, &session_url).await?
                        == Flow::Closed
                    {
                        return Ok(());
                    }
                }
            }
        }
    }
}

async fn absorb_and_reply(
    ctx: &mut LinkContext,
    session: &mut SocketSession,
    packet: EnginePacket,
    http: &reqwest::Client,
    url: &Url,
) -> Result<Flow, Error> {
    match ctx.absorb(session, packet, KIND)? {
        Flow::Reply(reply) => {
            send(http, url, &[reply]).await?;
            Ok(Flow::Continue)
        }
        flow => Ok(flow),
    }
}

/// One long-poll GET. Owns its inputs so it can live across loop turns.
async fn fetch(http: reqwest::Client, url: Url) -> Result<String, Error> {
    let resp = http
        .get(url)
        .send()
        .await
        .map_err(|e| Error::Polling(e.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(Error::Polling(format!("poll returned HTTP {status}")));
    }
    resp.text().await.map_err(|e| Error::Polling(e.to_string()))
}

async fn send(http: &reqwest::Client, url: &Url, packets: &[EnginePacket]) -> Result<(), Error> {
    let body = packets
        .iter()
        .map(EnginePacket::encode)
        .collect::<Vec<_>>()
        .join(&RECORD_SEPARATOR.to_string());

    let resp = http
        .post(url.clone())
        .header(reqwest::header::CONTENT_TYPE, "text/plain;charset=UTF-8")
        .body(body)
        .send()
        .await
        .map_err(|e| Error::Polling(e.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(Error::Polling(format!("post returned HTTP {status}")));
    }
    Ok(())
}
