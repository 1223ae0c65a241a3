// Socket.IO push channel
//
// Engine.IO v4 client with a WebSocket transport and a long-polling
// fallback. `link` owns reconnection; the transports own one session each.

pub mod link;
pub mod packet;

mod polling;
mod session;
mod tls;
mod websocket;

pub use link::{
    LinkStatus, PushFrame, PushHandle, PushOptions, ReconnectConfig, TransportKind,
    TransportPolicy,
};
