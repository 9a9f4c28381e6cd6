//! Realtime session with the message broker.
//!
//! - `transport`: socket abstraction and the tokio-tungstenite implementation
//! - `stomp`: STOMP 1.2 frame codec and heart-beat negotiation
//! - `envelope`: `{type, data}` messages and their typed decoding
//! - `connection`: the connection state machine with reconnect backoff
//! - `dispatcher`: applies inbound messages to the notification store

mod connection;
mod dispatcher;
mod envelope;
mod stomp;
mod transport;

pub use connection::{ConnectionManager, ConnectionState, RealtimeConfig, RealtimeError};
pub use dispatcher::Dispatcher;
pub use envelope::{
    DecodeError, Envelope, InboundMessage, InterviewReminderPayload, MessageKind, ReadTarget,
    ReminderInterview,
};
pub use stomp::{decode_frames, negotiate_heartbeat, StompCommand, StompError, StompFrame, HEARTBEAT};
pub use transport::{redact_token, SocketConnection, SocketTransport, TransportError, WsTransport};
