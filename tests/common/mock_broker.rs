//! In-memory STOMP broker standing in for the WebSocket endpoint.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use workflowgo_lib::realtime::{
    decode_frames, SocketConnection, SocketTransport, StompCommand, StompFrame, TransportError,
    HEARTBEAT,
};

#[derive(Debug, Clone)]
enum Handshake {
    Accept,
    Reject(String),
}

struct BrokerState {
    urls: Mutex<Vec<String>>,
    frames: Mutex<Vec<StompFrame>>,
    heartbeats: AtomicUsize,
    refuse_connects: AtomicBool,
    fail_subscribe: AtomicBool,
    closes: AtomicUsize,
    handshake: Mutex<Handshake>,
    /// `heart-beat` header sent back in CONNECTED.
    heart_beat: Mutex<String>,
    /// Server side of each accepted socket; `None` closes it.
    sockets: Mutex<Vec<mpsc::UnboundedSender<Option<String>>>>,
    message_seq: AtomicUsize,
}

/// A broker that accepts CONNECT, records every frame it receives and lets
/// tests push MESSAGE frames or drop the socket.
#[derive(Clone)]
pub struct MockBroker {
    state: Arc<BrokerState>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(BrokerState {
                urls: Mutex::new(Vec::new()),
                frames: Mutex::new(Vec::new()),
                heartbeats: AtomicUsize::new(0),
                refuse_connects: AtomicBool::new(false),
                fail_subscribe: AtomicBool::new(false),
                closes: AtomicUsize::new(0),
                handshake: Mutex::new(Handshake::Accept),
                heart_beat: Mutex::new("0,0".to_string()),
                sockets: Mutex::new(Vec::new()),
                message_seq: AtomicUsize::new(0),
            }),
        }
    }

    pub fn transport(&self) -> Arc<dyn SocketTransport> {
        Arc::new(MockSocketTransport {
            state: self.state.clone(),
        })
    }

    /// Make every socket open fail until turned off again.
    pub fn refuse_connects(&self, refuse: bool) {
        self.state.refuse_connects.store(refuse, Ordering::SeqCst);
    }

    /// Fail the socket write that carries SUBSCRIBE.
    pub fn fail_subscribe(&self, fail: bool) {
        self.state.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    /// Sockets the client has closed.
    pub fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// Answer CONNECT with an ERROR frame.
    pub fn reject_handshake(&self, message: &str) {
        *self.state.handshake.lock().unwrap() = Handshake::Reject(message.to_string());
    }

    /// Heart-beat periods (`cx,cy` in ms) the broker offers in CONNECTED.
    /// The broker never sends heart-beats itself.
    pub fn offer_heartbeat(&self, header: &str) {
        *self.state.heart_beat.lock().unwrap() = header.to_string();
    }

    pub fn connect_count(&self) -> usize {
        self.state.urls.lock().unwrap().len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.state.urls.lock().unwrap().clone()
    }

    pub fn frames(&self) -> Vec<StompFrame> {
        self.state.frames.lock().unwrap().clone()
    }

    pub fn frames_of(&self, command: StompCommand) -> Vec<StompFrame> {
        self.frames()
            .into_iter()
            .filter(|frame| frame.command == command)
            .collect()
    }

    pub fn heartbeats(&self) -> usize {
        self.state.heartbeats.load(Ordering::SeqCst)
    }

    /// Deliver `body` as a MESSAGE on the newest socket.
    pub fn push_message(&self, body: &str) {
        let seq = self.state.message_seq.fetch_add(1, Ordering::SeqCst);
        let frame = StompFrame::new(StompCommand::Message)
            .header("destination", "/queue/user.u1")
            .header("subscription", "sub-0")
            .header("message-id", seq.to_string())
            .body(body);
        self.push_raw(frame.encode());
    }

    pub fn push_raw(&self, text: String) {
        if let Some(socket) = self.state.sockets.lock().unwrap().last() {
            let _ = socket.send(Some(text));
        }
    }

    /// Close the newest socket from the broker side.
    pub fn drop_connection(&self) {
        if let Some(socket) = self.state.sockets.lock().unwrap().last() {
            let _ = socket.send(None);
        }
    }
}

struct MockSocketTransport {
    state: Arc<BrokerState>,
}

#[async_trait]
impl SocketTransport for MockSocketTransport {
    async fn connect(&self, url: &str) -> Result<Box<dyn SocketConnection>, TransportError> {
        self.state.urls.lock().unwrap().push(url.to_string());
        if self.state.refuse_connects.load(Ordering::SeqCst) {
            return Err(TransportError::Connection("connection refused".to_string()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.sockets.lock().unwrap().push(tx.clone());
        Ok(Box::new(MockConnection {
            state: self.state.clone(),
            to_client: tx,
            inbox: rx,
        }))
    }
}

struct MockConnection {
    state: Arc<BrokerState>,
    to_client: mpsc::UnboundedSender<Option<String>>,
    inbox: mpsc::UnboundedReceiver<Option<String>>,
}

#[async_trait]
impl SocketConnection for MockConnection {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        if text == HEARTBEAT {
            self.state.heartbeats.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        }
        let frames = decode_frames(&text).map_err(|e| TransportError::Protocol(e.to_string()))?;
        for frame in frames {
            let is_connect = frame.command == StompCommand::Connect;
            let is_subscribe = frame.command == StompCommand::Subscribe;
            self.state.frames.lock().unwrap().push(frame);
            if is_subscribe && self.state.fail_subscribe.load(Ordering::SeqCst) {
                return Err(TransportError::Closed("write failed".to_string()));
            }
            if is_connect {
                let reply = match self.state.handshake.lock().unwrap().clone() {
                    Handshake::Accept => StompFrame::new(StompCommand::Connected)
                        .header("version", "1.2")
                        .header("heart-beat", self.state.heart_beat.lock().unwrap().clone()),
                    Handshake::Reject(message) => {
                        StompFrame::new(StompCommand::Error).header("message", message)
                    }
                };
                let _ = self.to_client.send(Some(reply.encode()));
            }
        }
        Ok(())
    }

    async fn recv_text(&mut self) -> Option<Result<String, TransportError>> {
        match self.inbox.recv().await {
            Some(Some(text)) => Some(Ok(text)),
            Some(None) | None => None,
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        self.inbox.close();
        Ok(())
    }
}
