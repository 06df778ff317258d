//! WebSocket connection to the tutor backend.
//!
//! ## Design
//! - One I/O task per connection owns the `WebSocketStream` (split into sink and
//!   stream, as in a server-side handler) and never touches channel state.
//! - The task reports `ConnectionEvent`s over an unbounded mpsc channel; the
//!   event loop feeds each one back through `ConnectionManager::handle_event`,
//!   which is the only place the state changes.
//! - Outbound frames travel the other way over a second mpsc channel, so
//!   `send` is synchronous and never blocks the event loop.
//!
//! ## States
//! `Connecting → Open → Closed`. Only `Open` writes frames. There is no
//! reconnect: once closed, the session stays closed.

use futures_util::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use crate::config::{ChatConfig, NotReadyPolicy};
use crate::error::ChatError;
use crate::protocol::{InboundMessage, OutboundMessage};
use crate::session::ClientSession;

const CLOSE_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closed,
}

/// Lifecycle and data events reported by the I/O task.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// Handshake completed.
    Opened,
    /// One inbound text frame, unparsed.
    Frame(String),
    /// The channel ended; carries the handshake error or close reason if any.
    Closed(Option<String>),
}

/// What happened to a message handed to `send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to the socket.
    Sent,
    /// Held until the channel opens.
    Queued,
}

/// Anything the transcript can hand outbound messages to.
pub trait MessageSink {
    fn send(&mut self, message: &OutboundMessage) -> Result<SendOutcome, ChatError>;
}

pub struct ConnectionManager {
    url: String,
    state: ChannelState,
    policy: NotReadyPolicy,
    outbound: mpsc::UnboundedSender<WsMessage>,
    pending: VecDeque<OutboundMessage>,
    undelivered: Vec<OutboundMessage>,
    io_task: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Start connecting to the session's endpoint. Returns immediately in the
    /// `Connecting` state; progress arrives on the returned event receiver.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(
        session: &ClientSession,
        config: &ChatConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let url = session.ws_url(&config.base_url());
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        info!(url = %url, client_id = session.client_id(), "connecting");
        let io_task = tokio::spawn(run_io(url.clone(), outbound_rx, event_tx));

        let manager = Self {
            url,
            state: ChannelState::Connecting,
            policy: config.not_ready_policy,
            outbound: outbound_tx,
            pending: VecDeque::new(),
            undelivered: Vec::new(),
            io_task: Some(io_task),
        };
        (manager, event_rx)
    }

    /// A manager with no I/O task: frames written while open land on the
    /// returned receiver, and lifecycle events are driven by the caller through
    /// `handle_event`. Useful for custom transports and tests.
    pub fn in_memory(
        url: impl Into<String>,
        policy: NotReadyPolicy,
    ) -> (Self, mpsc::UnboundedReceiver<WsMessage>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let manager = Self {
            url: url.into(),
            state: ChannelState::Connecting,
            policy,
            outbound: outbound_tx,
            pending: VecDeque::new(),
            undelivered: Vec::new(),
            io_task: None,
        };
        (manager, outbound_rx)
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Number of messages waiting for the channel to open.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Take the queued messages that never reached the socket. Filled when
    /// `handle_event` reports a lost queue.
    pub fn take_undelivered(&mut self) -> Vec<OutboundMessage> {
        std::mem::take(&mut self.undelivered)
    }

    /// Apply one event from the I/O task. Returns the parsed message for
    /// inbound frames, `None` for lifecycle events.
    ///
    /// A frame that fails to parse yields `MalformedPayload`; the connection
    /// itself is unaffected. Queued messages that cannot be delivered yield
    /// `SendFailure` (flush on open failed) or `ChannelNotReady` (closed before
    /// opening) and are kept for `take_undelivered`.
    pub fn handle_event(
        &mut self,
        event: ConnectionEvent,
    ) -> Result<Option<InboundMessage>, ChatError> {
        match event {
            ConnectionEvent::Opened => {
                if self.state == ChannelState::Connecting {
                    self.state = ChannelState::Open;
                    info!(url = %self.url, "WebSocket connection established");
                    self.flush_pending()?;
                }
                Ok(None)
            }
            ConnectionEvent::Frame(raw) => match InboundMessage::decode(&raw) {
                Ok(msg) => Ok(Some(msg)),
                Err(e) => {
                    warn!(error = %e, "discarding inbound frame");
                    Err(e)
                }
            },
            ConnectionEvent::Closed(reason) => {
                if self.state != ChannelState::Closed {
                    self.state = ChannelState::Closed;
                    match &reason {
                        Some(r) => warn!(url = %self.url, reason = %r, "connection closed"),
                        None => info!(url = %self.url, "connection closed"),
                    }
                }
                if self.pending.is_empty() {
                    return Ok(None);
                }
                warn!(dropped = self.pending.len(), "queued messages never sent");
                self.undelivered.extend(self.pending.drain(..));
                Err(ChatError::ChannelNotReady)
            }
        }
    }

    /// Teardown: send a Close frame if open, then stop the I/O task.
    pub async fn close(&mut self) {
        let was_open = self.state == ChannelState::Open;
        self.state = ChannelState::Closed;
        self.drop_pending();

        let Some(task) = self.io_task.take() else {
            return;
        };
        if was_open && self.outbound.send(WsMessage::Close(None)).is_ok() {
            let abort = task.abort_handle();
            if tokio::time::timeout(CLOSE_GRACE, task).await.is_err() {
                debug!("close handshake timed out");
                abort.abort();
            }
        } else {
            task.abort();
        }
    }

    fn write_frame(&self, message: &OutboundMessage) -> Result<(), ChatError> {
        let text = message.encode()?;
        let bytes = text.len();
        self.outbound
            .send(WsMessage::Text(text))
            .map_err(|_| ChatError::SendFailure("connection task has stopped".to_string()))?;
        debug!(kind = %message.kind, bytes, "frame sent");
        Ok(())
    }

    fn flush_pending(&mut self) -> Result<(), ChatError> {
        let mut first_err = None;
        while let Some(message) = self.pending.pop_front() {
            if let Err(e) = self.write_frame(&message) {
                error!(kind = %message.kind, error = %e, "failed to flush queued message");
                self.undelivered.push(message);
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn drop_pending(&mut self) {
        if !self.pending.is_empty() {
            warn!(dropped = self.pending.len(), "discarding queued messages");
            self.pending.clear();
        }
    }
}

impl MessageSink for ConnectionManager {
    fn send(&mut self, message: &OutboundMessage) -> Result<SendOutcome, ChatError> {
        match (self.state, self.policy) {
            (ChannelState::Open, _) => {
                self.write_frame(message)?;
                Ok(SendOutcome::Sent)
            }
            (ChannelState::Connecting, NotReadyPolicy::Queue) => {
                self.pending.push_back(message.clone());
                debug!(kind = %message.kind, pending = self.pending.len(), "queued until open");
                Ok(SendOutcome::Queued)
            }
            (state, _) => {
                debug!(?state, kind = %message.kind, "refusing send on unopened channel");
                Err(ChatError::ChannelNotReady)
            }
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(task) = self.io_task.take() {
            task.abort();
        }
    }
}

/// Owns the socket for the lifetime of the connection.
async fn run_io(
    url: String,
    mut outbound: mpsc::UnboundedReceiver<WsMessage>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
) {
    let ws_stream = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            warn!(url = %url, error = %e, "WebSocket handshake failed");
            let _ = events.send(ConnectionEvent::Closed(Some(e.to_string())));
            return;
        }
    };
    if events.send(ConnectionEvent::Opened).is_err() {
        return;
    }

    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    let reason = loop {
        tokio::select! {
            out = outbound.recv() => {
                match out {
                    Some(msg) => {
                        let closing = matches!(msg, WsMessage::Close(_));
                        if let Err(e) = ws_sink.send(msg).await {
                            break Some(e.to_string());
                        }
                        if closing {
                            break None;
                        }
                    }
                    // Manager dropped without an explicit close.
                    None => {
                        let _ = ws_sink.close().await;
                        break None;
                    }
                }
            }

            inbound = ws_stream.next() => {
                match inbound {
                    Some(Ok(WsMessage::Text(text))) => {
                        debug!(bytes = text.len(), "frame received");
                        if events.send(ConnectionEvent::Frame(text)).is_err() {
                            break None;
                        }
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        break frame.map(|f| f.reason.to_string()).filter(|r| !r.is_empty());
                    }
                    Some(Ok(_)) => {} // Ignore binary / ping / pong frames
                    Some(Err(e)) => break Some(e.to_string()),
                    None => break None,
                }
            }
        }
    };

    let _ = events.send(ConnectionEvent::Closed(reason));
}
