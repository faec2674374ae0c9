/// Legacy HTTP+SSE Transport Adapter
///
/// One `SseTransport` per client connection. It owns two queues:
/// - inbound: JSON-RPC requests POSTed by the client, drained in arrival
///   order by a single worker task that feeds them to the protocol engine;
/// - outbound: framed SSE events, drained by the streaming response body.
///
/// Lifecycle is `Establishing -> Open -> Closed`. Closing is idempotent and
/// fires the registered close observer exactly once.
///
/// An idle stream emits a `: ping` comment every keep-alive period. actix
/// only notices a vanished peer when a write fails, so without the ping a
/// disconnected client would keep its session forever.

use bytes::Bytes;
use futures_util::Stream;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::engine::McpEngine;
use crate::core::protocol::MCPRequest;

/// Errors raised when talking to a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("session {0} is closed")]
    Closed(String),
}

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Establishing,
    Open,
    Closed,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Establishing,
            1 => SessionState::Open,
            _ => SessionState::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            SessionState::Establishing => 0,
            SessionState::Open => 1,
            SessionState::Closed => 2,
        }
    }
}

/// A single Server-Sent Event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

impl SseEvent {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }

    /// Wire framing: one `data:` line per payload line, blank line terminator.
    pub fn encode(&self) -> Bytes {
        let mut frame = String::with_capacity(self.event.len() + self.data.len() + 16);
        frame.push_str("event: ");
        frame.push_str(&self.event);
        frame.push('\n');
        for line in self.data.split('\n') {
            frame.push_str("data: ");
            frame.push_str(line);
            frame.push('\n');
        }
        frame.push('\n');
        Bytes::from(frame)
    }
}

/// SSE comment frame; clients ignore it.
pub const KEEP_ALIVE_FRAME: &[u8] = b": ping\n\n";

type CloseObserver = Box<dyn FnOnce(&str) + Send>;

pub struct SseTransport {
    session_id: String,
    state: AtomicU8,
    inbound: Mutex<Option<mpsc::UnboundedSender<MCPRequest>>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<SseEvent>>>,
    on_close: Mutex<Option<CloseObserver>>,
}

impl SseTransport {
    /// Open a new session bound to `engine`.
    ///
    /// Generates a fresh session id, queues the `endpoint` event pointing at
    /// `message_path?sessionId=<id>`, and spawns the session worker onto the
    /// current actix runtime.
    ///
    /// # Arguments
    /// * `engine` - Protocol engine that answers this session's requests
    /// * `message_path` - Path clients POST follow-up messages to
    /// * `keep_alive` - Idle interval between `: ping` comment frames
    ///
    /// # Returns
    /// The transport and the body stream the caller must hand to the HTTP
    /// response. Must be called from within an actix/tokio runtime.
    pub fn connect(
        engine: Arc<McpEngine>,
        message_path: &str,
        keep_alive: Duration,
    ) -> (Arc<Self>, EventStream) {
        let session_id = Uuid::new_v4().to_string();
        let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel::<MCPRequest>();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let transport = Arc::new(Self {
            session_id,
            state: AtomicU8::new(SessionState::Establishing.as_u8()),
            inbound: Mutex::new(Some(inbound_tx)),
            outbound: Mutex::new(Some(outbound_tx)),
            on_close: Mutex::new(None),
        });

        transport.send_event(SseEvent::new(
            "endpoint",
            format!("{message_path}?sessionId={}", transport.session_id),
        ));

        let worker = Arc::clone(&transport);
        actix_rt::spawn(async move {
            while let Some(request) = inbound_rx.recv().await {
                let method = request.method.clone();
                let Some(response) = engine.handle(request).await else {
                    continue;
                };
                let payload = match serde_json::to_string(&response) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(session_id = %worker.session_id, error = %e, "failed to serialize response");
                        continue;
                    }
                };
                if !worker.send_event(SseEvent::new("message", payload)) {
                    debug!(session_id = %worker.session_id, method = %method, "session closed, discarding response");
                }
            }
            debug!(session_id = %worker.session_id, "session worker finished");
        });

        // First ping one full period after connect, not immediately.
        let mut ping = tokio::time::interval_at(Instant::now() + keep_alive, keep_alive);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let stream = EventStream {
            events: outbound_rx,
            ping,
            guard: CloseOnDrop(Arc::clone(&transport)),
        };
        (transport, stream)
    }

    /// # Returns
    /// The UUID v4 (hyphenated) identifying this session on the wire
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_closed(&self) -> bool {
        self.state() == SessionState::Closed
    }

    /// `Establishing -> Open`. Has no effect in any other state.
    ///
    /// # Returns
    /// True if this call performed the transition
    pub fn open(&self) -> bool {
        self.state
            .compare_exchange(
                SessionState::Establishing.as_u8(),
                SessionState::Open.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Subscribe the single close observer.
    ///
    /// If the transport is already closed the observer runs immediately.
    pub fn on_close(&self, observer: impl FnOnce(&str) + Send + 'static) {
        let mut slot = self.on_close.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_closed() {
            drop(slot);
            observer(&self.session_id);
            return;
        }
        if slot.is_some() {
            warn!(session_id = %self.session_id, "replacing existing close observer");
        }
        *slot = Some(Box::new(observer));
    }

    /// Queue a client message for the session worker.
    ///
    /// # Arguments
    /// * `request` - One JSON-RPC message; its response, if any, is sent as
    ///   a `message` event
    ///
    /// # Returns
    /// `TransportError::Closed` once the session has closed
    pub fn handle_post_message(&self, request: MCPRequest) -> Result<(), TransportError> {
        let inbound = self.inbound.lock().unwrap_or_else(PoisonError::into_inner);
        inbound
            .as_ref()
            .and_then(|tx| tx.send(request).ok())
            .ok_or_else(|| TransportError::Closed(self.session_id.clone()))
    }

    /// Push an event to the client. Returns false once the session is closed.
    pub fn send_event(&self, event: SseEvent) -> bool {
        let outbound = self.outbound.lock().unwrap_or_else(PoisonError::into_inner);
        outbound
            .as_ref()
            .is_some_and(|tx| tx.send(event).is_ok())
    }

    /// Close the session.
    ///
    /// Drops both queues, which ends the event stream after already-queued
    /// events and stops the worker once its in-flight request completes. Only
    /// the first call has any effect.
    pub fn close(&self) {
        let previous = self.state.swap(SessionState::Closed.as_u8(), Ordering::AcqRel);
        if SessionState::from_u8(previous) == SessionState::Closed {
            return;
        }

        self.inbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        info!(session_id = %self.session_id, "session closed");

        let observer = self
            .on_close
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(observer) = observer {
            observer(&self.session_id);
        }
    }
}

impl std::fmt::Debug for SseTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseTransport")
            .field("session_id", &self.session_id)
            .field("state", &self.state())
            .finish()
    }
}

struct CloseOnDrop(Arc<SseTransport>);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Streaming SSE response body for one session.
///
/// Dropping it (client disconnect) closes the session.
pub struct EventStream {
    events: mpsc::UnboundedReceiver<SseEvent>,
    ping: Interval,
    guard: CloseOnDrop,
}

impl EventStream {
    /// Id of the session this stream belongs to.
    pub fn session_id(&self) -> &str {
        self.guard.0.session_id()
    }
}

impl Stream for EventStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.events.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                // Real traffic proves liveness just as well as a ping.
                self.ping.reset();
                return Poll::Ready(Some(Ok(event.encode())));
            }
            // Queue closed: the session is over, stop pinging.
            Poll::Ready(None) => return Poll::Ready(None),
            Poll::Pending => {}
        }
        match self.ping.poll_tick(cx) {
            Poll::Ready(_) => Poll::Ready(Some(Ok(Bytes::from_static(KEEP_ALIVE_FRAME)))),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::ServerInfo;
    use crate::core::registry::ToolRegistry;
    use futures_util::StreamExt;
    use serde_json::{Value, json};
    use std::sync::atomic::AtomicUsize;

    /// Long enough that no ping lands inside a test.
    const QUIET: Duration = Duration::from_secs(600);

    fn engine() -> Arc<McpEngine> {
        Arc::new(McpEngine::new(
            ServerInfo {
                name: "transport-test".to_string(),
                version: "0.0.0".to_string(),
            },
            Arc::new(ToolRegistry::new()),
        ))
    }

    async fn next_event(stream: &mut EventStream) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("timed out waiting for event")
            .map(|frame| String::from_utf8(frame.unwrap().to_vec()).unwrap())
    }

    fn data_of(frame: &str) -> Value {
        let data = frame
            .lines()
            .find_map(|line| line.strip_prefix("data: "))
            .unwrap();
        serde_json::from_str(data).unwrap()
    }

    #[test]
    fn multi_line_data_is_framed_per_line() {
        let frame = SseEvent::new("message", "a\nb").encode();
        assert_eq!(&frame[..], b"event: message\ndata: a\ndata: b\n\n");
    }

    #[actix_rt::test]
    async fn first_event_announces_message_endpoint() {
        let (transport, mut stream) = SseTransport::connect(engine(), "/mcp/message", QUIET);
        let frame = next_event(&mut stream).await.unwrap();
        assert_eq!(
            frame,
            format!(
                "event: endpoint\ndata: /mcp/message?sessionId={}\n\n",
                transport.session_id()
            )
        );
        assert_eq!(transport.state(), SessionState::Establishing);
        assert!(transport.open());
        assert!(!transport.open());
        assert_eq!(transport.state(), SessionState::Open);
    }

    #[actix_rt::test]
    async fn responses_come_back_in_arrival_order() {
        let (transport, mut stream) = SseTransport::connect(engine(), "/mcp/message", QUIET);
        next_event(&mut stream).await;

        transport
            .handle_post_message(MCPRequest::new(Some(json!(1)), "ping", None))
            .unwrap();
        transport
            .handle_post_message(MCPRequest::new(None, "notifications/initialized", None))
            .unwrap();
        transport
            .handle_post_message(MCPRequest::new(Some(json!(2)), "tools/list", None))
            .unwrap();

        let first = next_event(&mut stream).await.unwrap();
        assert!(first.starts_with("event: message\n"));
        assert_eq!(data_of(&first)["id"], 1);

        let second = next_event(&mut stream).await.unwrap();
        assert_eq!(data_of(&second)["id"], 2);
        assert_eq!(data_of(&second)["result"]["tools"], json!([]));
    }

    #[actix_rt::test]
    async fn close_is_idempotent_and_notifies_once() {
        let (transport, mut stream) = SseTransport::connect(engine(), "/mcp/message", QUIET);
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);
        transport.on_close(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        transport.close();
        transport.close();
        assert_eq!(notified.load(Ordering::SeqCst), 1);
        assert!(transport.is_closed());
        assert!(matches!(
            transport.handle_post_message(MCPRequest::new(Some(json!(1)), "ping", None)),
            Err(TransportError::Closed(_))
        ));
        assert!(!transport.send_event(SseEvent::new("message", "late")));

        // Stream ends once the queued endpoint event (if still queued) drains.
        while next_event(&mut stream).await.is_some() {}
        drop(stream);
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    #[actix_rt::test]
    async fn dropping_the_stream_closes_the_session() {
        let (transport, stream) = SseTransport::connect(engine(), "/mcp/message", QUIET);
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);
        transport.on_close(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(stream.session_id(), transport.session_id());

        drop(stream);
        assert!(transport.is_closed());
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    #[actix_rt::test]
    async fn observer_registered_after_close_runs_immediately() {
        let (transport, _stream) = SseTransport::connect(engine(), "/mcp/message", QUIET);
        transport.close();
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);
        transport.on_close(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    #[actix_rt::test]
    async fn idle_stream_emits_keep_alive_comments() {
        let (transport, mut stream) =
            SseTransport::connect(engine(), "/mcp/message", Duration::from_millis(30));
        assert!(next_event(&mut stream).await.unwrap().starts_with("event: endpoint\n"));

        let ping = next_event(&mut stream).await.unwrap();
        assert_eq!(ping.as_bytes(), KEEP_ALIVE_FRAME);

        transport
            .handle_post_message(MCPRequest::new(Some(json!(5)), "ping", None))
            .unwrap();
        // Pings may interleave, but the response still arrives intact.
        let response = loop {
            let frame = next_event(&mut stream).await.unwrap();
            if frame.as_bytes() != KEEP_ALIVE_FRAME {
                break frame;
            }
        };
        assert_eq!(data_of(&response)["id"], 5);

        transport.close();
        assert!(next_event(&mut stream).await.is_none());
    }

    #[actix_rt::test]
    async fn sessions_are_isolated() {
        let (a, mut a_stream) = SseTransport::connect(engine(), "/mcp/message", QUIET);
        let (b, mut b_stream) = SseTransport::connect(engine(), "/mcp/message", QUIET);
        assert_ne!(a.session_id(), b.session_id());
        next_event(&mut a_stream).await;
        next_event(&mut b_stream).await;

        a.handle_post_message(MCPRequest::new(Some(json!("only-a")), "ping", None))
            .unwrap();
        let frame = next_event(&mut a_stream).await.unwrap();
        assert_eq!(data_of(&frame)["id"], "only-a");

        let nothing = tokio::time::timeout(Duration::from_millis(100), b_stream.next()).await;
        assert!(nothing.is_err(), "session b received an event meant for a");
    }
}
