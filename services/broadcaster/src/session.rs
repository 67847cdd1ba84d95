//! Viewer session lifecycle.
//!
//! `Connecting -> Open -> Closed`. The session is registered once the
//! WebSocket handshake completes, gets one bootstrap payload, and then only
//! waits for the transport to end or for the registry to evict it. Every path
//! to `Closed` goes through `unregister`.

use crate::registry::{PushChannel, PushError, SessionHandle};
use crate::source::EventQuery;
use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use chrono::Utc;
use futures_util::future::{self, BoxFuture};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, Stream, StreamExt};
use std::sync::Arc;
use sw_protocol::encode_batch;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Handshake completed and the session is in the registry.
    Opened,
    /// The viewer sent a close frame or the stream ended.
    ClientClosed,
    /// Read or write on the transport failed.
    TransportError,
    /// The registry dropped the session (failed push).
    Evicted,
}

impl SessionState {
    pub fn on_event(self, event: SessionEvent) -> Self {
        match (self, event) {
            (Self::Closed, _) => Self::Closed,
            (Self::Connecting | Self::Open, SessionEvent::Opened) => Self::Open,
            (
                _,
                SessionEvent::ClientClosed | SessionEvent::TransportError | SessionEvent::Evicted,
            ) => Self::Closed,
        }
    }

    pub fn is_closed(self) -> bool {
        self == Self::Closed
    }
}

/// Write half of a viewer WebSocket. The mutex serializes concurrent pushes.
pub struct WsPushChannel {
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsPushChannel {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }
}

impl PushChannel for WsPushChannel {
    fn push(&self, payload: Arc<str>) -> BoxFuture<'_, Result<(), PushError>> {
        Box::pin(async move {
            self.sink
                .lock()
                .await
                .send(Message::Text(payload.to_string()))
                .await?;
            Ok(())
        })
    }
}

/// Registry-facing channel for a session. Dispatcher pushes wait until the
/// bootstrap window has gone out on the inner channel, so a tick batch never
/// reaches a viewer ahead of its catch-up.
struct BootstrapGate {
    channel: Arc<dyn PushChannel>,
    ready: CancellationToken,
}

impl BootstrapGate {
    fn new(channel: Arc<dyn PushChannel>) -> Self {
        Self {
            channel,
            ready: CancellationToken::new(),
        }
    }

    fn open(&self) {
        self.ready.cancel();
    }
}

impl PushChannel for BootstrapGate {
    fn push(&self, payload: Arc<str>) -> BoxFuture<'_, Result<(), PushError>> {
        Box::pin(async move {
            self.ready.cancelled().await;
            self.channel.push(payload).await
        })
    }
}

pub async fn ws_viewer_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_session(socket, state))
}

async fn run_session(socket: WebSocket, state: AppState) {
    let (sink, stream) = socket.split();
    // Viewers have nothing to say; pings are answered by the transport.
    let inbound = stream.filter_map(|frame| {
        future::ready(match frame {
            Ok(Message::Close(_)) => Some(SessionEvent::ClientClosed),
            Err(e) => {
                debug!(error = %e, "viewer transport error");
                Some(SessionEvent::TransportError)
            }
            Ok(_) => None,
        })
    });
    drive_session(
        &state,
        Arc::new(WsPushChannel::new(sink)),
        CancellationToken::new(),
        inbound,
    )
    .await;
}

/// Run one session from registration to `Closed`.
///
/// `inbound` yields the viewer-side events; its end counts as a client close.
/// `closed` becomes the registry token and is cancelled on the way out.
async fn drive_session<S>(
    state: &AppState,
    channel: Arc<dyn PushChannel>,
    closed: CancellationToken,
    mut inbound: S,
) -> SessionState
where
    S: Stream<Item = SessionEvent> + Unpin,
{
    let mut lifecycle = SessionState::Connecting;
    let gate = Arc::new(BootstrapGate::new(Arc::clone(&channel)));
    let handle = SessionHandle {
        channel: Arc::clone(&gate) as Arc<dyn PushChannel>,
        joined_at: Utc::now(),
        closed: closed.clone(),
    };

    let id = state.registry.register(handle).await;
    lifecycle = lifecycle.on_event(SessionEvent::Opened);
    let clients = state.registry.len().await;
    info!(connection = %id, clients, "viewer connected");

    let bootstrap = send_bootstrap(state, channel.as_ref()).await;
    gate.open();
    match bootstrap {
        Ok(sent) => debug!(connection = %id, events = sent, "bootstrap sent"),
        Err(e) => {
            warn!(connection = %id, error = %e, "bootstrap push failed");
            lifecycle = lifecycle.on_event(SessionEvent::TransportError);
        }
    }

    while !lifecycle.is_closed() {
        let event = tokio::select! {
            () = closed.cancelled() => SessionEvent::Evicted,
            event = inbound.next() => event.unwrap_or(SessionEvent::ClientClosed),
        };
        lifecycle = lifecycle.on_event(event);
    }

    state.registry.unregister(id).await;
    let clients = state.registry.len().await;
    info!(connection = %id, clients, "viewer disconnected");
    lifecycle
}

/// Send the most recent window to a newly opened session, independent of the
/// dispatcher's watermark. A store failure or an empty store sends nothing.
async fn send_bootstrap(
    state: &AppState,
    channel: &dyn PushChannel,
) -> Result<usize, PushError> {
    let events = match state
        .source
        .fetch(EventQuery::Latest {
            limit: state.bootstrap_window,
        })
        .await
    {
        Ok(events) => events,
        Err(e) => {
            warn!(error = %e, "bootstrap fetch failed; viewer waits for next tick");
            return Ok(0);
        }
    };
    if events.is_empty() {
        return Ok(0);
    }
    let payload = match encode_batch(&events) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "failed to serialize bootstrap batch");
            return Ok(0);
        }
    };
    channel.push(payload.into()).await?;
    Ok(events.len())
}
