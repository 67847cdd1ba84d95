//! Reconnecting viewer client.
//!
//! `Disconnected -> Connecting -> Connected -> Disconnected`, then a fixed
//! delay and around again, forever. Feed state belongs to one connection and
//! is cleared whenever a new one opens.

use crate::error::ViewerError;
use crate::feed::FeedState;
use crate::render::{Render, RenderFrame};
use crate::views::DashboardView;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use sw_protocol::decode_batch;
use tokio::sync::watch;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerConfig {
    pub url: String,
    pub reconnect_delay: Duration,
}

impl ViewerConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Views were redrawn; `admitted` records joined the feed.
    Rendered { admitted: usize },
    /// `[]`: parsed, nothing drawn.
    Empty,
}

/// How a connected stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    Closed,
    Shutdown,
}

pub struct Viewer<R: Render> {
    config: ViewerConfig,
    renderer: R,
    feed: FeedState,
    state: watch::Sender<ConnectionState>,
}

impl<R: Render> Viewer<R> {
    pub fn new(config: ViewerConfig, renderer: R) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            renderer,
            feed: FeedState::new(),
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn feed(&self) -> &FeedState {
        &self.feed
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Apply one text frame. A frame that does not parse as an event array is
    /// rejected before any state changes.
    pub fn handle_frame(&mut self, text: &str) -> Result<FrameOutcome, ViewerError> {
        let batch = decode_batch(text)?;
        if batch.is_empty() {
            return Ok(FrameOutcome::Empty);
        }

        let view = DashboardView::from_batch(&batch);
        let admitted = self.feed.admit(&batch);
        self.renderer.render(&RenderFrame {
            connection: self.connection_state(),
            view: &view,
            feed: &self.feed,
        })?;
        Ok(FrameOutcome::Rendered { admitted })
    }

    /// Consume frames until the server goes away or `shutdown` turns true.
    pub async fn run_stream<S>(
        &mut self,
        mut ws: S,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<StreamEnd, ViewerError>
    where
        S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
            + futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
            + Unpin,
    {
        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        let _ = ws.send(Message::Close(None)).await;
                        return Ok(StreamEnd::Shutdown);
                    }
                }
                msg = ws.next() => match msg {
                    None | Some(Ok(Message::Close(_))) => return Ok(StreamEnd::Closed),
                    Some(Err(e)) => return Err(ViewerError::Ws(e)),
                    Some(Ok(Message::Text(text))) => match self.handle_frame(text.as_str()) {
                        Ok(FrameOutcome::Rendered { admitted }) => {
                            debug!(admitted, "batch rendered");
                        }
                        Ok(FrameOutcome::Empty) => debug!("empty batch"),
                        Err(e) => warn!(error = %e, "discarding frame"),
                    },
                    // Pongs are queued by tungstenite when it reads a ping.
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    /// Connect, consume, and reconnect after the configured delay until
    /// `shutdown` turns true or its sender is dropped.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            self.set_state(ConnectionState::Connecting);
            match connect_async(self.config.url.as_str()).await {
                Ok((ws, _response)) => {
                    self.feed.reset();
                    self.set_state(ConnectionState::Connected);
                    info!(url = %self.config.url, "connected");
                    match self.run_stream(ws, &mut shutdown).await {
                        Ok(StreamEnd::Shutdown) => {
                            self.set_state(ConnectionState::Disconnected);
                            break;
                        }
                        Ok(StreamEnd::Closed) => info!("server closed the connection"),
                        Err(e) => warn!(error = %e, "connection lost"),
                    }
                }
                Err(e) => warn!(url = %self.config.url, error = %e, "connect failed"),
            }

            self.set_state(ConnectionState::Disconnected);
            info!(
                delay_secs = self.config.reconnect_delay.as_secs_f64(),
                "reconnecting after delay"
            );
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                () = tokio::time::sleep(self.config.reconnect_delay) => {}
            }
        }
        info!("viewer stopped");
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state.send_replace(state);
        if let Err(e) = self.renderer.connection_changed(state) {
            warn!(error = %e, "failed to draw connection state");
        }
    }
}
