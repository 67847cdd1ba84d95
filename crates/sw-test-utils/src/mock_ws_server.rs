// mock_ws_server: A scripted WebSocket push server for testing viewer clients.
//
// Each accepted connection plays one script of frames and then closes, which
// lets a test drive the viewer through several connect/disconnect cycles.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use sw_protocol::{encode_batch, EventRecord};
use tokio::net::TcpListener;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::Message;

/// One server-to-viewer frame.
#[derive(Debug, Clone)]
pub enum Frame {
    /// A JSON event array, encoded the way the broadcaster encodes it.
    Batch(Vec<EventRecord>),
    /// Arbitrary text, for malformed payloads.
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    fn into_message(self) -> Result<Message, serde_json::Error> {
        Ok(match self {
            Self::Batch(events) => Message::Text(encode_batch(&events)?.into()),
            Self::Text(text) => Message::Text(text.into()),
            Self::Binary(bytes) => Message::Binary(bytes.into()),
        })
    }
}

/// A mock push server for integration testing.
///
/// Binds to port 0 (random). Connection `n` receives `scripts[n]` followed by
/// a close frame. Connections past the last script are held open silently
/// until the client goes away.
pub struct MockWsServer {
    addr: SocketAddr,
    accepted: Arc<Mutex<Vec<Instant>>>,
    /// Handle to the background accept loop; dropped when the server is dropped.
    _task: tokio::task::JoinHandle<()>,
}

impl MockWsServer {
    pub async fn start(scripts: Vec<Vec<Frame>>) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let accepted = Arc::new(Mutex::new(Vec::new()));

        let task = tokio::spawn(Self::accept_loop(
            listener,
            scripts,
            Arc::clone(&accepted),
        ));

        Ok(Self {
            addr,
            accepted,
            _task: task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}{}", self.addr, sw_protocol::VIEWER_WS_PATH)
    }

    /// Number of completed WebSocket handshakes so far.
    pub fn accepted(&self) -> usize {
        self.accepted.lock().map(|times| times.len()).unwrap_or(0)
    }

    /// When each handshake completed, in order.
    pub fn accepted_at(&self) -> Vec<Instant> {
        self.accepted
            .lock()
            .map(|times| times.clone())
            .unwrap_or_default()
    }

    // -- internal --

    async fn accept_loop(
        listener: TcpListener,
        scripts: Vec<Vec<Frame>>,
        accepted: Arc<Mutex<Vec<Instant>>>,
    ) {
        let mut scripts = scripts.into_iter();
        while let Ok((stream, _peer)) = listener.accept().await {
            let script = scripts.next();
            let accepted = Arc::clone(&accepted);
            tokio::spawn(async move {
                // Client drops are expected in tests.
                let _ = Self::handle_connection(stream, script, accepted).await;
            });
        }
    }

    async fn handle_connection(
        stream: tokio::net::TcpStream,
        script: Option<Vec<Frame>>,
        accepted: Arc<Mutex<Vec<Instant>>>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ws_stream = tokio_tungstenite::accept_async(stream).await?;
        if let Ok(mut times) = accepted.lock() {
            times.push(Instant::now());
        }
        let (mut write, mut read) = ws_stream.split();

        match script {
            Some(frames) => {
                for frame in frames {
                    write.send(frame.into_message()?).await?;
                }
                write.send(Message::Close(None)).await?;
                // Drain until the client acknowledges the close.
                while let Some(Ok(_)) = read.next().await {}
            }
            None => {
                while let Some(msg) = read.next().await {
                    match msg? {
                        Message::Ping(data) => write.send(Message::Pong(data)).await?,
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }
}
