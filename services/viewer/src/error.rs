#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("WS: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("malformed batch: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("render: {0}")]
    Render(#[from] std::io::Error),
}
