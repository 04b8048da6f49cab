#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("Discord rejected the message (HTTP {status}): {message}")]
    Delivery { status: u16, message: String },
}
