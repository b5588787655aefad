use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid relay url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("relay url must use ws, wss, http or https (got {0})")]
    UnsupportedScheme(String),
    #[error("transport is already running")]
    AlreadyRunning,
    #[error("transport is closed")]
    Closed,
}
