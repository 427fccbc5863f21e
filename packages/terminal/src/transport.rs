// ABOUTME: Client connection capability required by the terminal bridge
// ABOUTME: Implemented by the WebSocket layer and by test doubles

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection closed")]
    Closed,

    #[error("Transport error: {0}")]
    Other(String),
}

/// A duplex client connection carrying terminal bytes.
///
/// `recv` must be cancel-safe: the bridge polls it inside `tokio::select!`.
#[async_trait]
pub trait ClientConnection: Send {
    fn is_open(&self) -> bool;

    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    async fn send_binary(&mut self, data: Vec<u8>) -> Result<(), TransportError>;

    /// Next chunk of client input; `None` once the client has gone away
    async fn recv(&mut self) -> Option<Result<Vec<u8>, TransportError>>;

    async fn close(&mut self);
}
