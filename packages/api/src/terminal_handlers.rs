// ABOUTME: WebSocket endpoint for interactive terminal sessions
// ABOUTME: Adapts an axum WebSocket to the terminal bridge's client connection trait

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
};
use tracing::{debug, info};
use wharf_terminal::{ClientConnection, TransportError};

use crate::AppState;

/// Upgrade to a WebSocket and hand the socket to the terminal bridge
pub async fn terminal_ws(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    info!("Terminal connection requested for workspace {}", id);
    ws.on_upgrade(move |socket| async move {
        state.bridge.run(&id, WsConnection::new(socket)).await;
    })
}

/// WebSocket-backed client connection
pub struct WsConnection {
    socket: WebSocket,
    open: bool,
}

impl WsConnection {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket, open: true }
    }

    async fn send(&mut self, message: Message) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        self.socket.send(message).await.map_err(|e| {
            self.open = false;
            TransportError::Other(e.to_string())
        })
    }
}

#[async_trait]
impl ClientConnection for WsConnection {
    fn is_open(&self) -> bool {
        self.open
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.send(Message::Text(text.into())).await
    }

    async fn send_binary(&mut self, data: Vec<u8>) -> Result<(), TransportError> {
        self.send(Message::Binary(data.into())).await
    }

    async fn recv(&mut self) -> Option<Result<Vec<u8>, TransportError>> {
        while self.open {
            match self.socket.recv().await {
                Some(Ok(Message::Text(text))) => {
                    return Some(Ok(text.as_str().as_bytes().to_vec()))
                }
                Some(Ok(Message::Binary(data))) => return Some(Ok(data.to_vec())),
                // Pings are answered by axum
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Close(frame))) => {
                    debug!("Client sent close frame: {:?}", frame);
                    self.open = false;
                }
                Some(Err(e)) => {
                    // Report once; the next call sees a closed connection
                    self.open = false;
                    return Some(Err(TransportError::Other(e.to_string())));
                }
                None => self.open = false,
            }
        }
        None
    }

    async fn close(&mut self) {
        if self.open {
            let _ = self.socket.send(Message::Close(None)).await;
            self.open = false;
        }
    }
}
