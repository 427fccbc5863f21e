// ABOUTME: Terminal bridge relaying bytes between a client connection and a sandbox shell
// ABOUTME: Drives each session through Connecting, Verifying, Ready, Streaming and Closed

use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use wharf_sandbox::{SandboxError, SandboxHandle, SandboxManager, ShellStream};

use crate::frames::{Frame, TextFramer};
use crate::journal::{JournalLevel, TerminalJournal};
use crate::messages;
use crate::transport::{ClientConnection, TransportError};

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Client connection was closed before the session started")]
    ConnectionClosed,

    #[error("Sandbox for workspace {0} is not running")]
    SandboxMissing(String),

    #[error("Failed to verify sandbox: {0}")]
    Verify(#[source] SandboxError),

    #[error("Failed to open shell: {0}")]
    Shell(#[source] SandboxError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Where a sandbox shell comes from
#[async_trait]
pub trait ShellSource: Send + Sync {
    async fn verify_running(&self, workspace_id: &str) -> Result<SandboxHandle, SandboxError>;

    async fn open_shell(&self, handle: &SandboxHandle) -> Result<ShellStream, SandboxError>;
}

#[async_trait]
impl ShellSource for SandboxManager {
    async fn verify_running(&self, workspace_id: &str) -> Result<SandboxHandle, SandboxError> {
        SandboxManager::verify_running(self, workspace_id).await
    }

    async fn open_shell(&self, handle: &SandboxHandle) -> Result<ShellStream, SandboxError> {
        SandboxManager::open_shell(self, handle).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Connecting,
    Verifying,
    Ready,
    Streaming,
    Closed,
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Connection was already closed when the session began
    NotConnected,
    SandboxMissing,
    /// Setup failed after the sandbox was found
    Failed,
    /// The shell reached end of output
    SandboxExited,
    StreamError,
    ClientClosed,
    IdleTimeout,
}

/// One client connection bound to one workspace shell
struct ExecSession<C> {
    workspace_id: String,
    phase: SessionPhase,
    conn: C,
}

impl<C: ClientConnection> ExecSession<C> {
    fn enter(&mut self, phase: SessionPhase) {
        debug!(
            "Terminal session {}: {:?} -> {:?}",
            self.workspace_id, self.phase, phase
        );
        self.phase = phase;
    }

    /// Send a status line if the client is still there
    async fn notify(&mut self, line: String) {
        if !self.conn.is_open() {
            return;
        }
        if let Err(e) = self.conn.send_text(line).await {
            debug!(
                "Could not deliver status line to {}: {}",
                self.workspace_id, e
            );
        }
    }

    async fn close(&mut self) {
        if self.conn.is_open() {
            self.conn.close().await;
        }
        self.enter(SessionPhase::Closed);
    }
}

pub struct TerminalBridge {
    source: Arc<dyn ShellSource>,
    journal: Arc<TerminalJournal>,
    idle_timeout: Option<Duration>,
}

impl TerminalBridge {
    pub fn new(
        source: Arc<dyn ShellSource>,
        journal: Arc<TerminalJournal>,
        idle_timeout: Option<Duration>,
    ) -> Self {
        Self {
            source,
            journal,
            idle_timeout,
        }
    }

    pub fn journal(&self) -> &Arc<TerminalJournal> {
        &self.journal
    }

    /// Run one terminal session to completion. The connection is closed on return.
    pub async fn run<C: ClientConnection>(&self, workspace_id: &str, conn: C) -> SessionEnd {
        let mut session = ExecSession {
            workspace_id: workspace_id.to_string(),
            phase: SessionPhase::Connecting,
            conn,
        };
        info!("Terminal connection attempt for workspace {}", workspace_id);
        self.journal
            .record(JournalLevel::Info, workspace_id, "connection attempt")
            .await;

        let end = match self.establish(&mut session).await {
            Ok(shell) => self.stream(&mut session, shell).await,
            Err(e) => self.fail(&mut session, e).await,
        };

        session.close().await;
        info!("Terminal session for {} ended: {:?}", workspace_id, end);
        end
    }

    async fn establish<C: ClientConnection>(
        &self,
        session: &mut ExecSession<C>,
    ) -> Result<ShellStream, BridgeError> {
        if !session.conn.is_open() {
            return Err(BridgeError::ConnectionClosed);
        }

        session.enter(SessionPhase::Verifying);
        let handle = match self.source.verify_running(&session.workspace_id).await {
            Ok(handle) => handle,
            Err(
                SandboxError::NotFound(_)
                | SandboxError::NotRunning(_)
                | SandboxError::InvalidWorkspaceId(_),
            ) => return Err(BridgeError::SandboxMissing(session.workspace_id.clone())),
            Err(e) => return Err(BridgeError::Verify(e)),
        };

        session.enter(SessionPhase::Ready);
        let shell = self
            .source
            .open_shell(&handle)
            .await
            .map_err(BridgeError::Shell)?;

        session
            .conn
            .send_text(messages::ready(&session.workspace_id))
            .await?;
        session.conn.send_text(messages::PROMPT.to_string()).await?;
        Ok(shell)
    }

    async fn fail<C: ClientConnection>(
        &self,
        session: &mut ExecSession<C>,
        err: BridgeError,
    ) -> SessionEnd {
        let workspace_id = session.workspace_id.clone();
        match err {
            BridgeError::ConnectionClosed => {
                error!(
                    "Terminal connection for {} was closed before the session started",
                    workspace_id
                );
                self.journal
                    .record(
                        JournalLevel::Error,
                        &workspace_id,
                        "connection closed before session start",
                    )
                    .await;
                SessionEnd::NotConnected
            }
            BridgeError::SandboxMissing(_) => {
                warn!("No running sandbox for workspace {}", workspace_id);
                self.journal
                    .record(JournalLevel::Warn, &workspace_id, "sandbox not running")
                    .await;
                session.notify(messages::sandbox_missing(&workspace_id)).await;
                SessionEnd::SandboxMissing
            }
            other => {
                error!("Terminal session for {} failed: {}", workspace_id, other);
                self.journal
                    .record(JournalLevel::Error, &workspace_id, &other.to_string())
                    .await;
                session.notify(messages::fatal(&other.to_string())).await;
                SessionEnd::Failed
            }
        }
    }

    async fn stream<C: ClientConnection>(
        &self,
        session: &mut ExecSession<C>,
        shell: ShellStream,
    ) -> SessionEnd {
        session.enter(SessionPhase::Streaming);

        let ShellStream {
            mut output,
            mut input,
        } = shell;
        let mut framer = TextFramer::new();
        let mut input_open = true;
        // Client bytes not yet accepted by the shell; at most one client chunk
        let mut pending: Vec<u8> = Vec::new();
        let mut deadline = self.idle_timeout.map(|d| Instant::now() + d);

        loop {
            let idle = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                chunk = output.next() => match chunk {
                    Some(Ok(bytes)) => {
                        deadline = self.idle_timeout.map(|d| Instant::now() + d);
                        if !session.conn.is_open() {
                            continue;
                        }
                        if let Some(frame) = framer.push(&bytes) {
                            send_frame(session, frame).await;
                        }
                    }
                    Some(Err(e)) => {
                        warn!("Shell stream for {} failed: {}", session.workspace_id, e);
                        self.journal
                            .record(
                                JournalLevel::Error,
                                &session.workspace_id,
                                &format!("shell stream error: {}", e),
                            )
                            .await;
                        return SessionEnd::StreamError;
                    }
                    None => {
                        if let Some(frame) = framer.flush() {
                            send_frame(session, frame).await;
                        }
                        session.notify(messages::session_ended()).await;
                        return SessionEnd::SandboxExited;
                    }
                },
                // Partial writes keep the output branch live while the shell is slow to read
                written = input.write(&pending), if input_open && !pending.is_empty() => {
                    match written {
                        Ok(n) if n > 0 => {
                            pending.drain(..n);
                        }
                        result => {
                            if let Err(e) = result {
                                warn!("Shell input for {} closed: {}", session.workspace_id, e);
                            }
                            input_open = false;
                            pending.clear();
                        }
                    }
                }
                incoming = session.conn.recv(), if pending.is_empty() => match incoming {
                    Some(Ok(bytes)) => {
                        deadline = self.idle_timeout.map(|d| Instant::now() + d);
                        if input_open {
                            pending = bytes;
                        }
                    }
                    Some(Err(e)) => {
                        warn!("Terminal transport error for {}: {}", session.workspace_id, e);
                        self.journal
                            .record(
                                JournalLevel::Warn,
                                &session.workspace_id,
                                &format!("transport error: {}", e),
                            )
                            .await;
                    }
                    None => {
                        debug!("Client for {} went away, sending EOF", session.workspace_id);
                        self.journal
                            .record(
                                JournalLevel::Info,
                                &session.workspace_id,
                                "client disconnected",
                            )
                            .await;
                        if input_open {
                            shutdown_input(&session.workspace_id, &mut input).await;
                        }
                        return SessionEnd::ClientClosed;
                    }
                },
                _ = idle => {
                    let after = self.idle_timeout.unwrap_or_default();
                    info!(
                        "Terminal session for {} idle for {}s, closing",
                        session.workspace_id,
                        after.as_secs()
                    );
                    self.journal
                        .record(JournalLevel::Info, &session.workspace_id, "idle timeout")
                        .await;
                    session.notify(messages::idle_timeout(after)).await;
                    if input_open {
                        shutdown_input(&session.workspace_id, &mut input).await;
                    }
                    return SessionEnd::IdleTimeout;
                }
            }
        }
    }
}

async fn send_frame<C: ClientConnection>(session: &mut ExecSession<C>, frame: Frame) {
    let sent = match frame {
        Frame::Text(text) => session.conn.send_text(text).await,
        Frame::Binary(data) => session.conn.send_binary(data).await,
    };
    if let Err(e) = sent {
        // Output is dropped once the client is gone
        debug!("Dropped output for {}: {}", session.workspace_id, e);
    }
}

/// Shut down only the write half so the command sees EOF
async fn shutdown_input(
    workspace_id: &str,
    input: &mut std::pin::Pin<Box<dyn tokio::io::AsyncWrite + Send>>,
) {
    if let Err(e) = input.shutdown().await {
        debug!("Shell input for {} already closed: {}", workspace_id, e);
    }
}
