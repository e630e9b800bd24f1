//! Unix domain socket server for IPC
//!
//! Provides request-response communication and push notifications of lock
//! events to subscribed clients. Requests never touch lock state directly:
//! they are forwarded to the controller as commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::events::LockEvent;
use crate::lock::Command;
use crate::shortcut::{Shortcut, ShortcutRecord};

use super::protocol::{DaemonStatus, Notification, Request, Response, MAX_FRAME_LEN};

/// Frames queued per client before the writer applies backpressure
const CLIENT_QUEUE_DEPTH: usize = 32;

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    dispatcher: Arc<Dispatcher>,
    events: broadcast::Sender<LockEvent>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Create a new IPC server
    pub fn new(
        socket_path: &Path,
        commands: mpsc::Sender<Command>,
        events: broadcast::Sender<LockEvent>,
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))
                .context("failed to restrict socket permissions")?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            dispatcher: Arc::new(Dispatcher::new(commands)),
            events,
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let dispatcher = Arc::clone(&self.dispatcher);
                    let events = self.events.clone();
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = handle_client(stream, dispatcher, events) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

/// Handle a single client connection
async fn handle_client(
    stream: UnixStream,
    dispatcher: Arc<Dispatcher>,
    events: broadcast::Sender<LockEvent>,
) -> Result<()> {
    let (mut reader, writer) = stream.into_split();
    let (frame_tx, frame_rx) = mpsc::channel::<Vec<u8>>(CLIENT_QUEUE_DEPTH);
    let writer_task = tokio::spawn(write_frames(writer, frame_rx));
    let mut forwarder = None;

    let result = loop {
        let body = match read_frame(&mut reader).await {
            Ok(Some(body)) => body,
            Ok(None) => {
                debug!("client disconnected");
                break Ok(());
            }
            Err(e) => break Err(e),
        };

        let response = match serde_json::from_slice::<Request>(&body) {
            Ok(request) => {
                debug!(?request, "received request");
                let (response, subscribe) = dispatcher.dispatch(request).await;
                if subscribe && forwarder.is_none() {
                    debug!("client subscribed to notifications");
                    forwarder = Some(tokio::spawn(forward_events(
                        events.subscribe(),
                        frame_tx.clone(),
                    )));
                }
                response
            }
            Err(e) => {
                warn!(?e, "malformed request");
                Response::error("bad_request", e.to_string())
            }
        };

        let frame = match encode_frame(&response) {
            Ok(frame) => frame,
            Err(e) => break Err(e),
        };
        if frame_tx.send(frame).await.is_err() {
            break Ok(());
        }
    };

    if let Some(forwarder) = forwarder {
        forwarder.abort();
    }
    drop(frame_tx);
    let _ = writer_task.await;
    result
}

/// Push every lock event to a subscribed client until it goes away
async fn forward_events(mut events: broadcast::Receiver<LockEvent>, frames: mpsc::Sender<Vec<u8>>) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "subscriber lagged behind lock events");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return,
        };

        let frame = match encode_frame(&Notification { event }) {
            Ok(frame) => frame,
            Err(e) => {
                error!(?e, "failed to encode notification");
                continue;
            }
        };
        if frames.send(frame).await.is_err() {
            return;
        }
    }
}

async fn write_frames<W: AsyncWrite + Unpin>(mut writer: W, mut frames: mpsc::Receiver<Vec<u8>>) {
    while let Some(frame) = frames.recv().await {
        if let Err(e) = writer.write_all(&frame).await {
            debug!(?e, "client write failed");
            return;
        }
    }
}

/// Read one length-prefixed frame. `None` on a clean disconnect.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    anyhow::ensure!(len <= MAX_FRAME_LEN, "frame of {len} bytes exceeds limit");

    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .context("truncated frame")?;
    Ok(Some(body))
}

/// Serialize a message as a length-prefixed JSON frame
pub fn encode_frame<T: serde::Serialize>(msg: &T) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(msg)?;
    anyhow::ensure!(body.len() <= MAX_FRAME_LEN, "outgoing frame too large");

    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Turns requests into controller commands
struct Dispatcher {
    commands: mpsc::Sender<Command>,
    start_time: Instant,
}

impl Dispatcher {
    fn new(commands: mpsc::Sender<Command>) -> Self {
        Self {
            commands,
            start_time: Instant::now(),
        }
    }

    /// Returns (Response, should_subscribe)
    async fn dispatch(&self, request: Request) -> (Response, bool) {
        let response = match request {
            Request::Ping => Response::Pong,

            Request::GetStatus => {
                match self.ask(|reply| Command::Snapshot { reply }).await {
                    Some(snapshot) => Response::Status(DaemonStatus::new(
                        snapshot,
                        self.start_time.elapsed().as_secs(),
                    )),
                    None => unavailable(),
                }
            }

            Request::Toggle => {
                match self
                    .ask(|reply| Command::Toggle { reply: Some(reply) })
                    .await
                {
                    Some(outcome) => {
                        info!(?outcome, "toggle via IPC");
                        outcome.into()
                    }
                    None => unavailable(),
                }
            }

            Request::SetShortcut {
                key_code,
                modifier_mask,
            } => {
                let record = ShortcutRecord {
                    key_code,
                    modifier_mask,
                };
                match Shortcut::try_from(record) {
                    Err(e) => Response::error("invalid_shortcut", e.to_string()),
                    Ok(shortcut) => {
                        match self
                            .ask(|reply| Command::SetShortcut { shortcut, reply })
                            .await
                        {
                            Some(Ok(label)) => Response::ShortcutUpdated { label },
                            Some(Err(e)) => Response::error("shortcut_not_saved", e.to_string()),
                            None => unavailable(),
                        }
                    }
                }
            }

            Request::Subscribe => return (Response::Subscribed, true),
        };
        (response, false)
    }

    /// Send a command carrying a reply channel and wait for the answer
    async fn ask<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Option<T> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(command(tx)).await.ok()?;
        rx.await.ok()
    }
}

fn unavailable() -> Response {
    Response::error("unavailable", "controller is not running")
}
