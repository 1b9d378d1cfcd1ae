//! IPC server for the presentation layer
//!
//! Provides request-response communication and push notifications of
//! binder events to subscribed clients. Listens on a Unix domain socket,
//! or a named pipe on Windows.

use std::future::pending;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::events::BinderEvent;
use crate::hotkey::CaptureHub;
use crate::settings::Settings;
use crate::state::{BinderCommand, BindingStatus};

use super::protocol::{DaemonStatus, Notification, Request, Response};

/// Frames above this size disconnect the client
const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Handles the server needs into the rest of the daemon
#[derive(Debug, Clone)]
pub struct ServerContext {
    /// Binder task command queue
    pub commands: mpsc::Sender<BinderCommand>,
    /// Where forwarded key releases are published
    pub hub: CaptureHub,
    /// Binder event stream, for subscribed clients
    pub events: broadcast::Sender<BinderEvent>,
    /// Settings file written by `save_binding`
    pub settings_path: PathBuf,
    pub start_time: Instant,
}

/// IPC Server handling client connections
pub struct Server {
    endpoint: PathBuf,
    #[cfg(unix)]
    listener: tokio::net::UnixListener,
    context: ServerContext,
    shutdown_tx: broadcast::Sender<()>,
}

enum Frame {
    Complete(Vec<u8>),
    Incomplete,
    TooLarge(usize),
}

impl Server {
    /// Create a new IPC server
    #[cfg(unix)]
    pub fn new(endpoint: &Path, context: ServerContext) -> Result<Self> {
        use std::os::unix::fs::PermissionsExt;

        // Ensure parent directory exists
        if let Some(parent) = endpoint.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if endpoint.exists() {
            std::fs::remove_file(endpoint).context("failed to remove stale socket")?;
        }

        let listener =
            tokio::net::UnixListener::bind(endpoint).context("failed to bind Unix socket")?;

        // Owner-only access
        std::fs::set_permissions(endpoint, std::fs::Permissions::from_mode(0o600))?;

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?endpoint, "IPC server listening");

        Ok(Self {
            endpoint: endpoint.to_owned(),
            listener,
            context,
            shutdown_tx,
        })
    }

    /// Create a new IPC server
    #[cfg(windows)]
    pub fn new(endpoint: &Path, context: ServerContext) -> Result<Self> {
        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?endpoint, "IPC server configured");

        Ok(Self {
            endpoint: endpoint.to_owned(),
            context,
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    #[cfg(unix)]
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    self.spawn_client(stream);
                }
                Err(e) => {
                    tracing::error!(?e, "accept error");
                }
            }
        }
    }

    /// Run the server, accepting connections
    #[cfg(windows)]
    pub async fn run(&self) -> Result<()> {
        use tokio::net::windows::named_pipe::ServerOptions;

        let mut pipe = ServerOptions::new()
            .first_pipe_instance(true)
            .create(&self.endpoint)
            .context("failed to create named pipe")?;

        loop {
            pipe.connect().await.context("named pipe connect failed")?;
            let next = ServerOptions::new()
                .create(&self.endpoint)
                .context("failed to create named pipe")?;
            let connected = std::mem::replace(&mut pipe, next);

            debug!("client connected");
            self.spawn_client(connected);
        }
    }

    fn spawn_client<S>(&self, stream: S)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let context = self.context.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            tokio::select! {
                result = Self::handle_client(stream, context) => {
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

    /// Handle a single client connection
    ///
    /// Reads are buffered so a notification can be written while a
    /// request frame is still arriving.
    pub async fn handle_client<S>(mut stream: S, context: ServerContext) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut buf = Vec::with_capacity(1024);
        let mut chunk = [0u8; 4096];
        let mut events: Option<broadcast::Receiver<BinderEvent>> = None;

        loop {
            match take_frame(&mut buf) {
                Frame::TooLarge(len) => {
                    warn!(len, "message too large, disconnecting");
                    return Ok(());
                }
                Frame::Complete(body) => {
                    let request: Request = match serde_json::from_slice(&body) {
                        Ok(request) => request,
                        Err(e) => {
                            warn!(%e, "malformed request");
                            let response = Response::error("bad_request", e.to_string());
                            send_message(&mut stream, &response).await?;
                            continue;
                        }
                    };
                    debug!(?request, "received request");

                    let (response, subscribe) = Self::process_request(request, &context).await;
                    if subscribe && events.is_none() {
                        events = Some(context.events.subscribe());
                        debug!("client subscribed to notifications");
                    }

                    send_message(&mut stream, &response).await?;
                    continue;
                }
                Frame::Incomplete => {}
            }

            tokio::select! {
                read = stream.read(&mut chunk) => {
                    let n = read?;
                    if n == 0 {
                        debug!("client disconnected");
                        return Ok(());
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
                Some(event) = next_event(&mut events) => {
                    send_message(&mut stream, &Notification::BinderEvent { event }).await?;
                }
            }
        }
    }

    /// Process a request and return a response
    /// Returns (Response, should_subscribe)
    async fn process_request(request: Request, context: &ServerContext) -> (Response, bool) {
        match request {
            Request::Ping => (Response::Pong, false),

            Request::GetStatus => match binding_status(context).await {
                Some(status) => {
                    let uptime_secs = context.start_time.elapsed().as_secs();
                    (Response::Status(DaemonStatus::new(status, uptime_secs)), false)
                }
                None => (binder_unavailable(), false),
            },

            Request::StartCapture => {
                let (reply, rx) = oneshot::channel();
                if context
                    .commands
                    .send(BinderCommand::StartCapture { reply })
                    .await
                    .is_err()
                {
                    return (binder_unavailable(), false);
                }
                let response = match rx.await {
                    Ok(true) => Response::CaptureStarted,
                    Ok(false) => {
                        Response::error("already_capturing", "a capture is already in progress")
                    }
                    Err(_) => binder_unavailable(),
                };
                (response, false)
            }

            request @ Request::KeyReleased { .. } => {
                let delivered = request
                    .key_release()
                    .map_or(false, |release| context.hub.publish(release));
                let response = if delivered {
                    Response::Accepted
                } else {
                    Response::error("not_capturing", "no capture in progress")
                };
                (response, false)
            }

            Request::SaveBinding => {
                let Some(status) = binding_status(context).await else {
                    return (binder_unavailable(), false);
                };
                let settings = Settings {
                    sequence: status.combination,
                };
                let response = match settings.save(&context.settings_path) {
                    Ok(()) => Response::Saved {
                        sequence: settings.sequence,
                    },
                    Err(e) => {
                        warn!(?e, "failed to save settings");
                        Response::error("save_failed", format!("{:#}", e))
                    }
                };
                (response, false)
            }

            Request::Subscribe => (Response::Subscribed, true),
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        #[cfg(unix)]
        if self.endpoint.exists() {
            if let Err(e) = std::fs::remove_file(&self.endpoint) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!(endpoint = ?self.endpoint, "IPC server shutdown complete");
    }
}

/// Split the next length-prefixed frame off the front of `buf`
fn take_frame(buf: &mut Vec<u8>) -> Frame {
    if buf.len() < 4 {
        return Frame::Incomplete;
    }

    let len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if len > MAX_FRAME_LEN {
        return Frame::TooLarge(len);
    }
    if buf.len() < 4 + len {
        return Frame::Incomplete;
    }

    let body = buf[4..4 + len].to_vec();
    buf.drain(..4 + len);
    Frame::Complete(body)
}

/// Send a length-prefixed JSON message
async fn send_message<S, T>(stream: &mut S, msg: &T) -> Result<()>
where
    S: AsyncWrite + Unpin,
    T: Serialize,
{
    let msg_bytes = serde_json::to_vec(msg)?;
    let msg_len = (msg_bytes.len() as u32).to_le_bytes();

    stream.write_all(&msg_len).await?;
    stream.write_all(&msg_bytes).await?;
    stream.flush().await?;

    Ok(())
}

/// Next binder event for a subscribed client; pending forever otherwise
async fn next_event(events: &mut Option<broadcast::Receiver<BinderEvent>>) -> Option<BinderEvent> {
    let Some(rx) = events.as_mut() else {
        return pending().await;
    };

    loop {
        match rx.recv().await {
            Ok(event) => return Some(event),
            Err(RecvError::Lagged(n)) => warn!(skipped = n, "notification receiver lagged"),
            Err(RecvError::Closed) => break,
        }
    }

    *events = None;
    None
}

async fn binding_status(context: &ServerContext) -> Option<BindingStatus> {
    let (reply, rx) = oneshot::channel();
    context
        .commands
        .send(BinderCommand::Status { reply })
        .await
        .ok()?;
    rx.await.ok()
}

fn binder_unavailable() -> Response {
    Response::error("unavailable", "hotkey binder is not running")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::{Key, Modifiers, ObservedKey};
    use tempfile::TempDir;
    use tokio::io::duplex;
    use tokio_test::io::Builder;

    fn frame<T: Serialize>(msg: &T) -> Vec<u8> {
        let body = serde_json::to_vec(msg).unwrap();
        let mut bytes = (body.len() as u32).to_le_bytes().to_vec();
        bytes.extend_from_slice(&body);
        bytes
    }

    /// Context whose binder answers every command with fixed values
    fn context(settings_path: PathBuf) -> (ServerContext, broadcast::Sender<BinderEvent>) {
        let (commands, mut rx) = mpsc::channel(8);
        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    BinderCommand::StartCapture { reply } => {
                        let _ = reply.send(true);
                    }
                    BinderCommand::Status { reply } => {
                        let _ = reply.send(BindingStatus {
                            combination: "Ctrl+Shift+K".to_string(),
                            active: true,
                            capturing: false,
                        });
                    }
                }
            }
        });

        let (events, _) = broadcast::channel(16);
        let context = ServerContext {
            commands,
            hub: CaptureHub::new(),
            events: events.clone(),
            settings_path,
            start_time: Instant::now(),
        };
        (context, events)
    }

    #[tokio::test]
    async fn test_ping() {
        let (context, _) = context(PathBuf::from("unused.json"));
        let stream = Builder::new()
            .read(&frame(&Request::Ping))
            .write(&frame(&Response::Pong))
            .build();

        Server::handle_client(stream, context).await.unwrap();
    }

    #[tokio::test]
    async fn test_start_capture() {
        let (context, _) = context(PathBuf::from("unused.json"));
        let stream = Builder::new()
            .read(&frame(&Request::StartCapture))
            .write(&frame(&Response::CaptureStarted))
            .build();

        Server::handle_client(stream, context).await.unwrap();
    }

    #[tokio::test]
    async fn test_key_release_without_capture() {
        let (context, _) = context(PathBuf::from("unused.json"));
        let request = Request::KeyReleased {
            key: "K".to_string(),
            modifiers: Modifiers::CONTROL,
        };
        let stream = Builder::new()
            .read(&frame(&request))
            .write(&frame(&Response::error(
                "not_capturing",
                "no capture in progress",
            )))
            .build();

        Server::handle_client(stream, context).await.unwrap();
    }

    #[tokio::test]
    async fn test_key_release_reaches_subscription() {
        let (context, _) = context(PathBuf::from("unused.json"));
        let mut subscription = context.hub.subscribe();
        let request = Request::KeyReleased {
            key: "k".to_string(),
            modifiers: Modifiers::ALT,
        };
        let stream = Builder::new()
            .read(&frame(&request))
            .write(&frame(&Response::Accepted))
            .build();

        Server::handle_client(stream, context).await.unwrap();
        let release = subscription.try_recv().unwrap();
        assert_eq!(release.key, ObservedKey::Base(Key::Char('K')));
        assert_eq!(release.modifiers, Modifiers::ALT);
    }

    #[tokio::test]
    async fn test_frame_split_across_reads() {
        let (context, _) = context(PathBuf::from("unused.json"));
        let bytes = frame(&Request::Ping);
        let stream = Builder::new()
            .read(&bytes[..3])
            .read(&bytes[3..])
            .write(&frame(&Response::Pong))
            .build();

        Server::handle_client(stream, context).await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_request_keeps_connection() {
        let (context, _) = context(PathBuf::from("unused.json"));
        let garbage = b"{\"type\":\"launch\"}";
        let mut bytes = (garbage.len() as u32).to_le_bytes().to_vec();
        bytes.extend_from_slice(garbage);

        let (client, server) = duplex(4096);
        let handler = tokio::spawn(Server::handle_client(server, context));
        let (mut reader, mut writer) = tokio::io::split(client);

        writer.write_all(&bytes).await.unwrap();
        let response: Response = read_frame(&mut reader).await;
        assert!(matches!(response, Response::Error { ref code, .. } if code == "bad_request"));

        writer.write_all(&frame(&Request::Ping)).await.unwrap();
        assert_eq!(read_frame::<Response, _>(&mut reader).await, Response::Pong);

        drop(writer);
        drop(reader);
        handler.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_oversized_frame_disconnects() {
        let (context, _) = context(PathBuf::from("unused.json"));
        let header = ((MAX_FRAME_LEN + 1) as u32).to_le_bytes();
        let stream = Builder::new().read(&header).build();

        Server::handle_client(stream, context).await.unwrap();
    }

    #[tokio::test]
    async fn test_get_status() {
        let (context, _) = context(PathBuf::from("unused.json"));
        let (client, server) = duplex(4096);
        let handler = tokio::spawn(Server::handle_client(server, context));
        let (mut reader, mut writer) = tokio::io::split(client);

        writer.write_all(&frame(&Request::GetStatus)).await.unwrap();
        let Response::Status(status) = read_frame(&mut reader).await else {
            panic!("expected status response");
        };
        assert_eq!(status.binding, "Ctrl+Shift+K");
        assert!(status.active);
        assert!(!status.capturing);
        assert_eq!(status.version, env!("CARGO_PKG_VERSION"));

        drop(writer);
        drop(reader);
        handler.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_save_binding_writes_settings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        let (context, _) = context(path.clone());
        let stream = Builder::new()
            .read(&frame(&Request::SaveBinding))
            .write(&frame(&Response::Saved {
                sequence: "Ctrl+Shift+K".to_string(),
            }))
            .build();

        Server::handle_client(stream, context).await.unwrap();
        assert_eq!(Settings::load(&path).unwrap().sequence, "Ctrl+Shift+K");
    }

    #[tokio::test]
    async fn test_subscribed_client_receives_events() {
        let (context, events) = context(PathBuf::from("unused.json"));
        let (client, server) = duplex(4096);
        let handler = tokio::spawn(Server::handle_client(server, context));
        let (mut reader, mut writer) = tokio::io::split(client);

        writer.write_all(&frame(&Request::Subscribe)).await.unwrap();
        assert_eq!(
            read_frame::<Response, _>(&mut reader).await,
            Response::Subscribed
        );

        events.send(BinderEvent::CaptureStarted).unwrap();
        assert_eq!(
            read_frame::<Notification, _>(&mut reader).await,
            Notification::BinderEvent {
                event: BinderEvent::CaptureStarted
            }
        );

        drop(writer);
        drop(reader);
        handler.await.unwrap().unwrap();
    }

    async fn read_frame<T, R>(reader: &mut R) -> T
    where
        T: serde::de::DeserializeOwned,
        R: AsyncRead + Unpin,
    {
        let mut len = [0u8; 4];
        reader.read_exact(&mut len).await.unwrap();
        let mut body = vec![0u8; u32::from_le_bytes(len) as usize];
        reader.read_exact(&mut body).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }
}
