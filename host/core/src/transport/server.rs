//! Host Server
//!
//! Runs the two-phase handoff and per-session asset streaming:
//!
//! 1. Discovery: listen on the workspace-derived port, accept exactly one
//!    connection, advertise a freshly bound session port, close the
//!    discovery listener.
//! 2. Session: accept surface connections on the session port; each
//!    connection gets the full config snapshot followed by every referenced
//!    sprite and icon it has not been sent yet.
//!
//! Reconfiguration pushes re-run the send cycle on every live connection,
//! skipping assets already recorded in that connection's dedup set.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::assets;
use crate::config::{self, HostConfig};
use crate::messages::{StateName, WireMessage};
use crate::port;
use crate::transport::{encode, TransportError};

/// How many random ports to try before giving up on the session bind.
const SESSION_BIND_ATTEMPTS: u32 = 64;

/// Snapshot of one live session, for logs and tests.
#[derive(Clone, Debug)]
pub struct SessionSummary {
    /// Session port the surface is connected on.
    pub port: u16,
    /// Distinct assets delivered on this connection so far.
    pub sent_assets: usize,
}

/// Handle to one connected surface.
struct Session {
    port: u16,
    resend: mpsc::Sender<()>,
    sent: Arc<Mutex<HashSet<String>>>,
}

/// The host side of the asset-delivery protocol.
pub struct HostServer {
    config: Arc<RwLock<HostConfig>>,
    sessions: Arc<Mutex<HashMap<u64, Session>>>,
    next_session: AtomicU64,
}

impl HostServer {
    /// Create a server for the given configuration.
    #[must_use]
    pub fn new(config: HostConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            sessions: Arc::new(Mutex::new(HashMap::new())),
            next_session: AtomicU64::new(1),
        }
    }

    /// Replace the configuration. Call [`HostServer::push_config`] afterwards
    /// to fan the change out to connected surfaces.
    pub fn update_config(&self, config: HostConfig) {
        *self.config.write() = config;
    }

    /// Re-run the send cycle on every live session.
    pub async fn push_config(&self) {
        let targets: Vec<(u16, mpsc::Sender<()>)> = self
            .sessions
            .lock()
            .values()
            .map(|s| (s.port, s.resend.clone()))
            .collect();
        for (session_port, resend) in targets {
            if resend.send(()).await.is_err() {
                tracing::debug!(port = session_port, "session gone before push");
            }
        }
    }

    /// Live sessions, for logs and tests.
    #[must_use]
    pub fn sessions(&self) -> Vec<SessionSummary> {
        self.sessions
            .lock()
            .values()
            .map(|s| SessionSummary {
                port: s.port,
                sent_assets: s.sent.lock().len(),
            })
            .collect()
    }

    /// Run the discovery handshake, then serve sessions until the listener
    /// fails. The discovery listener accepts exactly one connection.
    pub async fn run(&self) -> Result<(), TransportError> {
        let workspace = self.config.read().workspace.clone();
        let discovery_port = port::workspace_port(&workspace);
        let discovery = TcpListener::bind(("127.0.0.1", discovery_port)).await?;
        tracing::info!(port = discovery_port, %workspace, "listening for discovery");

        let (mut stream, peer) = discovery.accept().await?;
        drop(discovery);
        tracing::debug!(%peer, "discovery connection accepted");

        let (listener, session_port) = bind_session_port().await?;
        stream
            .write_all(&encode(&WireMessage::Socket { port: session_port })?)
            .await?;
        stream.shutdown().await.ok();
        tracing::info!(port = session_port, "session port handed off");

        self.serve_sessions(listener, session_port).await
    }

    async fn serve_sessions(
        &self,
        listener: TcpListener,
        session_port: u16,
    ) -> Result<(), TransportError> {
        loop {
            let (stream, peer) = listener.accept().await?;
            tracing::info!(%peer, port = session_port, "surface connected");

            let id = self.next_session.fetch_add(1, Ordering::SeqCst);
            let (resend_tx, resend_rx) = mpsc::channel(8);
            let sent = Arc::new(Mutex::new(HashSet::new()));
            self.sessions.lock().insert(
                id,
                Session {
                    port: session_port,
                    resend: resend_tx,
                    sent: Arc::clone(&sent),
                },
            );

            let config = Arc::clone(&self.config);
            let sessions = Arc::clone(&self.sessions);
            tokio::spawn(async move {
                drive_connection(config, stream, resend_rx, sent).await;
                sessions.lock().remove(&id);
                tracing::info!(port = session_port, "session ended");
            });
        }
    }
}

/// Bind a random session port, retrying on collision.
async fn bind_session_port() -> Result<(TcpListener, u16), TransportError> {
    let mut rng = StdRng::from_entropy();
    for _ in 0..SESSION_BIND_ATTEMPTS {
        let candidate = port::random_session_port(&mut rng);
        match TcpListener::bind(("127.0.0.1", candidate)).await {
            Ok(listener) => return Ok((listener, candidate)),
            Err(e) => tracing::debug!(port = candidate, error = %e, "session port unavailable"),
        }
    }
    Err(TransportError::InvalidState(
        "no free session port".to_string(),
    ))
}

/// Serve one surface connection: initial send cycle, then resend commands
/// until the socket closes. Surfaces send nothing; reads only detect close.
async fn drive_connection(
    config: Arc<RwLock<HostConfig>>,
    stream: TcpStream,
    mut resend: mpsc::Receiver<()>,
    sent: Arc<Mutex<HashSet<String>>>,
) {
    let (mut read_half, mut write_half) = stream.into_split();

    if let Err(e) = send_cycle(&config, &mut write_half, &sent).await {
        tracing::warn!(error = %e, "initial send cycle failed");
        return;
    }

    let mut buf = [0u8; 1024];
    loop {
        tokio::select! {
            cmd = resend.recv() => match cmd {
                Some(()) => {
                    if let Err(e) = send_cycle(&config, &mut write_half, &sent).await {
                        tracing::warn!(error = %e, "reconfiguration push failed");
                        return;
                    }
                }
                None => return,
            },
            read = read_half.read(&mut buf) => match read {
                Ok(0) => {
                    tracing::debug!("surface closed the session");
                    return;
                }
                Ok(n) => tracing::debug!(bytes = n, "ignoring unexpected surface bytes"),
                Err(e) => {
                    tracing::warn!(error = %e, "session read error");
                    return;
                }
            },
        }
    }
}

/// One full send cycle: config snapshot, then every referenced sprite state
/// file and icon not yet in this session's dedup set.
async fn send_cycle<W: AsyncWrite + Unpin>(
    config: &RwLock<HostConfig>,
    writer: &mut W,
    sent: &Mutex<HashSet<String>>,
) -> Result<(), TransportError> {
    let config = config.read().clone();
    let pets = config::build_snapshot(&config);
    writer
        .write_all(&encode(&WireMessage::Config { pets: pets.clone() })?)
        .await?;
    tracing::debug!(pets = pets.len(), "config snapshot sent");

    for pet in &pets {
        for state in StateName::ALL {
            let Some(wire_name) = pet.asset_name(state) else {
                continue;
            };
            let Some(rel) = pet.states.get(&state) else {
                continue;
            };
            let path = config.media_dir.join("pets").join(rel);
            send_asset(writer, sent, wire_name, &path).await?;
        }
    }

    for (name, path) in assets::icon_manifest(&config.media_dir) {
        send_asset(writer, sent, format!("icons/{name}"), &path).await?;
    }

    Ok(())
}

/// Send one asset unless it was already delivered on this session.
/// Unreadable files are logged and leave the dedup set untouched so a later
/// push can retry them.
async fn send_asset<W: AsyncWrite + Unpin>(
    writer: &mut W,
    sent: &Mutex<HashSet<String>>,
    wire_name: String,
    path: &std::path::Path,
) -> Result<(), TransportError> {
    if !sent.lock().insert(wire_name.clone()) {
        return Ok(());
    }

    match assets::data_uri(path) {
        Ok(content) => {
            writer
                .write_all(&encode(&WireMessage::Asset {
                    file: Some(wire_name),
                    content: Some(content),
                })?)
                .await?;
            Ok(())
        }
        Err(e) => {
            tracing::error!(file = %wire_name, path = %path.display(), error = %e, "failed to load asset");
            sent.lock().remove(&wire_name);
            Ok(())
        }
    }
}
