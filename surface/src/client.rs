//! Host Client
//!
//! Finds the host in two phases: connect to the workspace-derived discovery
//! port and wait for the session-port handoff, then hold a session on that
//! port for the rest of the process lifetime. Both phases retry on a fixed
//! one-second cadence; the session port never changes once learned, because
//! the host closes its discovery listener after the first surface arrives.

use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use roampets_core::transport::{FrameDecoder, TransportError};
use roampets_core::{port, WireMessage};

use crate::assets::AssetStore;
use crate::registry::PetRegistry;

/// Retry cadence for both discovery and session connects.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// Drives the connection to the host and feeds the registry and asset store.
pub struct SurfaceClient {
    workspace: String,
    registry: std::sync::Arc<PetRegistry>,
    store: AssetStore,
}

impl SurfaceClient {
    /// Create a client for the given workspace.
    #[must_use]
    pub fn new(
        workspace: String,
        registry: std::sync::Arc<PetRegistry>,
        store: AssetStore,
    ) -> Self {
        Self {
            workspace,
            registry,
            store,
        }
    }

    /// Run forever: discover once, then keep a session alive.
    pub async fn run(&self) {
        let session_port = self.discover().await;
        self.session_loop(session_port).await;
    }

    async fn discover(&self) -> u16 {
        let discovery_port = port::workspace_port(&self.workspace);
        loop {
            match TcpStream::connect(("127.0.0.1", discovery_port)).await {
                Ok(stream) => match read_handoff(stream).await {
                    Ok(session_port) => {
                        tracing::info!(port = session_port, "session port received");
                        return session_port;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "discovery connection failed mid-handoff");
                    }
                },
                Err(e) => {
                    tracing::debug!(port = discovery_port, error = %e, "host not up yet");
                }
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    async fn session_loop(&self, session_port: u16) {
        loop {
            match TcpStream::connect(("127.0.0.1", session_port)).await {
                Ok(stream) => {
                    tracing::info!(port = session_port, "session connected");
                    if let Err(e) = self.drive(stream).await {
                        tracing::warn!(error = %e, "session dropped");
                    }
                }
                Err(e) => {
                    tracing::debug!(port = session_port, error = %e, "session connect failed");
                }
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    async fn drive(&self, mut stream: TcpStream) -> Result<(), TransportError> {
        let mut decoder = FrameDecoder::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                tracing::debug!("host closed the session");
                return Ok(());
            }
            decoder.push(&buf[..n]);
            while let Some(msg) = decoder.next::<WireMessage>()? {
                self.dispatch(msg);
            }
        }
    }

    fn dispatch(&self, msg: WireMessage) {
        match msg {
            WireMessage::Config { pets } => {
                tracing::info!(pets = pets.len(), "config snapshot received");
                self.registry.apply_snapshot(pets);
            }
            WireMessage::Asset { file, content } => match (file, content) {
                (Some(file), Some(content)) => {
                    tracing::debug!(file = %file, "asset received");
                    self.store.insert(file, content);
                }
                (file, _) => {
                    tracing::error!(file = ?file, "asset message missing file or content");
                }
            },
            WireMessage::Socket { port } => {
                tracing::debug!(port, "stray socket message on session, ignoring");
            }
            WireMessage::Unknown => {
                tracing::debug!("unknown message type, ignoring");
            }
        }
    }
}

/// Read frames off the discovery connection until the handoff arrives.
async fn read_handoff(mut stream: TcpStream) -> Result<u16, TransportError> {
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Err(TransportError::InvalidState(
                "discovery closed before handoff".to_string(),
            ));
        }
        decoder.push(&buf[..n]);
        while let Some(msg) = decoder.next::<WireMessage>()? {
            match msg {
                WireMessage::Socket { port } => return Ok(port),
                other => {
                    tracing::debug!(message = discriminant_name(&other), "non-handoff message during discovery");
                }
            }
        }
    }
}

fn discriminant_name(msg: &WireMessage) -> &'static str {
    match msg {
        WireMessage::Socket { .. } => "socket",
        WireMessage::Config { .. } => "config",
        WireMessage::Asset { .. } => "asset",
        WireMessage::Unknown => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::LayoutMetrics;
    use parking_lot::RwLock;
    use roampets_core::{PetData, PetId, StateName, StateSizes};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn client() -> (SurfaceClient, Arc<PetRegistry>, AssetStore) {
        let metrics = Arc::new(RwLock::new(LayoutMetrics::unobstructed(2000.0, 1000.0)));
        let store = AssetStore::new();
        let registry = Arc::new(PetRegistry::new(metrics, store.clone()));
        let client = SurfaceClient::new(
            "/home/user/proj".into(),
            Arc::clone(&registry),
            store.clone(),
        );
        (client, registry, store)
    }

    fn pet() -> PetData {
        PetData {
            id: PetId(1),
            source: "cat".into(),
            kind: "tabby".into(),
            sizes: StateSizes {
                idle: 40.0,
                walk: 40.0,
            },
            states: BTreeMap::from([(StateName::Idle, "cat/tabby/idle.gif".into())]),
        }
    }

    #[tokio::test]
    async fn test_dispatch_config_populates_registry() {
        let (client, registry, _store) = client();
        client.dispatch(WireMessage::Config { pets: vec![pet()] });
        assert_eq!(registry.ids(), vec![PetId(1)]);
    }

    #[tokio::test]
    async fn test_dispatch_asset_stores_content() {
        let (client, _registry, store) = client();
        client.dispatch(WireMessage::Asset {
            file: Some("pets/cat/tabby/idle.gif".into()),
            content: Some("data:image/gif;base64,AA".into()),
        });
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_rejects_incomplete_asset() {
        let (client, _registry, store) = client();
        client.dispatch(WireMessage::Asset {
            file: Some("pets/cat/tabby/idle.gif".into()),
            content: None,
        });
        client.dispatch(WireMessage::Asset {
            file: None,
            content: Some("data:image/gif;base64,AA".into()),
        });
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_ignores_unknown() {
        let (client, registry, store) = client();
        client.dispatch(WireMessage::Unknown);
        client.dispatch(WireMessage::Socket { port: 40001 });
        assert!(registry.is_empty());
        assert!(store.is_empty());
    }
}
