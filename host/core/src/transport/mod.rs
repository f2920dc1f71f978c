//! Socket transport between host and render surfaces.
//!
//! Two-phase handoff: a surface first connects to the deterministic discovery
//! port (derived from the workspace path), receives a dedicated session port,
//! and reconnects there for config and asset streaming. Frames are
//! length-prefixed JSON with a CRC32 checksum.

pub mod frame;
pub mod server;

pub use frame::{encode, FrameDecoder, MAX_FRAME_BYTES};
pub use server::{HostServer, SessionSummary};

use thiserror::Error;

/// Errors surfaced by the transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Underlying socket I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame (de)serialization failed or violated size limits.
    #[error("frame error: {0}")]
    Frame(String),

    /// Payload arrived corrupted.
    #[error("checksum mismatch (expected {expected:#010x}, got {actual:#010x})")]
    ChecksumMismatch {
        /// Checksum carried in the frame header.
        expected: u32,
        /// Checksum computed over the received payload.
        actual: u32,
    },

    /// Operation attempted in the wrong lifecycle phase.
    #[error("invalid state: {0}")]
    InvalidState(String),
}
