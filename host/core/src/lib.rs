//! roampets-core: host-side engine for the desktop pets system.
//!
//! The host reads a TOML configuration, derives a deterministic discovery
//! port from the workspace path, and hands each render surface a dedicated
//! session port. Over that session it streams the pet snapshot followed by
//! every sprite and icon the surface has not seen yet, as base64 data URIs.
//!
//! Modules:
//! - [`port`]: workspace-derived discovery port, random session ports.
//! - [`messages`]: JSON wire messages and the pet data model.
//! - [`config`]: daemon config, sprite-pack metadata, snapshot building.
//! - [`assets`]: data-URI encoding and the icon manifest.
//! - [`transport`]: frame codec and the [`HostServer`] itself.

#![deny(missing_docs)]

pub mod assets;
pub mod config;
pub mod messages;
pub mod port;
pub mod transport;

pub use config::{ConfigError, HostConfig, PetEntry};
pub use messages::{PetData, PetId, StateName, StateSizes, WireMessage};
pub use transport::{HostServer, SessionSummary, TransportError};
