//! Wire Messages
//!
//! JSON messages exchanged between the host and a render surface. The host is
//! the only sender; surfaces are pure consumers that render what they are
//! told. Unknown message types must be ignored by receivers so that hosts can
//! be upgraded ahead of surfaces.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identity of a configured pet. Stable across reconfiguration pushes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PetId(pub u32);

impl std::fmt::Display for PetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pet-{}", self.0)
    }
}

/// Behavioral states a pet sprite can be in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateName {
    /// Standing still (also used while hovered/dragged).
    Idle,
    /// Walking or being thrown.
    Walk,
}

impl StateName {
    /// All states, in the order the host streams their sprites.
    pub const ALL: [StateName; 2] = [StateName::Idle, StateName::Walk];

    /// File stem of the sprite for this state.
    #[must_use]
    pub fn file_stem(self) -> &'static str {
        match self {
            StateName::Idle => "idle",
            StateName::Walk => "walk",
        }
    }
}

/// Rendered pixel height per behavioral state, pre-scaled host-side.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateSizes {
    /// Height while idle.
    pub idle: f64,
    /// Height while walking.
    pub walk: f64,
}

impl StateSizes {
    /// Height for a given state.
    #[must_use]
    pub fn get(&self, state: StateName) -> f64 {
        match state {
            StateName::Idle => self.idle,
            StateName::Walk => self.walk,
        }
    }
}

/// One pet's configuration as delivered in a `config` message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PetData {
    /// Pet identity.
    pub id: PetId,
    /// Sprite pack this pet comes from (e.g. "cat").
    pub source: String,
    /// Pet type within the source (e.g. "tabby").
    #[serde(rename = "type")]
    pub kind: String,
    /// Pre-scaled pixel heights per state.
    pub sizes: StateSizes,
    /// Sprite file per state, relative to the source root. States whose file
    /// is missing host-side are simply absent.
    pub states: BTreeMap<StateName, String>,
}

impl PetData {
    /// Wire name of the asset for a state, or `None` if the state has no
    /// sprite configured.
    #[must_use]
    pub fn asset_name(&self, state: StateName) -> Option<String> {
        self.states.get(&state).map(|rel| format!("pets/{rel}"))
    }
}

/// Messages from host to surface.
///
/// The `asset` variant keeps its fields optional on purpose: a message with a
/// missing `file` or `content` must be rejected by the receiver with a logged
/// error rather than failing the whole stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireMessage {
    /// Discovery handoff: the dedicated session port for this surface.
    Socket {
        /// Port the session listener was opened on.
        port: u16,
    },
    /// Full replacement snapshot of all live pets.
    Config {
        /// Every configured pet; absent pets must be torn down.
        pets: Vec<PetData>,
    },
    /// One binary asset, base64-encoded as a data URI.
    Asset {
        /// Addressable asset name (`pets/<relpath>` or `icons/<name>`).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file: Option<String>,
        /// `data:image/<ext>;base64,<data>` payload.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    /// Forward compatibility: receivers ignore types they do not know.
    #[serde(other)]
    Unknown,
}
