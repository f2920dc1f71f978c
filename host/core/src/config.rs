//! Host Configuration
//!
//! The daemon is configured by a single TOML file naming the media directory,
//! the workspace path (used for discovery-port derivation), a global sprite
//! scale, and the list of adopted pets. Per-source sprite metadata lives next
//! to the sprites themselves in `media/pets/<source>/config.json`.
//!
//! Building a config snapshot is lossy on purpose: pets whose source config
//! cannot be loaded or whose type is unknown are logged and skipped, so one
//! broken sprite pack never takes down the rest.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::messages::{PetData, PetId, StateName, StateSizes};

/// Default global scale, in percent.
pub const DEFAULT_SCALE: f64 = 100.0;

/// Errors while loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// File contents did not parse.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// Path that failed.
        path: PathBuf,
        /// Parser diagnostic.
        message: String,
    },
}

/// One adopted pet in the daemon config.
#[derive(Clone, Debug, Deserialize)]
pub struct PetEntry {
    /// Stable identity; assigned on load when missing.
    #[serde(default)]
    pub id: Option<u32>,
    /// Sprite pack name.
    pub source: String,
    /// Pet type within the pack.
    #[serde(rename = "type")]
    pub kind: String,
    /// Per-pet scale override, in percent.
    #[serde(default)]
    pub scale: Option<f64>,
}

/// Top-level daemon configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct HostConfig {
    /// Directory holding `pets/` and `icons/`.
    pub media_dir: PathBuf,
    /// Workspace path; drives the discovery port.
    #[serde(default = "default_workspace")]
    pub workspace: String,
    /// Global sprite scale, in percent.
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Adopted pets.
    #[serde(default)]
    pub pets: Vec<PetEntry>,
}

fn default_workspace() -> String {
    "noworkspace".to_string()
}

fn default_scale() -> f64 {
    DEFAULT_SCALE
}

impl HostConfig {
    /// Load and normalize a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: HostConfig = toml::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(config.normalized())
    }

    /// Fold invalid values back to defaults and assign missing pet ids.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            tracing::warn!(scale = self.scale, "invalid global scale, using default");
            self.scale = DEFAULT_SCALE;
        }
        assign_missing_ids(&mut self.pets);
        self
    }
}

/// Assign the lowest free positive integer to every pet without an id.
fn assign_missing_ids(pets: &mut [PetEntry]) {
    let mut used: HashSet<u32> = pets.iter().filter_map(|p| p.id).collect();
    for pet in pets.iter_mut().filter(|p| p.id.is_none()) {
        let mut id = 1;
        while used.contains(&id) {
            id += 1;
        }
        used.insert(id);
        pet.id = Some(id);
    }
}

/// Sprite metadata for one behavioral state.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct SpriteMeta {
    /// Base pixel height before scaling.
    pub size: f64,
}

/// Sprite metadata for one pet type.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct SpriteSet {
    /// Idle sprite.
    pub idle: SpriteMeta,
    /// Walk sprite.
    pub walk: SpriteMeta,
    /// Whether this pet may leave the floor. Reserved; flight is not wired
    /// into the motion engine yet.
    #[serde(default)]
    pub can_fly: bool,
}

/// Per-source sprite pack config (`media/pets/<source>/config.json`).
#[derive(Clone, Debug, Deserialize)]
pub struct SourceConfig {
    /// Human-readable pack name.
    pub name: String,
    /// Metadata per pet type.
    #[serde(default)]
    pub pets: HashMap<String, SpriteSet>,
}

impl SourceConfig {
    /// Load the config for one sprite pack.
    pub fn load(media_dir: &Path, source: &str) -> Result<Self, ConfigError> {
        let path = media_dir.join("pets").join(source).join("config.json");
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|e| ConfigError::Parse {
            path,
            message: e.to_string(),
        })
    }
}

/// Build the wire-ready pet snapshot from the current config.
///
/// Sizes are pre-scaled here (`base * 2 * scale / 100`) so surfaces never see
/// raw sprite metadata. States whose sprite file is missing on disk are left
/// out of `states`.
#[must_use]
pub fn build_snapshot(config: &HostConfig) -> Vec<PetData> {
    let mut sources: HashMap<String, Option<SourceConfig>> = HashMap::new();
    let mut pets = Vec::new();

    for entry in &config.pets {
        let Some(id) = entry.id else { continue };

        let source_config = sources
            .entry(entry.source.clone())
            .or_insert_with(|| match SourceConfig::load(&config.media_dir, &entry.source) {
                Ok(cfg) => Some(cfg),
                Err(e) => {
                    tracing::error!(source = %entry.source, error = %e, "failed to load source config");
                    None
                }
            });
        let Some(source_config) = source_config else {
            continue;
        };

        let Some(sprites) = source_config.pets.get(&entry.kind) else {
            tracing::warn!(source = %entry.source, kind = %entry.kind, "unknown pet type");
            continue;
        };

        let scale = entry
            .scale
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(config.scale);
        let factor = 2.0 * scale / 100.0;

        let mut states = BTreeMap::new();
        for state in StateName::ALL {
            let rel = format!("{}/{}/{}.gif", entry.source, entry.kind, state.file_stem());
            if config.media_dir.join("pets").join(&rel).is_file() {
                states.insert(state, rel);
            }
        }

        pets.push(PetData {
            id: PetId(id),
            source: entry.source.clone(),
            kind: entry.kind.clone(),
            sizes: StateSizes {
                idle: sprites.idle.size * factor,
                walk: sprites.walk.size * factor,
            },
            states,
        });
    }

    pets
}
