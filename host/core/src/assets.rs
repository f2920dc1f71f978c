//! Asset Loading
//!
//! Sprites and icons travel the wire as base64 data URIs so surfaces never
//! touch the filesystem. A missing or unreadable file is logged by callers
//! and that asset is simply absent until a later push supplies it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Read a file and encode it as a `data:image/<ext>;base64,...` URI.
pub fn data_uri(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("gif");
    Ok(format!("data:image/{ext};base64,{}", STANDARD.encode(bytes)))
}

/// Icon name -> file path, from `media/icons/config.json`.
///
/// A missing or malformed icon config is not fatal; the surface just gets no
/// icons this cycle.
#[must_use]
pub fn icon_manifest(media_dir: &Path) -> BTreeMap<String, PathBuf> {
    let config_path = media_dir.join("icons").join("config.json");
    let raw = match std::fs::read_to_string(&config_path) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(path = %config_path.display(), error = %e, "no icon config");
            return BTreeMap::new();
        }
    };
    let names: BTreeMap<String, String> = match serde_json::from_str(&raw) {
        Ok(names) => names,
        Err(e) => {
            tracing::error!(path = %config_path.display(), error = %e, "malformed icon config");
            return BTreeMap::new();
        }
    };
    names
        .into_iter()
        .map(|(name, file)| (name, media_dir.join("icons").join(file)))
        .collect()
}
