//! File-backed settings store.
//!
//! Documents are pretty-printed JSON laid out under the data directory:
//!
//! ```text
//! <data>/
//! ├── serverdata/
//! │   └── <server id>/
//! │       ├── settings.json
//! │       └── m-<Module>/settings.json
//! └── shared/
//!     └── m-<Module>/settings.json
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tracing::trace;

use mentionbot_core::{SettingsStore, StorageError, StorageResult, StoreKey};

const SETTINGS_FILE: &str = "settings.json";

/// [`SettingsStore`] over the local filesystem.
///
/// Writes go to a temporary sibling first and are renamed into place.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    /// Directories are created lazily on the first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the document for `key` lives.
    pub fn path_for(&self, key: &StoreKey) -> PathBuf {
        let dir = match key {
            StoreKey::Server { server_id } => self.root.join("serverdata").join(server_id),
            StoreKey::Module { server_id, module } => self
                .root
                .join("serverdata")
                .join(server_id)
                .join(format!("m-{module}")),
            StoreKey::SharedModule { module } => self.root.join("shared").join(format!("m-{module}")),
        };
        dir.join(SETTINGS_FILE)
    }
}

#[async_trait]
impl SettingsStore for JsonFileStore {
    async fn load(&self, key: &StoreKey) -> StorageResult<Option<Value>> {
        let path = self.path_for(key);
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        trace!(path = %path.display(), "Loaded settings");
        let doc = serde_json::from_str(&text)
            .map_err(|e| StorageError::malformed(key.to_string(), e.to_string()))?;
        Ok(Some(doc))
    }

    async fn save(&self, key: &StoreKey, doc: &Value) -> StorageResult<()> {
        let path = self.path_for(key);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }

        let json = serde_json::to_vec_pretty(doc)?;
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &json).await?;
        fs::rename(&temp_path, &path).await?;
        trace!(path = %path.display(), "Saved settings");
        Ok(())
    }
}
