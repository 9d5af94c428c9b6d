//! The per-server settings document.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use mentionbot_core::{SettingsStore, StorageError, StorageResult, StoreKey};

use crate::privilege::PrivilegeSettings;

/// Stored shape. Unknown top-level keys are kept as they are.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettingsDoc {
    #[serde(rename = "Server Name", default)]
    pub server_name: String,
    #[serde(rename = "Installed Modules", default)]
    pub installed_modules: Vec<String>,
    #[serde(rename = "cmd prefix", default)]
    pub cmd_prefix: String,
    #[serde(rename = "bot command privileges", default)]
    pub privileges: PrivilegeSettings,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Loaded settings bound to their store.
pub struct ServerSettings {
    store: Arc<dyn SettingsStore>,
    key: StoreKey,
    doc: ServerSettingsDoc,
}

impl ServerSettings {
    /// Loads the document, or starts one from the given defaults.
    pub async fn load(
        store: Arc<dyn SettingsStore>,
        server_id: &str,
        server_name: &str,
        default_prefix: &str,
        default_modules: &[String],
    ) -> StorageResult<Self> {
        let key = StoreKey::server(server_id);
        let mut doc = match store.load(&key).await? {
            Some(value) => serde_json::from_value::<ServerSettingsDoc>(value)
                .map_err(|e| StorageError::malformed(key.to_string(), e.to_string()))?,
            None => {
                debug!(server = server_id, "No stored settings, using defaults");
                ServerSettingsDoc {
                    server_name: String::new(),
                    installed_modules: default_modules.to_vec(),
                    cmd_prefix: String::new(),
                    privileges: PrivilegeSettings::default(),
                    extra: Map::new(),
                }
            }
        };
        if doc.cmd_prefix.is_empty() {
            doc.cmd_prefix = default_prefix.to_string();
        }
        doc.server_name = server_name.to_string();
        Ok(Self { store, key, doc })
    }

    pub fn doc(&self) -> &ServerSettingsDoc {
        &self.doc
    }

    pub fn installed_modules(&self) -> &[String] {
        &self.doc.installed_modules
    }

    pub fn cmd_prefix(&self) -> &str {
        &self.doc.cmd_prefix
    }

    pub fn privileges(&self) -> &PrivilegeSettings {
        &self.doc.privileges
    }

    pub fn set_cmd_prefix(&mut self, prefix: impl Into<String>) {
        self.doc.cmd_prefix = prefix.into();
    }

    pub fn set_privileges(&mut self, privileges: PrivilegeSettings) {
        self.doc.privileges = privileges;
    }

    pub fn add_module(&mut self, name: &str) {
        if !self.doc.installed_modules.iter().any(|m| m == name) {
            self.doc.installed_modules.push(name.to_string());
        }
    }

    pub fn remove_module(&mut self, name: &str) {
        self.doc.installed_modules.retain(|m| m != name);
    }

    pub async fn save(&self) -> StorageResult<()> {
        let value = serde_json::to_value(&self.doc)?;
        self.store.save(&self.key, &value).await
    }
}
