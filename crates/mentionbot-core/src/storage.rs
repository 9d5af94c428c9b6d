//! Persistent settings documents.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::StorageResult;

/// Identifies one settings document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// Server-wide settings (prefix, installed modules, privileges).
    Server { server_id: String },
    /// One module's settings inside one server.
    Module { server_id: String, module: String },
    /// One module's settings shared by every server.
    SharedModule { module: String },
}

impl StoreKey {
    pub fn server(server_id: impl Into<String>) -> Self {
        Self::Server {
            server_id: server_id.into(),
        }
    }

    pub fn module(server_id: impl Into<String>, module: impl Into<String>) -> Self {
        Self::Module {
            server_id: server_id.into(),
            module: module.into(),
        }
    }

    pub fn shared_module(module: impl Into<String>) -> Self {
        Self::SharedModule {
            module: module.into(),
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server { server_id } => write!(f, "server {server_id}"),
            Self::Module { server_id, module } => write!(f, "module '{module}' in server {server_id}"),
            Self::SharedModule { module } => write!(f, "shared module '{module}'"),
        }
    }
}

/// Key/value store of JSON documents.
///
/// The store does no schema validation; callers reject malformed values.
#[async_trait]
pub trait SettingsStore: Send + Sync + 'static {
    /// Returns the document, or `None` if nothing has been saved yet.
    async fn load(&self, key: &StoreKey) -> StorageResult<Option<Value>>;

    /// Replaces the document.
    async fn save(&self, key: &StoreKey, doc: &Value) -> StorageResult<()>;
}

/// In-memory [`SettingsStore`], used by tests and the console binary.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<StoreKey, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeds a document.
    pub fn with_doc(self, key: StoreKey, doc: Value) -> Self {
        self.docs.write().insert(key, doc);
        self
    }

    /// Returns a copy of the current document.
    pub fn snapshot(&self, key: &StoreKey) -> Option<Value> {
        self.docs.read().get(key).cloned()
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn load(&self, key: &StoreKey) -> StorageResult<Option<Value>> {
        Ok(self.docs.read().get(key).cloned())
    }

    async fn save(&self, key: &StoreKey, doc: &Value) -> StorageResult<()> {
        self.docs.write().insert(key.clone(), doc.clone());
        Ok(())
    }
}
