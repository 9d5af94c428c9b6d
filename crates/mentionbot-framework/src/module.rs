//! The module contract.
//!
//! A module is a pluggable feature set installed into one server. It is
//! described statically by a [`ModuleDescriptor`] (collected at link time into
//! [`MODULE_REGISTRY`](crate::factory::MODULE_REGISTRY)) and lives behind a
//! [`ServerModuleWrapper`](crate::wrapper::ServerModuleWrapper) once
//! installed. Everything a module may touch is reached through its
//! [`ModuleResources`].
//!
//! # Example
//!
//! ```rust,ignore
//! #[distributed_slice(MODULE_REGISTRY)]
//! #[linkme(crate = mentionbot_framework::linkme)]
//! static ECHO: ModuleDescriptor = ModuleDescriptor {
//!     name: "Echo",
//!     short_description: "Repeats things.",
//!     recommended_aliases: &["echo"],
//!     preprocessor_triggers: &[],
//!     shortcuts: no_shortcuts,
//!     create: Echo::create,
//! };
//! ```

use std::future::Future;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use mentionbot_core::text::remove_whitespace;
use mentionbot_core::{
    ChatClient, CommandResult, MemberEvent, Message, PrivilegeLevel, Server, SettingsStore,
    StorageError, StoreKey,
};

use crate::command::Shortcut;
use crate::error::RegistryResult;
use crate::wrapper::ServerModuleWrapper;

// ─── Contract ────────────────────────────────────────────────────────────────

/// Behaviour of a live module instance.
///
/// Returning a fault (`anyhow::Error`, or [`CommandError::Fault`]) from any
/// method is contained by the wrapper: the owner is notified and the module
/// is deactivated unless autokill is suppressed. Command signals pass through
/// untouched.
///
/// [`CommandError::Fault`]: mentionbot_core::CommandError::Fault
#[async_trait]
pub trait ServerModule: Send + Sync + 'static {
    /// Summary lines for the server-wide help message.
    async fn help_summary(&self, privilege: PrivilegeLevel) -> anyhow::Result<String>;

    /// Detailed help for `locator`, the query after the module alias.
    async fn help_detail(&self, locator: &str, privilege: PrivilegeLevel) -> CommandResult<String>;

    /// Handles a command addressed to this module.
    ///
    /// `substr` has the module alias stripped; top-level shortcuts have
    /// already been rewritten to their local alias.
    async fn process_cmd(
        &mut self,
        substr: &str,
        msg: &Message,
        privilege: PrivilegeLevel,
    ) -> CommandResult;

    /// Rewrites message content before command parsing.
    async fn msg_preprocessor(
        &mut self,
        content: String,
        _msg: &Message,
        _default_prefix: &str,
    ) -> anyhow::Result<String> {
        Ok(content)
    }

    /// Sees every message in the server, commands included.
    async fn on_message(&mut self, _msg: &Message) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_member_event(&mut self, _event: &MemberEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Constructor stored in a descriptor.
pub type ModuleConstructor =
    fn(ModuleResources) -> BoxFuture<'static, anyhow::Result<Box<dyn ServerModule>>>;

/// Static description of a module type.
#[derive(Debug, Clone, Copy)]
pub struct ModuleDescriptor {
    /// Unique name, also used in install commands.
    pub name: &'static str,
    pub short_description: &'static str,
    /// Aliases routing commands to the module. The first is the primary one.
    pub recommended_aliases: &'static [&'static str],
    /// Leading strings the module's preprocessor reacts to.
    pub preprocessor_triggers: &'static [&'static str],
    /// Top-level aliases the module exposes.
    pub shortcuts: fn() -> RegistryResult<Vec<Shortcut>>,
    pub create: ModuleConstructor,
}

impl ModuleDescriptor {
    pub fn primary_alias(&self) -> &'static str {
        self.recommended_aliases.first().copied().unwrap_or_default()
    }
}

/// For descriptors of modules without top-level aliases.
pub fn no_shortcuts() -> RegistryResult<Vec<Shortcut>> {
    Ok(Vec::new())
}

// ─── Resources ───────────────────────────────────────────────────────────────

/// Per-server collaborators shared by the instance and its modules.
#[derive(Clone)]
pub struct ModuleEnv {
    pub server_id: String,
    pub client: Arc<dyn ChatClient>,
    pub store: Arc<dyn SettingsStore>,
    /// The server's live command prefix.
    pub cmd_prefix: Arc<RwLock<String>>,
}

impl ModuleEnv {
    pub fn new(
        server_id: impl Into<String>,
        client: Arc<dyn ChatClient>,
        store: Arc<dyn SettingsStore>,
        cmd_prefix: impl Into<String>,
    ) -> Self {
        Self {
            server_id: server_id.into(),
            client,
            store,
            cmd_prefix: Arc::new(RwLock::new(cmd_prefix.into())),
        }
    }

    pub fn cmd_prefix(&self) -> String {
        self.cmd_prefix.read().clone()
    }
}

/// What a module can reach.
///
/// Settings are JSON documents keyed by the module name with whitespace
/// removed, so `Dynamic Channels` stores under `DynamicChannels`.
#[derive(Clone)]
pub struct ModuleResources {
    name: &'static str,
    aliases: &'static [&'static str],
    env: ModuleEnv,
    wrapper: Weak<ServerModuleWrapper>,
}

impl ModuleResources {
    pub(crate) fn new(
        descriptor: &ModuleDescriptor,
        env: ModuleEnv,
        wrapper: Weak<ServerModuleWrapper>,
    ) -> Self {
        Self {
            name: descriptor.name,
            aliases: descriptor.recommended_aliases,
            env,
            wrapper,
        }
    }

    pub fn module_name(&self) -> &'static str {
        self.name
    }

    pub fn module_cmd_aliases(&self) -> &'static [&'static str] {
        self.aliases
    }

    pub fn client(&self) -> &Arc<dyn ChatClient> {
        &self.env.client
    }

    pub fn server_id(&self) -> &str {
        &self.env.server_id
    }

    /// A fresh snapshot of the server.
    pub fn server(&self) -> Option<Server> {
        self.env.client.server(&self.env.server_id)
    }

    pub fn cmd_prefix(&self) -> String {
        self.env.cmd_prefix()
    }

    pub fn botowner_id(&self) -> String {
        self.env.client.bot_owner_id()
    }

    pub fn me_id(&self) -> String {
        self.env.client.bot_user().id
    }

    fn settings_key(&self) -> StoreKey {
        StoreKey::module(&self.env.server_id, remove_whitespace(self.name))
    }

    /// Loads this module's settings for this server.
    pub async fn get_settings<T: DeserializeOwned>(&self) -> anyhow::Result<Option<T>> {
        load_doc(&*self.env.store, &self.settings_key()).await
    }

    /// Loads settings, falling back to `default` when none are stored.
    pub async fn get_settings_or<T: DeserializeOwned>(&self, default: T) -> anyhow::Result<T> {
        Ok(self.get_settings().await?.unwrap_or(default))
    }

    pub async fn save_settings<T: Serialize + Sync>(&self, settings: &T) -> anyhow::Result<()> {
        save_doc(&*self.env.store, &self.settings_key(), settings).await
    }

    /// Keeps the module active after a fault when `suppress` is `true`.
    pub fn suppress_autokill(&self, suppress: bool) {
        if let Some(wrapper) = self.wrapper.upgrade() {
            wrapper.set_suppress_autokill(suppress);
        }
    }

    /// Runs `task` for as long as the module stays active.
    ///
    /// The task is expected to run forever: returning, with or without an
    /// error, is treated as a fault. It is cancelled when the module is
    /// deactivated.
    pub fn start_background_task<F>(&self, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        match self.wrapper.upgrade() {
            Some(wrapper) => wrapper.spawn_background(task),
            None => debug!(module = self.name, "Wrapper dropped, background task not started"),
        }
    }
}

async fn load_doc<T: DeserializeOwned>(
    store: &dyn SettingsStore,
    key: &StoreKey,
) -> anyhow::Result<Option<T>> {
    match store.load(key).await? {
        Some(doc) => {
            let value = serde_json::from_value(doc)
                .map_err(|e| StorageError::malformed(key.to_string(), e.to_string()))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

async fn save_doc<T: Serialize + Sync>(
    store: &dyn SettingsStore,
    key: &StoreKey,
    settings: &T,
) -> anyhow::Result<()> {
    let doc = serde_json::to_value(settings)?;
    store.save(key, &doc).await?;
    Ok(())
}
