//! Everything the bot does inside one server.
//!
//! A [`ServerBotInstance`] owns the server's settings, privilege tables and
//! installed modules, and runs every message through the command pipeline:
//!
//! ```text
//! message ─▶ on_message fan-out ─▶ privilege ─▶ preprocessors ─▶ prefix / mention?
//!                                    │                                 │
//!                            NoPrivilege: stop                   no: stop
//!                                                                      ▼
//!                                               core command ◀── first word ──▶ module group
//! ```

mod core_cmds;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, span, warn};

use mentionbot_core::text::split_left_word;
use mentionbot_core::{
    ChatClient, CommandResult, CommandSignal, MemberEvent, Message, PrivilegeLevel, Server,
    SettingsStore,
};

use crate::command::CommandContext;
use crate::error::InstanceResult;
use crate::factory::ServerModuleFactory;
use crate::group::ServerModuleGroup;
use crate::module::ModuleEnv;
use crate::privilege::PrivilegeManager;
use crate::settings::ServerSettings;

pub use core_cmds::core_commands;

/// Construction parameters shared by every server.
#[derive(Debug, Clone)]
pub struct InstanceOptions {
    pub default_prefix: String,
    /// Installed into servers that have no stored settings yet.
    pub default_modules: Vec<String>,
    /// Cancelled by the `closebot` command.
    pub shutdown: CancellationToken,
}

impl Default for InstanceOptions {
    fn default() -> Self {
        Self {
            default_prefix: "/".to_string(),
            default_modules: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }
}

pub struct ServerBotInstance {
    server_id: String,
    server_name: String,
    client: Arc<dyn ChatClient>,
    factory: Arc<ServerModuleFactory>,
    settings: ServerSettings,
    cmd_prefix: Arc<RwLock<String>>,
    env: ModuleEnv,
    privileges: PrivilegeManager,
    modules: ServerModuleGroup,
    started_at: DateTime<Utc>,
    shutdown: CancellationToken,
}

impl ServerBotInstance {
    /// Loads settings and installs the stored modules.
    ///
    /// Modules that fail to install are skipped with a warning and stay in
    /// the stored list. The settings document is written back afterwards.
    pub async fn new(
        server: &Server,
        client: Arc<dyn ChatClient>,
        store: Arc<dyn SettingsStore>,
        factory: Arc<ServerModuleFactory>,
        options: &InstanceOptions,
    ) -> InstanceResult<Self> {
        core_commands()?;

        let settings = ServerSettings::load(
            store.clone(),
            &server.id,
            &server.name,
            &options.default_prefix,
            &options.default_modules,
        )
        .await?;

        let mut privileges = PrivilegeManager::new(client.bot_owner_id(), server.owner_id.clone());
        privileges.apply_settings(settings.privileges());

        let env = ModuleEnv::new(
            server.id.clone(),
            client.clone(),
            store,
            settings.cmd_prefix(),
        );

        let mut modules = ServerModuleGroup::new();
        for name in settings.installed_modules() {
            let installed = match factory.new_module_instance(name, env.clone()) {
                Ok(wrapper) => modules.install(wrapper).await.map_err(|e| e.to_string()),
                Err(err) => Err(err.to_string()),
            };
            if let Err(reason) = installed {
                warn!(server = %server.id, module = %name, %reason, "Error installing module, skipping");
            }
        }

        settings.save().await?;
        info!(
            server = %server.id,
            name = %server.name,
            modules = modules.modules().len(),
            "Server instance ready"
        );

        Ok(Self {
            server_id: server.id.clone(),
            server_name: server.name.clone(),
            cmd_prefix: env.cmd_prefix.clone(),
            client,
            factory,
            settings,
            env,
            privileges,
            modules,
            started_at: Utc::now(),
            shutdown: options.shutdown.clone(),
        })
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn cmd_prefix(&self) -> String {
        self.cmd_prefix.read().clone()
    }

    pub fn modules(&self) -> &ServerModuleGroup {
        &self.modules
    }

    pub fn privileges(&self) -> &PrivilegeManager {
        &self.privileges
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Runs one message through the pipeline.
    ///
    /// Signals and faults are returned to the caller. Module faults never
    /// surface here; they are contained by the module wrappers.
    pub async fn process_text(&mut self, text: &str, msg: &Message) -> CommandResult {
        self.modules.on_message(msg).await;

        self.refresh_server_owner();
        let privilege = self.privileges.privilege_level(&msg.author);
        if privilege == PrivilegeLevel::NoPrivilege {
            return Ok(());
        }

        let prefix = self.cmd_prefix();
        let content = self
            .modules
            .msg_preprocessor(text.to_string(), msg, &prefix)
            .await;
        let Some(substr) = self.strip_invocation(&content, &prefix) else {
            return Ok(());
        };

        let span = span!(
            tracing::Level::DEBUG,
            "command",
            server = %self.server_id,
            user = %msg.author.id(),
            %privilege
        );
        async {
            debug!(command = substr, "Processing command");
            let (left, right) = split_left_word(substr);
            let registry = core_commands()?;
            match registry.get(left) {
                Some(entry) => {
                    if privilege < entry.meta().required_privilege() {
                        return Err(CommandSignal::PrivilegeError.into());
                    }
                    let ctx = CommandContext {
                        args: right,
                        msg,
                        privilege,
                        alias: left,
                    };
                    (entry.handler())(self, ctx).await
                }
                None => self.modules.process_cmd(substr, msg, privilege, true).await,
            }
        }
        .instrument(span)
        .await
    }

    /// Strips the prefix or a leading bot mention.
    fn strip_invocation<'a>(&self, content: &'a str, prefix: &str) -> Option<&'a str> {
        let me = self.client.bot_user().id;
        let mentions = [format!("<@{me}>"), format!("<@!{me}>")];
        if let Some(rest) = content.strip_prefix(prefix) {
            return Some(rest.trim());
        }
        mentions
            .iter()
            .find_map(|m| content.strip_prefix(m.as_str()))
            .map(str::trim)
    }

    fn refresh_server_owner(&mut self) {
        if let Some(server) = self.client.server(&self.server_id) {
            self.privileges.set_serverowner(server.owner_id);
        }
    }

    pub async fn on_member_event(&mut self, event: &MemberEvent) {
        debug!(server = %self.server_id, kind = event.kind(), user = %event.user().id, "Member event");
        self.modules.on_member_event(event).await;
    }

    /// Deactivates every module.
    pub async fn shutdown(&mut self) {
        self.modules.shutdown().await;
        info!(server = %self.server_id, "Server instance shut down");
    }

    /// Help text with `{p}` filled in.
    ///
    /// An empty query gives the full summary. Otherwise the first word is
    /// looked up as a core command, then as a module alias.
    async fn help_content(
        &self,
        substr: &str,
        privilege: PrivilegeLevel,
    ) -> Result<String, CommandSignal> {
        let registry = core_commands().map_err(|_| CommandSignal::NoHelpContent)?;
        let text = if substr.is_empty() {
            let core = registry.help_summary().replace("{grp}", "");
            let mods = self.modules.help_summary(privilege).await;
            if mods.is_empty() {
                core
            } else {
                format!("{core}\n\n{mods}")
            }
        } else {
            let (left, _) = split_left_word(substr);
            match registry.get(left) {
                Some(entry) => entry.meta().detail_text(privilege).replace("{grp}", ""),
                None => self.modules.help_detail(substr, privilege).await?,
            }
        };
        Ok(text.replace("{p}", &self.cmd_prefix()))
    }

    async fn persist_privileges(&mut self) -> CommandResult {
        self.settings.set_privileges(self.privileges.to_settings());
        self.settings.save().await?;
        Ok(())
    }

    async fn reply(&self, msg: &Message, text: &str) -> CommandResult {
        self.client.reply(msg, text).await?;
        Ok(())
    }
}
