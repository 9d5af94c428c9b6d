//! The set of modules installed in one server.
//!
//! The group owns the alias routing tables. They are rebuilt on every install
//! and uninstall and swapped in whole, so a lookup never sees a half-updated
//! table.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use mentionbot_core::text::split_left_word;
use mentionbot_core::{CommandResult, CommandSignal, MemberEvent, Message, PrivilegeLevel};

use crate::command::{HelpNode, summarize_nodes};
use crate::error::{GroupError, GroupResult, WrapperError};
use crate::wrapper::ServerModuleWrapper;

#[derive(Default)]
struct Routes {
    /// Module aliases and top-level shortcuts to their module.
    cmd_map: HashMap<String, Arc<ServerModuleWrapper>>,
    /// Aliases accepted by `help <alias>`.
    help_map: HashMap<String, Arc<ServerModuleWrapper>>,
}

impl Routes {
    fn build(modules: &[Arc<ServerModuleWrapper>]) -> Self {
        let mut routes = Self::default();
        for module in modules {
            for key in module
                .module_cmd_aliases()
                .iter()
                .copied()
                .chain(module.shortcut_aliases())
            {
                routes.cmd_map.insert(key.to_string(), module.clone());
                routes.help_map.insert(key.to_string(), module.clone());
            }
        }
        routes
    }
}

#[derive(Default)]
pub struct ServerModuleGroup {
    modules: Vec<Arc<ServerModuleWrapper>>,
    routes: Routes,
}

impl ServerModuleGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn modules(&self) -> &[Arc<ServerModuleWrapper>] {
        &self.modules
    }

    pub fn module(&self, name: &str) -> Option<&Arc<ServerModuleWrapper>> {
        self.modules.iter().find(|m| m.name() == name)
    }

    pub fn module_is_installed(&self, name: &str) -> bool {
        self.module(name).is_some()
    }

    /// `(name, short description)` of every installed module.
    pub fn module_info(&self) -> Vec<(&'static str, &'static str)> {
        self.modules
            .iter()
            .map(|m| (m.name(), m.short_description()))
            .collect()
    }

    /// Checks that `candidate` can join without ambiguous routing.
    fn check_collisions(&self, candidate: &ServerModuleWrapper) -> GroupResult<()> {
        for key in candidate
            .module_cmd_aliases()
            .iter()
            .copied()
            .chain(candidate.shortcut_aliases())
        {
            if let Some(existing) = self.routes.cmd_map.get(key) {
                return Err(GroupError::AliasCollision {
                    alias: key.to_string(),
                    module: candidate.name(),
                    existing: existing.name(),
                });
            }
        }

        for &trigger in candidate.preprocessor_triggers() {
            for installed in &self.modules {
                for &existing_trigger in installed.preprocessor_triggers() {
                    if trigger.starts_with(existing_trigger) || existing_trigger.starts_with(trigger) {
                        return Err(GroupError::TriggerCollision {
                            trigger,
                            module: candidate.name(),
                            existing_trigger,
                            existing: installed.name(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Activates `module` and adds it to the group.
    ///
    /// Nothing is added if routing would become ambiguous or the module fails
    /// to construct.
    pub async fn install(&mut self, module: Arc<ServerModuleWrapper>) -> GroupResult<()> {
        if self.module_is_installed(module.name()) {
            return Err(GroupError::AlreadyInstalled(module.name().to_string()));
        }
        self.check_collisions(&module)?;

        match module.activate().await {
            Ok(()) | Err(WrapperError::AlreadyActive(_)) => {}
            Err(err) => return Err(err.into()),
        }

        let mut modules = self.modules.clone();
        modules.push(module.clone());
        self.routes = Routes::build(&modules);
        self.modules = modules;
        info!(module = module.name(), "Module installed");
        Ok(())
    }

    /// Deactivates and removes a module.
    pub async fn uninstall(&mut self, name: &str) -> GroupResult<()> {
        let module = self
            .module(name)
            .cloned()
            .ok_or_else(|| GroupError::NotInstalled(name.to_string()))?;

        if let Err(err) = module.kill().await {
            debug!(module = name, error = %err, "Uninstalling an inactive module");
        }

        let modules: Vec<_> = self
            .modules
            .iter()
            .filter(|m| !Arc::ptr_eq(m, &module))
            .cloned()
            .collect();
        self.routes = Routes::build(&modules);
        self.modules = modules;
        info!(module = name, "Module uninstalled");
        Ok(())
    }

    pub async fn activate_module(&self, name: &str) -> GroupResult<()> {
        let module = self
            .module(name)
            .ok_or_else(|| GroupError::NotInstalled(name.to_string()))?;
        module.activate().await?;
        Ok(())
    }

    pub async fn kill_module(&self, name: &str) -> GroupResult<()> {
        let module = self
            .module(name)
            .ok_or_else(|| GroupError::NotInstalled(name.to_string()))?;
        module.kill().await?;
        Ok(())
    }

    /// Deactivates every module.
    pub async fn shutdown(&self) {
        for module in &self.modules {
            if module.is_active() {
                let _ = module.kill().await;
            }
        }
    }

    // ─── Event fan-out ───────────────────────────────────────────────────────

    /// Routes a command to the module owning its first word.
    ///
    /// With `silentfail` an unknown first word raises
    /// [`CommandSignal::SilentUnknownCommand`] instead of
    /// [`CommandSignal::UnknownCommand`].
    pub async fn process_cmd(
        &self,
        substr: &str,
        msg: &Message,
        privilege: PrivilegeLevel,
        silentfail: bool,
    ) -> CommandResult {
        let (left, right) = split_left_word(substr);
        match self.routes.cmd_map.get(left) {
            Some(module) => module.process_cmd(left, right, msg, privilege).await,
            None if silentfail => Err(CommandSignal::SilentUnknownCommand.into()),
            None => Err(CommandSignal::UnknownCommand.into()),
        }
    }

    /// Runs every module's preprocessor in installation order.
    pub async fn msg_preprocessor(&self, content: String, msg: &Message, default_prefix: &str) -> String {
        let mut content = content;
        for module in &self.modules {
            content = module.msg_preprocessor(content, msg, default_prefix).await;
        }
        content
    }

    pub async fn on_message(&self, msg: &Message) {
        for module in &self.modules {
            module.on_message(msg).await;
        }
    }

    pub async fn on_member_event(&self, event: &MemberEvent) {
        for module in &self.modules {
            module.on_member_event(event).await;
        }
    }

    // ─── Help ────────────────────────────────────────────────────────────────

    pub async fn help_summary(&self, privilege: PrivilegeLevel) -> String {
        let nodes: Vec<&dyn HelpNode> = self
            .modules
            .iter()
            .map(|m| m.as_ref() as &dyn HelpNode)
            .collect();
        summarize_nodes(&nodes, privilege).await
    }

    /// Detailed help; the first word of `substr` selects the module.
    pub async fn help_detail(
        &self,
        substr: &str,
        privilege: PrivilegeLevel,
    ) -> Result<String, CommandSignal> {
        let (left, right) = split_left_word(substr);
        match self.routes.help_map.get(left) {
            Some(module) => module.help_detail(right, left, privilege).await,
            None => Err(CommandSignal::NoHelpContent),
        }
    }
}

#[async_trait]
impl HelpNode for ServerModuleGroup {
    async fn help_detail(
        &self,
        locator: &str,
        _entry: &str,
        privilege: PrivilegeLevel,
    ) -> Result<String, CommandSignal> {
        ServerModuleGroup::help_detail(self, locator, privilege).await
    }

    async fn help_summary(&self, privilege: PrivilegeLevel) -> String {
        ServerModuleGroup::help_summary(self, privilege).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::future::BoxFuture;
    use mentionbot_core::{Channel, LocalClient, Member, MemoryStore, Server, User};

    use crate::command::Shortcut;
    use crate::module::{ModuleDescriptor, ModuleEnv, ModuleResources, ServerModule, no_shortcuts};

    static SEEN: AtomicUsize = AtomicUsize::new(0);

    struct Echo {
        tag: &'static str,
    }

    #[async_trait]
    impl ServerModule for Echo {
        async fn help_summary(&self, _privilege: PrivilegeLevel) -> anyhow::Result<String> {
            Ok(format!("`{{p}}{{grp}}` - {}", self.tag))
        }

        async fn help_detail(&self, _locator: &str, _privilege: PrivilegeLevel) -> CommandResult<String> {
            Ok(self.tag.to_string())
        }

        async fn process_cmd(
            &mut self,
            substr: &str,
            _msg: &Message,
            _privilege: PrivilegeLevel,
        ) -> CommandResult {
            if substr == "fail" {
                return Err(CommandSignal::OperationAborted.into());
            }
            Ok(())
        }

        async fn msg_preprocessor(
            &mut self,
            content: String,
            _msg: &Message,
            default_prefix: &str,
        ) -> anyhow::Result<String> {
            match content.strip_prefix('+') {
                Some(rest) => Ok(format!("{default_prefix}{} {rest}", self.tag)),
                None => Ok(content),
            }
        }

        async fn on_message(&mut self, _msg: &Message) -> anyhow::Result<()> {
            SEEN.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn create_a(_res: ModuleResources) -> BoxFuture<'static, anyhow::Result<Box<dyn ServerModule>>> {
        Box::pin(async { Ok(Box::new(Echo { tag: "alpha" }) as Box<dyn ServerModule>) })
    }

    fn create_b(_res: ModuleResources) -> BoxFuture<'static, anyhow::Result<Box<dyn ServerModule>>> {
        Box::pin(async { Ok(Box::new(Echo { tag: "beta" }) as Box<dyn ServerModule>) })
    }

    const ALPHA: ModuleDescriptor = ModuleDescriptor {
        name: "Alpha",
        short_description: "First.",
        recommended_aliases: &["alpha", "a"],
        preprocessor_triggers: &["+"],
        shortcuts: no_shortcuts,
        create: create_a,
    };

    const BETA: ModuleDescriptor = ModuleDescriptor {
        name: "Beta",
        short_description: "Second.",
        recommended_aliases: &["beta"],
        preprocessor_triggers: &[],
        shortcuts: no_shortcuts,
        create: create_b,
    };

    static GRUMBLES: AtomicUsize = AtomicUsize::new(0);
    static HEARD: AtomicUsize = AtomicUsize::new(0);

    /// Fails every passive message hook.
    struct Grumpy;

    #[async_trait]
    impl ServerModule for Grumpy {
        async fn help_summary(&self, _privilege: PrivilegeLevel) -> anyhow::Result<String> {
            Ok(String::new())
        }

        async fn help_detail(&self, _locator: &str, _privilege: PrivilegeLevel) -> CommandResult<String> {
            Err(CommandSignal::NoHelpContent.into())
        }

        async fn process_cmd(
            &mut self,
            _substr: &str,
            _msg: &Message,
            _privilege: PrivilegeLevel,
        ) -> CommandResult {
            Ok(())
        }

        async fn on_message(&mut self, _msg: &Message) -> anyhow::Result<()> {
            GRUMBLES.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("grumble")
        }
    }

    struct Listener;

    #[async_trait]
    impl ServerModule for Listener {
        async fn help_summary(&self, _privilege: PrivilegeLevel) -> anyhow::Result<String> {
            Ok(String::new())
        }

        async fn help_detail(&self, _locator: &str, _privilege: PrivilegeLevel) -> CommandResult<String> {
            Err(CommandSignal::NoHelpContent.into())
        }

        async fn process_cmd(
            &mut self,
            _substr: &str,
            _msg: &Message,
            _privilege: PrivilegeLevel,
        ) -> CommandResult {
            Ok(())
        }

        async fn on_message(&mut self, _msg: &Message) -> anyhow::Result<()> {
            HEARD.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn create_grumpy(_res: ModuleResources) -> BoxFuture<'static, anyhow::Result<Box<dyn ServerModule>>> {
        Box::pin(async { Ok(Box::new(Grumpy) as Box<dyn ServerModule>) })
    }

    fn create_stubborn(res: ModuleResources) -> BoxFuture<'static, anyhow::Result<Box<dyn ServerModule>>> {
        res.suppress_autokill(true);
        Box::pin(async { Ok(Box::new(Grumpy) as Box<dyn ServerModule>) })
    }

    fn create_listener(_res: ModuleResources) -> BoxFuture<'static, anyhow::Result<Box<dyn ServerModule>>> {
        Box::pin(async { Ok(Box::new(Listener) as Box<dyn ServerModule>) })
    }

    const GRUMPY: ModuleDescriptor = ModuleDescriptor {
        name: "Grumpy",
        short_description: "Always fails.",
        recommended_aliases: &["grumpy"],
        preprocessor_triggers: &[],
        shortcuts: no_shortcuts,
        create: create_grumpy,
    };

    const STUBBORN: ModuleDescriptor = ModuleDescriptor {
        name: "Stubborn",
        recommended_aliases: &["stubborn"],
        create: create_stubborn,
        ..GRUMPY
    };

    const LISTENER: ModuleDescriptor = ModuleDescriptor {
        name: "Listener",
        short_description: "Counts messages.",
        recommended_aliases: &["listener"],
        create: create_listener,
        ..GRUMPY
    };

    fn env() -> ModuleEnv {
        let client = Arc::new(LocalClient::new(User::new("1", "bot"), "2"));
        client.upsert_server(Server::new("100", "S", "3"));
        ModuleEnv::new("100", client, Arc::new(MemoryStore::new()), "/")
    }

    fn wrapper(descriptor: ModuleDescriptor, shortcuts: Vec<Shortcut>) -> Arc<ServerModuleWrapper> {
        ServerModuleWrapper::new(descriptor, shortcuts, env())
    }

    fn message(content: &str) -> Message {
        Message::new(
            "1",
            content,
            Member::new(User::new("5", "alice")),
            Channel::text("10", "general", "100"),
        )
    }

    #[tokio::test]
    async fn test_install_routes_and_uninstall() {
        let mut group = ServerModuleGroup::new();
        group.install(wrapper(ALPHA, Vec::new())).await.unwrap();
        assert!(group.module("Alpha").unwrap().is_active());

        let msg = message("/a");
        group
            .process_cmd("a hello", &msg, PrivilegeLevel::Normal, false)
            .await
            .unwrap();
        let err = group
            .process_cmd("alpha fail", &msg, PrivilegeLevel::Normal, false)
            .await
            .unwrap_err();
        assert_eq!(err.as_signal(), Some(&CommandSignal::OperationAborted));

        let silent = group
            .process_cmd("nope", &msg, PrivilegeLevel::Normal, true)
            .await
            .unwrap_err();
        assert_eq!(silent.as_signal(), Some(&CommandSignal::SilentUnknownCommand));

        let module = group.module("Alpha").cloned().unwrap();
        group.uninstall("Alpha").await.unwrap();
        assert!(!module.is_active());
        assert!(!group.module_is_installed("Alpha"));
        let loud = group
            .process_cmd("a", &msg, PrivilegeLevel::Normal, false)
            .await
            .unwrap_err();
        assert_eq!(loud.as_signal(), Some(&CommandSignal::UnknownCommand));
    }

    #[tokio::test]
    async fn test_install_rejects_collisions() {
        let mut group = ServerModuleGroup::new();
        group.install(wrapper(ALPHA, Vec::new())).await.unwrap();

        let err = group.install(wrapper(ALPHA, Vec::new())).await.unwrap_err();
        assert_eq!(err, GroupError::AlreadyInstalled("Alpha".into()));

        let stealing = wrapper(
            BETA,
            vec![Shortcut {
                top_level: "a",
                local: "x",
            }],
        );
        let err = group.install(stealing.clone()).await.unwrap_err();
        assert!(matches!(err, GroupError::AliasCollision { ref alias, .. } if alias == "a"));
        assert!(!stealing.is_active());

        let greedy = ModuleDescriptor {
            preprocessor_triggers: &["++"],
            ..BETA
        };
        let err = group.install(wrapper(greedy, Vec::new())).await.unwrap_err();
        assert!(matches!(err, GroupError::TriggerCollision { trigger: "++", .. }));
        assert_eq!(group.module_info(), vec![("Alpha", "First.")]);
    }

    #[tokio::test]
    async fn test_fan_out_and_preprocess() {
        let mut group = ServerModuleGroup::new();
        group.install(wrapper(ALPHA, Vec::new())).await.unwrap();
        group.install(wrapper(BETA, Vec::new())).await.unwrap();

        let before = SEEN.load(Ordering::SeqCst);
        let msg = message("+x");
        group.on_message(&msg).await;
        assert_eq!(SEEN.load(Ordering::SeqCst) - before, 2);

        let rewritten = group.msg_preprocessor("+x".into(), &msg, "/").await;
        assert_eq!(rewritten, "/alpha x");

        group.kill_module("Alpha").await.unwrap();
        let untouched = group.msg_preprocessor("+x".into(), &msg, "/").await;
        assert_eq!(untouched, "+x");
        assert!(matches!(
            group.kill_module("Alpha").await,
            Err(GroupError::Wrapper(WrapperError::NotActive("Alpha")))
        ));
        group.activate_module("Alpha").await.unwrap();
    }

    #[tokio::test]
    async fn test_help_routing() {
        let mut group = ServerModuleGroup::new();
        group.install(wrapper(BETA, Vec::new())).await.unwrap();
        group.install(wrapper(ALPHA, Vec::new())).await.unwrap();

        assert_eq!(
            group.help_summary(PrivilegeLevel::Normal).await,
            "`{p}alpha ` - alpha\n`{p}beta ` - beta"
        );
        assert_eq!(
            group.help_detail("a", PrivilegeLevel::Normal).await.unwrap(),
            "alpha"
        );
        assert_eq!(
            group.help_detail("zzz", PrivilegeLevel::Normal).await,
            Err(CommandSignal::NoHelpContent)
        );
    }

    #[tokio::test]
    async fn test_faulting_on_message_is_contained() {
        let msg = message("hello");

        let mut group = ServerModuleGroup::new();
        group.install(wrapper(GRUMPY, Vec::new())).await.unwrap();
        group.install(wrapper(LISTENER, Vec::new())).await.unwrap();

        let grumbles = GRUMBLES.load(Ordering::SeqCst);
        let heard = HEARD.load(Ordering::SeqCst);
        group.on_message(&msg).await;
        assert_eq!(GRUMBLES.load(Ordering::SeqCst) - grumbles, 1);
        assert_eq!(HEARD.load(Ordering::SeqCst) - heard, 1);
        assert!(!group.module("Grumpy").unwrap().is_active());
        assert!(group.module("Listener").unwrap().is_active());

        group.on_message(&msg).await;
        assert_eq!(GRUMBLES.load(Ordering::SeqCst) - grumbles, 1);
        assert_eq!(HEARD.load(Ordering::SeqCst) - heard, 2);

        let mut group = ServerModuleGroup::new();
        group.install(wrapper(STUBBORN, Vec::new())).await.unwrap();
        group.install(wrapper(LISTENER, Vec::new())).await.unwrap();

        let grumbles = GRUMBLES.load(Ordering::SeqCst);
        let heard = HEARD.load(Ordering::SeqCst);
        group.on_message(&msg).await;
        group.on_message(&msg).await;
        assert_eq!(GRUMBLES.load(Ordering::SeqCst) - grumbles, 2);
        assert_eq!(HEARD.load(Ordering::SeqCst) - heard, 2);
        assert!(group.module("Stubborn").unwrap().is_active());
        assert!(group.module("Listener").unwrap().is_active());
    }
}
