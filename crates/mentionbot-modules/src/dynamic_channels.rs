//! Temporary channels that users open on demand.
//!
//! Every channel that is not on the default list is temporary. Opening one
//! unhides it (or creates it) and puts it at the back of the "last opened"
//! queue; when the queue grows past the configured maximum the oldest
//! channel is hidden again. A background sweep hides channels that have
//! been idle for longer than the timeout.
//!
//! ```text
//! ++room   ->  {p}dchannel open room
//! +ro      ->  {p}dchannel search ro
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use mentionbot_framework::linkme::distributed_slice;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info};

use mentionbot_core::{
    Channel, ChannelKind, CommandError, CommandResult, CommandSignal, Message,
    PrivilegeLevel, SearchOptions,
};
use mentionbot_framework::{
    CommandContext, CommandMeta, CommandRegistry, MODULE_REGISTRY, ModuleDescriptor,
    ModuleResources, RegistryResult, ServerModule, StaticRegistry, no_shortcuts,
};

#[distributed_slice(MODULE_REGISTRY)]
#[linkme(crate = mentionbot_framework::linkme)]
pub static DYNAMIC_CHANNELS: ModuleDescriptor = ModuleDescriptor {
    name: "Dynamic Channels",
    short_description: "Allows users to create temporary channels.",
    recommended_aliases: &["dchannel"],
    preprocessor_triggers: &["++", "+"],
    shortcuts: no_shortcuts,
    create: DynamicChannels::create,
};

static COMMANDS: StaticRegistry<DynamicChannels> = StaticRegistry::new(build);

const DEFAULT_TIMEOUT_SECS: i64 = 10;
const DEFAULT_MAX_ACTIVE: i64 = 5;
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

fn build() -> RegistryResult<CommandRegistry<DynamicChannels>> {
    use PrivilegeLevel::Admin;

    CommandRegistry::builder()
        .add(
            CommandMeta::new(&["settings"])
                .default_command()
                .help("`{cmd}` - View the module's settings."),
            cmd_settings,
        )
        .add(
            CommandMeta::new(&["search"])
                .help("`{cmd} [string]` - Search list of temporary channels."),
            cmd_search,
        )
        .add(
            CommandMeta::new(&["open", "create"])
                .help("`{cmd} [string]` - Create/unhide channel."),
            cmd_open,
        )
        .add(
            CommandMeta::new(&["adddefault"])
                .min_privilege(Admin)
                .help("`{cmd} [channel]` - Add a channel to the default list."),
            cmd_adddefault,
        )
        .add(
            CommandMeta::new(&["removedefault"])
                .min_privilege(Admin)
                .help("`{cmd} [channel]` - Remove a channel from the default list."),
            cmd_removedefault,
        )
        .add(
            CommandMeta::new(&["settimeout"])
                .min_privilege(Admin)
                .help("`{cmd} [int]` - Set how many idle seconds before a channel is hidden."),
            cmd_settimeout,
        )
        .add(
            CommandMeta::new(&["setmaxactive"])
                .min_privilege(Admin)
                .help(
                    "`{cmd} [int]` - Set the maximum number of open temporary channels.\n\n\
                     Enter `-1` for no limit.",
                ),
            cmd_setmaxactive,
        )
        .build()
}

// ─── Settings ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl From<&Channel> for ChannelRecord {
    fn from(channel: &Channel) -> Self {
        Self {
            id: channel.id.clone(),
            name: channel.name.clone(),
        }
    }
}

/// Stored per server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicChannelsSettings {
    #[serde(rename = "default channels", default)]
    pub default_channels: Vec<ChannelRecord>,
    /// Idle seconds before a temporary channel is hidden.
    #[serde(rename = "channel timeout", default = "default_timeout")]
    pub channel_timeout: i64,
    /// Negative means unlimited.
    #[serde(rename = "max active temp channels", default = "default_max_active")]
    pub max_active: i64,
}

fn default_timeout() -> i64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_active() -> i64 {
    DEFAULT_MAX_ACTIVE
}

impl Default for DynamicChannelsSettings {
    fn default() -> Self {
        Self {
            default_channels: Vec::new(),
            channel_timeout: DEFAULT_TIMEOUT_SECS,
            max_active: DEFAULT_MAX_ACTIVE,
        }
    }
}

impl DynamicChannelsSettings {
    fn is_default(&self, channel_id: &str) -> bool {
        self.default_channels.iter().any(|c| c.id == channel_id)
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.channel_timeout.max(1) as u64)
    }

    fn limit(&self) -> Option<usize> {
        usize::try_from(self.max_active).ok()
    }
}

// ─── Tracking ────────────────────────────────────────────────────────────────

/// Shared between command handlers and the idle sweep.
#[derive(Debug)]
struct Tracker {
    settings: DynamicChannelsSettings,
    /// Open temporary channels, oldest first.
    last_opened: VecDeque<String>,
    last_active: HashMap<String, Instant>,
}

impl Tracker {
    fn new(settings: DynamicChannelsSettings) -> Self {
        Self {
            settings,
            last_opened: VecDeque::new(),
            last_active: HashMap::new(),
        }
    }

    /// Moves `channel_id` to the back of the queue and returns the channels
    /// evicted to stay within the limit.
    fn record_open(&mut self, channel_id: &str, now: Instant) -> Vec<String> {
        self.forget(channel_id);
        self.last_opened.push_back(channel_id.to_string());
        self.last_active.insert(channel_id.to_string(), now);
        self.enforce_limit()
    }

    fn enforce_limit(&mut self) -> Vec<String> {
        let Some(limit) = self.settings.limit() else {
            return Vec::new();
        };
        let mut evicted = Vec::new();
        while self.last_opened.len() > limit {
            if let Some(oldest) = self.last_opened.pop_front() {
                self.last_active.remove(&oldest);
                evicted.push(oldest);
            }
        }
        evicted
    }

    fn forget(&mut self, channel_id: &str) {
        self.last_opened.retain(|id| id != channel_id);
        self.last_active.remove(channel_id);
    }

    fn touch(&mut self, channel_id: &str, now: Instant) {
        if let Some(seen) = self.last_active.get_mut(channel_id) {
            *seen = now;
        }
    }

    /// Removes and returns channels idle for longer than the timeout.
    fn take_expired(&mut self, now: Instant) -> Vec<String> {
        let timeout = self.settings.timeout();
        let expired: Vec<String> = self
            .last_active
            .iter()
            .filter(|(_, seen)| now.duration_since(**seen) > timeout)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            self.forget(id);
        }
        expired
    }
}

async fn sweep_idle(res: ModuleResources, tracker: Arc<Mutex<Tracker>>) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        ticker.tick().await;
        let expired = tracker.lock().take_expired(Instant::now());
        for id in expired {
            res.client().set_channel_visible(&id, false).await?;
            info!(server = res.server_id(), channel = %id, "Idle temporary channel hidden");
        }
    }
}

// ─── Module ──────────────────────────────────────────────────────────────────

pub struct DynamicChannels {
    res: ModuleResources,
    tracker: Arc<Mutex<Tracker>>,
}

impl DynamicChannels {
    fn create(res: ModuleResources) -> BoxFuture<'static, anyhow::Result<Box<dyn ServerModule>>> {
        Box::pin(async move {
            COMMANDS.get()?;
            let mut settings: DynamicChannelsSettings = res.get_settings_or(Default::default()).await?;

            // Drop default channels that no longer exist.
            settings.default_channels.retain(|record| {
                res.client()
                    .search_for_channel(&record.id, SearchOptions::by_id().in_server(res.server_id()))
                    .is_some()
            });
            if settings.channel_timeout < 1 {
                settings.channel_timeout = DEFAULT_TIMEOUT_SECS;
            }
            res.save_settings(&settings).await?;

            let tracker = Arc::new(Mutex::new(Tracker::new(settings)));
            res.start_background_task(sweep_idle(res.clone(), tracker.clone()));
            Ok(Box::new(DynamicChannels { res, tracker }) as Box<dyn ServerModule>)
        })
    }

    fn base_cmd(&self) -> &'static str {
        self.res
            .module_cmd_aliases()
            .first()
            .copied()
            .unwrap_or("dchannel")
    }

    fn find_channel(&self, query: &str) -> Option<Channel> {
        self.res.client().search_for_channel(
            query,
            SearchOptions::by_id().with_names().in_server(self.res.server_id()),
        )
    }

    async fn save(&self) -> CommandResult {
        let settings = self.tracker.lock().settings.clone();
        self.res.save_settings(&settings).await?;
        Ok(())
    }

    async fn hide_all(&self, channel_ids: Vec<String>) -> CommandResult {
        for id in channel_ids {
            self.res.client().set_channel_visible(&id, false).await?;
            debug!(channel = %id, "Temporary channel evicted");
        }
        Ok(())
    }

    async fn reply(&self, msg: &Message, text: &str) -> CommandResult {
        self.res.client().reply(msg, text).await?;
        Ok(())
    }
}

#[async_trait]
impl ServerModule for DynamicChannels {
    async fn help_summary(&self, _privilege: PrivilegeLevel) -> anyhow::Result<String> {
        Ok("`+` - See list of temporary channels.\n\
            `+[string]` - Search list of temporary channels.\n\
            `++[string]` - Create/unhide channel.\n\
            `{modhelp}` - Dynamic channel settings."
            .to_string())
    }

    async fn help_detail(&self, locator: &str, privilege: PrivilegeLevel) -> CommandResult<String> {
        let registry = COMMANDS.get()?;
        if locator.is_empty() {
            return Ok(registry.help_summary());
        }
        Ok(registry.help_detail(locator, privilege)?)
    }

    async fn process_cmd(
        &mut self,
        substr: &str,
        msg: &Message,
        privilege: PrivilegeLevel,
    ) -> CommandResult {
        COMMANDS.get()?.dispatch(self, substr, msg, privilege).await
    }

    async fn msg_preprocessor(
        &mut self,
        content: String,
        _msg: &Message,
        default_prefix: &str,
    ) -> anyhow::Result<String> {
        let base = self.base_cmd();
        let rewritten = if let Some(rest) = content.strip_prefix("++") {
            format!("{default_prefix}{base} open {rest}")
        } else if let Some(rest) = content.strip_prefix('+') {
            format!("{default_prefix}{base} search {rest}")
        } else {
            content
        };
        Ok(rewritten)
    }

    async fn on_message(&mut self, msg: &Message) -> anyhow::Result<()> {
        self.tracker.lock().touch(&msg.channel.id, Instant::now());
        Ok(())
    }
}

type Handler<'a> = BoxFuture<'a, CommandResult>;

/// Channel names are lowercase with dashes for spaces.
fn channel_name(input: &str) -> String {
    input
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

// ─── Commands ────────────────────────────────────────────────────────────────

fn cmd_settings<'a>(module: &'a mut DynamicChannels, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let (settings, open) = {
            let tracker = module.tracker.lock();
            (tracker.settings.clone(), tracker.last_opened.clone())
        };

        let mut text = format!("**Timeout**: {} seconds", settings.channel_timeout);
        match settings.limit() {
            Some(limit) => text.push_str(&format!("\n**Max Active**: {limit} channels")),
            None => text.push_str("\n**Max Active**: unlimited channels"),
        }
        text.push_str("\n**Default Channels**:");
        if settings.default_channels.is_empty() {
            text.push_str("\nNONE.");
        }
        for record in &settings.default_channels {
            text.push_str(&format!("\n<#{0}> (ID: {0})", record.id));
        }
        text.push_str("\n**Open Temporary Channels**:");
        if open.is_empty() {
            text.push_str("\nNONE.");
        }
        for id in &open {
            text.push_str(&format!("\n<#{id}>"));
        }

        if ctx.privilege >= PrivilegeLevel::Admin {
            let base = format!("{}{}", module.res.cmd_prefix(), module.base_cmd());
            text.push_str("\n\nChange settings using the following commands:");
            text.push_str(&format!("\n`{base} adddefault [channel]`"));
            text.push_str(&format!("\n`{base} removedefault [channel]`"));
            text.push_str(&format!("\n`{base} settimeout [int]`"));
            text.push_str(&format!(
                "\n`{base} setmaxactive [int]` (for unlimited max active, enter `-1`.)"
            ));
        }
        module.reply(ctx.msg, &text).await
    })
}

fn cmd_search<'a>(module: &'a mut DynamicChannels, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let query = ctx.args.trim().to_lowercase();
        let server = module.res.server().ok_or_else(|| {
            CommandError::Fault(anyhow::anyhow!("server {} not visible", module.res.server_id()))
        })?;
        let matches: Vec<Channel> = {
            let tracker = module.tracker.lock();
            server
                .channels
                .into_iter()
                .filter(|c| c.kind == ChannelKind::Text && !tracker.settings.is_default(&c.id))
                .filter(|c| c.name.to_lowercase().contains(&query))
                .collect()
        };

        let text = if matches.is_empty() {
            "No temporary channels found.".to_string()
        } else {
            let mut buf = "**Temporary channels:**".to_string();
            for channel in &matches {
                let state = if channel.visible { "open" } else { "hidden" };
                buf.push_str(&format!("\n`#{}` ({state})", channel.name));
            }
            buf
        };
        module.reply(ctx.msg, &text).await
    })
}

fn cmd_open<'a>(module: &'a mut DynamicChannels, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let name = channel_name(ctx.args);
        if name.is_empty() {
            return Err(CommandSignal::InvalidArguments(None).into());
        }
        let server = module.res.server().ok_or_else(|| {
            CommandError::Fault(anyhow::anyhow!("server {} not visible", module.res.server_id()))
        })?;

        let client = module.res.client().clone();
        let channel = match server.channel_named(&name).cloned() {
            Some(existing) => {
                let is_default = module.tracker.lock().settings.is_default(&existing.id);
                if is_default {
                    let text = format!("{} is a default channel.", existing.mention());
                    return module.reply(ctx.msg, &text).await;
                }
                client.set_channel_visible(&existing.id, true).await?;
                existing
            }
            None => {
                let created = client.create_text_channel(&server.id, &name).await?;
                info!(server = %server.id, channel = %created.id, name = %name, "Temporary channel created");
                created
            }
        };

        let evicted = module
            .tracker
            .lock()
            .record_open(&channel.id, Instant::now());
        module.hide_all(evicted).await?;

        let text = format!("Channel {} opened.", channel.mention());
        module.reply(ctx.msg, &text).await
    })
}

fn cmd_adddefault<'a>(module: &'a mut DynamicChannels, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let Some(channel) = module.find_channel(ctx.args) else {
            return module.reply(ctx.msg, "Error: Channel not found.").await;
        };
        let added = {
            let mut tracker = module.tracker.lock();
            if tracker.settings.is_default(&channel.id) {
                false
            } else {
                tracker.settings.default_channels.push(ChannelRecord::from(&channel));
                tracker.forget(&channel.id);
                true
            }
        };
        if !added {
            return module.reply(ctx.msg, "Error: Channel is already default.").await;
        }
        module.save().await?;
        let text = format!("{} successfully added to default list.", channel.mention());
        module.reply(ctx.msg, &text).await
    })
}

fn cmd_removedefault<'a>(module: &'a mut DynamicChannels, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let Some(channel) = module.find_channel(ctx.args) else {
            return module.reply(ctx.msg, "Error: Channel not found.").await;
        };
        let removed = {
            let mut tracker = module.tracker.lock();
            let before = tracker.settings.default_channels.len();
            tracker.settings.default_channels.retain(|c| c.id != channel.id);
            tracker.settings.default_channels.len() != before
        };
        if !removed {
            return module.reply(ctx.msg, "Error: Channel is not default.").await;
        }
        module.save().await?;
        let text = format!("{} successfully removed from default list.", channel.mention());
        module.reply(ctx.msg, &text).await
    })
}

fn cmd_settimeout<'a>(module: &'a mut DynamicChannels, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let Ok(timeout) = ctx.args.trim().parse::<i64>() else {
            return module.reply(ctx.msg, "Error: Must enter an integer.").await;
        };
        if timeout < 1 {
            return module.reply(ctx.msg, "Error: Timeout must be >0 seconds.").await;
        }
        module.tracker.lock().settings.channel_timeout = timeout;
        module.save().await?;
        let text = format!("Timeout set to {timeout} seconds.");
        module.reply(ctx.msg, &text).await
    })
}

fn cmd_setmaxactive<'a>(module: &'a mut DynamicChannels, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let Ok(max_active) = ctx.args.trim().parse::<i64>() else {
            return module.reply(ctx.msg, "Error: Must enter an integer.").await;
        };
        let evicted = {
            let mut tracker = module.tracker.lock();
            tracker.settings.max_active = max_active;
            tracker.enforce_limit()
        };
        module.save().await?;
        module.hide_all(evicted).await?;

        let text = if max_active < 0 {
            "Max active channels set to unlimited.".to_string()
        } else {
            format!("Max active channels set to {max_active}.")
        };
        module.reply(ctx.msg, &text).await
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mentionbot_core::{ChatClient, LocalClient, Member, MemoryStore, Server, StoreKey, User};
    use mentionbot_framework::{ModuleEnv, ServerModuleWrapper};
    use serde_json::json;

    const ID: &str = "100";

    fn setup(store: MemoryStore) -> (Arc<LocalClient>, Arc<MemoryStore>, Arc<ServerModuleWrapper>) {
        let client = Arc::new(LocalClient::new(User::new("1", "mentionbot"), "2"));
        let mut server = Server::new(ID, "Test Server", "3");
        server.channels.push(Channel::text("10", "general", ID));
        server.channels.push(Channel::text("11", "lobby", ID));
        server.members.push(Member::new(User::new("5", "alice")));
        client.upsert_server(server);
        let store = Arc::new(store);
        let env = ModuleEnv::new(ID, client.clone(), store.clone(), "/");
        let wrapper = ServerModuleWrapper::new(DYNAMIC_CHANNELS, Vec::new(), env);
        (client, store, wrapper)
    }

    fn message(channel_id: &str, content: &str) -> Message {
        Message::new(
            "m",
            content,
            Member::new(User::new("5", "alice")),
            Channel::text(channel_id, "general", ID),
        )
    }

    fn visible(client: &LocalClient, name: &str) -> Option<bool> {
        client
            .server(ID)
            .and_then(|s| s.channel_named(name).map(|c| c.visible))
    }

    async fn run(wrapper: &ServerModuleWrapper, args: &str, privilege: PrivilegeLevel) -> CommandResult {
        wrapper
            .process_cmd("dchannel", args, &message("10", args), privilege)
            .await
    }

    fn settings_key() -> StoreKey {
        StoreKey::module(ID, "DynamicChannels")
    }

    #[test]
    fn test_tracker_evicts_oldest() {
        let mut tracker = Tracker::new(DynamicChannelsSettings {
            max_active: 2,
            ..Default::default()
        });
        let now = Instant::now();
        assert!(tracker.record_open("a", now).is_empty());
        assert!(tracker.record_open("b", now).is_empty());
        assert!(tracker.record_open("a", now).is_empty());
        assert_eq!(tracker.record_open("c", now), vec!["b".to_string()]);
        assert_eq!(tracker.last_opened, ["a", "c"]);

        tracker.settings.max_active = -1;
        assert!(tracker.record_open("d", now).is_empty());
        tracker.settings.max_active = 0;
        assert_eq!(tracker.enforce_limit().len(), 3);
    }

    #[test]
    fn test_channel_name() {
        assert_eq!(channel_name("  Test   Room "), "test-room");
        assert_eq!(channel_name(""), "");
    }

    #[tokio::test]
    async fn test_defaults_saved_on_first_activation() {
        let (_client, store, wrapper) = setup(MemoryStore::new());
        wrapper.activate().await.unwrap();
        assert_eq!(
            store.snapshot(&settings_key()).unwrap(),
            json!({"default channels": [], "channel timeout": 10, "max active temp channels": 5})
        );
    }

    #[tokio::test]
    async fn test_stale_defaults_are_dropped() {
        let store = MemoryStore::new().with_doc(
            settings_key(),
            json!({"default channels": [{"id": "10", "name": "general"}, {"id": "99"}], "channel timeout": 0}),
        );
        let (_client, store, wrapper) = setup(store);
        wrapper.activate().await.unwrap();
        let saved = store.snapshot(&settings_key()).unwrap();
        assert_eq!(saved["default channels"], json!([{"id": "10", "name": "general"}]));
        assert_eq!(saved["channel timeout"], 10);
        assert_eq!(saved["max active temp channels"], 5);
    }

    #[tokio::test]
    async fn test_preprocessor_shortcuts() {
        let (_client, _store, wrapper) = setup(MemoryStore::new());
        wrapper.activate().await.unwrap();
        let msg = message("10", "");
        assert_eq!(
            wrapper.msg_preprocessor("++Game Night".into(), &msg, "!").await,
            "!dchannel open Game Night"
        );
        assert_eq!(wrapper.msg_preprocessor("+gam".into(), &msg, "!").await, "!dchannel search gam");
        assert_eq!(wrapper.msg_preprocessor("hello".into(), &msg, "!").await, "hello");
    }

    #[tokio::test]
    async fn test_open_search_and_settings() {
        let (client, _store, wrapper) = setup(MemoryStore::new());
        wrapper.activate().await.unwrap();

        run(&wrapper, "open Game Night", PrivilegeLevel::Normal).await.unwrap();
        assert_eq!(visible(&client, "game-night"), Some(true));
        let opened = client.channel_messages("10").pop().unwrap();
        assert!(opened.starts_with("Channel <#") && opened.ends_with("> opened."));

        client.set_channel_visible("11", false).await.unwrap();
        run(&wrapper, "open lobby", PrivilegeLevel::Normal).await.unwrap();
        assert_eq!(visible(&client, "lobby"), Some(true));
        assert_eq!(client.channel_messages("10").pop().unwrap(), "Channel <#11> opened.");

        run(&wrapper, "search game", PrivilegeLevel::Normal).await.unwrap();
        assert_eq!(
            client.channel_messages("10").pop().unwrap(),
            "**Temporary channels:**\n`#game-night` (open)"
        );
        run(&wrapper, "search zzz", PrivilegeLevel::Normal).await.unwrap();
        assert_eq!(client.channel_messages("10").pop().unwrap(), "No temporary channels found.");

        run(&wrapper, "", PrivilegeLevel::Normal).await.unwrap();
        let settings = client.channel_messages("10").pop().unwrap();
        assert!(settings.starts_with("**Timeout**: 10 seconds\n**Max Active**: 5 channels\n**Default Channels**:\nNONE."));
        assert!(settings.ends_with("\n<#11>"));
        assert!(!settings.contains("Change settings"));

        run(&wrapper, "settings", PrivilegeLevel::Admin).await.unwrap();
        assert!(client.channel_messages("10").pop().unwrap().contains("`/dchannel settimeout [int]`"));

        assert_eq!(
            run(&wrapper, "open", PrivilegeLevel::Normal).await.unwrap_err().as_signal(),
            Some(&CommandSignal::InvalidArguments(None))
        );
    }

    #[tokio::test]
    async fn test_admin_commands() {
        let (client, store, wrapper) = setup(MemoryStore::new());
        wrapper.activate().await.unwrap();

        assert_eq!(
            run(&wrapper, "settimeout 30", PrivilegeLevel::Normal).await.unwrap_err().as_signal(),
            Some(&CommandSignal::PrivilegeError)
        );

        run(&wrapper, "adddefault general", PrivilegeLevel::Admin).await.unwrap();
        assert_eq!(
            client.channel_messages("10").pop().unwrap(),
            "<#10> successfully added to default list."
        );
        run(&wrapper, "adddefault <#10>", PrivilegeLevel::Admin).await.unwrap();
        assert_eq!(client.channel_messages("10").pop().unwrap(), "Error: Channel is already default.");
        run(&wrapper, "open general", PrivilegeLevel::Normal).await.unwrap();
        assert_eq!(client.channel_messages("10").pop().unwrap(), "<#10> is a default channel.");

        run(&wrapper, "settimeout 0", PrivilegeLevel::Admin).await.unwrap();
        assert_eq!(client.channel_messages("10").pop().unwrap(), "Error: Timeout must be >0 seconds.");
        run(&wrapper, "settimeout soon", PrivilegeLevel::Admin).await.unwrap();
        assert_eq!(client.channel_messages("10").pop().unwrap(), "Error: Must enter an integer.");
        run(&wrapper, "settimeout 30", PrivilegeLevel::Admin).await.unwrap();
        run(&wrapper, "setmaxactive -1", PrivilegeLevel::Admin).await.unwrap();
        assert_eq!(client.channel_messages("10").pop().unwrap(), "Max active channels set to unlimited.");

        assert_eq!(
            store.snapshot(&settings_key()).unwrap(),
            json!({
                "default channels": [{"id": "10", "name": "general"}],
                "channel timeout": 30,
                "max active temp channels": -1
            })
        );

        run(&wrapper, "removedefault 10", PrivilegeLevel::Admin).await.unwrap();
        assert_eq!(
            client.channel_messages("10").pop().unwrap(),
            "<#10> successfully removed from default list."
        );
        run(&wrapper, "removedefault 10", PrivilegeLevel::Admin).await.unwrap();
        assert_eq!(client.channel_messages("10").pop().unwrap(), "Error: Channel is not default.");
        run(&wrapper, "removedefault nowhere", PrivilegeLevel::Admin).await.unwrap();
        assert_eq!(client.channel_messages("10").pop().unwrap(), "Error: Channel not found.");
    }

    #[tokio::test]
    async fn test_lowering_max_hides_oldest() {
        let (client, _store, wrapper) = setup(MemoryStore::new());
        wrapper.activate().await.unwrap();
        for room in ["one", "two", "three"] {
            run(&wrapper, &format!("open {room}"), PrivilegeLevel::Normal).await.unwrap();
        }
        run(&wrapper, "setmaxactive 1", PrivilegeLevel::Admin).await.unwrap();
        assert_eq!(visible(&client, "one"), Some(false));
        assert_eq!(visible(&client, "two"), Some(false));
        assert_eq!(visible(&client, "three"), Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_channels_are_hidden() {
        let (client, _store, wrapper) = setup(MemoryStore::new());
        wrapper.activate().await.unwrap();
        run(&wrapper, "open quiet", PrivilegeLevel::Normal).await.unwrap();
        run(&wrapper, "open busy", PrivilegeLevel::Normal).await.unwrap();
        let busy = client.server(ID).unwrap().channel_named("busy").unwrap().id.clone();

        tokio::time::sleep(Duration::from_secs(6)).await;
        wrapper.on_message(&message(&busy, "still here")).await;
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(visible(&client, "quiet"), Some(false));
        assert_eq!(visible(&client, "busy"), Some(true));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(visible(&client, "busy"), Some(false));
        assert!(wrapper.is_active());
    }
}
