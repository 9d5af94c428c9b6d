//! Process-level orchestration.
//!
//! [`BotRuntime`] consumes the [`InboundEvent`] stream of one chat client
//! and routes it to per-server workers. It stops when:
//!
//! - a shutdown signal arrives (Ctrl+C, SIGTERM, or the future given to
//!   [`BotRuntime::run_until`]),
//! - the bot owner runs `closebot`,
//! - the event stream ends, or
//! - a server reports a core fault, which is returned as the error.
//!
//! ```rust,ignore
//! let runtime = BotRuntime::builder()
//!     .config_file("mentionbot.toml")
//!     .build(client)?;
//! runtime.run(events).await?;
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use mentionbot_core::{ChatClient, InboundEvent, Message, SettingsStore};
use mentionbot_framework::{InstanceOptions, ServerModuleFactory};

use crate::config::{ConfigLoader, MentionbotConfig};
use crate::error::RuntimeResult;
use crate::logging;
use crate::store::JsonFileStore;
use crate::worker::{ServerEvent, ServerWorker, WorkerContext};

/// Reply to any private message.
pub const PRIVATE_MESSAGE_REPLY: &str = "sry m8 im not programmed to do anything fancy with pms yet";

/// Owns the collaborators and drives every server.
pub struct BotRuntime {
    config: MentionbotConfig,
    client: Arc<dyn ChatClient>,
    store: Arc<dyn SettingsStore>,
    factory: Arc<ServerModuleFactory>,
    shutdown: CancellationToken,
}

impl BotRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from a loaded configuration.
    ///
    /// Initializes logging, stores settings under `bot.data_dir` and uses
    /// every module linked into the binary.
    pub fn from_config(config: &MentionbotConfig, client: Arc<dyn ChatClient>) -> RuntimeResult<Self> {
        logging::init_from_config(&config.logging);

        let factory = ServerModuleFactory::collect_all()?;
        info!(
            log_level = %config.logging.level,
            data_dir = %config.bot.data_dir.display(),
            modules = factory.available().count(),
            "Runtime initialized"
        );

        Ok(Self {
            config: config.clone(),
            store: Arc::new(JsonFileStore::new(&config.bot.data_dir)),
            client,
            factory: Arc::new(factory),
            shutdown: CancellationToken::new(),
        })
    }

    /// Replaces the settings store.
    pub fn with_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.store = store;
        self
    }

    /// Replaces the module factory.
    pub fn with_factory(mut self, factory: ServerModuleFactory) -> Self {
        self.factory = Arc::new(factory);
        self
    }

    pub fn config(&self) -> &MentionbotConfig {
        &self.config
    }

    /// Cancelling this token stops the runtime. `closebot` cancels it too.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(&self, events: mpsc::Receiver<InboundEvent>) -> RuntimeResult<()> {
        info!("mentionbot is now running. Press Ctrl+C to stop.");
        self.run_until(events, shutdown_signal()).await
    }

    /// Runs until `shutdown` completes.
    pub async fn run_until<F>(
        &self,
        mut events: mpsc::Receiver<InboundEvent>,
        shutdown: F,
    ) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let (faults, mut fault_rx) = mpsc::unbounded_channel();
        let ctx = WorkerContext {
            client: self.client.clone(),
            store: self.store.clone(),
            factory: self.factory.clone(),
            options: InstanceOptions {
                default_prefix: self.config.bot.default_prefix.clone(),
                default_modules: self.config.bot.default_modules.clone(),
                shutdown: self.shutdown.clone(),
            },
            queue_capacity: self.config.bot.queue_capacity,
            faults,
        };

        let mut workers = HashMap::new();
        for server in self.client.servers() {
            workers.insert(server.id.clone(), ServerWorker::spawn(server, ctx.clone()));
        }
        info!(servers = workers.len(), "Server workers started");

        tokio::pin!(shutdown);
        let mut outcome = Ok(());
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                Some(err) = fault_rx.recv() => {
                    outcome = Err(err);
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => self.route(event, &mut workers, &ctx).await,
                    None => {
                        info!("Event stream closed");
                        break;
                    }
                },
            }
        }

        for (_, worker) in workers.drain() {
            worker.stop().await;
        }
        if outcome.is_ok()
            && let Ok(err) = fault_rx.try_recv()
        {
            outcome = Err(err);
        }

        info!("Runtime stopped");
        outcome
    }

    async fn route(
        &self,
        event: InboundEvent,
        workers: &mut HashMap<String, ServerWorker>,
        ctx: &WorkerContext,
    ) {
        trace!(event = event.event_name(), "Inbound event");
        match event {
            InboundEvent::Message(msg) => {
                if msg.author.id() == self.client.bot_user().id {
                    return;
                }
                if msg.is_private() {
                    self.reply_private(&msg).await;
                    return;
                }
                let Some(server_id) = msg.server_id().map(str::to_string) else {
                    warn!(channel = %msg.channel.id, "Server message without a server, dropping");
                    return;
                };
                self.forward(server_id, ServerEvent::Message(msg), workers, ctx)
                    .await;
            }
            InboundEvent::Member { server_id, event } => {
                self.forward(server_id, ServerEvent::Member(event), workers, ctx)
                    .await;
            }
            InboundEvent::ServerJoined(server) => {
                if !workers.contains_key(&server.id) {
                    info!(server = %server.id, name = %server.name, "Joined server");
                    workers.insert(server.id.clone(), ServerWorker::spawn(server, ctx.clone()));
                }
            }
            InboundEvent::ServerRemoved { server_id } => {
                if let Some(worker) = workers.remove(&server_id) {
                    info!(server = %server_id, "Left server");
                    worker.stop().await;
                }
            }
        }
    }

    /// Queues an event on its server's worker, starting one if needed.
    async fn forward(
        &self,
        server_id: String,
        event: ServerEvent,
        workers: &mut HashMap<String, ServerWorker>,
        ctx: &WorkerContext,
    ) {
        if !workers.contains_key(&server_id) {
            let Some(server) = self.client.server(&server_id) else {
                warn!(server = %server_id, "Event for unknown server, dropping");
                return;
            };
            debug!(server = %server_id, "Starting worker on first event");
            workers.insert(server_id.clone(), ServerWorker::spawn(server, ctx.clone()));
        }

        if let Some(worker) = workers.get(&server_id)
            && !worker.send(event).await
        {
            warn!(server = %server_id, "Server worker has stopped, dropping event");
            if let Some(worker) = workers.remove(&server_id) {
                worker.stop().await;
            }
        }
    }

    async fn reply_private(&self, msg: &Message) {
        debug!(user = %msg.author.id(), "Private message");
        if let Err(err) = self.client.reply(msg, PRIVATE_MESSAGE_REPLY).await {
            warn!(error = %err, "Failed to answer private message");
        }
    }
}

/// Completes on Ctrl+C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c() => {}
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down");
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "Failed to register SIGTERM handler");
                ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(err) => {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            futures::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Loads configuration, then builds a [`BotRuntime`].
///
/// ```rust,ignore
/// let runtime = BotRuntime::builder()
///     .profile("production")
///     .set("bot.default_prefix", "!")
///     .build(client)?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    pub fn set<V: serde::Serialize>(mut self, key: &str, value: V) -> Self {
        self.config_loader = self.config_loader.set(key, value);
        self
    }

    pub fn build(self, client: Arc<dyn ChatClient>) -> RuntimeResult<BotRuntime> {
        let config = self.config_loader.load()?;
        BotRuntime::from_config(&config, client)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::pending;
    use serde_json::Value;

    use mentionbot_core::{
        Channel, LocalClient, Member, MemberEvent, MemoryStore, Server, StoreKey, User,
    };
    use mentionbot_framework::ModuleDescriptor;

    use crate::error::RuntimeError;

    struct Fixture {
        client: Arc<LocalClient>,
        store: Arc<MemoryStore>,
        runtime: BotRuntime,
    }

    fn fixture() -> Fixture {
        let client = Arc::new(LocalClient::new(User::new("1", "mentionbot"), "2"));
        let mut server = Server::new("100", "Test Server", "3");
        server.members.push(Member::new(User::new("2", "dev")));
        server.members.push(Member::new(User::new("5", "bob")));
        server.channels.push(Channel::text("10", "general", "100"));
        client.upsert_server(server);

        let store = Arc::new(MemoryStore::default());
        let runtime = BotRuntime {
            config: MentionbotConfig::default(),
            client: client.clone(),
            store: store.clone(),
            factory: Arc::new(
                ServerModuleFactory::from_descriptors(Vec::<ModuleDescriptor>::new()).unwrap(),
            ),
            shutdown: CancellationToken::new(),
        };
        Fixture {
            client,
            store,
            runtime,
        }
    }

    fn message(author: &str, content: &str) -> InboundEvent {
        InboundEvent::Message(Message::new(
            "m",
            content,
            Member::new(User::new(author, author)),
            Channel::text("10", "general", "100"),
        ))
    }

    #[tokio::test]
    async fn test_private_message_reply() {
        let fx = fixture();
        let (tx, rx) = mpsc::channel(8);
        tx.send(InboundEvent::Message(Message::new(
            "m",
            "hello",
            Member::new(User::new("5", "bob")),
            Channel::private("50", "bob"),
        )))
        .await
        .unwrap();
        drop(tx);

        fx.runtime.run_until(rx, pending()).await.unwrap();
        assert_eq!(fx.client.channel_messages("50"), [PRIVATE_MESSAGE_REPLY]);
    }

    #[tokio::test]
    async fn test_own_messages_ignored() {
        let fx = fixture();
        let (tx, rx) = mpsc::channel(8);
        tx.send(message("1", "/closebot")).await.unwrap();
        drop(tx);

        fx.runtime.run_until(rx, pending()).await.unwrap();
        assert!(fx.client.channel_messages("10").is_empty());
        assert!(!fx.runtime.shutdown_token().is_cancelled());
    }

    #[tokio::test]
    async fn test_signal_reply() {
        let fx = fixture();
        let (tx, rx) = mpsc::channel(8);
        tx.send(message("5", "/closebot")).await.unwrap();
        tx.send(message("5", "just chatting")).await.unwrap();
        drop(tx);

        fx.runtime.run_until(rx, pending()).await.unwrap();
        assert_eq!(
            fx.client.channel_messages("10"),
            ["Error: Permission denied."]
        );
    }

    #[tokio::test]
    async fn test_core_fault_is_fatal() {
        let fx = fixture();
        let (tx, rx) = mpsc::channel(8);
        tx.send(message("2", "/throwexception")).await.unwrap();

        let result = fx.runtime.run_until(rx, pending()).await;
        assert!(matches!(
            result,
            Err(RuntimeError::CoreFault { ref server_id, .. }) if server_id == "100"
        ));

        let report = fx.client.direct_messages("2");
        assert_eq!(report.len(), 1);
        assert!(report[0].starts_with("**EXCEPTION**"));
        let announced = fx.client.channel_messages("10");
        assert!(announced[0].contains("THIS BOT WILL NOW TERMINATE"));
        drop(tx);
    }

    #[tokio::test]
    async fn test_closebot_stops_runtime() {
        let fx = fixture();
        let (tx, rx) = mpsc::channel(8);
        tx.send(message("2", "/closebot")).await.unwrap();

        fx.runtime.run_until(rx, pending()).await.unwrap();
        assert!(fx.runtime.shutdown_token().is_cancelled());
        assert_eq!(fx.client.channel_messages("10"), ["brb killing self"]);
        drop(tx);
    }

    #[tokio::test]
    async fn test_servers_joined_and_removed() {
        let fx = fixture();
        let (tx, rx) = mpsc::channel(8);

        let mut other = Server::new("200", "Other", "3");
        other.channels.push(Channel::text("20", "lobby", "200"));
        fx.client.upsert_server(other.clone());
        tx.send(InboundEvent::ServerJoined(other)).await.unwrap();
        tx.send(InboundEvent::Member {
            server_id: "200".into(),
            event: MemberEvent::Joined {
                member: Member::new(User::new("6", "carol")),
            },
        })
        .await
        .unwrap();
        tx.send(InboundEvent::ServerRemoved {
            server_id: "200".into(),
        })
        .await
        .unwrap();
        tx.send(message("5", "/closebot")).await.unwrap();
        drop(tx);

        fx.runtime.run_until(rx, pending()).await.unwrap();
        assert!(fx.store.snapshot(&StoreKey::server("200")).is_some());
        assert_eq!(
            fx.client.channel_messages("10"),
            ["Error: Permission denied."]
        );
    }

    #[tokio::test]
    async fn test_settings_written_for_every_server() {
        let fx = fixture();
        let (tx, rx) = mpsc::channel(8);
        drop(tx);

        fx.runtime.run_until(rx, pending()).await.unwrap();
        let doc = fx.store.snapshot(&StoreKey::server("100")).unwrap();
        assert_eq!(doc["cmd prefix"], Value::from("/"));
    }

    #[tokio::test]
    async fn test_external_shutdown() {
        let fx = fixture();
        let (tx, rx) = mpsc::channel(8);
        fx.runtime.run_until(rx, async {}).await.unwrap();
        drop(tx);
    }
}
