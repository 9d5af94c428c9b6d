//! In-process [`ChatClient`] backed by plain data.
//!
//! Used by the console binary and by tests: servers are inserted by hand and
//! everything the bot sends is captured in an outbox.

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::trace;

use crate::client::ChatClient;
use crate::error::{TransportError, TransportResult};
use crate::model::{Channel, Server, User};

/// Where a captured message went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Channel(String),
    User(String),
}

/// One captured outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub destination: Destination,
    pub content: String,
}

#[derive(Debug, Default)]
struct LocalState {
    servers: Vec<Server>,
    outbox: Vec<SentMessage>,
    next_channel_id: u64,
}

#[derive(Debug)]
pub struct LocalClient {
    bot: User,
    owner_id: String,
    state: RwLock<LocalState>,
}

impl LocalClient {
    pub fn new(bot: User, owner_id: impl Into<String>) -> Self {
        Self {
            bot,
            owner_id: owner_id.into(),
            state: RwLock::new(LocalState {
                next_channel_id: 900_000,
                ..Default::default()
            }),
        }
    }

    /// Adds or replaces a server snapshot.
    pub fn upsert_server(&self, server: Server) {
        let mut state = self.state.write();
        state.servers.retain(|s| s.id != server.id);
        state.servers.push(server);
    }

    pub fn remove_server(&self, server_id: &str) {
        self.state.write().servers.retain(|s| s.id != server_id);
    }

    /// Everything sent so far, oldest first.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.state.read().outbox.clone()
    }

    /// Drains the outbox.
    pub fn take_sent(&self) -> Vec<SentMessage> {
        std::mem::take(&mut self.state.write().outbox)
    }

    /// Contents sent to one channel.
    pub fn channel_messages(&self, channel_id: &str) -> Vec<String> {
        self.collect(|d| matches!(d, Destination::Channel(id) if id == channel_id))
    }

    /// Contents sent privately to one user.
    pub fn direct_messages(&self, user_id: &str) -> Vec<String> {
        self.collect(|d| matches!(d, Destination::User(id) if id == user_id))
    }

    fn collect(&self, pred: impl Fn(&Destination) -> bool) -> Vec<String> {
        self.state
            .read()
            .outbox
            .iter()
            .filter(|m| pred(&m.destination))
            .map(|m| m.content.clone())
            .collect()
    }

    fn push(&self, destination: Destination, content: &str) {
        trace!(?destination, "Captured outbound message");
        self.state.write().outbox.push(SentMessage {
            destination,
            content: content.to_string(),
        });
    }
}

#[async_trait]
impl ChatClient for LocalClient {
    fn bot_user(&self) -> User {
        self.bot.clone()
    }

    fn bot_owner_id(&self) -> String {
        self.owner_id.clone()
    }

    fn servers(&self) -> Vec<Server> {
        self.state.read().servers.clone()
    }

    async fn send_raw(&self, channel_id: &str, content: &str) -> TransportResult<()> {
        self.push(Destination::Channel(channel_id.to_string()), content);
        Ok(())
    }

    async fn send_direct_raw(&self, user_id: &str, content: &str) -> TransportResult<()> {
        self.push(Destination::User(user_id.to_string()), content);
        Ok(())
    }

    async fn create_text_channel(&self, server_id: &str, name: &str) -> TransportResult<Channel> {
        let mut state = self.state.write();
        let id = state.next_channel_id.to_string();
        let server = state
            .servers
            .iter_mut()
            .find(|s| s.id == server_id)
            .ok_or_else(|| TransportError::not_found("server", server_id))?;
        let channel = Channel::text(id, name, server_id);
        server.channels.push(channel.clone());
        state.next_channel_id += 1;
        Ok(channel)
    }

    async fn set_channel_visible(&self, channel_id: &str, visible: bool) -> TransportResult<()> {
        let mut state = self.state.write();
        let channel = state
            .servers
            .iter_mut()
            .flat_map(|s| s.channels.iter_mut())
            .find(|c| c.id == channel_id)
            .ok_or_else(|| TransportError::not_found("channel", channel_id))?;
        channel.visible = visible;
        Ok(())
    }
}
