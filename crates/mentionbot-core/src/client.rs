//! The outbound side of the chat platform.
//!
//! [`ChatClient`] is the narrow boundary between the command framework and
//! whatever transport actually talks to the platform. Implementors supply a
//! handful of raw operations; length enforcement and argument lookups are
//! provided on top of them so every transport behaves the same way.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::TransportResult;
use crate::model::{Channel, Member, Message, Server, User};
use crate::text::{self, MESSAGE_LIMIT};

/// How [`ChatClient::search_for_user`] and
/// [`ChatClient::search_for_channel`] interpret a query.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOptions<'a> {
    /// Also match exact names, not only IDs and mentions.
    pub name_search: bool,
    /// Only look inside this server.
    pub server: Option<&'a str>,
}

impl<'a> SearchOptions<'a> {
    /// ID and mention lookups only, across every server.
    pub fn by_id() -> Self {
        Self::default()
    }

    pub fn with_names(mut self) -> Self {
        self.name_search = true;
        self
    }

    pub fn in_server(mut self, server_id: &'a str) -> Self {
        self.server = Some(server_id);
        self
    }
}

#[async_trait]
pub trait ChatClient: Send + Sync + 'static {
    /// The account the bot is logged in as.
    fn bot_user(&self) -> User;

    /// ID of the bot owner, who always holds the highest privilege.
    fn bot_owner_id(&self) -> String;

    /// Snapshots of every server the bot is in.
    fn servers(&self) -> Vec<Server>;

    fn server(&self, server_id: &str) -> Option<Server> {
        self.servers().into_iter().find(|s| s.id == server_id)
    }

    /// Sends `content` to a channel as-is.
    ///
    /// Callers should go through [`send_message`](Self::send_message), which
    /// enforces the length ceiling.
    async fn send_raw(&self, channel_id: &str, content: &str) -> TransportResult<()>;

    /// Sends `content` to a user's private channel as-is.
    async fn send_direct_raw(&self, user_id: &str, content: &str) -> TransportResult<()>;

    async fn create_text_channel(&self, server_id: &str, name: &str) -> TransportResult<Channel>;

    /// Shows or hides a channel from regular members.
    async fn set_channel_visible(&self, channel_id: &str, visible: bool) -> TransportResult<()>;

    // ─── Provided ────────────────────────────────────────────────────────────

    /// Sends a message to a channel, truncating it to the platform limit.
    async fn send_message(&self, channel_id: &str, content: &str) -> TransportResult<()> {
        let body = text::truncate_message(content);
        if body.len() != content.len() {
            warn!(
                channel = %channel_id,
                original_len = content.chars().count(),
                limit = MESSAGE_LIMIT,
                "Outbound message truncated"
            );
        }
        debug!(channel = %channel_id, "Sending message");
        self.send_raw(channel_id, &body).await
    }

    /// Replies in the channel `msg` came from.
    async fn reply(&self, msg: &Message, content: &str) -> TransportResult<()> {
        self.send_message(&msg.channel.id, content).await
    }

    /// Sends a private message, truncating it to the platform limit.
    async fn send_direct(&self, user_id: &str, content: &str) -> TransportResult<()> {
        let body = text::truncate_message(content);
        self.send_direct_raw(user_id, &body).await
    }

    /// Sends a private message to the bot owner.
    async fn send_to_owner(&self, content: &str) -> TransportResult<()> {
        let owner = self.bot_owner_id();
        self.send_direct(&owner, content).await
    }

    /// Resolves a user from an ID, a `<@id>`/`<@!id>` mention or, when
    /// enabled, an exact name.
    fn search_for_user(&self, query: &str, options: SearchOptions<'_>) -> Option<Member> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }
        let by_id = text::parse_user_mention(query)
            .or_else(|| text::is_all_digits(query).then_some(query));

        self.servers()
            .into_iter()
            .filter(|s| options.server.is_none_or(|id| s.id == id))
            .find_map(|server| {
                let found = match by_id {
                    Some(id) => server.member(id),
                    None if options.name_search => server.member_named(query),
                    None => None,
                };
                found.cloned()
            })
    }

    /// Resolves a channel from an ID, a `<#id>` mention or, when enabled, an
    /// exact name (with or without a leading `#`).
    fn search_for_channel(&self, query: &str, options: SearchOptions<'_>) -> Option<Channel> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }
        let by_id = text::parse_channel_mention(query)
            .or_else(|| text::is_all_digits(query).then_some(query));
        let name = query.strip_prefix('#').unwrap_or(query);

        self.servers()
            .into_iter()
            .filter(|s| options.server.is_none_or(|id| s.id == id))
            .find_map(|server| {
                let found = match by_id {
                    Some(id) => server.channel(id),
                    None if options.name_search => server.channel_named(name),
                    None => None,
                };
                found.cloned()
            })
    }
}
