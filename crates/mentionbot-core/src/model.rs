//! Snapshots of chat-platform entities and the inbound event stream.
//!
//! These are plain data: a [`ChatClient`](crate::ChatClient) produces them,
//! the framework reads them. None of them hold a connection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Users and roles ─────────────────────────────────────────────────────────

/// A platform account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub bot: bool,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            bot: false,
        }
    }

    /// The `<@id>` mention string.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

/// A named server role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
}

impl Role {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A user as seen inside one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user: User,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub nick: Option<String>,
}

impl Member {
    pub fn new(user: User) -> Self {
        Self {
            user,
            roles: Vec::new(),
            nick: None,
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles.extend(roles);
        self
    }

    pub fn id(&self) -> &str {
        &self.user.id
    }

    pub fn name(&self) -> &str {
        &self.user.name
    }

    /// Nickname if set, otherwise the account name.
    pub fn display_name(&self) -> &str {
        self.nick.as_deref().unwrap_or(&self.user.name)
    }

    pub fn mention(&self) -> String {
        self.user.mention()
    }
}

// ─── Channels and servers ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    #[default]
    Text,
    Voice,
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    /// `None` for private (direct message) channels.
    #[serde(default)]
    pub server_id: Option<String>,
    #[serde(default)]
    pub kind: ChannelKind,
    /// Whether regular members can currently see the channel.
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

impl Channel {
    /// A visible text channel inside `server_id`.
    pub fn text(
        id: impl Into<String>,
        name: impl Into<String>,
        server_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            server_id: Some(server_id.into()),
            kind: ChannelKind::Text,
            visible: true,
        }
    }

    /// A direct-message channel.
    pub fn private(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            server_id: None,
            kind: ChannelKind::Private,
            visible: true,
        }
    }

    pub fn is_private(&self) -> bool {
        self.kind == ChannelKind::Private || self.server_id.is_none()
    }

    /// The `<#id>` mention string.
    pub fn mention(&self) -> String {
        format!("<#{}>", self.id)
    }
}

/// Snapshot of one server (guild).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl Server {
    pub fn new(id: impl Into<String>, name: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            owner_id: owner_id.into(),
            members: Vec::new(),
            channels: Vec::new(),
            roles: Vec::new(),
        }
    }

    pub fn member(&self, user_id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.id() == user_id)
    }

    /// Exact match on account name or nickname.
    pub fn member_named(&self, name: &str) -> Option<&Member> {
        self.members
            .iter()
            .find(|m| m.name() == name || m.nick.as_deref() == Some(name))
    }

    pub fn channel(&self, channel_id: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == channel_id)
    }

    pub fn channel_named(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name == name)
    }

    pub fn role_named(&self, name: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.name == name)
    }
}

// ─── Messages and events ─────────────────────────────────────────────────────

/// An inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub author: Member,
    pub channel: Channel,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        author: Member,
        channel: Channel,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            author,
            channel,
            timestamp: Utc::now(),
        }
    }

    pub fn server_id(&self) -> Option<&str> {
        self.channel.server_id.as_deref()
    }

    pub fn is_private(&self) -> bool {
        self.channel.is_private()
    }
}

/// Membership changes inside one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MemberEvent {
    Joined { member: Member },
    Removed { member: Member },
    Banned { member: Member },
    Unbanned { user: User },
    Updated { before: Member, after: Member },
}

impl MemberEvent {
    /// The user the event is about.
    pub fn user(&self) -> &User {
        match self {
            Self::Joined { member } | Self::Removed { member } | Self::Banned { member } => {
                &member.user
            }
            Self::Unbanned { user } => user,
            Self::Updated { after, .. } => &after.user,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Joined { .. } => "joined",
            Self::Removed { .. } => "removed",
            Self::Banned { .. } => "banned",
            Self::Unbanned { .. } => "unbanned",
            Self::Updated { .. } => "updated",
        }
    }
}

/// Everything a transport can deliver to the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Message(Message),
    Member {
        server_id: String,
        event: MemberEvent,
    },
    ServerJoined(Server),
    ServerRemoved {
        server_id: String,
    },
}

impl InboundEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::Member { .. } => "member",
            Self::ServerJoined(_) => "server_joined",
            Self::ServerRemoved { .. } => "server_removed",
        }
    }
}
