//! # mentionbot core
//!
//! Leaf types shared by every layer of the bot:
//!
//! - **Privileges**: the ordered [`PrivilegeLevel`] tiers used to gate commands.
//! - **Errors**: the two command-path families ([`CommandSignal`] for
//!   expected control flow, [`anyhow::Error`] for faults) joined by
//!   [`CommandError`], plus per-collaborator error enums.
//! - **Model**: snapshots of users, members, channels, servers and messages,
//!   and the [`InboundEvent`] stream a transport delivers.
//! - **Collaborators**: the [`ChatClient`] and [`SettingsStore`] boundaries,
//!   with in-memory implementations ([`LocalClient`], [`MemoryStore`]).
//!
//! ```text
//! ┌─────────────┐  InboundEvent   ┌──────────────────┐  send / search  ┌────────────┐
//! │  Transport  │────────────────▶│  Server instance │────────────────▶│ ChatClient │
//! └─────────────┘                 └──────────────────┘                 └────────────┘
//!                                          │ load / save
//!                                          ▼
//!                                  ┌───────────────┐
//!                                  │ SettingsStore │
//!                                  └───────────────┘
//! ```

pub mod client;
pub mod error;
pub mod local;
pub mod model;
pub mod privilege;
pub mod storage;
pub mod text;

pub use client::{ChatClient, SearchOptions};
pub use error::{
    CommandError, CommandResult, CommandSignal, RecordError, RecordResult, StorageError,
    StorageResult, TransportError, TransportResult,
};
pub use local::{Destination, LocalClient, SentMessage};
pub use model::{
    Channel, ChannelKind, InboundEvent, Member, MemberEvent, Message, Role, Server, User,
};
pub use privilege::PrivilegeLevel;
pub use storage::{MemoryStore, SettingsStore, StoreKey};

/// Prelude for common imports.
pub mod prelude {
    pub use super::client::{ChatClient, SearchOptions};
    pub use super::error::{CommandError, CommandResult, CommandSignal};
    pub use super::model::{Channel, Member, MemberEvent, Message, Server, User};
    pub use super::privilege::PrivilegeLevel;
    pub use super::storage::{SettingsStore, StoreKey};
}
