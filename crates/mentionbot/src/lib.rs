//! # mentionbot
//!
//! A chat bot whose behavior lives in per-server modules. Each server keeps
//! its own command prefix, installed module list and privilege table; the
//! bot owner and server admins manage them with core commands such as
//! `add`, `remove`, `prefix` and `setuserpriv`.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  InboundEvent  ┌───────────────┐     ┌───────────────────┐     ┌─────────────────────┐
//! │ ChatClient  │───────────────▶│  BotRuntime   │────▶│ ServerBotInstance │────▶│ ServerModuleWrapper │──▶ module
//! │ (transport) │◀───────────────│ (one worker   │────▶│  core commands    │────▶│  fault containment  │──▶ module
//! └─────────────┘     replies    │  per server)  │     └───────────────────┘     └─────────────────────┘
//!                                └───────────────┘
//! ```
//!
//! - [`core`]: model types, errors, the client and store boundaries
//! - [`framework`]: command tables, privileges, module lifecycle, the
//!   server instance
//! - [`modules`]: the bundled modules
//! - [`runtime`]: configuration, logging, on-disk settings and the event
//!   loop
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mentionbot::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (client, events) = connect().await?;
//!     let runtime = BotRuntime::builder()
//!         .build(client)?
//!         .with_factory(mentionbot::modules::factory()?);
//!     runtime.run(events).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` (default): TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use mentionbot_core as core;
pub use mentionbot_framework as framework;
pub use mentionbot_modules as modules;
pub use mentionbot_runtime as runtime;

/// Commonly used types for running a bot and writing modules.
pub mod prelude {
    // Runtime
    pub use mentionbot_runtime::{BotRuntime, ConfigLoader, MentionbotConfig, RuntimeError};

    // Module authoring
    pub use mentionbot_framework::prelude::*;

    // Collaborators
    pub use mentionbot_core::{InboundEvent, LocalClient, MemoryStore};
}
