//! # mentionbot runtime
//!
//! Everything around the command pipeline that a running bot process needs:
//!
//! - [`config`]: layered configuration through figment (defaults, files,
//!   `MENTIONBOT_*` environment variables, programmatic overrides)
//! - [`logging`]: the global `tracing` subscriber
//! - [`JsonFileStore`]: settings documents on disk
//! - [`BotRuntime`]: one worker task per server, fed from the client's
//!   event stream
//!
//! ```rust,ignore
//! use mentionbot_runtime::BotRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (client, events) = connect().await?;
//!     let runtime = BotRuntime::builder().build(client)?;
//!     runtime.run(events).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Feature Flags
//!
//! - `toml-config`: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod store;
mod worker;

pub use config::{
    BotConfig, ConfigError, ConfigLoader, ConfigResult, ConsoleConfig, LogLevel, LoggingConfig,
    MentionbotConfig, Profile,
};
pub use error::{RuntimeError, RuntimeResult};
pub use runtime::{BotRuntime, PRIVATE_MESSAGE_REPLY, RuntimeBuilder, shutdown_signal};
pub use store::JsonFileStore;

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
