//! Layered configuration for the bot process.
//!
//! Sources are merged by [`ConfigLoader`] and checked by
//! [`validate_config`] before the runtime starts.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile};
pub use schema::{
    BotConfig, ConsoleConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, MentionbotConfig,
    SpanEventConfig,
};
pub use validation::validate_config;
