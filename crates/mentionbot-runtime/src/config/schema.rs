//! Configuration schema definitions.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MentionbotConfig {
    #[serde(default)]
    pub bot: BotConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Settings for the local console front end.
    #[serde(default)]
    pub console: ConsoleConfig,
}

/// Platform IDs may be written as numbers or strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(text) => text,
            RawId::Number(n) => n.to_string(),
        }
    }
}

fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    RawId::deserialize(deserializer).map(String::from)
}

fn optional_id_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(Option::<RawId>::deserialize(deserializer)?.map(String::from))
}

// =============================================================================
// Bot
// =============================================================================

/// Settings shared by every server instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    /// User ID of the bot owner.
    #[serde(default = "default_owner_id", deserialize_with = "id_string")]
    pub owner_id: String,

    /// User ID the bot is logged in as.
    #[serde(default = "default_user_id", deserialize_with = "id_string")]
    pub user_id: String,

    #[serde(default = "default_user_name")]
    pub user_name: String,

    /// Command prefix for servers without stored settings.
    #[serde(default = "default_prefix")]
    pub default_prefix: String,

    /// Modules installed into servers without stored settings.
    #[serde(default = "default_modules")]
    pub default_modules: Vec<String>,

    /// Root of the settings tree.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Capacity of each server worker's event queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            owner_id: default_owner_id(),
            user_id: default_user_id(),
            user_name: default_user_name(),
            default_prefix: default_prefix(),
            default_modules: default_modules(),
            data_dir: default_data_dir(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_owner_id() -> String {
    "2".to_string()
}

fn default_user_id() -> String {
    "1".to_string()
}

fn default_user_name() -> String {
    "mentionbot".to_string()
}

fn default_prefix() -> String {
    "/".to_string()
}

fn default_modules() -> Vec<String> {
    vec!["Random".to_string()]
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("cache")
}

fn default_queue_capacity() -> usize {
    256
}

// =============================================================================
// Console
// =============================================================================

/// The single server and user simulated by the console binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default = "default_server_id", deserialize_with = "id_string")]
    pub server_id: String,

    #[serde(default = "default_server_name")]
    pub server_name: String,

    #[serde(default = "default_channel_id", deserialize_with = "id_string")]
    pub channel_id: String,

    /// Who the console types as. Defaults to the bot owner.
    #[serde(default, deserialize_with = "optional_id_string")]
    pub user_id: Option<String>,

    #[serde(default = "default_console_user_name")]
    pub user_name: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            server_id: default_server_id(),
            server_name: default_server_name(),
            channel_id: default_channel_id(),
            user_id: None,
            user_name: default_console_user_name(),
        }
    }
}

fn default_server_id() -> String {
    "100".to_string()
}

fn default_server_name() -> String {
    "Console".to_string()
}

fn default_channel_id() -> String {
    "10".to_string()
}

fn default_console_user_name() -> String {
    "console".to_string()
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line format of the log output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature.
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include file names and line numbers.
    #[serde(default)]
    pub file_location: bool,

    /// Log file, used when `output` is `file`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Per-target levels, e.g. `mentionbot_framework = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            file_path: None,
            filters: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_document_fills_defaults() {
        let config: MentionbotConfig = serde_json::from_value(serde_json::json!({
            "bot": {"owner_id": 42, "user_id": "7"},
            "logging": {"level": "debug", "filters": {"mentionbot_framework": "trace"}}
        }))
        .unwrap();

        assert_eq!(config.bot.owner_id, "42");
        assert_eq!(config.bot.user_id, "7");
        assert_eq!(config.bot.default_prefix, "/");
        assert_eq!(config.bot.default_modules, ["Random"]);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.filters["mentionbot_framework"], LogLevel::Trace);
        assert_eq!(config.console, ConsoleConfig::default());
    }

    #[test]
    fn test_log_level_names() {
        assert_eq!(LogLevel::Warn.to_string(), "warn");
        assert_eq!(LogLevel::Trace.as_str(), "trace");
    }
}
