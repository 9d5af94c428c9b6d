//! Configuration validation utilities.

use std::collections::HashSet;

use super::error::{ConfigError, ConfigResult};
use super::schema::{BotConfig, ConsoleConfig, LogOutput, LoggingConfig, MentionbotConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &MentionbotConfig) -> ConfigResult<()> {
    validate_bot_config(&config.bot)?;
    validate_logging_config(&config.logging)?;
    validate_console_config(&config.console)?;
    Ok(())
}

fn validate_bot_config(bot: &BotConfig) -> ConfigResult<()> {
    if bot.owner_id.trim().is_empty() {
        return Err(ConfigError::missing_field("bot.owner_id"));
    }
    if bot.user_id.trim().is_empty() {
        return Err(ConfigError::missing_field("bot.user_id"));
    }
    if bot.owner_id == bot.user_id {
        return Err(ConfigError::validation("The bot cannot be its own owner"));
    }

    if bot.default_prefix.is_empty() {
        return Err(ConfigError::missing_field("bot.default_prefix"));
    }
    if bot.default_prefix.chars().any(char::is_whitespace) {
        return Err(ConfigError::validation(
            "Command prefix cannot contain whitespace",
        ));
    }

    let mut seen = HashSet::new();
    for module in &bot.default_modules {
        if module.trim().is_empty() {
            return Err(ConfigError::validation("Default module names cannot be empty"));
        }
        if !seen.insert(module) {
            return Err(ConfigError::validation(format!(
                "Default module listed more than once: {module}"
            )));
        }
    }

    if bot.queue_capacity == 0 {
        return Err(ConfigError::validation("Queue capacity must be greater than 0"));
    }
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    for target in logging.filters.keys() {
        if target.is_empty() || target.contains(char::is_whitespace) {
            return Err(ConfigError::validation(format!(
                "Invalid log filter target: '{target}'"
            )));
        }
    }
    Ok(())
}

fn validate_console_config(console: &ConsoleConfig) -> ConfigResult<()> {
    if console.server_id.is_empty() {
        return Err(ConfigError::missing_field("console.server_id"));
    }
    if console.channel_id.is_empty() {
        return Err(ConfigError::missing_field("console.channel_id"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&MentionbotConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_empty_owner() {
        let mut config = MentionbotConfig::default();
        config.bot.owner_id = " ".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { field }) if field == "bot.owner_id"
        ));
    }

    #[test]
    fn test_validate_prefix() {
        let mut config = MentionbotConfig::default();
        config.bot.default_prefix = "! ".to_string();
        assert!(validate_config(&config).is_err());
        config.bot.default_prefix = "!".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_duplicate_default_module() {
        let mut config = MentionbotConfig::default();
        config.bot.default_modules = vec!["Random".into(), "Random".into()];
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_validate_file_output_needs_path() {
        let mut config = MentionbotConfig::default();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());
        config.logging.file_path = Some(PathBuf::from("logs/mentionbot.log"));
        assert!(validate_config(&config).is_ok());
    }
}
