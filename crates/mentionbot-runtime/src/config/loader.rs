//! Layered configuration through figment.
//!
//! Sources, later ones winning:
//!
//! 1. [`MentionbotConfig::default`]
//! 2. `mentionbot.{profile}.<ext>` next to the chosen config file
//! 3. `mentionbot.<ext>` or `config.<ext>`, from the working directory or
//!    `<config dir>/mentionbot`
//! 4. `MENTIONBOT_*` environment variables, `__` between sections
//!    (`MENTIONBOT_BOT__OWNER_ID=1234` sets `bot.owner_id`)
//! 5. [`ConfigLoader::set`] overrides
//!
//! Which extensions are read depends on the `toml-config` and `yaml-config`
//! features.

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "toml-config", feature = "yaml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::MentionbotConfig;
use super::validation::validate_config;

const ENV_PREFIX: &str = "MENTIONBOT_";
const PROFILE_VAR: &str = "MENTIONBOT_PROFILE";
const FILE_STEMS: &[&str] = &["mentionbot", "config"];

/// Selects the `mentionbot.{profile}.<ext>` overlay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// `MENTIONBOT_PROFILE`, or development when unset.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_VAR)
            .map(|name| Self::parse(&name))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A config file syntax this build can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Syntax {
    #[cfg(feature = "toml-config")]
    Toml,
    #[cfg(feature = "yaml-config")]
    Yaml,
}

impl Syntax {
    const ENABLED: &'static [(&'static str, Syntax)] = &[
        #[cfg(feature = "toml-config")]
        ("toml", Syntax::Toml),
        #[cfg(feature = "yaml-config")]
        ("yaml", Syntax::Yaml),
        #[cfg(feature = "yaml-config")]
        ("yml", Syntax::Yaml),
    ];

    fn of(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::ENABLED
            .iter()
            .find(|(known, _)| *known == ext)
            .map(|(_, syntax)| *syntax)
    }

    fn layer(self, figment: Figment, path: &Path) -> Figment {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => figment.merge(Toml::file(path)),
            #[cfg(feature = "yaml-config")]
            Self::Yaml => figment.merge(Yaml::file(path)),
        }
    }
}

/// Collects sources and produces a validated [`MentionbotConfig`].
pub struct ConfigLoader {
    profile: Profile,
    file: Option<PathBuf>,
    search_dirs: Vec<PathBuf>,
    read_env: bool,
    overrides: Figment,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            profile: Profile::from_env(),
            file: None,
            search_dirs: Vec::new(),
            read_env: true,
            overrides: Figment::new(),
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Reads exactly this file instead of searching. It must exist.
    pub fn file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Searches `dir` instead of the default locations. Repeatable.
    pub fn search_path(mut self, dir: impl AsRef<Path>) -> Self {
        self.search_dirs.push(dir.as_ref().to_path_buf());
        self
    }

    pub fn without_env(mut self) -> Self {
        self.read_env = false;
        self
    }

    /// Overrides one dotted key, e.g. `set("bot.default_prefix", "!")`.
    pub fn set<V: serde::Serialize>(mut self, key: &str, value: V) -> Self {
        self.overrides = self.overrides.merge(Serialized::default(key, value));
        self
    }

    pub fn load(self) -> ConfigResult<MentionbotConfig> {
        let profile = self.profile.clone();
        let config: MentionbotConfig = self
            .figment()?
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        validate_config(&config)?;

        debug!(
            %profile,
            level = %config.logging.level,
            data_dir = %config.bot.data_dir.display(),
            "Configuration loaded"
        );
        Ok(config)
    }

    fn figment(self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(MentionbotConfig::default()));

        let chosen = match &self.file {
            Some(path) => Some(self.explicit_file(path)?),
            None => self.discover(),
        };
        match chosen {
            Some((path, syntax)) => {
                if let Some(overlay) = self.profile_overlay(&path) {
                    debug!(path = %overlay.display(), "Loading profile overlay");
                    figment = syntax.layer(figment, &overlay);
                }
                info!(path = %path.display(), "Loading configuration file");
                figment = syntax.layer(figment, &path);
            }
            None => warn!("No configuration file found, using defaults"),
        }

        if self.read_env {
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }
        Ok(figment.merge(self.overrides))
    }

    fn explicit_file(&self, path: &Path) -> ConfigResult<(PathBuf, Syntax)> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        let syntax = Syntax::of(path).ok_or_else(|| {
            ConfigError::ParseError(format!(
                "{} is not in a format this build reads",
                path.display()
            ))
        })?;
        Ok((path.to_path_buf(), syntax))
    }

    /// First existing `<stem>.<ext>` across the search directories.
    fn discover(&self) -> Option<(PathBuf, Syntax)> {
        let searched = if self.search_dirs.is_empty() {
            default_search_dirs()
        } else {
            self.search_dirs.clone()
        };
        searched.iter().find_map(|dir| {
            FILE_STEMS.iter().find_map(|stem| {
                Syntax::ENABLED.iter().find_map(|(ext, syntax)| {
                    let path = dir.join(format!("{stem}.{ext}"));
                    path.exists().then_some((path, *syntax))
                })
            })
        })
    }

    /// `dir/<stem>.<profile>.<ext>` beside `base`, if present.
    fn profile_overlay(&self, base: &Path) -> Option<PathBuf> {
        let stem = base.file_stem()?.to_str()?;
        let ext = base.extension()?.to_str()?;
        let overlay = base.with_file_name(format!("{stem}.{}.{ext}", self.profile));
        overlay.exists().then_some(overlay)
    }
}

fn default_search_dirs() -> Vec<PathBuf> {
    let mut found = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        found.push(cwd);
    }
    if let Some(config_dir) = dirs::config_dir() {
        found.push(config_dir.join("mentionbot"));
    }
    found
}
