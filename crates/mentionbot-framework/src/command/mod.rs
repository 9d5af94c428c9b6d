//! Declarative command registries.
//!
//! A [`CommandRegistry`] maps aliases to handler functions together with the
//! static metadata ([`CommandMeta`]) that drives help output, privilege gating
//! and top-level shortcuts. Registries are built once and validated at build
//! time: duplicate aliases and multiple defaults are rejected before anything
//! is dispatched.
//!
//! # Example
//!
//! ```rust,ignore
//! static COMMANDS: StaticRegistry<MyModule> = StaticRegistry::new(|| {
//!     CommandRegistry::builder()
//!         .add(
//!             CommandMeta::new(&["number", "num", "n"])
//!                 .default_command()
//!                 .top_level(&["rnd"])
//!                 .help("`{cmd} [int]` - Get random integer."),
//!             cmd_number,
//!         )
//!         .build()
//! });
//!
//! fn cmd_number<'a>(m: &'a mut MyModule, ctx: CommandContext<'a>) -> BoxFuture<'a, CommandResult> {
//!     Box::pin(async move { /* ... */ Ok(()) })
//! }
//! ```

pub mod help;

use std::collections::HashMap;
use std::sync::OnceLock;

use futures::future::BoxFuture;
use tracing::trace;

use mentionbot_core::text::split_left_word;
use mentionbot_core::{CommandResult, CommandSignal, Message, PrivilegeLevel};

use crate::error::{RegistryError, RegistryResult};

pub use help::{HelpEntry, HelpNode, compose_help_summary, summarize_nodes};

// ─── Metadata ────────────────────────────────────────────────────────────────

/// Which of a command's aliases are also reachable without the module alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopLevel {
    None,
    Some(&'static [&'static str]),
    /// Every alias of the command.
    All,
}

/// Static description of one command.
///
/// Help text uses placeholders that are filled in at render time:
/// `{cmd}` is the full invocation, `{p}` the command prefix and `{grp}` the
/// alias path leading to this registry.
#[derive(Debug, Clone, Copy)]
pub struct CommandMeta {
    aliases: &'static [&'static str],
    top_level: TopLevel,
    default: bool,
    category: &'static str,
    min_privilege: PrivilegeLevel,
    help: &'static str,
}

impl CommandMeta {
    pub const fn new(aliases: &'static [&'static str]) -> Self {
        Self {
            aliases,
            top_level: TopLevel::None,
            default: false,
            category: "",
            min_privilege: PrivilegeLevel::lowest(),
            help: "`{cmd}`",
        }
    }

    /// Runs this command when the input names no subcommand.
    pub const fn default_command(mut self) -> Self {
        self.default = true;
        self
    }

    pub const fn top_level(mut self, aliases: &'static [&'static str]) -> Self {
        self.top_level = TopLevel::Some(aliases);
        self
    }

    pub const fn top_level_all(mut self) -> Self {
        self.top_level = TopLevel::All;
        self
    }

    pub const fn category(mut self, category: &'static str) -> Self {
        self.category = category;
        self
    }

    pub const fn min_privilege(mut self, level: PrivilegeLevel) -> Self {
        self.min_privilege = level;
        self
    }

    /// Help text. The first paragraph is the summary line.
    pub const fn help(mut self, help: &'static str) -> Self {
        self.help = help;
        self
    }

    pub fn aliases(&self) -> &'static [&'static str] {
        self.aliases
    }

    pub fn primary_alias(&self) -> &'static str {
        self.aliases.first().copied().unwrap_or_default()
    }

    pub fn top_level_aliases(&self) -> &'static [&'static str] {
        match self.top_level {
            TopLevel::None => &[],
            TopLevel::Some(aliases) => aliases,
            TopLevel::All => self.aliases,
        }
    }

    pub fn is_default(&self) -> bool {
        self.default
    }

    pub fn category_name(&self) -> &'static str {
        self.category
    }

    pub fn required_privilege(&self) -> PrivilegeLevel {
        self.min_privilege
    }

    /// The `{cmd}` expansion: a top-level shortcut if one exists, else the
    /// aliased path.
    fn cmd_placeholder(&self) -> String {
        match self.top_level_aliases().first() {
            Some(top) => format!("{{p}}{top}"),
            None => format!("{{p}}{{grp}}{}", self.primary_alias()),
        }
    }

    /// First paragraph of the help text.
    pub fn summary_text(&self) -> String {
        let first = self.help.trim().split("\n\n").next().unwrap_or_default();
        first.replace("{cmd}", &self.cmd_placeholder())
    }

    /// Full help text, with a note when `privilege` is too low to use it.
    pub fn detail_text(&self, privilege: PrivilegeLevel) -> String {
        let mut text = self.help.trim().replace("{cmd}", &self.cmd_placeholder());
        if privilege < self.min_privilege {
            text.push_str(&format!(
                "\n\n**Required privilege level:** `{}`\n**Your privilege level:** `{}`",
                self.min_privilege, privilege
            ));
        }
        text
    }
}

// ─── Handlers ────────────────────────────────────────────────────────────────

/// What a handler gets besides its owner.
#[derive(Debug, Clone, Copy)]
pub struct CommandContext<'a> {
    /// Everything after the matched alias, left-trimmed.
    pub args: &'a str,
    pub msg: &'a Message,
    pub privilege: PrivilegeLevel,
    /// The alias that matched; empty when the default command ran.
    pub alias: &'a str,
}

/// A command handler bound to its owner type `T`.
pub type CommandFn<T> =
    for<'a> fn(&'a mut T, CommandContext<'a>) -> BoxFuture<'a, CommandResult>;

pub struct CommandEntry<T: 'static> {
    meta: CommandMeta,
    handler: CommandFn<T>,
}

impl<T: 'static> CommandEntry<T> {
    pub fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    pub fn handler(&self) -> CommandFn<T> {
        self.handler
    }
}

/// A top-level alias exposed by a registry, and the local alias it maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortcut {
    pub top_level: &'static str,
    pub local: &'static str,
}

// ─── Registry ────────────────────────────────────────────────────────────────

pub struct CommandRegistryBuilder<T: 'static> {
    entries: Vec<CommandEntry<T>>,
}

impl<T: 'static> CommandRegistryBuilder<T> {
    pub fn add(mut self, meta: CommandMeta, handler: CommandFn<T>) -> Self {
        self.entries.push(CommandEntry { meta, handler });
        self
    }

    pub fn build(self) -> RegistryResult<CommandRegistry<T>> {
        let mut by_alias = HashMap::new();
        let mut top_level = HashMap::new();
        let mut default: Option<usize> = None;

        for (index, entry) in self.entries.iter().enumerate() {
            let meta = &entry.meta;
            if meta.aliases.is_empty() {
                return Err(RegistryError::NoAliases);
            }
            for &alias in meta.aliases {
                if by_alias.insert(alias, index).is_some() {
                    return Err(RegistryError::DuplicateAlias(alias));
                }
            }
            for &alias in meta.top_level_aliases() {
                if top_level.insert(alias, index).is_some() {
                    return Err(RegistryError::DuplicateTopLevel(alias));
                }
            }
            if meta.default {
                if let Some(first) = default {
                    return Err(RegistryError::MultipleDefaults {
                        first: self.entries[first].meta.primary_alias(),
                        second: meta.primary_alias(),
                    });
                }
                default = Some(index);
            }
        }

        Ok(CommandRegistry {
            entries: self.entries,
            by_alias,
            default,
        })
    }
}

/// Validated alias table for one owner type.
pub struct CommandRegistry<T: 'static> {
    entries: Vec<CommandEntry<T>>,
    by_alias: HashMap<&'static str, usize>,
    default: Option<usize>,
}

impl<T: 'static> CommandRegistry<T> {
    pub fn builder() -> CommandRegistryBuilder<T> {
        CommandRegistryBuilder {
            entries: Vec::new(),
        }
    }

    pub fn get(&self, alias: &str) -> Option<&CommandEntry<T>> {
        self.by_alias.get(alias).map(|&i| &self.entries[i])
    }

    pub fn default_entry(&self) -> Option<&CommandEntry<T>> {
        self.default.map(|i| &self.entries[i])
    }

    /// Registered commands in declaration order.
    pub fn commands(&self) -> impl Iterator<Item = &CommandMeta> {
        self.entries.iter().map(|e| &e.meta)
    }

    pub fn shortcuts(&self) -> Vec<Shortcut> {
        self.commands()
            .flat_map(|meta| {
                meta.top_level_aliases().iter().map(|&top_level| Shortcut {
                    top_level,
                    local: meta.primary_alias(),
                })
            })
            .collect()
    }

    /// Routes `substr` to a handler.
    ///
    /// An empty `substr` runs the default command. Unknown aliases raise
    /// [`CommandSignal::UnknownCommand`] and under-privileged callers
    /// [`CommandSignal::PrivilegeError`], in both cases before any handler
    /// runs.
    pub async fn dispatch(
        &self,
        target: &mut T,
        substr: &str,
        msg: &Message,
        privilege: PrivilegeLevel,
    ) -> CommandResult {
        let (left, right) = split_left_word(substr);
        let (entry, args) = if left.is_empty() {
            (self.default_entry().ok_or(CommandSignal::UnknownCommand)?, "")
        } else {
            (self.get(left).ok_or(CommandSignal::UnknownCommand)?, right)
        };

        if privilege < entry.meta.min_privilege {
            return Err(CommandSignal::PrivilegeError.into());
        }

        trace!(command = entry.meta.primary_alias(), "Dispatching command");
        (entry.handler)(
            target,
            CommandContext {
                args,
                msg,
                privilege,
                alias: left,
            },
        )
        .await
    }

    /// Summary lines of every command, grouped by category.
    ///
    /// Locked commands are listed too; gating happens on use.
    pub fn help_summary(&self) -> String {
        compose_help_summary(self.commands().map(|meta| HelpEntry {
            category: meta.category.to_string(),
            summary: meta.summary_text(),
        }))
    }

    /// Full help for the command named by the first word of `locator`.
    pub fn help_detail(
        &self,
        locator: &str,
        privilege: PrivilegeLevel,
    ) -> Result<String, CommandSignal> {
        let (left, _) = split_left_word(locator);
        self.get(left)
            .map(|entry| entry.meta.detail_text(privilege))
            .ok_or(CommandSignal::NoHelpContent)
    }
}

/// A registry built lazily on first use, for `static` items.
pub struct StaticRegistry<T: 'static> {
    build: fn() -> RegistryResult<CommandRegistry<T>>,
    cell: OnceLock<RegistryResult<CommandRegistry<T>>>,
}

impl<T: 'static> StaticRegistry<T> {
    pub const fn new(build: fn() -> RegistryResult<CommandRegistry<T>>) -> Self {
        Self {
            build,
            cell: OnceLock::new(),
        }
    }

    pub fn get(&'static self) -> RegistryResult<&'static CommandRegistry<T>> {
        self.cell
            .get_or_init(|| (self.build)())
            .as_ref()
            .map_err(Clone::clone)
    }
}
