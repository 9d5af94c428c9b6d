//! Commands built into every server instance.

use std::collections::BTreeMap;

use chrono::Utc;
use futures::future::BoxFuture;
use tracing::{info, warn};

use mentionbot_core::text::{format_duration, split_right_word};
use mentionbot_core::{
    ChatClient, CommandError, CommandResult, CommandSignal, Member, Message, PrivilegeLevel,
    SearchOptions,
};

use super::ServerBotInstance;
use crate::command::{CommandContext, CommandMeta, CommandRegistry, StaticRegistry};
use crate::error::{GroupError, RegistryResult, WrapperError};

const MODULES: &str = "Module Info/Management";
const PRIVILEGES: &str = "Command Privilege Info/Management";
const ADMIN: &str = "Admin Commands";

const SOURCE_URL: &str = "https://github.com/simshadows/discord-mentionbot";

static CORE_COMMANDS: StaticRegistry<ServerBotInstance> = StaticRegistry::new(build);

/// The core command table.
pub fn core_commands() -> RegistryResult<&'static CommandRegistry<ServerBotInstance>> {
    CORE_COMMANDS.get()
}

fn build() -> RegistryResult<CommandRegistry<ServerBotInstance>> {
    use PrivilegeLevel::{Admin, BotOwner, Trusted};

    CommandRegistry::builder()
        // ===== General =====
        .add(
            CommandMeta::new(&["help"]).help(
                "`{cmd} [command name]` - More help.\n\n\
                 Without arguments, lists every command. Follow with a command \
                 or module alias for details, e.g. `{p}help mods`.",
            ),
            cmd_help,
        )
        .add(
            CommandMeta::new(&["source", "src"]).help("`{cmd}` - Where to get my source code."),
            cmd_source,
        )
        .add(
            CommandMeta::new(&["uptime"]).help("`{cmd}` - Get time since initialization."),
            cmd_uptime,
        )
        .add(
            CommandMeta::new(&["time", "gettime", "utc"])
                .help("`{cmd}` - Get bot's system time in UTC."),
            cmd_time,
        )
        // ===== Modules =====
        .add(
            CommandMeta::new(&["mods", "modules"])
                .category(MODULES)
                .help("`{cmd}` - View installed and available modules."),
            cmd_mods,
        )
        .add(
            CommandMeta::new(&["add", "install", "addmodule"])
                .category(MODULES)
                .min_privilege(Admin)
                .help("`{cmd} [module name]` - Add a module."),
            cmd_add,
        )
        .add(
            CommandMeta::new(&["remove", "uninstall", "removemodule"])
                .category(MODULES)
                .min_privilege(Admin)
                .help("`{cmd} [module name]` - Remove a module."),
            cmd_remove,
        )
        .add(
            CommandMeta::new(&["activate"])
                .category(MODULES)
                .min_privilege(Admin)
                .help(
                    "`{cmd} [module name]` - Reactivate a module.\n\n\
                     Modules are deactivated automatically when they fail.",
                ),
            cmd_activate,
        )
        .add(
            CommandMeta::new(&["deactivate"])
                .category(MODULES)
                .min_privilege(Admin)
                .help("`{cmd} [module name]` - Deactivate a module without removing it."),
            cmd_deactivate,
        )
        // ===== Privileges =====
        .add(
            CommandMeta::new(&["prefix"])
                .category(PRIVILEGES)
                .min_privilege(Admin)
                .help("`{cmd} [new prefix]` - Set new command prefix."),
            cmd_prefix,
        )
        .add(
            CommandMeta::new(&["privinfo", "allprivs", "privsinfo", "whatprivs"])
                .category(PRIVILEGES)
                .help("`{cmd}` - Get information on the bot's command privilege system."),
            cmd_privinfo,
        )
        .add(
            CommandMeta::new(&["priv", "privilege", "mypriv"])
                .category(PRIVILEGES)
                .help("`{cmd}` - Check your command privilege level."),
            cmd_priv,
        )
        .add(
            CommandMeta::new(&["privof", "privilegeof"])
                .category(PRIVILEGES)
                .min_privilege(Trusted)
                .help("`{cmd} [user]` - Check someone's command privilege level."),
            cmd_privof,
        )
        .add(
            CommandMeta::new(&["userprivsresolved", "userprivilegesresolved"])
                .category(PRIVILEGES)
                .min_privilege(Trusted)
                .help("`{cmd}` - Get list of everyone with command privilege levels resolved."),
            cmd_userprivsresolved,
        )
        .add(
            CommandMeta::new(&["userprivs", "userprivileges"])
                .category(PRIVILEGES)
                .min_privilege(Trusted)
                .help("`{cmd}` - View user-assigned command privileges."),
            cmd_userprivs,
        )
        .add(
            CommandMeta::new(&["roleprivs", "roleprivileges", "flairprivs", "tagprivs"])
                .category(PRIVILEGES)
                .min_privilege(Trusted)
                .help("`{cmd}` - View role-assigned command privileges."),
            cmd_roleprivs,
        )
        .add(
            CommandMeta::new(&["adduserpriv", "adduserprivilege"])
                .category(PRIVILEGES)
                .min_privilege(Admin)
                .help("`{cmd} [user] [privilege level]` - Add a user command privilege."),
            cmd_adduserpriv,
        )
        .add(
            CommandMeta::new(&["addrolepriv", "addroleprivilege"])
                .category(PRIVILEGES)
                .min_privilege(Admin)
                .help("`{cmd} [role name] [privilege level]` - Add a role command privilege."),
            cmd_addrolepriv,
        )
        .add(
            CommandMeta::new(&["removeuserpriv", "removeuserprivilege"])
                .category(PRIVILEGES)
                .min_privilege(Admin)
                .help("`{cmd} [user]` - Remove a user command privilege."),
            cmd_removeuserpriv,
        )
        .add(
            CommandMeta::new(&["removerolepriv", "removeroleprivilege", "removeflairpriv", "removetagpriv"])
                .category(PRIVILEGES)
                .min_privilege(Admin)
                .help("`{cmd} [role name]` - Remove a role command privilege."),
            cmd_removerolepriv,
        )
        // ===== Admin =====
        .add(
            CommandMeta::new(&["say"])
                .category(ADMIN)
                .min_privilege(Admin)
                .help("`{cmd} [text]` - Echoes the following text."),
            cmd_say,
        )
        .add(
            CommandMeta::new(&["throwexception", "exception"])
                .category(ADMIN)
                .min_privilege(BotOwner),
            cmd_throwexception,
        )
        .add(
            CommandMeta::new(&["closebot", "quit", "exit"])
                .category(ADMIN)
                .min_privilege(BotOwner),
            cmd_closebot,
        )
        .build()
}

type Handler<'a> = BoxFuture<'a, CommandResult>;

// ─── General ─────────────────────────────────────────────────────────────────

fn cmd_help<'a>(bot: &'a mut ServerBotInstance, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let text = bot.help_content(ctx.args, ctx.privilege).await?;
        bot.reply(ctx.msg, &text).await
    })
}

fn cmd_source<'a>(bot: &'a mut ServerBotInstance, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move { bot.reply(ctx.msg, SOURCE_URL).await })
}

fn cmd_uptime<'a>(bot: &'a mut ServerBotInstance, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let secs = (Utc::now() - bot.started_at).num_seconds().max(0) as u64;
        let text = format!("**Bot current uptime:** {}. ", format_duration(secs));
        bot.reply(ctx.msg, &text).await
    })
}

fn cmd_time<'a>(bot: &'a mut ServerBotInstance, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let text = Utc::now()
            .format("My current system time: %c UTC")
            .to_string();
        bot.reply(ctx.msg, &text).await
    })
}

// ─── Modules ─────────────────────────────────────────────────────────────────

fn cmd_mods<'a>(bot: &'a mut ServerBotInstance, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let installed = bot.modules.module_info();
        let mut text = if installed.is_empty() {
            "**No modules are installed.**".to_string()
        } else {
            let mut buf = "**The following modules are installed:**".to_string();
            for (name, desc) in &installed {
                buf.push_str(&format!("\n`{name}`: {desc}"));
            }
            buf
        };

        let available: String = bot
            .factory
            .available()
            .filter(|(name, _)| !installed.iter().any(|(n, _)| *n == *name))
            .map(|(name, desc)| format!("\n`{name}`: {desc}"))
            .collect();
        if available.is_empty() {
            text.push_str("\n\n**No modules are available for installation.**");
        } else {
            text.push_str("\n\n**The following modules are available for installation:**");
            text.push_str(&available);
        }
        bot.reply(ctx.msg, &text).await
    })
}

fn cmd_add<'a>(bot: &'a mut ServerBotInstance, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let name = ctx.args;
        let text = if !bot.factory.module_exists(name) {
            format!("`{name}` does not exist.")
        } else if bot.modules.module_is_installed(name) {
            format!("`{name}` is already installed.")
        } else {
            let wrapper = bot
                .factory
                .new_module_instance(name, bot.env.clone())
                .map_err(CommandError::fault)?;
            match bot.modules.install(wrapper).await {
                Ok(()) => {
                    bot.settings.add_module(name);
                    bot.settings.save().await?;
                    format!("`{name}` successfully installed.")
                }
                Err(err) => {
                    warn!(module = name, error = %err, "Module install rejected");
                    format!("Error: `{name}` could not be installed. ({err})")
                }
            }
        };
        bot.reply(ctx.msg, &text).await
    })
}

fn cmd_remove<'a>(bot: &'a mut ServerBotInstance, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let name = ctx.args;
        let text = match bot.modules.uninstall(name).await {
            Ok(()) => {
                bot.settings.remove_module(name);
                bot.settings.save().await?;
                format!("`{name}` successfully uninstalled.")
            }
            Err(_) => format!("`{name}` is not installed."),
        };
        bot.reply(ctx.msg, &text).await
    })
}

fn cmd_activate<'a>(bot: &'a mut ServerBotInstance, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let name = ctx.args;
        let text = match bot.modules.activate_module(name).await {
            Ok(()) => format!("`{name}` successfully activated."),
            Err(GroupError::NotInstalled(_)) => format!("`{name}` is not installed."),
            Err(GroupError::Wrapper(WrapperError::AlreadyActive(_))) => {
                format!("`{name}` is already active.")
            }
            Err(err) => format!("Error: `{name}` failed to activate. ({err})"),
        };
        bot.reply(ctx.msg, &text).await
    })
}

fn cmd_deactivate<'a>(bot: &'a mut ServerBotInstance, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let name = ctx.args;
        let text = match bot.modules.kill_module(name).await {
            Ok(()) => format!("`{name}` successfully deactivated."),
            Err(GroupError::NotInstalled(_)) => format!("`{name}` is not installed."),
            Err(_) => format!("`{name}` is already inactive."),
        };
        bot.reply(ctx.msg, &text).await
    })
}

// ─── Privileges ──────────────────────────────────────────────────────────────

fn cmd_prefix<'a>(bot: &'a mut ServerBotInstance, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let prefix = ctx.args;
        if prefix.is_empty() {
            return Err(CommandSignal::InvalidArguments(None).into());
        }
        *bot.cmd_prefix.write() = prefix.to_string();
        bot.settings.set_cmd_prefix(prefix);
        bot.settings.save().await?;
        info!(server = %bot.server_id, prefix, "Command prefix changed");

        let text = format!(
            "`{prefix}` set as command prefix.\nThe help message is now invoked using `{prefix}help`."
        );
        bot.reply(ctx.msg, &text).await
    })
}

fn cmd_privinfo<'a>(bot: &'a mut ServerBotInstance, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let mut text = String::from(
            "This bot has internal command privilege levels to determine what commands users \
             have access to. This is managed separately from discord's own privileges.\
             \n\nThe bot command privilege levels from highest to lowest are:",
        );
        for level in PrivilegeLevel::ALL.iter().rev() {
            text.push_str(&format!("\n`{level}`"));
        }
        bot.reply(ctx.msg, &text).await
    })
}

fn cmd_priv<'a>(bot: &'a mut ServerBotInstance, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let mut text = user_priv_text(bot, "", ctx.msg).await?;
        text.push_str(&format!(
            "\nFor info on privilege levels, use the command `{}privinfo`.",
            bot.cmd_prefix()
        ));
        bot.reply(ctx.msg, &text).await
    })
}

fn cmd_privof<'a>(bot: &'a mut ServerBotInstance, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let text = user_priv_text(bot, ctx.args, ctx.msg).await?;
        bot.reply(ctx.msg, &text).await
    })
}

fn cmd_userprivsresolved<'a>(bot: &'a mut ServerBotInstance, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let members = bot
            .client
            .server(&bot.server_id)
            .map(|s| s.members)
            .unwrap_or_default();

        let mut by_level: BTreeMap<PrivilegeLevel, Vec<&Member>> = BTreeMap::new();
        for member in &members {
            by_level
                .entry(bot.privileges.privilege_level(member))
                .or_default()
                .push(member);
        }

        let mut text = String::from("**Here are the resolved privilege levels for all users:**\n");
        for (level, mut group) in by_level.into_iter().rev() {
            group.sort_by_key(|m| m.name().to_lowercase());
            text.push_str(&format!("\nPrivilege level `{level}`:\n```"));
            for member in group {
                text.push_str(&format!("\n{} (ID: {})", member.name(), member.id()));
            }
            text.push_str("\n```");
        }
        bot.reply(ctx.msg, &text).await
    })
}

fn cmd_userprivs<'a>(bot: &'a mut ServerBotInstance, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let mut entries: Vec<(String, &str, PrivilegeLevel)> = bot
            .privileges
            .user_privileges()
            .into_iter()
            .map(|(id, level)| {
                let name = bot
                    .client
                    .search_for_user(id, SearchOptions::by_id().in_server(&bot.server_id))
                    .map(|m| m.user.name)
                    .unwrap_or_default();
                (name, id, level)
            })
            .collect();

        let text = if entries.is_empty() {
            "No users have been assigned bot command privilege levels.".to_string()
        } else {
            entries.sort_by_key(|(name, _, _)| name.to_lowercase());
            entries.sort_by(|a, b| b.2.cmp(&a.2));
            let mut buf =
                String::from("The following users have been assigned bot command privilege levels:\n```");
            for (name, id, level) in &entries {
                buf.push_str(&format!("\n{name} (ID: {id}): {level}"));
            }
            buf.push_str("\n```");
            buf
        };
        bot.reply(ctx.msg, &text).await
    })
}

fn cmd_roleprivs<'a>(bot: &'a mut ServerBotInstance, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let mut entries = bot.privileges.role_privileges();
        let text = if entries.is_empty() {
            "No roles have been assigned bot command privilege levels.".to_string()
        } else {
            entries.sort_by_key(|(name, _)| name.to_lowercase());
            entries.sort_by(|a, b| b.1.cmp(&a.1));
            let mut buf =
                String::from("The following roles have been assigned bot command privilege levels:\n```");
            for (name, level) in &entries {
                buf.push_str(&format!("\n{name}: {level}"));
            }
            buf.push_str("\n```");
            buf
        };
        bot.reply(ctx.msg, &text).await
    })
}

fn cmd_adduserpriv<'a>(bot: &'a mut ServerBotInstance, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let (left, right) = split_right_word(ctx.args);
        let Some(member) = bot.client.search_for_user(
            left,
            SearchOptions::by_id().with_names().in_server(&bot.server_id),
        ) else {
            return abort(bot, ctx.msg, "Error: User not found. Aborting.").await;
        };
        let level = match assignable_level(bot, right) {
            Ok(level) => level,
            Err(text) => return abort(bot, ctx.msg, &text).await,
        };

        bot.privileges
            .assign_user_privileges(member.id(), Some(level))
            .map_err(CommandError::fault)?;
        bot.persist_privileges().await?;
        info!(server = %bot.server_id, user = %member.id(), %level, "User privilege assigned");

        let text = format!("Successfully assigned level `{right}` to user {}.", member.name());
        bot.reply(ctx.msg, &text).await
    })
}

fn cmd_addrolepriv<'a>(bot: &'a mut ServerBotInstance, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let (left, right) = split_right_word(ctx.args);
        let role_exists = bot
            .client
            .server(&bot.server_id)
            .is_some_and(|s| s.role_named(left).is_some());
        if !role_exists {
            return abort(bot, ctx.msg, "Error: Role not found. Aborting.").await;
        }
        let level = match assignable_level(bot, right) {
            Ok(level) => level,
            Err(text) => return abort(bot, ctx.msg, &text).await,
        };

        bot.privileges
            .assign_role_privileges(left, Some(level))
            .map_err(CommandError::fault)?;
        bot.persist_privileges().await?;
        info!(server = %bot.server_id, role = left, %level, "Role privilege assigned");

        let text = format!("Successfully assigned level `{right}` to role {left}.");
        bot.reply(ctx.msg, &text).await
    })
}

fn cmd_removeuserpriv<'a>(bot: &'a mut ServerBotInstance, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let query = ctx.args;
        let text = if query.is_empty() {
            "Error: No arguments have been entered.".to_string()
        } else {
            match bot.client.search_for_user(
                query,
                SearchOptions::by_id().with_names().in_server(&bot.server_id),
            ) {
                None => format!("Error: User {query} not found."),
                Some(member) => match bot.privileges.assign_user_privileges(member.id(), None) {
                    Ok(()) => format!(
                        "Successfully unassigned personal command privilege level for {}.",
                        member.name()
                    ),
                    Err(_) => format!(
                        "Error: {} doesn't have a personally assigned command privilege level.",
                        member.name()
                    ),
                },
            }
        };
        bot.persist_privileges().await?;
        bot.reply(ctx.msg, &text).await
    })
}

fn cmd_removerolepriv<'a>(bot: &'a mut ServerBotInstance, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let role = ctx.args;
        let text = if role.is_empty() {
            "Error: No arguments have been entered.".to_string()
        } else {
            match bot.privileges.assign_role_privileges(role, None) {
                Ok(()) => format!("Successfully unassigned role command privilege level for {role}."),
                Err(_) => format!("Error: {role} doesn't have an assigned command privilege level."),
            }
        };
        bot.persist_privileges().await?;
        bot.reply(ctx.msg, &text).await
    })
}

/// "User X has a bot command privilege level of ..." for the caller or a
/// looked-up user.
async fn user_priv_text(bot: &ServerBotInstance, query: &str, msg: &Message) -> CommandResult<String> {
    let member = if query.is_empty() {
        msg.author.clone()
    } else {
        match bot.client.search_for_user(
            query,
            SearchOptions::by_id().with_names().in_server(&bot.server_id),
        ) {
            Some(member) => member,
            None => {
                bot.reply(msg, &format!("User {query} not found. Aborting."))
                    .await?;
                return Err(CommandSignal::OperationAborted.into());
            }
        }
    };
    let level = bot.privileges.privilege_level(&member);
    Ok(format!(
        "User {} has a bot command privilege level of `{}`.",
        member.name(),
        level
    ))
}

/// Parses a level name that an admin may hand out.
fn assignable_level(bot: &ServerBotInstance, name: &str) -> Result<PrivilegeLevel, String> {
    match PrivilegeLevel::from_common_name(name) {
        Ok(level) if level >= PrivilegeLevel::ServerOwner => {
            Err("Error: Not allowed to assign that level.".to_string())
        }
        Ok(level) => Ok(level),
        Err(_) => Err(format!(
            "Error: Level `{name}` is not recognized. Aborting.\n\
             (For info on privilege levels, use the command `{}privinfo`.)",
            bot.cmd_prefix()
        )),
    }
}

async fn abort(bot: &ServerBotInstance, msg: &Message, text: &str) -> CommandResult {
    bot.reply(msg, text).await?;
    Err(CommandSignal::OperationAborted.into())
}

// ─── Admin ───────────────────────────────────────────────────────────────────

fn cmd_say<'a>(bot: &'a mut ServerBotInstance, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        if ctx.args.is_empty() {
            return Err(CommandSignal::InvalidArguments(None).into());
        }
        bot.reply(ctx.msg, ctx.args).await
    })
}

fn cmd_throwexception<'a>(_bot: &'a mut ServerBotInstance, _ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        Err::<(), _>(CommandError::Fault(anyhow::anyhow!(
            "exception deliberately thrown by the bot owner"
        )))
    })
}

fn cmd_closebot<'a>(bot: &'a mut ServerBotInstance, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let sent = bot.reply(ctx.msg, "brb killing self").await;
        info!(server = %bot.server_id, "Shutdown requested by bot owner");
        bot.shutdown.cancel();
        sent
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use mentionbot_core::{
        Channel, LocalClient, MemoryStore, Role, Server, SettingsStore, StoreKey, User,
    };

    use crate::command::Shortcut;
    use crate::factory::ServerModuleFactory;
    use crate::instance::InstanceOptions;
    use crate::module::{ModuleDescriptor, ModuleResources, ServerModule};

    static ECHO_MESSAGES: AtomicUsize = AtomicUsize::new(0);

    struct Echo {
        res: ModuleResources,
    }

    #[async_trait]
    impl ServerModule for Echo {
        async fn help_summary(&self, _privilege: PrivilegeLevel) -> anyhow::Result<String> {
            Ok("`{p}{grp}[text]` - Echo text.\n`{p}shout [text]` - Echo loudly.".to_string())
        }

        async fn help_detail(&self, locator: &str, _privilege: PrivilegeLevel) -> CommandResult<String> {
            match locator {
                "" => Ok("The echo module. See `{modhelp} loud`.".to_string()),
                "loud" => Ok("`{p}shout [text]` - Echo loudly.".to_string()),
                _ => Err(CommandSignal::NoHelpContent.into()),
            }
        }

        async fn process_cmd(
            &mut self,
            substr: &str,
            msg: &Message,
            _privilege: PrivilegeLevel,
        ) -> CommandResult {
            if substr == "crash" {
                return Err(anyhow::anyhow!("echo crashed").into());
            }
            let text = match substr.strip_prefix("loud") {
                Some(rest) => rest.trim().to_uppercase(),
                None => substr.to_string(),
            };
            self.res.client().reply(msg, &format!("echo: {text}")).await?;
            Ok(())
        }

        async fn on_message(&mut self, _msg: &Message) -> anyhow::Result<()> {
            ECHO_MESSAGES.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn create_echo(res: ModuleResources) -> BoxFuture<'static, anyhow::Result<Box<dyn ServerModule>>> {
        Box::pin(async move { Ok(Box::new(Echo { res }) as Box<dyn ServerModule>) })
    }

    fn echo_shortcuts() -> RegistryResult<Vec<Shortcut>> {
        Ok(vec![Shortcut {
            top_level: "shout",
            local: "loud",
        }])
    }

    const ECHO: ModuleDescriptor = ModuleDescriptor {
        name: "Echo",
        short_description: "Repeats things.",
        recommended_aliases: &["echo"],
        preprocessor_triggers: &[],
        shortcuts: echo_shortcuts,
        create: create_echo,
    };

    const SPARE: ModuleDescriptor = ModuleDescriptor {
        name: "Spare",
        short_description: "Not installed by default.",
        recommended_aliases: &["spare"],
        preprocessor_triggers: &[],
        shortcuts: crate::module::no_shortcuts,
        create: create_echo,
    };

    const BOT_OWNER: &str = "2";
    const SERVER_OWNER: &str = "3";

    struct Fixture {
        client: Arc<LocalClient>,
        store: Arc<MemoryStore>,
        shutdown: CancellationToken,
        bot: ServerBotInstance,
    }

    impl Fixture {
        async fn new() -> Self {
            Self::with_store(MemoryStore::new()).await
        }

        async fn with_store(store: MemoryStore) -> Self {
            let client = Arc::new(LocalClient::new(User::new("1", "mentionbot"), BOT_OWNER));
            let mut server = Server::new("100", "Test Server", SERVER_OWNER);
            server.roles = vec![Role::new("r1", "Mods"), Role::new("r2", "Muted")];
            server.channels.push(Channel::text("10", "general", "100"));
            server.members = vec![
                Member::new(User::new(BOT_OWNER, "dev")),
                Member::new(User::new(SERVER_OWNER, "boss")),
                Member::new(User::new("4", "alice")).with_roles([Role::new("r1", "Mods")]),
                Member::new(User::new("5", "bob")),
                Member::new(User::new("6", "muted")).with_roles([Role::new("r2", "Muted")]),
            ];
            client.upsert_server(server.clone());

            let store = Arc::new(store);
            let factory = Arc::new(ServerModuleFactory::from_descriptors([ECHO, SPARE]).unwrap());
            let shutdown = CancellationToken::new();
            let options = InstanceOptions {
                default_prefix: "/".into(),
                default_modules: vec!["Echo".into()],
                shutdown: shutdown.clone(),
            };
            let bot = ServerBotInstance::new(&server, client.clone(), store.clone(), factory, &options)
                .await
                .unwrap();
            Self {
                client,
                store,
                shutdown,
                bot,
            }
        }

        fn member(&self, id: &str) -> Member {
            self.client.server("100").unwrap().member(id).cloned().unwrap()
        }

        async fn send(&mut self, from: &str, content: &str) -> CommandResult {
            let msg = Message::new("m", content, self.member(from), Channel::text("10", "general", "100"));
            self.bot.process_text(content, &msg).await
        }

        fn last_reply(&self) -> String {
            self.client.channel_messages("10").pop().unwrap_or_default()
        }

        fn stored(&self) -> serde_json::Value {
            self.store.snapshot(&StoreKey::server("100")).unwrap()
        }
    }

    fn signal(result: CommandResult) -> CommandSignal {
        result.unwrap_err().as_signal().cloned().unwrap()
    }

    #[test]
    fn test_core_registry_builds() {
        let registry = core_commands().unwrap();
        assert!(registry.get("privinfo").is_some());
        assert!(registry.get("quit").is_some());
        assert!(registry.default_entry().is_none());
    }

    #[tokio::test]
    async fn test_startup_installs_defaults_and_persists() {
        let fx = Fixture::new().await;
        assert!(fx.bot.modules().module("Echo").unwrap().is_active());
        let doc = fx.stored();
        assert_eq!(doc["Installed Modules"], json!(["Echo"]));
        assert_eq!(doc["cmd prefix"], "/");
        assert_eq!(doc["Server Name"], "Test Server");
    }

    #[tokio::test]
    async fn test_unknown_stored_module_is_skipped() {
        let store = MemoryStore::new().with_doc(
            StoreKey::server("100"),
            json!({"Installed Modules": ["Ghost", "Echo"], "cmd prefix": "!"}),
        );
        let fx = Fixture::with_store(store).await;
        assert_eq!(fx.bot.modules().module_info(), vec![("Echo", "Repeats things.")]);
        assert_eq!(fx.bot.cmd_prefix(), "!");
        assert_eq!(fx.stored()["Installed Modules"], json!(["Ghost", "Echo"]));
    }

    #[tokio::test]
    async fn test_invocation_forms() {
        let mut fx = Fixture::new().await;
        fx.send("5", "/source").await.unwrap();
        assert_eq!(fx.last_reply(), SOURCE_URL);

        fx.send("5", "<@1> echo hi").await.unwrap();
        assert_eq!(fx.last_reply(), "echo: hi");
        fx.send("5", "<@!1>   shout hey").await.unwrap();
        assert_eq!(fx.last_reply(), "echo: HEY");

        let before = fx.client.sent().len();
        fx.send("5", "just chatting").await.unwrap();
        assert_eq!(fx.client.sent().len(), before);
    }

    #[tokio::test]
    async fn test_no_privilege_is_silent_but_seen() {
        let mut fx = Fixture::new().await;
        fx.bot
            .privileges
            .assign_role_privileges("Muted", Some(PrivilegeLevel::NoPrivilege))
            .unwrap();
        let seen = ECHO_MESSAGES.load(Ordering::SeqCst);
        let before = fx.client.sent().len();

        fx.send("6", "/source").await.unwrap();
        assert_eq!(fx.client.sent().len(), before);
        assert!(ECHO_MESSAGES.load(Ordering::SeqCst) > seen);
    }

    #[tokio::test]
    async fn test_unknown_commands_are_silent() {
        let mut fx = Fixture::new().await;
        assert_eq!(signal(fx.send("5", "/nosuchthing").await), CommandSignal::SilentUnknownCommand);
    }

    #[tokio::test]
    async fn test_core_privilege_gate() {
        let mut fx = Fixture::new().await;
        assert_eq!(signal(fx.send("5", "/say hi").await), CommandSignal::PrivilegeError);
        fx.send("3", "/say hi").await.unwrap();
        assert_eq!(fx.last_reply(), "hi");
        assert_eq!(signal(fx.send("3", "/say").await), CommandSignal::InvalidArguments(None));
    }

    #[tokio::test]
    async fn test_help_summary_and_topics() {
        let mut fx = Fixture::new().await;
        fx.send("5", "/help").await.unwrap();
        let summary = fx.last_reply();
        assert!(summary.starts_with("`/help [command name]` - More help.\n`/source` -"));
        assert!(summary.contains("\n\n**Admin Commands**\n`/closebot`"));
        assert!(summary.contains("\n\n**Module Info/Management**\n`/activate [module name]`"));
        assert!(summary.ends_with("`/echo [text]` - Echo text.\n`/shout [text]` - Echo loudly."));

        fx.send("5", "/help mods").await.unwrap();
        assert_eq!(fx.last_reply(), "`/mods` - View installed and available modules.");

        fx.send("5", "/help say").await.unwrap();
        assert!(fx.last_reply().contains("**Required privilege level:** `Admin`"));

        fx.send("5", "/help echo").await.unwrap();
        assert_eq!(fx.last_reply(), "The echo module. See `/help echo loud`.");
        fx.send("5", "/help echo loud").await.unwrap();
        assert_eq!(fx.last_reply(), "`/shout [text]` - Echo loudly.");
        fx.send("5", "/help shout").await.unwrap();
        assert_eq!(fx.last_reply(), "`/shout [text]` - Echo loudly.");

        assert_eq!(signal(fx.send("5", "/help nothing").await), CommandSignal::NoHelpContent);
        assert_eq!(signal(fx.send("5", "/help echo nothing").await), CommandSignal::NoHelpContent);
    }

    #[tokio::test]
    async fn test_module_management() {
        let mut fx = Fixture::new().await;
        fx.send("5", "/mods").await.unwrap();
        assert_eq!(
            fx.last_reply(),
            "**The following modules are installed:**\n`Echo`: Repeats things.\
             \n\n**The following modules are available for installation:**\
             \n`Spare`: Not installed by default."
        );

        fx.send("3", "/add Nope").await.unwrap();
        assert_eq!(fx.last_reply(), "`Nope` does not exist.");
        fx.send("3", "/add Echo").await.unwrap();
        assert_eq!(fx.last_reply(), "`Echo` is already installed.");
        fx.send("3", "/add Spare").await.unwrap();
        assert_eq!(fx.last_reply(), "`Spare` successfully installed.");
        assert_eq!(fx.stored()["Installed Modules"], json!(["Echo", "Spare"]));

        fx.send("3", "/deactivate Spare").await.unwrap();
        assert_eq!(fx.last_reply(), "`Spare` successfully deactivated.");
        fx.send("3", "/deactivate Spare").await.unwrap();
        assert_eq!(fx.last_reply(), "`Spare` is already inactive.");
        fx.send("3", "/activate Spare").await.unwrap();
        assert_eq!(fx.last_reply(), "`Spare` successfully activated.");
        fx.send("3", "/activate Spare").await.unwrap();
        assert_eq!(fx.last_reply(), "`Spare` is already active.");

        fx.send("3", "/remove Spare").await.unwrap();
        assert_eq!(fx.last_reply(), "`Spare` successfully uninstalled.");
        fx.send("3", "/remove Spare").await.unwrap();
        assert_eq!(fx.last_reply(), "`Spare` is not installed.");
        assert_eq!(fx.stored()["Installed Modules"], json!(["Echo"]));
    }

    #[tokio::test]
    async fn test_module_fault_is_contained() {
        let mut fx = Fixture::new().await;
        fx.send("5", "/echo crash").await.unwrap();
        assert!(!fx.bot.modules().module("Echo").unwrap().is_active());
        assert!(fx.client.direct_messages(BOT_OWNER)[0].contains("echo crashed"));
        assert!(fx.last_reply().contains("`/activate Echo`"));

        fx.send("3", "/activate Echo").await.unwrap();
        fx.send("5", "/echo back").await.unwrap();
        assert_eq!(fx.last_reply(), "echo: back");
    }

    #[tokio::test]
    async fn test_prefix_change() {
        let mut fx = Fixture::new().await;
        assert_eq!(signal(fx.send("3", "/prefix").await), CommandSignal::InvalidArguments(None));
        fx.send("3", "/prefix !").await.unwrap();
        assert_eq!(
            fx.last_reply(),
            "`!` set as command prefix.\nThe help message is now invoked using `!help`."
        );
        assert_eq!(fx.stored()["cmd prefix"], "!");

        let before = fx.client.sent().len();
        fx.send("5", "/source").await.unwrap();
        assert_eq!(fx.client.sent().len(), before);
        fx.send("5", "!priv").await.unwrap();
        assert!(fx.last_reply().ends_with("use the command `!privinfo`."));
    }

    #[tokio::test]
    async fn test_priv_queries() {
        let mut fx = Fixture::new().await;
        fx.send("2", "/priv").await.unwrap();
        assert_eq!(
            fx.last_reply(),
            "User dev has a bot command privilege level of `Literally God`.\
             \nFor info on privilege levels, use the command `/privinfo`."
        );

        fx.send("3", "/privof alice").await.unwrap();
        assert_eq!(fx.last_reply(), "User alice has a bot command privilege level of `Normal`.");

        assert_eq!(signal(fx.send("3", "/privof ghost").await), CommandSignal::OperationAborted);
        assert_eq!(fx.last_reply(), "User ghost not found. Aborting.");

        fx.send("5", "/privinfo").await.unwrap();
        let info = fx.last_reply();
        assert!(info.contains("\n\nThe bot command privilege levels from highest to lowest are:\n`Literally God`\n`Server Owner`"));
        assert!(info.ends_with("`Restricted1`\n`No Privileges`"));
    }

    #[tokio::test]
    async fn test_assign_and_list_privileges() {
        let mut fx = Fixture::new().await;
        fx.send("3", "/addrolepriv Mods Moderator").await.unwrap();
        assert_eq!(fx.last_reply(), "Successfully assigned level `Moderator` to role Mods.");
        fx.send("3", "/adduserpriv bob trusted").await.unwrap();
        assert_eq!(fx.last_reply(), "Successfully assigned level `trusted` to user bob.");
        assert_eq!(
            fx.stored()["bot command privileges"],
            json!({"role privileges": {"Mods": 7000}, "user privileges": {"5": 6000}})
        );

        fx.send("4", "/roleprivs").await.unwrap();
        assert_eq!(
            fx.last_reply(),
            "The following roles have been assigned bot command privilege levels:\n```\nMods: Moderator\n```"
        );
        fx.send("4", "/userprivs").await.unwrap();
        assert_eq!(
            fx.last_reply(),
            "The following users have been assigned bot command privilege levels:\n```\nbob (ID: 5): Trusted\n```"
        );
        fx.send("4", "/userprivsresolved").await.unwrap();
        let resolved = fx.last_reply();
        assert!(resolved.starts_with(
            "**Here are the resolved privilege levels for all users:**\n\nPrivilege level `Literally God`:\n```\ndev (ID: 2)\n```"
        ));
        assert!(resolved.contains("Privilege level `Moderator`:\n```\nalice (ID: 4)\n```"));
        assert!(resolved.ends_with("Privilege level `Normal`:\n```\nmuted (ID: 6)\n```"));

        fx.send("3", "/removeuserpriv bob").await.unwrap();
        assert_eq!(
            fx.last_reply(),
            "Successfully unassigned personal command privilege level for bob."
        );
        fx.send("3", "/removeuserpriv bob").await.unwrap();
        assert_eq!(
            fx.last_reply(),
            "Error: bob doesn't have a personally assigned command privilege level."
        );
        fx.send("3", "/removerolepriv Mods").await.unwrap();
        fx.send("3", "/removerolepriv Mods").await.unwrap();
        assert_eq!(fx.last_reply(), "Error: Mods doesn't have an assigned command privilege level.");
        fx.send("3", "/removeuserpriv").await.unwrap();
        assert_eq!(fx.last_reply(), "Error: No arguments have been entered.");
        assert_eq!(
            fx.stored()["bot command privileges"],
            json!({"role privileges": {}, "user privileges": {}})
        );
    }

    #[tokio::test]
    async fn test_assign_rejections() {
        let mut fx = Fixture::new().await;
        assert_eq!(
            signal(fx.send("3", "/adduserpriv ghost Admin").await),
            CommandSignal::OperationAborted
        );
        assert_eq!(fx.last_reply(), "Error: User not found. Aborting.");

        assert_eq!(
            signal(fx.send("3", "/addrolepriv Nobody Admin").await),
            CommandSignal::OperationAborted
        );
        assert_eq!(fx.last_reply(), "Error: Role not found. Aborting.");

        assert_eq!(
            signal(fx.send("3", "/adduserpriv bob Emperor").await),
            CommandSignal::OperationAborted
        );
        assert_eq!(
            fx.last_reply(),
            "Error: Level `Emperor` is not recognized. Aborting.\n(For info on privilege levels, use the command `/privinfo`.)"
        );

        // The level is the last word, so multi-word names never parse.
        assert_eq!(
            signal(fx.send("2", "/adduserpriv bob Literally God").await),
            CommandSignal::OperationAborted
        );
        assert_eq!(fx.last_reply(), "Error: User not found. Aborting.");
        assert!(fx.bot.privileges().user_privileges().is_empty());
    }

    #[tokio::test]
    async fn test_remove_privilege_needs_admin() {
        let mut fx = Fixture::new().await;
        fx.send("3", "/adduserpriv alice Regular").await.unwrap();
        let before = fx.stored();

        assert_eq!(signal(fx.send("5", "/removeuserpriv alice").await), CommandSignal::PrivilegeError);
        assert_eq!(fx.stored(), before);
        assert_eq!(fx.bot.privileges().user_privileges().len(), 1);
    }

    #[tokio::test]
    async fn test_owner_commands() {
        let mut fx = Fixture::new().await;
        assert_eq!(signal(fx.send("3", "/closebot").await), CommandSignal::PrivilegeError);
        assert!(!fx.shutdown.is_cancelled());

        let fault = fx.send("2", "/throwexception").await.unwrap_err();
        assert!(fault.is_fault());

        fx.send("2", "/quit").await.unwrap();
        assert_eq!(fx.last_reply(), "brb killing self");
        assert!(fx.shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn test_uptime_and_time() {
        let mut fx = Fixture::new().await;
        fx.send("5", "/uptime").await.unwrap();
        assert!(fx.last_reply().starts_with("**Bot current uptime:** "));
        fx.send("5", "/utc").await.unwrap();
        let reply = fx.last_reply();
        assert!(reply.starts_with("My current system time: ") && reply.ends_with(" UTC"));
    }

    #[tokio::test]
    async fn test_settings_survive_restart() {
        let fx = Fixture::new().await;
        let doc = fx.stored();
        let mut restarted = Fixture::with_store(MemoryStore::new().with_doc(StoreKey::server("100"), doc)).await;
        restarted.send("5", "/echo again").await.unwrap();
        assert_eq!(restarted.last_reply(), "echo: again");
        let store: &dyn SettingsStore = restarted.store.as_ref();
        assert!(store.load(&StoreKey::server("100")).await.unwrap().is_some());
    }
}
