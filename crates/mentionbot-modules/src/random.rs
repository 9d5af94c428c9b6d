//! Random value generation.
//!
//! Bare arguments are routed to the right sub-command before dispatch:
//!
//! ```text
//! /random 5 to 10      -> number 5 to 10
//! /random red; blue    -> choose red; blue
//! /choose red; blue    -> choose red; blue     (top-level shortcut)
//! ```

use futures::future::BoxFuture;
use mentionbot_framework::linkme::distributed_slice;
use rand::Rng;
use rand::seq::SliceRandom;
use regex::Regex;

use mentionbot_core::text::remove_whitespace;
use mentionbot_core::{CommandError, CommandResult, CommandSignal, Message, PrivilegeLevel};
use mentionbot_framework::{
    CommandContext, CommandMeta, CommandRegistry, MODULE_REGISTRY, ModuleDescriptor,
    ModuleResources, RegistryResult, ServerModule, Shortcut, StaticRegistry,
};

use async_trait::async_trait;

#[distributed_slice(MODULE_REGISTRY)]
#[linkme(crate = mentionbot_framework::linkme)]
pub static RANDOM: ModuleDescriptor = ModuleDescriptor {
    name: "Random",
    short_description: "Random value generation tools.",
    recommended_aliases: &["random", "rng", "rnd", "rand"],
    preprocessor_triggers: &[],
    shortcuts,
    create: Random::create,
};

static COMMANDS: StaticRegistry<Random> = StaticRegistry::new(build);

/// Upper bound on dice thrown by one roll.
const MAX_THROWS: u64 = 1000;

/// Room left in one message for the list of individual rolls.
const ROLL_LIST_BUDGET: usize = 1998;

fn shortcuts() -> RegistryResult<Vec<Shortcut>> {
    Ok(COMMANDS.get()?.shortcuts())
}

fn build() -> RegistryResult<CommandRegistry<Random>> {
    CommandRegistry::builder()
        .add(
            CommandMeta::new(&["number", "num", "int", "integer"])
                .default_command()
                .help(
                    "`{cmd} [args]` - Generates a random integer.\n\n\
                     **Examples of usage:**\n\n\
                     *Note: All ranges listed here are inclusive.*\n\n\
                     `{cmd}`\nRandom number from 1 to 10.\n\n\
                     `{cmd} 2000`\nRandom number from 1 to 2000.\n\n\
                     `{cmd} -50 to 100`\nRandom number from -50 to 100.\n\n\
                     `{cmd} 1 to 5 to 10 to 15`\n\
                     Generates three random numbers of the ranges 1-5, 5-10, and 10-15.",
                ),
            cmd_number,
        )
        .add(
            CommandMeta::new(&["choose", "choice", "choices"])
                .top_level_all()
                .help(
                    "`{cmd} [option1]; [option2]; [...]` - Randomly choose from multiple options.\n\n\
                     **EXAMPLE:**\n\n\
                     `{cmd} Red; Green; Blue`\n\
                     Randomly choose between those three colours.",
                ),
            cmd_choose,
        )
        .add(
            CommandMeta::new(&["coin", "flip"]).top_level_all().help(
                "`{cmd}` - 50/50 Heads or tails.\n\n\
                 Or... at least in theory. Some say there's a 1/6000 possibility of seeing \
                 the coin land on its side.",
            ),
            cmd_coin,
        )
        .add(
            CommandMeta::new(&["colour", "color", "rgb"])
                .help("`{cmd}` - Generates a random RGB colour code."),
            cmd_colour,
        )
        .add(
            CommandMeta::new(&["dice", "roll"]).top_level_all().help(
                "`{cmd} [args]` - Roll some dice.\n\n\
                 **Dice notation:**\n\n\
                 Dice rolls are represented with a code of the form \"3d6\": roll a \
                 6-sided die three times and sum up the result.\n\n\
                 `{cmd}`\nRolls a 1d6 (a single 6-sided die).\n\n\
                 `{cmd} 12`\nRolls a 1d12.\n\n\
                 `{cmd} d4`\nRolls a 1d4.\n\n\
                 `{cmd} 2d8`\nRolls a 2d8 (two 8-sided dice).",
            ),
            cmd_dice,
        )
        .add(
            CommandMeta::new(&["user", "member", "u", "mem"]).help(
                "`{cmd}` - Chooses a random member from this server.\n\n\
                 This command does not mention users.",
            ),
            cmd_user,
        )
        .build()
}

pub struct Random {
    res: ModuleResources,
    int_prefix: Regex,
    choose_keyword: Regex,
    dice_notation: Regex,
}

impl Random {
    fn create(res: ModuleResources) -> BoxFuture<'static, anyhow::Result<Box<dyn ServerModule>>> {
        Box::pin(async move {
            COMMANDS.get()?;
            res.suppress_autokill(true);
            let module = Random {
                int_prefix: Regex::new(r"^[-+]?\d")?,
                choose_keyword: Regex::new(r"^(choose|ch|choice|choices)")?,
                dice_notation: Regex::new(r"^(\d*d)?\d+$")?,
                res,
            };
            Ok(Box::new(module) as Box<dyn ServerModule>)
        })
    }

    /// Sends bare numbers to `number` and `;`-lists to `choose`.
    fn route(&self, substr: &str) -> String {
        if self.int_prefix.is_match(substr) {
            format!("number {substr}")
        } else if !self.choose_keyword.is_match(substr) && substr.contains(';') {
            format!("choose {substr}")
        } else {
            substr.to_string()
        }
    }

    async fn reply(&self, msg: &Message, text: &str) -> CommandResult {
        self.res.client().reply(msg, text).await?;
        Ok(())
    }
}

#[async_trait]
impl ServerModule for Random {
    async fn help_summary(&self, _privilege: PrivilegeLevel) -> anyhow::Result<String> {
        Ok("`{modhelp}` - Generate pseudo-random values.".to_string())
    }

    async fn help_detail(&self, locator: &str, privilege: PrivilegeLevel) -> CommandResult<String> {
        let registry = COMMANDS.get()?;
        if locator.is_empty() {
            return Ok(registry.help_summary());
        }
        Ok(registry.help_detail(locator, privilege)?)
    }

    async fn process_cmd(
        &mut self,
        substr: &str,
        msg: &Message,
        privilege: PrivilegeLevel,
    ) -> CommandResult {
        let substr = self.route(substr);
        COMMANDS.get()?.dispatch(self, &substr, msg, privilege).await
    }
}

type Handler<'a> = BoxFuture<'a, CommandResult>;

// ─── Commands ────────────────────────────────────────────────────────────────

fn cmd_number<'a>(module: &'a mut Random, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let ranges = parse_ranges(ctx.args).ok_or(CommandSignal::InvalidArguments(None))?;
        let text = {
            let mut rng = rand::thread_rng();
            ranges
                .iter()
                .map(|&(low, high)| {
                    let value = rng.gen_range(low..=high);
                    format!("{value} (Range: {low} to {high}, inclusive)")
                })
                .collect::<Vec<_>>()
                .join("\n")
        };
        module.reply(ctx.msg, &text).await
    })
}

fn cmd_choose<'a>(module: &'a mut Random, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let choices: Vec<&str> = ctx
            .args
            .split(';')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();
        let picked = choices
            .choose(&mut rand::thread_rng())
            .copied()
            .ok_or(CommandSignal::InvalidArguments(None))?;
        let text = format!("{picked}\n**My choices were**: {}", choices.join("; "));
        module.reply(ctx.msg, &text).await
    })
}

fn cmd_coin<'a>(module: &'a mut Random, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let text = flip_coin(&mut rand::thread_rng());
        module.reply(ctx.msg, text).await
    })
}

fn cmd_colour<'a>(module: &'a mut Random, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let value: u32 = rand::thread_rng().gen_range(0..0x100_0000);
        let text = format!(
            "{}, your random colour is {value:06x} (decimal: {value})\nhttp://www.colorhexa.com/{value:06x}.png",
            ctx.msg.author.name()
        );
        module.reply(ctx.msg, &text).await
    })
}

fn cmd_dice<'a>(module: &'a mut Random, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let (throws, sides) = parse_dice(&module.dice_notation, ctx.args)
            .ok_or(CommandSignal::InvalidArguments(None))?;
        let rolls: Vec<u64> = {
            let mut rng = rand::thread_rng();
            (0..throws).map(|_| rng.gen_range(1..=sides)).collect()
        };
        let text = render_rolls(throws, sides, &rolls);
        module.reply(ctx.msg, &text).await
    })
}

fn cmd_user<'a>(module: &'a mut Random, ctx: CommandContext<'a>) -> Handler<'a> {
    Box::pin(async move {
        let members = module
            .res
            .server()
            .map(|s| s.members)
            .unwrap_or_default();
        let Some(member) = members.choose(&mut rand::thread_rng()).cloned() else {
            return Err(CommandError::Fault(anyhow::anyhow!(
                "no members visible in server {}",
                module.res.server_id()
            )));
        };
        let text = format!(
            "**Your random user is:** {} (UID: {})\n(Chosen out of {} users.)",
            member.name(),
            member.id(),
            members.len()
        );
        module.reply(ctx.msg, &text).await
    })
}

// ─── Parsing ─────────────────────────────────────────────────────────────────

/// Inclusive `(low, high)` ranges for `number`.
///
/// A single value `n` means 1..n (or the nearest sensible range for small
/// and negative values). Otherwise every comma-separated set is a chain of
/// `to`-separated values, each consecutive pair giving one range.
fn parse_ranges(args: &str) -> Option<Vec<(i64, i64)>> {
    let args = remove_whitespace(args);
    let sets: Vec<&str> = args.split(',').collect();

    if let [single] = sets.as_slice() {
        if single.is_empty() {
            return Some(vec![(1, 10)]);
        }
        if let Ok(value) = single.parse::<i64>() {
            let range = match value {
                v if v > 1 => (1, v),
                v if v < -1 => (v, -1),
                1 => (0, 1),
                -1 => (-1, 0),
                _ => (0, 0),
            };
            return Some(vec![range]);
        }
    }

    let mut ranges = Vec::new();
    for set in sets {
        let values = set
            .split("to")
            .map(str::parse::<i64>)
            .collect::<Result<Vec<_>, _>>()
            .ok()?;
        ranges.extend(
            values
                .windows(2)
                .map(|pair| (pair[0].min(pair[1]), pair[0].max(pair[1]))),
        );
    }
    (!ranges.is_empty()).then_some(ranges)
}

/// `(throws, sides)` from dice notation; empty means 1d6.
fn parse_dice(notation: &Regex, args: &str) -> Option<(u64, u64)> {
    if args.is_empty() {
        return Some((1, 6));
    }
    if !notation.is_match(args) {
        return None;
    }
    let parts: Vec<&str> = args.split('d').filter(|p| !p.is_empty()).collect();
    let (throws, sides) = match parts.as_slice() {
        [sides] => (1, sides.parse().ok()?),
        [throws, sides] => (throws.parse().ok()?, sides.parse().ok()?),
        _ => return None,
    };
    (throws >= 1 && sides >= 1 && throws <= MAX_THROWS).then_some((throws, sides))
}

fn render_rolls(throws: u64, sides: u64, rolls: &[u64]) -> String {
    let total: u128 = rolls.iter().map(|&roll| u128::from(roll)).sum();
    if throws == 1 {
        return format!("{total} ({throws}d{sides})");
    }
    let head = format!("{total}\n\n**Interpretation:** {throws}d{sides}\n**Individual dice rolls:** ");
    let list = rolls
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    if head.len() + list.len() > ROLL_LIST_BUDGET {
        format!("{head}*(Too many dicerolls to display. Sorry!)*")
    } else {
        format!("{head}{list}")
    }
}

fn flip_coin<R: Rng>(rng: &mut R) -> &'static str {
    let face = if rng.gen_bool(0.5) { "Heads" } else { "Tails" };
    if rng.gen_ratio(1, 600) {
        "The coin landed on its side.\
         \nThis happens every approx. 1/6000 times!\
         \nhttp://journals.aps.org/pre/abstract/10.1103/PhysRevE.48.2547\
         \n(Disclaimer: Actually, this RNG does it every 600th flip to give this event a slight probability boost.)"
    } else if rng.gen_ratio(1, 80) {
        "You accidentally tear a hole in the fabric of spacetime. Good job. Idiot."
    } else {
        face
    }
}
