//! Fault report texts.

use std::any::Any;
use std::fmt;

use mentionbot_core::Message;

/// What the module was doing when it faulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultSite {
    Command,
    Message,
    Preprocessor,
    Help,
    MemberEvent,
    BackgroundTask,
}

impl fmt::Display for FaultSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Command => "processing a command",
            Self::Message => "handling a message",
            Self::Preprocessor => "preprocessing a message",
            Self::Help => "composing help",
            Self::MemberEvent => "handling a member event",
            Self::BackgroundTask => "running a background task",
        })
    }
}

/// Turns a caught panic payload into a fault.
pub fn panic_fault(payload: Box<dyn Any + Send>) -> anyhow::Error {
    let reason = match payload.downcast::<String>() {
        Ok(text) => *text,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(text) => (*text).to_string(),
            Err(_) => "non-string panic payload".to_string(),
        },
    };
    anyhow::anyhow!("panicked: {reason}")
}

/// Report sent privately to the bot owner when a module faults.
pub fn module_fault_report(
    module: &str,
    server_id: &str,
    site: FaultSite,
    msg: Option<&Message>,
    err: &anyhow::Error,
    killed: bool,
) -> String {
    let mut report = format!(
        "**MODULE FAULT**\n**Module:** `{module}`\n**Server ID:** {server_id}\n**While:** {site}"
    );
    if let Some(msg) = msg {
        report.push_str(&format!(
            "\n**From:** {}\n**Command issued by:** {}\n**Full message:**\n{}",
            msg.channel.mention(),
            msg.author.mention(),
            msg.content
        ));
    }
    report.push_str(&format!("\n**Error:**\n```\n{err:?}\n```"));
    report.push_str(if killed {
        "\n**The module has been deactivated.**"
    } else {
        "\n**Autokill is suppressed. The module is still active.**"
    });
    report
}

/// Reply in the channel where a module command faulted.
pub fn module_fault_reply(module: &str, prefix: &str, killed: bool) -> String {
    if killed {
        format!(
            "**Error:** The `{module}` module encountered a problem and has been deactivated.\n\
             It can be reactivated with `{prefix}activate {module}`."
        )
    } else {
        format!("**Error:** The `{module}` module encountered a problem. The bot owner has been notified.")
    }
}

/// Report sent privately to the bot owner when a core fault escapes a
/// server instance.
pub fn core_fault_report(msg: &Message, server_name: &str, err: &anyhow::Error) -> String {
    format!(
        "**EXCEPTION**\n**From:** {} **in** {}\n**Command issued by:** {}\n\
         **Full message:**\n{}\n**Stack Trace:**\n```\n{:?}\n```",
        msg.channel.mention(),
        server_name,
        msg.author.mention(),
        msg.content,
        err
    )
}

/// Reply in the channel where a core fault happened, right before shutdown.
pub fn core_fault_reply(err: &anyhow::Error, owner_id: &str) -> String {
    format!(
        "**EXCEPTION:** {}\n{}\n<@{}> Check it out, will ya?\n\n\
         **THIS BOT WILL NOW TERMINATE. Please fix the bug before relaunching.**",
        err,
        err.root_cause(),
        owner_id
    )
}
