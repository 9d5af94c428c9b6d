//! Bot debugging tools. Traces every hook and echoes sub-commands back.

use async_trait::async_trait;
use futures::future::BoxFuture;
use mentionbot_framework::linkme::distributed_slice;
use tracing::debug;

use mentionbot_core::{CommandResult, MemberEvent, Message, PrivilegeLevel};
use mentionbot_framework::{
    MODULE_REGISTRY, ModuleDescriptor, ModuleResources, ServerModule, no_shortcuts,
};

#[distributed_slice(MODULE_REGISTRY)]
#[linkme(crate = mentionbot_framework::linkme)]
pub static DEBUGGING: ModuleDescriptor = ModuleDescriptor {
    name: "Debugging",
    short_description: "Bot debugging tools.",
    recommended_aliases: &["debugging", "debug", "db"],
    preprocessor_triggers: &[],
    shortcuts: no_shortcuts,
    create: Debugging::create,
};

pub struct Debugging {
    res: ModuleResources,
}

impl Debugging {
    fn create(res: ModuleResources) -> BoxFuture<'static, anyhow::Result<Box<dyn ServerModule>>> {
        Box::pin(async move {
            res.suppress_autokill(true);
            debug!(server = res.server_id(), "Debugging module constructed");
            Ok(Box::new(Debugging { res }) as Box<dyn ServerModule>)
        })
    }
}

#[async_trait]
impl ServerModule for Debugging {
    async fn help_summary(&self, privilege: PrivilegeLevel) -> anyhow::Result<String> {
        debug!(%privilege, "help_summary");
        Ok("`{p}{grp}[anything]` - Echo a sub-command back.".to_string())
    }

    async fn help_detail(&self, locator: &str, privilege: PrivilegeLevel) -> CommandResult<String> {
        debug!(locator, %privilege, "help_detail");
        Ok(format!(
            "`{{p}}{{grp}}[anything]` - Echo a sub-command back.\n\n**Help locator received:** {locator}"
        ))
    }

    async fn process_cmd(
        &mut self,
        substr: &str,
        msg: &Message,
        privilege: PrivilegeLevel,
    ) -> CommandResult {
        debug!(substr, %privilege, "process_cmd");
        let text = format!("**Sub-command received:** {substr}");
        self.res.client().reply(msg, &text).await?;
        Ok(())
    }

    async fn msg_preprocessor(
        &mut self,
        content: String,
        _msg: &Message,
        default_prefix: &str,
    ) -> anyhow::Result<String> {
        debug!(content = %content, default_prefix, "msg_preprocessor");
        Ok(content)
    }

    async fn on_message(&mut self, msg: &Message) -> anyhow::Result<()> {
        debug!(content = %msg.content, author = %msg.author.id(), "on_message");
        Ok(())
    }

    async fn on_member_event(&mut self, event: &MemberEvent) -> anyhow::Result<()> {
        debug!(kind = event.kind(), user = %event.user().id, "on_member_event");
        Ok(())
    }
}
