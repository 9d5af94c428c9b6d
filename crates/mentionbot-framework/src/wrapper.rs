//! Lifecycle and fault containment for one installed module.
//!
//! ```text
//!              activate()                       kill() / fault
//!  Inactive ───────────────▶ Active ─────────────────────────────▶ Inactive
//!     ▲        (constructor                 (instance dropped,         │
//!     │         ran OK)                      background tasks          │
//!     │                                      cancelled)                │
//!     └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every call into the module goes through [`ServerModuleWrapper`]. Faults
//! coming back are logged, reported to the bot owner and, unless the module
//! asked for autokill to be suppressed, the module is deactivated. Command
//! signals are passed through so the instance can turn them into replies.
//! A panic inside module code is caught and handled as a fault.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use mentionbot_core::{CommandError, CommandResult, CommandSignal, MemberEvent, Message, PrivilegeLevel};

use crate::command::{HelpNode, Shortcut};
use crate::error::{WrapperError, WrapperResult};
use crate::fault::{FaultSite, module_fault_reply, module_fault_report, panic_fault};
use crate::module::{ModuleDescriptor, ModuleEnv, ModuleResources, ServerModule};

type Slot = Option<Box<dyn ServerModule>>;

/// Background tasks of the current activation.
struct TaskSet {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl TaskSet {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    /// Cancels every task. Tasks stop at their next await point.
    fn cancel(&mut self) {
        self.token.cancel();
        self.handles.clear();
    }
}

pub struct ServerModuleWrapper {
    descriptor: ModuleDescriptor,
    /// Top-level alias to local alias.
    shortcuts: HashMap<&'static str, &'static str>,
    env: ModuleEnv,
    slot: Mutex<Slot>,
    tasks: parking_lot::Mutex<TaskSet>,
    active: AtomicBool,
    suppress_autokill: AtomicBool,
    this: Weak<ServerModuleWrapper>,
}

impl ServerModuleWrapper {
    /// Creates an inactive wrapper.
    pub fn new(descriptor: ModuleDescriptor, shortcuts: Vec<Shortcut>, env: ModuleEnv) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            descriptor,
            shortcuts: shortcuts
                .into_iter()
                .map(|s| (s.top_level, s.local))
                .collect(),
            env,
            slot: Mutex::new(None),
            tasks: parking_lot::Mutex::new(TaskSet::new()),
            active: AtomicBool::new(false),
            suppress_autokill: AtomicBool::new(false),
            this: this.clone(),
        })
    }

    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    pub fn short_description(&self) -> &'static str {
        self.descriptor.short_description
    }

    pub fn module_cmd_aliases(&self) -> &'static [&'static str] {
        self.descriptor.recommended_aliases
    }

    /// Top-level aliases routed to this module.
    pub fn shortcut_aliases(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.shortcuts.keys().copied()
    }

    pub fn preprocessor_triggers(&self) -> &'static [&'static str] {
        self.descriptor.preprocessor_triggers
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn set_suppress_autokill(&self, suppress: bool) {
        self.suppress_autokill.store(suppress, Ordering::Release);
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────────

    /// Constructs the module.
    ///
    /// On failure the wrapper stays inactive and any task the constructor
    /// started is cancelled.
    pub async fn activate(&self) -> WrapperResult<()> {
        let mut slot = self.slot.lock().await;
        if slot.is_some() {
            return Err(WrapperError::AlreadyActive(self.name()));
        }

        *self.tasks.lock() = TaskSet::new();
        self.suppress_autokill.store(false, Ordering::Release);

        let resources = ModuleResources::new(&self.descriptor, self.env.clone(), self.this.clone());
        match (self.descriptor.create)(resources).await {
            Ok(module) => {
                *slot = Some(module);
                self.active.store(true, Ordering::Release);
                info!(module = self.name(), server = %self.env.server_id, "Module activated");
                Ok(())
            }
            Err(err) => {
                self.tasks.lock().cancel();
                error!(
                    module = self.name(),
                    server = %self.env.server_id,
                    error = ?err,
                    "Module construction failed"
                );
                Err(WrapperError::Construction {
                    module: self.name(),
                    reason: format!("{err:#}"),
                })
            }
        }
    }

    /// Drops the module instance and cancels its background tasks.
    pub async fn kill(&self) -> WrapperResult<()> {
        let mut slot = self.slot.lock().await;
        if slot.is_none() {
            return Err(WrapperError::NotActive(self.name()));
        }
        self.kill_locked(&mut slot);
        info!(module = self.name(), server = %self.env.server_id, "Module deactivated");
        Ok(())
    }

    fn kill_locked(&self, slot: &mut Slot) {
        slot.take();
        self.tasks.lock().cancel();
        self.active.store(false, Ordering::Release);
    }

    pub(crate) fn spawn_background<F>(&self, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let mut tasks = self.tasks.lock();
        let token = tasks.token.clone();
        let this = self.this.clone();
        let module = self.name();

        let handle = tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = token.cancelled() => {
                    debug!(module, "Background task cancelled");
                    return;
                }
                outcome = guarded(task) => outcome,
            };
            let err = match outcome {
                Ok(()) => anyhow::anyhow!("background task returned"),
                Err(err) => err,
            };
            if let Some(wrapper) = this.upgrade() {
                wrapper.background_fault(&token, err).await;
            }
        });

        tasks.handles.retain(|h| !h.is_finished());
        tasks.handles.push(handle);
    }

    async fn background_fault(&self, token: &CancellationToken, err: anyhow::Error) {
        let mut slot = self.slot.lock().await;
        // A later activation owns a different token.
        if token.is_cancelled() || slot.is_none() {
            debug!(module = self.name(), error = %err, "Stale background task fault ignored");
            return;
        }
        self.contain_fault(&mut slot, FaultSite::BackgroundTask, None, err)
            .await;
    }

    /// Reports a fault and kills the module unless autokill is suppressed.
    ///
    /// Returns `true` if the module was deactivated.
    async fn contain_fault(
        &self,
        slot: &mut Slot,
        site: FaultSite,
        msg: Option<&Message>,
        err: anyhow::Error,
    ) -> bool {
        let kill = !self.suppress_autokill.load(Ordering::Acquire);
        error!(
            module = self.name(),
            server = %self.env.server_id,
            %site,
            autokill = kill,
            error = ?err,
            "Module fault"
        );
        if kill {
            self.kill_locked(slot);
        }

        let report = module_fault_report(self.name(), &self.env.server_id, site, msg, &err, kill);
        if let Err(send_err) = self.env.client.send_to_owner(&report).await {
            warn!(module = self.name(), error = %send_err, "Failed to report module fault to owner");
        }
        kill
    }

    // ─── Serving ─────────────────────────────────────────────────────────────

    /// Turns a top-level shortcut into `"<local> <args>"`; module aliases
    /// just pass `args` on.
    fn localize(&self, matched_alias: &str, args: &str) -> String {
        match self.shortcuts.get(matched_alias) {
            Some(local) if args.is_empty() => (*local).to_string(),
            Some(local) => format!("{local} {args}"),
            None => args.to_string(),
        }
    }

    /// Routes a command whose first word, `matched_alias`, selected this
    /// module.
    pub async fn process_cmd(
        &self,
        matched_alias: &str,
        args: &str,
        msg: &Message,
        privilege: PrivilegeLevel,
    ) -> CommandResult {
        let substr = self.localize(matched_alias, args);
        let mut slot = self.slot.lock().await;
        let Some(module) = slot.as_mut() else {
            let text = format!("Error: The `{}` module is not active.", self.name());
            self.env.client.reply(msg, &text).await?;
            return Ok(());
        };

        let result = guarded(module.process_cmd(&substr, msg, privilege)).await;
        match result {
            Ok(()) => Ok(()),
            Err(CommandError::Signal(signal)) => Err(signal.into()),
            Err(CommandError::Fault(err)) => {
                let killed = self
                    .contain_fault(&mut slot, FaultSite::Command, Some(msg), err)
                    .await;
                drop(slot);
                let reply = module_fault_reply(self.name(), &self.env.cmd_prefix(), killed);
                self.env.client.reply(msg, &reply).await?;
                Ok(())
            }
        }
    }

    pub async fn msg_preprocessor(&self, content: String, msg: &Message, default_prefix: &str) -> String {
        let mut slot = self.slot.lock().await;
        let Some(module) = slot.as_mut() else {
            return content;
        };
        match guarded(module.msg_preprocessor(content.clone(), msg, default_prefix)).await {
            Ok(rewritten) => rewritten,
            Err(err) => {
                self.contain_fault(&mut slot, FaultSite::Preprocessor, Some(msg), err)
                    .await;
                content
            }
        }
    }

    pub async fn on_message(&self, msg: &Message) {
        let mut slot = self.slot.lock().await;
        let Some(module) = slot.as_mut() else {
            return;
        };
        if let Err(err) = guarded(module.on_message(msg)).await {
            self.contain_fault(&mut slot, FaultSite::Message, Some(msg), err)
                .await;
        }
    }

    pub async fn on_member_event(&self, event: &MemberEvent) {
        let mut slot = self.slot.lock().await;
        let Some(module) = slot.as_mut() else {
            return;
        };
        if let Err(err) = guarded(module.on_member_event(event)).await {
            self.contain_fault(&mut slot, FaultSite::MemberEvent, None, err)
                .await;
        }
    }

    // ─── Help ────────────────────────────────────────────────────────────────

    /// Fills module-level placeholders: `{modhelp}`, `{mod}` and `{grp}`.
    fn render(&self, text: &str, grp: &str) -> String {
        text.replace("{modhelp}", "{p}help {mod}")
            .replace("{mod}", self.descriptor.primary_alias())
            .replace("{grp}", &format!("{grp} "))
    }

    fn inactive_summary(&self) -> String {
        format!("`{{modhelp}}` - *Module `{}` is not active.*", self.name())
    }
}

#[async_trait]
impl HelpNode for ServerModuleWrapper {
    async fn help_detail(
        &self,
        locator: &str,
        entry: &str,
        privilege: PrivilegeLevel,
    ) -> Result<String, CommandSignal> {
        // A help query through a shortcut reads like one through the module.
        let (locator, grp) = match self.shortcuts.get(entry) {
            Some(local) if locator.is_empty() => ((*local).to_string(), self.descriptor.primary_alias()),
            Some(local) => (format!("{local} {locator}"), self.descriptor.primary_alias()),
            None => (locator.to_string(), entry),
        };

        let mut slot = self.slot.lock().await;
        let Some(module) = slot.as_ref() else {
            return Ok(format!("The `{}` module is not active.", self.name()));
        };
        let result = guarded(module.help_detail(&locator, privilege)).await;
        match result {
            Ok(text) => Ok(self.render(&text, grp)),
            Err(CommandError::Signal(signal)) => Err(signal),
            Err(CommandError::Fault(err)) => {
                let killed = self.contain_fault(&mut slot, FaultSite::Help, None, err).await;
                Ok(module_fault_reply(self.name(), &self.env.cmd_prefix(), killed))
            }
        }
    }

    async fn help_summary(&self, privilege: PrivilegeLevel) -> String {
        let grp = self.descriptor.primary_alias();
        let mut slot = self.slot.lock().await;
        let Some(module) = slot.as_ref() else {
            return self.render(&self.inactive_summary(), grp);
        };
        let result = guarded(module.help_summary(privilege)).await;
        let text = match result {
            Ok(text) => text,
            Err(err) => {
                self.contain_fault(&mut slot, FaultSite::Help, None, err).await;
                self.inactive_summary()
            }
        };
        self.render(&text, grp)
    }
}

/// Awaits a call into module code. A panic comes back as a fault.
async fn guarded<T, E, F>(call: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<anyhow::Error>,
{
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(panic_fault(payload).into()),
    }
}

impl Drop for ServerModuleWrapper {
    fn drop(&mut self) {
        self.tasks.get_mut().cancel();
    }
}
