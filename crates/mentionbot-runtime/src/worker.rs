//! One task per server.
//!
//! Each worker owns its server's [`ServerBotInstance`] and consumes that
//! server's events in arrival order. Servers progress independently of each
//! other.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

use mentionbot_core::{ChatClient, CommandError, MemberEvent, Message, Server, SettingsStore};
use mentionbot_framework::fault::{core_fault_reply, core_fault_report, panic_fault};
use mentionbot_framework::{InstanceOptions, ServerBotInstance, ServerModuleFactory};

use crate::error::{RuntimeError, RuntimeResult};

#[derive(Debug)]
pub(crate) enum ServerEvent {
    Message(Message),
    Member(MemberEvent),
}

/// Everything a worker needs to build and run its instance.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub client: Arc<dyn ChatClient>,
    pub store: Arc<dyn SettingsStore>,
    pub factory: Arc<ServerModuleFactory>,
    pub options: InstanceOptions,
    pub queue_capacity: usize,
    /// Fatal errors are reported here; the runtime stops on the first one.
    pub faults: mpsc::UnboundedSender<RuntimeError>,
}

pub(crate) struct ServerWorker {
    tx: mpsc::Sender<ServerEvent>,
    handle: JoinHandle<()>,
}

impl ServerWorker {
    pub fn spawn(server: Server, ctx: WorkerContext) -> Self {
        let (tx, rx) = mpsc::channel(ctx.queue_capacity.max(1));
        let span = info_span!("server", id = %server.id);
        let handle = tokio::spawn(
            async move {
                let faults = ctx.faults.clone();
                let server_id = server.id.clone();
                let outcome = AssertUnwindSafe(serve(server, ctx, rx))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| {
                        error!("Server worker panicked");
                        Err(RuntimeError::CoreFault {
                            server_id,
                            source: panic_fault(payload),
                        })
                    });
                if let Err(err) = outcome {
                    let _ = faults.send(err);
                }
            }
            .instrument(span),
        );
        Self { tx, handle }
    }

    /// Queues an event. Returns `false` if the worker has stopped.
    pub async fn send(&self, event: ServerEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }

    /// Lets the worker drain its queue and shut its instance down.
    pub async fn stop(self) {
        drop(self.tx);
        if let Err(err) = self.handle.await {
            error!(error = %err, "Server worker panicked");
        }
    }
}

async fn serve(
    server: Server,
    ctx: WorkerContext,
    mut rx: mpsc::Receiver<ServerEvent>,
) -> RuntimeResult<()> {
    let mut instance = ServerBotInstance::new(
        &server,
        ctx.client.clone(),
        ctx.store.clone(),
        ctx.factory.clone(),
        &ctx.options,
    )
    .await
    .map_err(|source| RuntimeError::Instance {
        server_id: server.id.clone(),
        source,
    })?;
    info!(name = %server.name, "Server worker started");

    let mut outcome = Ok(());
    while let Some(event) = rx.recv().await {
        match event {
            ServerEvent::Message(msg) => {
                if let Err(err) = handle_message(&mut instance, ctx.client.as_ref(), &msg).await {
                    outcome = Err(err);
                    break;
                }
            }
            ServerEvent::Member(event) => instance.on_member_event(&event).await,
        }
    }

    instance.shutdown().await;
    debug!("Server worker stopped");
    outcome
}

/// Runs one message and turns whatever comes back into replies.
///
/// Signals become their canned replies. A fault is reported to the bot owner
/// and announced in the channel, then returned as fatal.
pub(crate) async fn handle_message(
    instance: &mut ServerBotInstance,
    client: &dyn ChatClient,
    msg: &Message,
) -> RuntimeResult<()> {
    match instance.process_text(&msg.content, msg).await {
        Ok(()) => Ok(()),
        Err(CommandError::Signal(signal)) => {
            debug!(?signal, "Command signal");
            if let Some(text) = signal.reply_text()
                && let Err(err) = client.reply(msg, &text).await
            {
                warn!(error = %err, "Failed to send signal reply");
            }
            Ok(())
        }
        Err(CommandError::Fault(err)) => {
            error!(error = ?err, content = %msg.content, "Core fault, terminating");
            let report = core_fault_report(msg, instance.server_name(), &err);
            if let Err(send_err) = client.send_to_owner(&report).await {
                warn!(error = %send_err, "Failed to report core fault to owner");
            }
            let reply = core_fault_reply(&err, &client.bot_owner_id());
            if let Err(send_err) = client.reply(msg, &reply).await {
                warn!(error = %send_err, "Failed to announce core fault");
            }
            Err(RuntimeError::CoreFault {
                server_id: instance.server_id().to_string(),
                source: err,
            })
        }
    }
}
