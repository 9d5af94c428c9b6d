//! Console front end.
//!
//! Runs one in-memory server whose only channel is the terminal: every line
//! typed on stdin is a message from the console user, and everything the
//! bot sends is printed.

use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use mentionbot_core::{
    Channel, Destination, InboundEvent, LocalClient, Member, Message, Server, User,
};
use mentionbot_runtime::{BotRuntime, ConfigLoader, MentionbotConfig};

const FLUSH_INTERVAL: Duration = Duration::from_millis(50);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigLoader::new()
        .load()
        .context("Failed to load configuration")?;

    let client = Arc::new(console_client(&config));
    let runtime = BotRuntime::from_config(&config, client.clone())?
        .with_factory(mentionbot_modules::factory()?);

    let (tx, rx) = mpsc::channel(config.bot.queue_capacity);
    spawn_reader(&config, tx);

    let stop_printing = CancellationToken::new();
    let printer = tokio::spawn(print_outbox(client, stop_printing.clone()));

    let result = runtime.run(rx).await;
    stop_printing.cancel();
    if let Err(err) = printer.await {
        warn!(error = %err, "Console printer failed");
    }

    result?;
    Ok(())
}

/// A client with a single server holding the console channel.
fn console_client(config: &MentionbotConfig) -> LocalClient {
    let console = &config.console;
    let bot = User::new(&config.bot.user_id, &config.bot.user_name);
    let client = LocalClient::new(bot.clone(), &config.bot.owner_id);

    let mut server = Server::new(&console.server_id, &console.server_name, &config.bot.owner_id);
    server.members.push(Member::new(bot));
    server.members.push(Member::new(console_user(config)));
    server.channels.push(Channel::text(
        &console.channel_id,
        "console",
        &console.server_id,
    ));
    client.upsert_server(server);
    client
}

fn console_user(config: &MentionbotConfig) -> User {
    let id = config
        .console
        .user_id
        .as_deref()
        .unwrap_or(&config.bot.owner_id);
    User::new(id, &config.console.user_name)
}

/// Reads stdin on its own thread so a pending read never holds up exit.
fn spawn_reader(config: &MentionbotConfig, tx: mpsc::Sender<InboundEvent>) {
    let author = Member::new(console_user(config));
    let channel = Channel::text(
        &config.console.channel_id,
        "console",
        &config.console.server_id,
    );

    std::thread::spawn(move || {
        for (n, line) in std::io::stdin().lock().lines().enumerate() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            let msg = Message::new(n.to_string(), line, author.clone(), channel.clone());
            if tx.blocking_send(InboundEvent::Message(msg)).is_err() {
                break;
            }
        }
        info!("Console input closed");
    });
}

async fn print_outbox(client: Arc<LocalClient>, stop: CancellationToken) {
    let mut interval = tokio::time::interval(FLUSH_INTERVAL);
    loop {
        tokio::select! {
            _ = interval.tick() => flush(&client),
            _ = stop.cancelled() => {
                flush(&client);
                return;
            }
        }
    }
}

fn flush(client: &LocalClient) {
    for sent in client.take_sent() {
        match sent.destination {
            Destination::Channel(id) => println!("[#{id}] {}", sent.content),
            Destination::User(id) => println!("[@{id}] {}", sent.content),
        }
    }
}
