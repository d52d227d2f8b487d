use std::time::Duration;

use chatlink::{
    ChatAdapter, ClientConfig, ClientError, ConfigError, ConnectionStatus, EventHandlers, MessageAck, PresenceStatus,
    SyncBatch,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("could not connect: {0}")]
    ConnectFailed(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Client(#[from] ClientError),
    #[error("transport stopped before a reply arrived")]
    Closed,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("signal handler failed: {0}")]
    Signal(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "chatlink-cli", about = "Realtime chat websocket client")]
struct Cli {
    /// WebSocket endpoint, e.g. `wss://chat.example.com/ws`.
    #[arg(long, env = "CHAT_WS_URL")]
    url: String,

    #[arg(long, env = "CHAT_WS_TOKEN", default_value = "", hide_env_values = true)]
    token: String,

    /// Seconds to wait for the connection and for each reply.
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every inbound event as a JSON line until Ctrl-C.
    Listen {
        /// Conversations to join before listening.
        #[arg(long = "join")]
        conversations: Vec<String>,
    },
    /// Send one message and print the server acknowledgement.
    Send { conversation_id: String, content: String },
    /// Publish the local presence status.
    Presence {
        #[arg(value_parser = parse_presence)]
        status: PresenceStatus,
    },
    /// Request a conversation backlog and print the batch.
    Sync {
        conversation_id: String,
        #[arg(long)]
        last_message_id: Option<String>,
    },
}

#[derive(Debug)]
enum Reply {
    Ack(MessageAck),
    Batch(SyncBatch),
    Failed(ClientError),
}

#[derive(Serialize)]
struct EventLine<'a, T: Serialize> {
    event: &'static str,
    data: &'a T,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;
    let wait = Duration::from_secs(cli.timeout_secs);

    match cli.command {
        Command::Listen { conversations } => run_listen(config, wait, conversations).await,
        Command::Send { conversation_id, content } => run_send(config, wait, conversation_id, content).await,
        Command::Presence { status } => run_presence(config, wait, status).await,
        Command::Sync { conversation_id, last_message_id } => {
            run_sync(config, wait, conversation_id, last_message_id).await
        }
    }
}

/// Flags win over `CHAT_WS_URL`/`CHAT_WS_TOKEN`; every other knob comes from
/// the environment.
fn build_config(cli: &Cli) -> Result<ClientConfig, CliError> {
    let config = ClientConfig::from_lookup(|key| match key {
        "CHAT_WS_URL" => Some(cli.url.clone()),
        "CHAT_WS_TOKEN" => Some(cli.token.clone()),
        _ => std::env::var(key).ok(),
    })?;
    Ok(config)
}

async fn run_listen(config: ClientConfig, wait: Duration, conversations: Vec<String>) -> Result<(), CliError> {
    let handlers = EventHandlers::new()
        .on_connected(|info| print_event("connected", info))
        .on_message(|msg| print_event("message", msg))
        .on_message_sent(|ack| print_event("message_sent", ack))
        .on_typing(|ev| print_event("typing", ev))
        .on_read(|receipt| print_event("read", receipt))
        .on_presence(|ev| print_event("presence", ev))
        .on_sync_data(|batch| print_event("sync_data", batch))
        .on_pong(|ts| print_event("pong", ts))
        .on_error(|err| print_event("error", &err.to_string()))
        .on_status(|status| print_event("status", status));
    let adapter = ChatAdapter::new(config, handlers)?;
    wait_connected(&adapter, wait).await?;
    for conversation_id in conversations {
        adapter.join_conversation(conversation_id);
    }

    tokio::signal::ctrl_c().await?;
    eprintln!("interrupted; disconnecting");
    adapter.shutdown().await;
    Ok(())
}

async fn run_send(config: ClientConfig, wait: Duration, conversation_id: String, content: String) -> Result<(), CliError> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let adapter = ChatAdapter::new(config, reply_handlers(tx))?;
    wait_connected(&adapter, wait).await?;

    adapter.join_conversation(conversation_id.clone());
    adapter.send_message(conversation_id, content);
    let result = loop {
        match next_reply(&mut rx, wait).await? {
            Reply::Ack(ack) => break print_json(&ack),
            Reply::Failed(err) => break Err(err.into()),
            Reply::Batch(_) => {}
        }
    };
    adapter.shutdown().await;
    result
}

async fn run_presence(config: ClientConfig, wait: Duration, status: PresenceStatus) -> Result<(), CliError> {
    let adapter = ChatAdapter::new(config, EventHandlers::new())?;
    wait_connected(&adapter, wait).await?;
    adapter.update_presence(status);
    adapter.shutdown().await;
    println!("presence: {}", status.as_str());
    Ok(())
}

async fn run_sync(
    config: ClientConfig,
    wait: Duration,
    conversation_id: String,
    last_message_id: Option<String>,
) -> Result<(), CliError> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let adapter = ChatAdapter::new(config, reply_handlers(tx))?;
    wait_connected(&adapter, wait).await?;

    adapter.join_conversation(conversation_id.clone());
    adapter.request_sync(conversation_id, last_message_id);
    let result = loop {
        match next_reply(&mut rx, wait).await? {
            Reply::Batch(batch) => break print_json(&batch),
            Reply::Failed(err) => break Err(err.into()),
            Reply::Ack(_) => {}
        }
    };
    adapter.shutdown().await;
    result
}

/// Handlers that forward acknowledgements, backlogs and server errors.
fn reply_handlers(tx: mpsc::UnboundedSender<Reply>) -> EventHandlers {
    let (ack_tx, batch_tx) = (tx.clone(), tx.clone());
    EventHandlers::new()
        .on_message_sent(move |ack| {
            let _ = ack_tx.send(Reply::Ack(ack.clone()));
        })
        .on_sync_data(move |batch| {
            let _ = batch_tx.send(Reply::Batch(batch.clone()));
        })
        .on_error(move |err| {
            if matches!(err, ClientError::Server { .. }) {
                let _ = tx.send(Reply::Failed(err.clone()));
            } else {
                tracing::warn!(error = %err, "transport error");
            }
        })
}

async fn wait_connected(adapter: &ChatAdapter, wait: Duration) -> Result<(), CliError> {
    let mut status = adapter.watch_status();
    let reached = tokio::time::timeout(
        wait,
        status.wait_for(|s| matches!(s, ConnectionStatus::Connected | ConnectionStatus::Error)),
    )
    .await
    .map_err(|_| CliError::Timeout(wait))?
    .map(|s| *s)
    .map_err(|_| CliError::Closed)?;

    if reached == ConnectionStatus::Error {
        return Err(CliError::ConnectFailed(adapter.last_error().unwrap_or_else(|| "unknown error".to_owned())));
    }
    Ok(())
}

async fn next_reply(rx: &mut mpsc::UnboundedReceiver<Reply>, wait: Duration) -> Result<Reply, CliError> {
    tokio::time::timeout(wait, rx.recv())
        .await
        .map_err(|_| CliError::Timeout(wait))?
        .ok_or(CliError::Closed)
}

fn parse_presence(raw: &str) -> Result<PresenceStatus, String> {
    raw.parse()
}

fn print_event<T: Serialize>(event: &'static str, data: &T) {
    match serde_json::to_string(&EventLine { event, data }) {
        Ok(line) => println!("{line}"),
        Err(err) => tracing::warn!(error = %err, event, "failed to render event"),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
