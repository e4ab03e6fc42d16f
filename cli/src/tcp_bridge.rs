//! `CommandBridge` over a TCP connection to the chat server.
//!
//! Commands become wire frames on a writer task; inbound frames are mapped to
//! named events and handed to the app through `events`, but only for streams
//! the engine currently listens on.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, anyhow, bail};
use chatsync_core::{BackendCommand, CommandBridge, CommandResult};
use flume::Sender;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::wire::{self, AuthMessage, CommandMessage, Message, TextMessage};

type Listeners = Arc<Mutex<HashMap<u64, String>>>;

struct Connection {
    username: String,
    auth_token: String,
    outgoing: mpsc::UnboundedSender<String>,
    reader: AbortHandle,
}

pub struct TcpBridge {
    runtime: Handle,
    events: Sender<(String, String)>,
    listeners: Listeners,
    next_listener: AtomicU64,
    connection: Mutex<Option<Connection>>,
}

impl TcpBridge {
    pub fn new(runtime: Handle, events: Sender<(String, String)>) -> Self {
        Self {
            runtime,
            events,
            listeners: Arc::new(Mutex::new(HashMap::new())),
            next_listener: AtomicU64::new(1),
            connection: Mutex::new(None),
        }
    }

    fn connect(&self, ip: &str, username: &str, password: &str) -> anyhow::Result<()> {
        let (reader, writer, auth_token) = self
            .runtime
            .block_on(handshake(ip, username, password))?;
        tracing::info!(ip, username, "authenticated");

        let (outgoing, rx) = mpsc::unbounded_channel();
        self.runtime.spawn(write_loop(writer, rx));
        let reader = self
            .runtime
            .spawn(read_loop(reader, self.listeners.clone(), self.events.clone()))
            .abort_handle();

        let mut slot = self
            .connection
            .lock()
            .map_err(|_| anyhow!("connection lock poisoned"))?;
        let previous = slot.replace(Connection {
            username: username.to_string(),
            auth_token,
            outgoing,
            reader,
        });
        // Dropping the old sender ends its writer; the old reader must not
        // keep feeding frames from the stale connection.
        if let Some(previous) = previous {
            previous.reader.abort();
            tracing::info!(username = %previous.username, "previous connection replaced");
        }
        Ok(())
    }

    fn send_frame(&self, build: impl FnOnce(&Connection) -> Message) -> anyhow::Result<()> {
        let slot = self
            .connection
            .lock()
            .map_err(|_| anyhow!("connection lock poisoned"))?;
        let conn = slot.as_ref().ok_or_else(|| anyhow!("not connected"))?;
        let line = wire::encode(&build(conn)).context("encode frame")?;
        conn.outgoing
            .send(line)
            .map_err(|_| anyhow!("connection closed"))
    }

    fn command(&self, command_type: &str, args: Vec<String>) -> anyhow::Result<()> {
        self.send_frame(|conn| {
            Message::Command(CommandMessage {
                username: conn.username.clone(),
                auth_token: conn.auth_token.clone(),
                command_type: command_type.to_string(),
                args,
            })
        })
    }
}

impl CommandBridge for TcpBridge {
    fn invoke(&self, command: BackendCommand) -> CommandResult {
        let name = command.name();
        let result = match command {
            BackendCommand::ConnectServer {
                ip,
                username,
                password,
            } => self.connect(&ip, &username, &password),
            BackendCommand::RequestChannels => self.command("channels", vec![]),
            BackendCommand::RequestUsers => self.command("users", vec![]),
            // The server infers DM access from the `DM_` prefix; visibility
            // has no field on the wire.
            BackendCommand::RequestHistory { target, amount, .. } => {
                self.command("history", vec![target, amount.to_string()])
            }
            BackendCommand::SendMessage {
                message, target, ..
            } => self.send_frame(|conn| {
                Message::Text(TextMessage {
                    username: conn.username.clone(),
                    auth_token: conn.auth_token.clone(),
                    body: message,
                    channel: target,
                    embed_pointer: None,
                    embed_type: None,
                    message_id: None,
                    timestamp: now_seconds(),
                })
            }),
        };
        match result {
            Ok(()) => CommandResult::ok(),
            Err(err) => {
                let error = format!("{err:#}");
                tracing::warn!(command = name, error = %error, "command failed");
                CommandResult::failed(error)
            }
        }
    }

    fn listen(&self, event: String) -> u64 {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        match self.listeners.lock() {
            Ok(mut g) => {
                g.insert(id, event);
            }
            Err(poison) => {
                poison.into_inner().insert(id, event);
            }
        }
        id
    }

    fn unlisten(&self, listener_id: u64) {
        match self.listeners.lock() {
            Ok(mut g) => {
                g.remove(&listener_id);
            }
            Err(poison) => {
                poison.into_inner().remove(&listener_id);
            }
        }
    }
}

async fn handshake(
    ip: &str,
    username: &str,
    password: &str,
) -> anyhow::Result<(BufReader<OwnedReadHalf>, OwnedWriteHalf, String)> {
    let stream = TcpStream::connect(ip)
        .await
        .with_context(|| format!("connect to {ip}"))?;
    let (read_half, mut write_half) = stream.into_split();

    let auth = wire::encode(&Message::Auth(AuthMessage {
        username: username.to_string(),
        auth_token: None,
        password: Some(password.to_string()),
    }))?;
    write_half
        .write_all(auth.as_bytes())
        .await
        .context("send auth")?;

    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .await
        .context("read auth response")?;
    match serde_json::from_str::<Message>(line.trim_end()).context("decode auth response")? {
        Message::Auth(AuthMessage {
            auth_token: Some(token),
            ..
        }) => Ok((reader, write_half, token)),
        Message::Auth(_) => bail!("incorrect username or password"),
        _ => bail!("auth message was not returned"),
    }
}

async fn write_loop(mut writer: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = rx.recv().await {
        if let Err(err) = writer.write_all(line.as_bytes()).await {
            tracing::warn!(%err, "write failed; dropping connection");
            break;
        }
    }
    let _ = writer.shutdown().await;
}

async fn read_loop(
    mut reader: BufReader<OwnedReadHalf>,
    listeners: Listeners,
    events: Sender<(String, String)>,
) {
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                tracing::info!("server closed the connection");
                break;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(%err, "read failed");
                break;
            }
        }
        let message = match serde_json::from_str::<Message>(line.trim_end()) {
            Ok(message) => message,
            Err(err) => {
                tracing::debug!(%err, "undecodable frame skipped");
                continue;
            }
        };
        let Some((event, payload)) = wire::to_event(message) else {
            continue;
        };
        if !is_listened(&listeners, event) {
            tracing::trace!(event, "no listener; frame dropped");
            continue;
        }
        if events.send((event.to_string(), payload)).is_err() {
            break;
        }
    }
}

fn is_listened(listeners: &Mutex<HashMap<u64, String>>, event: &str) -> bool {
    match listeners.lock() {
        Ok(g) => g.values().any(|e| e == event),
        Err(poison) => poison.into_inner().values().any(|e| e == event),
    }
}

fn now_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
