mod tcp_bridge;
mod wire;

use std::path::PathBuf;

use anyhow::{Context, bail};
use chatsync_core::{
    dm_target_id, is_dm_id, AppAction, AppReconciler, AppState, AppUpdate, AuthState, FfiChat,
    TargetKind, ViewKind,
};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::tcp_bridge::TcpBridge;

#[derive(Debug, Parser)]
#[command(name = "chatsync")]
#[command(about = "Terminal chat client: channels and direct messages over TCP")]
struct Cli {
    /// Chat server address (host:port)
    #[arg(long, default_value = "127.0.0.1:8080")]
    server: String,

    #[arg(long)]
    username: String,

    #[arg(long, env = "CHATSYNC_PASSWORD")]
    password: String,

    /// Config and log file live here
    #[arg(long, default_value = ".chatsync")]
    data_dir: PathBuf,

    /// Also sync direct-message conversations
    #[arg(long)]
    dm: bool,
}

struct ChannelReconciler(flume::Sender<AppUpdate>);

impl AppReconciler for ChannelReconciler {
    fn reconcile(&self, update: AppUpdate) {
        let _ = self.0.send(update);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    std::fs::create_dir_all(&cli.data_dir)
        .with_context(|| format!("create data dir {}", cli.data_dir.display()))?;

    let (event_tx, event_rx) = flume::unbounded::<(String, String)>();
    let bridge = TcpBridge::new(tokio::runtime::Handle::current(), event_tx);
    let app = FfiChat::new(
        cli.data_dir.to_string_lossy().into_owned(),
        Box::new(bridge),
    );

    let (update_tx, update_rx) = flume::unbounded();
    app.listen_for_updates(Box::new(ChannelReconciler(update_tx)));

    let forwarder = app.clone();
    tokio::spawn(async move {
        while let Ok((event, payload)) = event_rx.recv_async().await {
            forwarder.deliver_event(event, payload);
        }
    });

    app.dispatch(AppAction::Connect {
        ip: cli.server.clone(),
        username: cli.username.clone(),
        password: cli.password.clone(),
    });
    wait_for_login(&update_rx).await?;

    app.dispatch(AppAction::MountView {
        view: ViewKind::Channels,
    });
    if cli.dm {
        app.dispatch(AppAction::MountView {
            view: ViewKind::DirectMessages,
        });
    }
    println!("connected to {} as {}. Type /help for commands.", cli.server, cli.username);

    let mut renderer = Renderer::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            update = update_rx.recv_async() => {
                let Ok(update) = update else { break };
                renderer.render(&app, update);
            }
            line = lines.next_line() => {
                let Some(line) = line.context("read stdin")? else { break };
                if !handle_input(&app, &cli, line.trim(), renderer.state.as_ref()) {
                    break;
                }
            }
        }
    }

    app.dispatch(AppAction::Logout);
    Ok(())
}

async fn wait_for_login(updates: &flume::Receiver<AppUpdate>) -> anyhow::Result<()> {
    while let Ok(AppUpdate::FullState(state)) = updates.recv_async().await {
        if matches!(state.auth, AuthState::LoggedIn { .. }) {
            return Ok(());
        }
        if let Some(toast) = state.toast {
            bail!(toast);
        }
    }
    bail!("chat core stopped before login finished")
}

/// Returns false when the user asked to quit.
fn handle_input(app: &FfiChat, cli: &Cli, line: &str, state: Option<&AppState>) -> bool {
    match line.split_once(' ').unwrap_or((line, "")) {
        ("", _) => {}
        ("/quit", _) => return false,
        ("/help", _) => {
            println!("/list             show channels and conversations");
            println!("/switch <target>  open a channel, DM id, or user");
            println!("/refresh          re-request the directory");
            println!("/quit             leave");
            println!("anything else is sent to the open conversation");
        }
        ("/list", _) => match state {
            Some(state) if !state.directory.is_empty() => {
                for t in &state.directory {
                    let marker = if t.is_active { '*' } else { ' ' };
                    println!(
                        "{marker} {} ({} messages)",
                        label(&t.kind, &t.display_name),
                        t.message_count
                    );
                }
            }
            _ => println!("directory is empty"),
        },
        ("/switch", name) if !name.trim().is_empty() => {
            let target_id = resolve_target(&cli.username, name.trim(), state);
            app.dispatch(AppAction::SwitchTarget { target_id });
        }
        ("/refresh", _) => {
            app.dispatch(AppAction::RefreshDirectory {
                view: ViewKind::Channels,
            });
            if cli.dm {
                app.dispatch(AppAction::RefreshDirectory {
                    view: ViewKind::DirectMessages,
                });
            }
        }
        (cmd, _) if cmd.starts_with('/') => eprintln!("unknown command {cmd}; try /help"),
        _ => match state.and_then(|s| s.active_target_id.clone()) {
            Some(target_id) => app.dispatch(AppAction::SendMessage {
                target_id,
                body: line.to_string(),
            }),
            None => eprintln!("no open conversation yet"),
        },
    }
    true
}

/// Channel names and DM ids pass through; a bare user name becomes its DM id
/// when that conversation is in the directory.
fn resolve_target(me: &str, name: &str, state: Option<&AppState>) -> String {
    let known = |id: &str| state.is_some_and(|s| s.directory.iter().any(|t| t.id == id));
    if is_dm_id(name) || known(name) {
        return name.to_string();
    }
    match dm_target_id(Some(me.to_string()), name.to_string()) {
        Some(dm) if known(&dm) => dm,
        _ => name.to_string(),
    }
}

fn label(kind: &TargetKind, display_name: &str) -> String {
    match kind {
        TargetKind::Public => format!("#{display_name}"),
        TargetKind::Direct { .. } => format!("@{display_name}"),
    }
}

#[derive(Default)]
struct Renderer {
    active: Option<String>,
    printed_seq: u64,
    last_toast: Option<String>,
    state: Option<AppState>,
}

impl Renderer {
    fn render(&mut self, app: &FfiChat, update: AppUpdate) {
        let AppUpdate::FullState(state) = update;

        if let Some(toast) = &state.toast {
            if self.last_toast.as_ref() != Some(toast) {
                eprintln!("! {toast}");
                app.dispatch(AppAction::ClearToast);
            }
        }
        self.last_toast = state.toast.clone();

        if let Some(current) = &state.current_target {
            if self.active.as_deref() != Some(current.id.as_str()) {
                println!("== {} ==", label(&current.kind, &current.display_name));
                self.active = Some(current.id.clone());
                self.printed_seq = 0;
            }
            for m in current.messages.iter() {
                if m.seq > self.printed_seq {
                    println!("[{}] <{}> {}", m.display_time, m.username, m.body);
                    self.printed_seq = m.seq;
                }
            }
        }
        self.state = Some(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatsync_core::TargetSummary;

    fn summary(id: &str, kind: TargetKind, display_name: &str) -> TargetSummary {
        TargetSummary {
            id: id.into(),
            kind,
            display_name: display_name.into(),
            message_count: 0,
            last_message: None,
            last_message_at: None,
            is_active: false,
        }
    }

    #[test]
    fn switch_resolves_user_names_to_known_dms() {
        let mut state = AppState::empty();
        state.directory = vec![
            summary("general", TargetKind::Public, "general"),
            summary(
                "DM_alice_rr",
                TargetKind::Direct {
                    other_user: "alice".into(),
                },
                "alice",
            ),
        ];

        assert_eq!(resolve_target("rr", "general", Some(&state)), "general");
        assert_eq!(resolve_target("rr", "alice", Some(&state)), "DM_alice_rr");
        assert_eq!(resolve_target("rr", "DM_bob_rr", Some(&state)), "DM_bob_rr");
        // Unknown names go through unchanged; the engine ignores them.
        assert_eq!(resolve_target("rr", "nowhere", Some(&state)), "nowhere");
        assert_eq!(resolve_target("rr", "alice", None), "alice");
    }
}
