mod config;
mod session;
mod sync;

use std::sync::{Arc, RwLock};

use flume::Sender;

use crate::actions::AppAction;
use crate::bridge::CommandBridge;
use crate::events::BackendEvent;
use crate::state::{AppState, AuthState, BusyState, SyncPhase};
use crate::updates::{AppUpdate, CoreMsg, InternalEvent};

pub(crate) use config::{load_app_config, AppConfig};
use sync::{SendError, SyncEngine, SyncOptions};

struct Session {
    // Set once; `None` until the login flow hands it to us.
    username: Option<String>,
    sync: SyncEngine,
}

pub struct ChatCore {
    pub state: AppState,
    rev: u64,

    update_sender: Sender<AppUpdate>,
    shared_state: Arc<RwLock<AppState>>,
    bridge: Arc<dyn CommandBridge>,
    config: AppConfig,

    session: Option<Session>,
}

impl ChatCore {
    pub(crate) fn new(
        update_sender: Sender<AppUpdate>,
        shared_state: Arc<RwLock<AppState>>,
        bridge: Arc<dyn CommandBridge>,
        config: AppConfig,
    ) -> Self {
        let this = Self {
            state: AppState::empty(),
            rev: 0,
            update_sender,
            shared_state,
            bridge,
            config,
            session: None,
        };
        // Ensure FfiChat.state() has an immediately-available snapshot.
        let snapshot = this.state.clone();
        this.commit_state_snapshot(&snapshot);
        this
    }

    fn next_rev(&mut self) -> u64 {
        self.rev += 1;
        self.state.rev = self.rev;
        self.rev
    }

    fn commit_state_snapshot(&self, snapshot: &AppState) {
        match self.shared_state.write() {
            Ok(mut g) => *g = snapshot.clone(),
            Err(poison) => *poison.into_inner() = snapshot.clone(),
        }
    }

    fn emit_state(&mut self) {
        if let Some(sess) = self.session.as_ref() {
            sess.sync.project(&mut self.state);
        }
        self.next_rev();
        let snapshot = self.state.clone();
        self.commit_state_snapshot(&snapshot);
        let _ = self.update_sender.send(AppUpdate::FullState(snapshot));
    }

    fn toast(&mut self, msg: impl Into<String>) {
        // Stays in state until the UI clears it, so a resync still shows it.
        self.state.toast = Some(msg.into());
        self.emit_state();
    }

    fn set_busy(&mut self, f: impl FnOnce(&mut BusyState)) {
        let mut next = self.state.busy.clone();
        f(&mut next);
        if next != self.state.busy {
            self.state.busy = next;
            self.emit_state();
        }
    }

    fn self_user(&self) -> Option<&str> {
        self.session.as_ref().and_then(|s| s.username.as_deref())
    }

    pub fn handle_message(&mut self, msg: CoreMsg) {
        match msg {
            CoreMsg::Action(ref action) => {
                // Never log `?action` directly: `Connect` carries a password.
                tracing::info!(action = action.tag(), "dispatch");
                self.handle_action(action.clone());
            }
            CoreMsg::Internal(internal) => self.handle_internal(*internal),
        }
    }

    fn handle_internal(&mut self, internal: InternalEvent) {
        match internal {
            InternalEvent::BackendEvent {
                event,
                payload_json,
            } => {
                let Some(sess) = self.session.as_ref() else {
                    tracing::trace!(event = %event, "event outside a session dropped");
                    return;
                };
                if !sess.sync.is_listening(&event) {
                    tracing::trace!(event = %event, "event without listener dropped");
                    return;
                }
                let parsed = match BackendEvent::parse(&event, &payload_json) {
                    Ok(parsed) => parsed,
                    Err(err) => {
                        tracing::warn!(%err, "backend event dropped");
                        return;
                    }
                };
                let self_user = self.self_user().map(str::to_string);
                let changed = match self.session.as_mut() {
                    Some(sess) => sess.sync.handle_event(parsed, self_user.as_deref()),
                    None => false,
                };
                if changed {
                    self.emit_state();
                }
            }
        }
    }

    fn handle_action(&mut self, action: AppAction) {
        match action {
            AppAction::Connect {
                ip,
                username,
                password,
            } => {
                if let Err(err) = self.connect(ip, username, password) {
                    tracing::warn!(%err, "connect failed");
                    self.toast(format!("Connection failed: {err:#}"));
                }
            }
            AppAction::AttachSession { username } => {
                let username = username
                    .map(|u| u.trim().to_string())
                    .filter(|u| !u.is_empty());
                self.start_session(username);
            }
            AppAction::IdentityResolved { username } => {
                self.resolve_identity(username);
            }
            AppAction::Logout => self.logout(),
            AppAction::MountView { view } => {
                let Some(sess) = self.session.as_mut() else {
                    tracing::debug!(?view, "mount before session ignored");
                    return;
                };
                if sess.sync.mount(view) {
                    self.emit_state();
                }
            }
            AppAction::RefreshDirectory { view } => {
                if let Some(sess) = self.session.as_mut() {
                    sess.sync.refresh(view);
                }
            }
            AppAction::SwitchTarget { target_id } => {
                let switched = self
                    .session
                    .as_mut()
                    .map(|s| s.sync.switch(&target_id))
                    .unwrap_or(false);
                if switched {
                    self.emit_state();
                }
            }
            AppAction::SendMessage { target_id, body } => {
                let Some(sess) = self.session.as_ref() else {
                    tracing::debug!("send outside a session ignored");
                    return;
                };
                match sess.sync.send_message(&target_id, &body) {
                    Ok(()) => {}
                    Err(SendError::EmptyBody) => {
                        tracing::debug!(target_id = %target_id, "empty message ignored");
                    }
                    Err(err @ SendError::UnknownTarget(_)) => {
                        self.toast(err.to_string());
                    }
                }
            }
            AppAction::ClearToast => {
                if self.state.toast.take().is_some() {
                    self.emit_state();
                }
            }
        }
    }

    fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            history_amount: self.config.history_amount(),
            request_users_on_mount: self.config.request_users_on_mount(),
        }
    }

    #[cfg(test)]
    fn sync(&self) -> Option<&SyncEngine> {
        self.session.as_ref().map(|s| &s.sync)
    }

    #[cfg(test)]
    fn phase(&self) -> SyncPhase {
        self.sync().map(SyncEngine::phase).unwrap_or(SyncPhase::Idle)
    }
}

// Clear session-derived view state when no session is running.
fn reset_sync_view(state: &mut AppState) {
    state.sync_phase = SyncPhase::Idle;
    state.directory.clear();
    state.active_target_id = None;
    state.current_target = None;
}

fn logged_in(username: Option<String>) -> AuthState {
    AuthState::LoggedIn { username }
}
