// Directory bootstrap, history backfill and live routing for one session.

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;

use crate::active::ActiveSessionController;
use crate::bridge::{send_command, BackendCommand, CommandBridge, ListenerGuard};
use crate::canonical::canonical_dm_id;
use crate::directory::ChannelDirectory;
use crate::events::{BackendEvent, WireMessage, INIT_CHANNELS, INIT_USERS, RECEIVE_MESSAGE};
use crate::message_log::MessageLog;
use crate::state::{
    format_timestamp, AppState, ChatMessage, SyncPhase, TargetKind, TargetSummary,
    TargetViewState, ViewKind,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum SendError {
    #[error("message body is empty")]
    EmptyBody,
    #[error("unknown conversation: {0}")]
    UnknownTarget(String),
}

pub(crate) struct SyncOptions {
    pub(crate) history_amount: u32,
    pub(crate) request_users_on_mount: bool,
}

pub(crate) struct SyncEngine {
    bridge: Arc<dyn CommandBridge>,
    options: SyncOptions,
    phase: SyncPhase,
    mounted: BTreeSet<ViewKind>,
    directory: ChannelDirectory,
    logs: MessageLog,
    active: ActiveSessionController,
    // Held for the session; dropping the engine releases them.
    directory_listeners: Vec<ListenerGuard>,
    message_listener: Option<ListenerGuard>,
    next_seq: u64,
}

impl SyncEngine {
    pub(crate) fn new(bridge: Arc<dyn CommandBridge>, options: SyncOptions) -> Self {
        Self {
            bridge,
            options,
            phase: SyncPhase::Idle,
            mounted: BTreeSet::new(),
            directory: ChannelDirectory::new(),
            logs: MessageLog::new(),
            active: ActiveSessionController::new(),
            directory_listeners: Vec::new(),
            message_listener: None,
            next_seq: 0,
        }
    }

    pub(crate) fn phase(&self) -> SyncPhase {
        self.phase
    }

    #[cfg(test)]
    pub(crate) fn directory(&self) -> &ChannelDirectory {
        &self.directory
    }

    #[cfg(test)]
    pub(crate) fn logs(&self) -> &MessageLog {
        &self.logs
    }

    #[cfg(test)]
    pub(crate) fn active_id(&self) -> Option<&str> {
        self.active.active_id()
    }

    pub(crate) fn is_listening(&self, event: &str) -> bool {
        self.message_listener
            .iter()
            .chain(self.directory_listeners.iter())
            .any(|l| l.event() == event)
    }

    /// Start syncing the directory behind `view`. Repeated mounts of the same
    /// view are no-ops, so a re-render cannot re-issue the bootstrap.
    pub(crate) fn mount(&mut self, view: ViewKind) -> bool {
        if !self.mounted.insert(view) {
            tracing::debug!(?view, "view already mounted; bootstrap skipped");
            return false;
        }

        let init_event = match view {
            ViewKind::Channels => INIT_CHANNELS,
            ViewKind::DirectMessages => INIT_USERS,
        };
        self.directory_listeners
            .push(ListenerGuard::acquire(&self.bridge, init_event));
        self.request_directory(view);

        if self.phase == SyncPhase::Idle {
            self.phase = SyncPhase::DirectoryRequested;
        }
        if self.message_listener.is_none() {
            self.message_listener = Some(ListenerGuard::acquire(&self.bridge, RECEIVE_MESSAGE));
        }
        self.phase = SyncPhase::Listening;
        tracing::info!(?view, phase = ?self.phase, "view mounted");
        true
    }

    /// Caller-driven re-request of a mounted directory. Listeners are not
    /// touched; upsert idempotency absorbs names that are already known.
    pub(crate) fn refresh(&mut self, view: ViewKind) -> bool {
        if !self.mounted.contains(&view) {
            tracing::debug!(?view, "refresh for unmounted view ignored");
            return false;
        }
        self.request_directory(view);
        true
    }

    fn request_directory(&self, view: ViewKind) {
        match view {
            ViewKind::Channels => {
                send_command(&self.bridge, BackendCommand::RequestChannels);
            }
            ViewKind::DirectMessages if self.options.request_users_on_mount => {
                send_command(&self.bridge, BackendCommand::RequestUsers);
            }
            ViewKind::DirectMessages => {
                tracing::debug!("user list request disabled by config");
            }
        }
    }

    /// Apply an event from a stream we listen on. Returns whether state changed.
    pub(crate) fn handle_event(&mut self, event: BackendEvent, self_user: Option<&str>) -> bool {
        match event {
            BackendEvent::InitChannels(names) => {
                self.apply_directory(ViewKind::Channels, &names, self_user)
            }
            BackendEvent::InitUsers(names) => {
                self.apply_directory(ViewKind::DirectMessages, &names, self_user)
            }
            BackendEvent::ReceiveMessage(msg) => self.route_message(msg),
        }
    }

    fn apply_directory(&mut self, view: ViewKind, names: &[String], self_user: Option<&str>) -> bool {
        let mut created = 0usize;
        // Names are ids exactly as the backend sent them; only blank ones are skipped.
        for name in names.iter().map(String::as_str) {
            if name.trim().is_empty() {
                continue;
            }
            let (id, kind) = match view {
                ViewKind::Channels => (name.to_string(), TargetKind::Public),
                ViewKind::DirectMessages => match canonical_dm_id(self_user, name) {
                    Ok(id) => (
                        id,
                        TargetKind::Direct {
                            other_user: name.to_string(),
                        },
                    ),
                    Err(err) => {
                        tracing::debug!(user = name, %err, "dm entry unavailable this cycle");
                        continue;
                    }
                },
            };

            let (target, is_new) = self.directory.upsert(id, kind, name);
            if !is_new {
                continue;
            }
            created += 1;
            self.logs.open(&target.id);
            self.active.on_target_created(&target.id);
            send_command(
                &self.bridge,
                BackendCommand::RequestHistory {
                    target: target.id.clone(),
                    amount: self.options.history_amount,
                    visibility: target.kind.visibility(),
                },
            );
        }
        tracing::info!(?view, received = names.len(), created, "directory init applied");
        created > 0
    }

    fn route_message(&mut self, msg: WireMessage) -> bool {
        let Some(channel) = msg.channel else {
            tracing::trace!(username = %msg.username, "message without channel dropped");
            return false;
        };
        if self.directory.get(&channel).is_none() {
            tracing::trace!(target_id = %channel, "message for unknown target dropped");
            return false;
        }
        self.next_seq += 1;
        let message = ChatMessage {
            seq: self.next_seq,
            display_time: format_timestamp(msg.timestamp),
            username: msg.username,
            body: msg.body,
            timestamp: msg.timestamp,
            channel: channel.clone(),
        };
        self.logs.append(&channel, message)
    }

    pub(crate) fn switch(&mut self, target_id: &str) -> bool {
        self.active.on_switch_requested(target_id, &self.directory)
    }

    /// Hand an outgoing message to the backend. Nothing is added locally; the
    /// message shows up once the backend echoes it on the live stream.
    pub(crate) fn send_message(&self, target_id: &str, body: &str) -> Result<(), SendError> {
        if body.trim().is_empty() {
            return Err(SendError::EmptyBody);
        }
        let target = self
            .directory
            .get(target_id)
            .ok_or_else(|| SendError::UnknownTarget(target_id.to_string()))?;
        send_command(
            &self.bridge,
            BackendCommand::SendMessage {
                message: body.to_string(),
                target: target.id.clone(),
                visibility: target.kind.visibility(),
            },
        );
        Ok(())
    }

    /// Copy the engine's view of the world into the published snapshot.
    pub(crate) fn project(&self, state: &mut AppState) {
        let active = self.active.active_id();
        state.sync_phase = self.phase;
        state.active_target_id = active.map(str::to_string);
        state.directory = self
            .directory
            .list()
            .map(|t| {
                let last = self.logs.last(&t.id);
                TargetSummary {
                    id: t.id.clone(),
                    kind: t.kind.clone(),
                    display_name: t.display_name.clone(),
                    message_count: u32::try_from(self.logs.len(&t.id)).unwrap_or(u32::MAX),
                    last_message: last.map(|m| m.body.clone()),
                    last_message_at: last.map(|m| m.timestamp),
                    is_active: active == Some(t.id.as_str()),
                }
            })
            .collect();
        state.current_target = active
            .and_then(|id| self.directory.get(id))
            .map(|t| TargetViewState {
                id: t.id.clone(),
                kind: t.kind.clone(),
                display_name: t.display_name.clone(),
                messages: self.logs.history(&t.id).to_vec(),
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::testing::RecordingBridge;
    use crate::state::Visibility;

    fn engine() -> (Arc<RecordingBridge>, SyncEngine) {
        let (recorder, bridge) = RecordingBridge::shared();
        let engine = SyncEngine::new(
            bridge,
            SyncOptions {
                history_amount: 50,
                request_users_on_mount: true,
            },
        );
        (recorder, engine)
    }

    fn live(username: &str, body: &str, timestamp: i64, channel: &str) -> BackendEvent {
        BackendEvent::ReceiveMessage(WireMessage {
            username: username.into(),
            body: body.into(),
            timestamp,
            channel: Some(channel.into()),
        })
    }

    fn channels(names: &[&str]) -> BackendEvent {
        BackendEvent::InitChannels(names.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn mount_bootstraps_once() {
        let (recorder, mut engine) = engine();
        assert_eq!(engine.phase(), SyncPhase::Idle);

        assert!(engine.mount(ViewKind::Channels));
        assert!(!engine.mount(ViewKind::Channels));

        assert_eq!(engine.phase(), SyncPhase::Listening);
        assert_eq!(recorder.commands(), vec![BackendCommand::RequestChannels]);
        let mut listeners = recorder.live_listeners();
        listeners.sort();
        assert_eq!(listeners, vec!["init_channels", "recieve_message"]);
    }

    #[test]
    fn dm_view_shares_the_message_listener() {
        let (recorder, mut engine) = engine();
        engine.mount(ViewKind::Channels);
        engine.mount(ViewKind::DirectMessages);
        assert_eq!(
            recorder.commands(),
            vec![BackendCommand::RequestChannels, BackendCommand::RequestUsers]
        );
        let message_listeners = recorder
            .live_listeners()
            .into_iter()
            .filter(|e| e == RECEIVE_MESSAGE)
            .count();
        assert_eq!(message_listeners, 1);
        assert!(engine.is_listening(INIT_USERS));
    }

    #[test]
    fn user_list_request_can_be_disabled() {
        let (recorder, bridge) = RecordingBridge::shared();
        let mut engine = SyncEngine::new(
            bridge,
            SyncOptions {
                history_amount: 50,
                request_users_on_mount: false,
            },
        );
        engine.mount(ViewKind::DirectMessages);
        assert!(recorder.commands().is_empty());
        assert!(engine.is_listening(INIT_USERS));
        assert_eq!(engine.phase(), SyncPhase::Listening);
    }

    #[test]
    fn init_channels_creates_targets_and_requests_history() {
        let (recorder, mut engine) = engine();
        engine.mount(ViewKind::Channels);
        assert!(engine.handle_event(channels(&["general", "random"]), Some("rr")));

        assert_eq!(
            recorder.history_requests(),
            vec![
                ("general".to_string(), 50, Visibility::Public),
                ("random".to_string(), 50, Visibility::Public),
            ]
        );
        assert_eq!(engine.active_id(), Some("general"));

        // A repeated init does not duplicate targets or history requests.
        assert!(!engine.handle_event(channels(&["general", "random"]), Some("rr")));
        assert_eq!(engine.directory().len(), 2);
        assert_eq!(recorder.history_requests().len(), 2);
    }

    #[test]
    fn live_message_routes_into_matching_log() {
        let (_recorder, mut engine) = engine();
        engine.mount(ViewKind::Channels);
        engine.handle_event(channels(&["general"]), None);
        assert!(engine.handle_event(live("bob", "hi", 1000, "general"), None));

        let history = engine.logs().history("general");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].username, "bob");
        assert_eq!(history[0].body, "hi");
        assert_eq!(history[0].timestamp, 1000);
        assert_eq!(history[0].channel, "general");
        assert_eq!(history[0].seq, 1);
    }

    #[test]
    fn channel_names_keep_backend_spelling() {
        let (recorder, mut engine) = engine();
        engine.mount(ViewKind::Channels);
        engine.handle_event(channels(&["general ", "  "]), None);

        let ids: Vec<&str> = engine.directory().list().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["general "]);
        assert_eq!(
            recorder.history_requests(),
            vec![("general ".to_string(), 50, Visibility::Public)]
        );
        assert!(engine.handle_event(live("bob", "hi", 1, "general "), None));
        assert!(!engine.handle_event(live("bob", "hi", 2, "general"), None));
        assert_eq!(engine.logs().len("general "), 1);
    }

    #[test]
    fn message_for_unknown_target_changes_nothing() {
        let (_recorder, mut engine) = engine();
        engine.mount(ViewKind::Channels);
        engine.handle_event(channels(&["general"]), None);
        assert!(!engine.handle_event(live("bob", "early", 1, "random"), None));
        assert!(engine.logs().history("random").is_empty());
        assert!(engine.logs().history("general").is_empty());
        assert!(!engine.directory().contains("random"));

        let no_channel = BackendEvent::ReceiveMessage(WireMessage {
            username: "bob".into(),
            body: "?".into(),
            timestamp: 1,
            channel: None,
        });
        assert!(!engine.handle_event(no_channel, None));
    }

    #[test]
    fn dm_targets_use_canonical_ids_from_either_side() {
        let (recorder, mut engine) = engine();
        engine.mount(ViewKind::DirectMessages);
        engine.handle_event(BackendEvent::InitUsers(vec!["alice".into()]), Some("rr"));

        let target = engine.directory().get("DM_alice_rr").unwrap().clone();
        assert_eq!(target.display_name, "alice");
        assert_eq!(
            target.kind,
            TargetKind::Direct {
                other_user: "alice".into()
            }
        );
        assert_eq!(
            recorder.history_requests(),
            vec![("DM_alice_rr".to_string(), 50, Visibility::Dm)]
        );

        engine.handle_event(live("alice", "hey rr", 10, "DM_alice_rr"), Some("rr"));
        engine.handle_event(live("rr", "hey alice", 11, "DM_alice_rr"), Some("rr"));
        let senders: Vec<&str> = engine
            .logs()
            .history("DM_alice_rr")
            .iter()
            .map(|m| m.username.as_str())
            .collect();
        assert_eq!(senders, vec!["alice", "rr"]);
    }

    #[test]
    fn missing_identity_skips_dm_entries() {
        let (recorder, mut engine) = engine();
        engine.mount(ViewKind::DirectMessages);
        assert!(!engine.handle_event(BackendEvent::InitUsers(vec!["alice".into()]), None));
        assert!(engine.directory().is_empty());
        assert!(recorder.history_requests().is_empty());

        // Once identity is known the caller re-requests and the entry appears.
        assert!(engine.refresh(ViewKind::DirectMessages));
        assert!(engine.handle_event(BackendEvent::InitUsers(vec!["alice".into()]), Some("rr")));
        assert!(engine.directory().contains("DM_alice_rr"));
    }

    #[test]
    fn refresh_requires_a_mounted_view() {
        let (recorder, mut engine) = engine();
        assert!(!engine.refresh(ViewKind::Channels));
        assert!(recorder.commands().is_empty());
        engine.mount(ViewKind::Channels);
        assert!(engine.refresh(ViewKind::Channels));
        assert_eq!(
            recorder.commands(),
            vec![BackendCommand::RequestChannels, BackendCommand::RequestChannels]
        );
        assert_eq!(recorder.live_listeners().len(), 2);
    }

    #[test]
    fn never_initialized_directory_stays_empty() {
        let (recorder, mut engine) = engine();
        engine.mount(ViewKind::Channels);
        for i in 0..10 {
            engine.handle_event(live("bob", "hello?", i, "general"), None);
        }
        assert!(engine.directory().is_empty());
        assert_eq!(engine.active_id(), None);
        assert_eq!(recorder.commands(), vec![BackendCommand::RequestChannels]);
    }

    #[test]
    fn switch_only_targets_known_entries() {
        let (_recorder, mut engine) = engine();
        engine.mount(ViewKind::Channels);
        engine.handle_event(channels(&["general", "random"]), None);
        assert!(!engine.switch("nowhere"));
        assert!(!engine.directory().contains("nowhere"));
        assert!(engine.switch("random"));
        assert_eq!(engine.active_id(), Some("random"));
    }

    #[test]
    fn send_uses_target_visibility() {
        let (recorder, mut engine) = engine();
        engine.mount(ViewKind::Channels);
        engine.mount(ViewKind::DirectMessages);
        engine.handle_event(channels(&["general"]), Some("rr"));
        engine.handle_event(BackendEvent::InitUsers(vec!["alice".into()]), Some("rr"));

        engine.send_message("general", "hello").unwrap();
        engine.send_message("DM_alice_rr", "psst").unwrap();
        assert_eq!(engine.send_message("general", "   "), Err(SendError::EmptyBody));
        assert_eq!(
            engine.send_message("nowhere", "hi"),
            Err(SendError::UnknownTarget("nowhere".into()))
        );

        let sends: Vec<BackendCommand> = recorder
            .commands()
            .into_iter()
            .filter(|c| matches!(c, BackendCommand::SendMessage { .. }))
            .collect();
        assert_eq!(
            sends,
            vec![
                BackendCommand::SendMessage {
                    message: "hello".into(),
                    target: "general".into(),
                    visibility: Visibility::Public,
                },
                BackendCommand::SendMessage {
                    message: "psst".into(),
                    target: "DM_alice_rr".into(),
                    visibility: Visibility::Dm,
                },
            ]
        );
        // No local echo.
        assert!(engine.logs().history("general").is_empty());
    }

    #[test]
    fn dropping_engine_releases_listeners() {
        let (recorder, mut engine) = engine();
        engine.mount(ViewKind::Channels);
        engine.mount(ViewKind::DirectMessages);
        assert_eq!(recorder.live_listeners().len(), 3);
        drop(engine);
        assert!(recorder.live_listeners().is_empty());
    }

    #[test]
    fn projection_reflects_directory_and_active_view() {
        let (_recorder, mut engine) = engine();
        engine.mount(ViewKind::Channels);
        engine.handle_event(channels(&["general", "random"]), None);
        engine.handle_event(live("bob", "hi", 1000, "general"), None);

        let mut state = AppState::empty();
        engine.project(&mut state);
        assert_eq!(state.sync_phase, SyncPhase::Listening);
        assert_eq!(state.active_target_id.as_deref(), Some("general"));
        assert_eq!(state.directory.len(), 2);
        assert!(state.directory[0].is_active);
        assert_eq!(state.directory[0].message_count, 1);
        assert_eq!(state.directory[0].last_message.as_deref(), Some("hi"));
        assert!(!state.directory[1].is_active);
        let current = state.current_target.unwrap();
        assert_eq!(current.id, "general");
        assert_eq!(current.messages.len(), 1);
    }
}
