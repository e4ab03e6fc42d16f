mod actions;
mod active;
mod bridge;
mod canonical;
mod core;
mod directory;
mod events;
mod logging;
mod message_log;
mod state;
mod updates;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;

use flume::{Receiver, Sender};

pub use actions::AppAction;
pub use active::{ActiveSessionController, ActiveTarget};
pub use bridge::{BackendCommand, CommandBridge, CommandResult};
pub use canonical::{canonical_dm_id, is_dm_id, CanonicalizeError, DM_PREFIX};
pub use directory::ChannelDirectory;
pub use events::{BackendEvent, EventError, WireMessage, INIT_CHANNELS, INIT_USERS, RECEIVE_MESSAGE};
pub use message_log::MessageLog;
pub use state::*;
pub use updates::*;

/// Canonical DM target id for hosts, or `None` while our own identity is unknown.
#[uniffi::export]
pub fn dm_target_id(self_user: Option<String>, other_user: String) -> Option<String> {
    canonical_dm_id(self_user.as_deref(), &other_user).ok()
}

#[uniffi::export]
pub fn display_timestamp(timestamp: i64) -> String {
    format_timestamp(timestamp)
}

uniffi::setup_scaffolding!();

#[uniffi::export(callback_interface)]
pub trait AppReconciler: Send + Sync + 'static {
    fn reconcile(&self, update: AppUpdate);
}

#[derive(uniffi::Object)]
pub struct FfiChat {
    core_tx: Sender<CoreMsg>,
    update_rx: Receiver<AppUpdate>,
    listening: AtomicBool,
    shared_state: Arc<RwLock<AppState>>,
}

#[uniffi::export]
impl FfiChat {
    #[uniffi::constructor]
    pub fn new(data_dir: String, bridge: Box<dyn CommandBridge>) -> Arc<Self> {
        let config = crate::core::load_app_config(&data_dir);
        logging::init_logging(&data_dir, config.log_to_file());
        tracing::info!(data_dir = %data_dir, "FfiChat::new() starting");

        let (update_tx, update_rx) = flume::unbounded();
        let (core_tx, core_rx) = flume::unbounded::<CoreMsg>();
        let shared_state = Arc::new(RwLock::new(AppState::empty()));
        let bridge: Arc<dyn CommandBridge> = Arc::from(bridge);

        // Actor loop thread (single threaded "chat actor"). It exits once every
        // FfiChat handle is gone, dropping the session and its listeners.
        let shared_for_core = shared_state.clone();
        thread::spawn(move || {
            let mut core =
                crate::core::ChatCore::new(update_tx, shared_for_core, bridge, config);
            while let Ok(msg) = core_rx.recv() {
                core.handle_message(msg);
            }
            tracing::info!("chat actor stopped");
        });

        Arc::new(Self {
            core_tx,
            update_rx,
            listening: AtomicBool::new(false),
            shared_state,
        })
    }

    pub fn state(&self) -> AppState {
        match self.shared_state.read() {
            Ok(g) => g.clone(),
            Err(poison) => poison.into_inner().clone(),
        }
    }

    pub fn dispatch(&self, action: AppAction) {
        // Contract: never block caller.
        let _ = self.core_tx.send(CoreMsg::Action(action));
    }

    /// Entry point for the backend's named event streams.
    pub fn deliver_event(&self, event: String, payload_json: String) {
        let _ = self.core_tx.send(CoreMsg::Internal(Box::new(
            InternalEvent::BackendEvent {
                event,
                payload_json,
            },
        )));
    }

    pub fn listen_for_updates(&self, reconciler: Box<dyn AppReconciler>) {
        if self
            .listening
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // Avoid multiple listeners that would split updates.
            return;
        }

        let rx = self.update_rx.clone();
        thread::spawn(move || {
            while let Ok(update) = rx.recv() {
                reconciler.reconcile(update);
            }
        });
    }
}
