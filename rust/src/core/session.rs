// Session lifecycle: connect, attach, identity, teardown.

use anyhow::Context;

use super::*;
use crate::bridge::{send_command, BackendCommand};

impl ChatCore {
    pub(super) fn connect(
        &mut self,
        ip: String,
        username: String,
        password: String,
    ) -> anyhow::Result<()> {
        // Tear down any existing session first.
        self.stop_session();
        self.state.auth = AuthState::LoggedOut;

        tracing::info!(ip = %ip, username = %username, "connect");
        self.set_busy(|b| b.connecting = true);
        let result = send_command(
            &self.bridge,
            BackendCommand::ConnectServer {
                ip: ip.clone(),
                username: username.clone(),
                password,
            },
        );
        self.set_busy(|b| b.connecting = false);

        if !result.ok {
            let reason = result.error.unwrap_or_else(|| "unknown error".to_string());
            return Err(anyhow::anyhow!(reason)).with_context(|| format!("connect to {ip}"));
        }
        self.start_session(Some(username));
        Ok(())
    }

    pub(super) fn start_session(&mut self, username: Option<String>) {
        self.stop_session();

        tracing::info!(username = ?username, "start_session");
        let sync = SyncEngine::new(self.bridge.clone(), self.sync_options());
        self.session = Some(Session {
            username: username.clone(),
            sync,
        });
        self.state.auth = logged_in(username);
        self.emit_state();
    }

    pub(super) fn resolve_identity(&mut self, username: String) {
        let username = username.trim().to_string();
        let Some(sess) = self.session.as_mut() else {
            tracing::debug!("identity outside a session ignored");
            return;
        };
        if username.is_empty() || sess.username.is_some() {
            tracing::debug!("identity already established or empty; ignored");
            return;
        }
        tracing::info!(username = %username, "identity resolved");
        sess.username = Some(username.clone());
        self.state.auth = logged_in(Some(username));
        self.emit_state();
    }

    pub(super) fn stop_session(&mut self) {
        // Dropping the engine releases every listener it registered.
        if let Some(sess) = self.session.take() {
            tracing::info!(username = ?sess.username, "stop_session");
        }
        reset_sync_view(&mut self.state);
    }

    pub(super) fn logout(&mut self) {
        self.stop_session();
        self.state.auth = AuthState::LoggedOut;
        self.state.busy = BusyState::idle();
        self.state.toast = None;
        self.emit_state();
    }
}
