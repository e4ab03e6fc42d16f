use std::sync::Arc;

use crate::state::Visibility;

/// Named commands the core issues to the backend host.
#[derive(uniffi::Enum, Clone, Debug, PartialEq, Eq)]
pub enum BackendCommand {
    ConnectServer {
        ip: String,
        username: String,
        password: String,
    },
    RequestChannels,
    RequestUsers,
    RequestHistory {
        target: String,
        amount: u32,
        visibility: Visibility,
    },
    SendMessage {
        message: String,
        target: String,
        visibility: Visibility,
    },
}

impl BackendCommand {
    /// Wire name of the command. Also the log-safe tag (never includes the password).
    pub fn name(&self) -> &'static str {
        match self {
            BackendCommand::ConnectServer { .. } => "connect_server",
            BackendCommand::RequestChannels => "request_channels",
            BackendCommand::RequestUsers => "request_users",
            BackendCommand::RequestHistory { .. } => "request_history",
            BackendCommand::SendMessage { .. } => "send_message",
        }
    }
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct CommandResult {
    pub ok: bool,
    pub error: Option<String>,
}

impl CommandResult {
    pub fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
        }
    }
}

/// Host side of the command/event bridge.
///
/// `invoke` is fire-and-forget for everything except `connect_server`; replies
/// arrive later as named events through `FfiChat::deliver_event`, and only for
/// streams with a live listener.
#[uniffi::export(callback_interface)]
pub trait CommandBridge: Send + Sync + 'static {
    fn invoke(&self, command: BackendCommand) -> CommandResult;
    fn listen(&self, event: String) -> u64;
    fn unlisten(&self, listener_id: u64);
}

pub(crate) fn send_command(bridge: &Arc<dyn CommandBridge>, command: BackendCommand) -> CommandResult {
    let name = command.name();
    let result = bridge.invoke(command);
    if result.ok {
        tracing::debug!(command = name, "command issued");
    } else {
        tracing::warn!(command = name, error = ?result.error, "command rejected by host");
    }
    result
}

/// A registered event listener, released when dropped.
pub(crate) struct ListenerGuard {
    bridge: Arc<dyn CommandBridge>,
    event: String,
    id: u64,
}

impl ListenerGuard {
    pub(crate) fn acquire(bridge: &Arc<dyn CommandBridge>, event: &str) -> Self {
        let id = bridge.listen(event.to_string());
        tracing::debug!(event, listener_id = id, "listener registered");
        Self {
            bridge: bridge.clone(),
            event: event.to_string(),
            id,
        }
    }

    pub(crate) fn event(&self) -> &str {
        &self.event
    }
}

impl std::fmt::Debug for ListenerGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerGuard")
            .field("event", &self.event)
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.bridge.unlisten(self.id);
        tracing::debug!(event = %self.event, listener_id = self.id, "listener released");
    }
}
