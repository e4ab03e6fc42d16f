use crate::state::ViewKind;

#[derive(uniffi::Enum, Debug, Clone)]
pub enum AppAction {
    // Session
    Connect {
        ip: String,
        username: String,
        password: String,
    },
    AttachSession {
        username: Option<String>,
    },
    IdentityResolved {
        username: String,
    },
    Logout,

    // Directory sync
    MountView {
        view: ViewKind,
    },
    RefreshDirectory {
        view: ViewKind,
    },

    // Chat
    SwitchTarget {
        target_id: String,
    },
    SendMessage {
        target_id: String,
        body: String,
    },

    // UI
    ClearToast,
}

impl AppAction {
    /// Log-safe action tag (never includes the password).
    pub fn tag(&self) -> &'static str {
        match self {
            // Session
            AppAction::Connect { .. } => "Connect",
            AppAction::AttachSession { .. } => "AttachSession",
            AppAction::IdentityResolved { .. } => "IdentityResolved",
            AppAction::Logout => "Logout",

            // Directory sync
            AppAction::MountView { .. } => "MountView",
            AppAction::RefreshDirectory { .. } => "RefreshDirectory",

            // Chat
            AppAction::SwitchTarget { .. } => "SwitchTarget",
            AppAction::SendMessage { .. } => "SendMessage",

            // UI
            AppAction::ClearToast => "ClearToast",
        }
    }
}
