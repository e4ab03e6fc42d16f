#[derive(uniffi::Record, Clone, Debug)]
pub struct AppState {
    pub rev: u64,
    pub auth: AuthState,
    pub busy: BusyState,
    pub sync_phase: SyncPhase,
    pub directory: Vec<TargetSummary>,
    pub active_target_id: Option<String>,
    pub current_target: Option<TargetViewState>,
    pub toast: Option<String>,
}

impl AppState {
    pub fn empty() -> Self {
        Self {
            rev: 0,
            auth: AuthState::LoggedOut,
            busy: BusyState::idle(),
            sync_phase: SyncPhase::Idle,
            directory: vec![],
            active_target_id: None,
            current_target: None,
            toast: None,
        }
    }
}

#[derive(uniffi::Enum, Clone, Debug, PartialEq, Eq)]
pub enum AuthState {
    LoggedOut,
    LoggedIn {
        /// `None` until the outer login flow tells us who we are.
        username: Option<String>,
    },
}

/// "In flight" flags for operations the UI should reflect.
#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct BusyState {
    pub connecting: bool,
}

impl BusyState {
    pub fn idle() -> Self {
        Self { connecting: false }
    }
}

/// Startup progress of the directory sync for the current session.
#[derive(uniffi::Enum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    DirectoryRequested,
    Listening,
}

/// Which directory a UI view shows.
#[derive(uniffi::Enum, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ViewKind {
    Channels,
    DirectMessages,
}

impl ViewKind {
    pub fn visibility(self) -> Visibility {
        match self {
            ViewKind::Channels => Visibility::Public,
            ViewKind::DirectMessages => Visibility::Dm,
        }
    }
}

/// Wire-level audience marker sent alongside history and send commands.
#[derive(uniffi::Enum, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Dm,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Dm => "dm",
        }
    }
}

#[derive(uniffi::Enum, Clone, Debug, PartialEq, Eq)]
pub enum TargetKind {
    Public,
    Direct { other_user: String },
}

impl TargetKind {
    pub fn visibility(&self) -> Visibility {
        match self {
            TargetKind::Public => Visibility::Public,
            TargetKind::Direct { .. } => Visibility::Dm,
        }
    }
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub id: String,
    pub kind: TargetKind,
    pub display_name: String,
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    /// Session-wide arrival order. Backfill and live delivery share one
    /// stream, so this is the only marker of when a message showed up.
    pub seq: u64,
    pub username: String,
    pub body: String,
    pub timestamp: i64,
    pub channel: String,
    pub display_time: String,
}

#[derive(uniffi::Record, Clone, Debug)]
pub struct TargetSummary {
    pub id: String,
    pub kind: TargetKind,
    pub display_name: String,
    pub message_count: u32,
    pub last_message: Option<String>,
    pub last_message_at: Option<i64>,
    pub is_active: bool,
}

#[derive(uniffi::Record, Clone, Debug)]
pub struct TargetViewState {
    pub id: String,
    pub kind: TargetKind,
    pub display_name: String,
    pub messages: Vec<ChatMessage>,
}

/// Render a sender timestamp (seconds) as local `YYYY-MM-DD HH:MM:SS`.
///
/// Out-of-range values render as an empty string rather than failing.
pub fn format_timestamp(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .map(|dt| {
            dt.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_default()
}
