//! Line-delimited JSON frames spoken by the chat server.

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Message {
    Text(TextMessage),
    File(FileMessage),
    Command(CommandMessage),
    Auth(AuthMessage),
    Info(InfoMessage),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TextMessage {
    pub username: String,
    pub auth_token: String,
    pub body: String,
    pub channel: String,
    pub embed_pointer: Option<usize>,
    pub embed_type: Option<String>,
    pub message_id: Option<u32>,
    pub timestamp: u64,
}

/// Attachment upload. Decoded so it is not mistaken for garbage, then ignored.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FileMessage {
    pub username: String,
    pub auth_token: String,
    pub filename: String,
    pub data: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CommandMessage {
    pub username: String,
    pub auth_token: String,
    pub command_type: String,
    pub args: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AuthMessage {
    pub username: String,
    pub auth_token: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct InfoMessage {
    pub header: String,
    pub data: String,
}

/// Serialize a frame with its trailing newline.
pub fn encode(message: &Message) -> serde_json::Result<String> {
    Ok(serde_json::to_string(message)? + "\n")
}

/// Map an inbound frame to the named event stream it belongs to.
///
/// Returns `None` for frames the engine has no stream for.
pub fn to_event(message: Message) -> Option<(&'static str, String)> {
    match message {
        Message::Text(text) => {
            let payload = serde_json::json!({
                "username": text.username,
                "body": text.body,
                "timestamp": text.timestamp,
                "channel": text.channel,
            });
            Some((chatsync_core::RECEIVE_MESSAGE, payload.to_string()))
        }
        // The server terminates some headers with a newline.
        Message::Info(info) => match info.header.trim() {
            "channels" => Some((chatsync_core::INIT_CHANNELS, info.data)),
            "users" => Some((chatsync_core::INIT_USERS, info.data)),
            _ => None,
        },
        Message::File(_) | Message::Auth(_) | Message::Command(_) => None,
    }
}
