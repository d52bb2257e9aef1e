use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub sender: String,
    pub text: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl ChatMessage {
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender: sender.into(),
            text: text.into(),
            timestamp: now_millis(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawStroke {
    pub tool: String,
    pub color: String,
    pub width: f64,
    pub from: Point,
    pub to: Point,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: String,
    pub text: String,
    pub timestamp: i64,
}

impl TranscriptEntry {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
            timestamp: now_millis(),
        }
    }
}

/// Announces a file whose bytes follow as binary frames on the same channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
}

impl FileInfo {
    pub fn new(name: impl Into<String>, size: u64, mime_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            size,
            mime_type: mime_type.into(),
        }
    }
}

/// Structured message carried as JSON text on a peer's data channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    #[serde(rename = "chat")]
    Chat(ChatMessage),
    #[serde(rename = "reaction")]
    Reaction { emoji: String },
    #[serde(rename = "handRaise")]
    HandRaise { raised: bool },
    #[serde(rename = "whiteboard-draw")]
    WhiteboardDraw(DrawStroke),
    #[serde(rename = "whiteboard-clear")]
    WhiteboardClear,
    #[serde(rename = "transcription")]
    Transcription { entry: TranscriptEntry },
    #[serde(rename = "file-info")]
    FileInfo(FileInfo),
}

impl ControlMessage {
    pub fn tag(&self) -> &'static str {
        match self {
            ControlMessage::Chat(_) => "chat",
            ControlMessage::Reaction { .. } => "reaction",
            ControlMessage::HandRaise { .. } => "handRaise",
            ControlMessage::WhiteboardDraw(_) => "whiteboard-draw",
            ControlMessage::WhiteboardClear => "whiteboard-clear",
            ControlMessage::Transcription { .. } => "transcription",
            ControlMessage::FileInfo(_) => "file-info",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parses an inbound frame. `None` means the frame is not a control
    /// message and belongs to the binary sub-protocol.
    pub fn parse(data: &[u8]) -> Option<Self> {
        serde_json::from_slice(data).ok()
    }
}
