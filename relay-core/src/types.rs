//! Core value types: chat reference, content kinds, roles, inline controls,
//! and the two inbound action shapes (free text and callback tap).

use serde::{Deserialize, Serialize};

/// Chat (conversation window on the transport side) identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRef {
    pub id: i64,
}

impl ChatRef {
    pub fn new(id: i64) -> Self {
        Self { id }
    }
}

/// Kind of content a message carries. Drives the formatter's type indicator
/// and the model catalog's supported-input check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Image,
    Video,
    Audio,
    Document,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Image => "image",
            ContentKind::Video => "video",
            ContentKind::Audio => "audio",
            ContentKind::Document => "document",
        }
    }

    /// Parses a stored content-type tag; unknown tags fall back to `Text`.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "image" => ContentKind::Image,
            "video" => ContentKind::Video,
            "audio" => ContentKind::Audio,
            "document" => ContentKind::Document,
            _ => ContentKind::Text,
        }
    }

    /// Emoji prefix shown before non-text responses.
    pub fn indicator(&self) -> Option<&'static str> {
        match self {
            ContentKind::Text => None,
            ContentKind::Image => Some("🖼️"),
            ContentKind::Video => Some("🎥"),
            ContentKind::Audio => Some("🎵"),
            ContentKind::Document => Some("📄"),
        }
    }
}

/// Role of a stored chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn from_str(s: &str) -> Self {
        if s == "assistant" {
            Role::Assistant
        } else {
            Role::User
        }
    }
}

/// One tappable inline button: label plus the callback payload it emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub data: String,
}

/// Shorthand constructor used by keyboard builders.
pub fn btn(label: impl Into<String>, data: impl Into<String>) -> Button {
    Button {
        label: label.into(),
        data: data.into(),
    }
}

/// Inline controls attached to a message: rows of buttons.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Controls {
    pub rows: Vec<Vec<Button>>,
}

impl Controls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one row of buttons (builder style).
    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        self.rows.push(buttons);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// An inbound free-text message, already reduced to what the orchestrator needs.
#[derive(Debug, Clone)]
pub struct Incoming {
    /// Transport id of the user's message (reply anchor, regeneration lookup).
    pub message_id: String,
    pub user_id: i64,
    pub chat: ChatRef,
    pub text: String,
}

/// An inbound menu tap: the callback id to answer plus the raw payload to decode.
#[derive(Debug, Clone)]
pub struct CallbackAction {
    pub callback_id: String,
    pub user_id: i64,
    pub chat: ChatRef,
    /// Transport id of the message the tapped controls are attached to.
    pub message_id: String,
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_kind_tag_round_trip() {
        for kind in [
            ContentKind::Text,
            ContentKind::Image,
            ContentKind::Video,
            ContentKind::Audio,
            ContentKind::Document,
        ] {
            assert_eq!(ContentKind::from_tag(kind.as_str()), kind);
        }
        assert_eq!(ContentKind::from_tag("unknown"), ContentKind::Text);
    }

    #[test]
    fn test_controls_builder() {
        let controls = Controls::new()
            .row(vec![btn("A", "a"), btn("B", "b")])
            .row(vec![btn("Back", "back")]);
        assert_eq!(controls.rows.len(), 2);
        assert_eq!(controls.rows[0][1].data, "b");
        assert!(!controls.is_empty());
        assert!(Controls::new().is_empty());
    }
}
