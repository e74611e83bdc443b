//! Row models for the store: user settings, chat threads, stored messages.

use chrono::{DateTime, Utc};
use relay_core::{ContentKind, Role};
use relay_model::GenerationParams;
use serde::{Deserialize, Serialize};

/// Durable per-user settings: selected model+version and generation params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSettings {
    pub model: Option<String>,
    pub version: Option<String>,
    pub params: GenerationParams,
}

impl UserSettings {
    /// True when both a model and a version have been selected.
    pub fn is_complete(&self) -> bool {
        self.model.is_some() && self.version.is_some()
    }
}

/// One chat thread. Soft-deleted rows never appear in queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRecord {
    pub chat_id: i64,
    pub user_id: i64,
    pub title: String,
    pub model: String,
    pub model_version: String,
    pub lang_code: String,
    pub created_at: DateTime<Utc>,
}

/// One stored message of a chat thread.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub message_id: i64,
    pub chat_id: i64,
    pub role: Role,
    pub content: String,
    pub kind: ContentKind,
    pub file_path: Option<String>,
    /// Transport id of the message displaying this content (anchor for
    /// assistant responses), when known.
    pub transport_message_id: Option<String>,
    pub params: Option<GenerationParams>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for [`crate::ChatStore::add_message`].
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub chat_id: i64,
    pub role: Role,
    pub content: String,
    pub kind: ContentKind,
    pub file_path: Option<String>,
    pub transport_message_id: Option<String>,
    pub params: Option<GenerationParams>,
}

impl NewMessage {
    /// A plain text message with no file or params attached.
    pub fn text(chat_id: i64, role: Role, content: impl Into<String>) -> Self {
        Self {
            chat_id,
            role,
            content: content.into(),
            kind: ContentKind::Text,
            file_path: None,
            transport_message_id: None,
            params: None,
        }
    }

    pub fn with_transport_id(mut self, id: impl Into<String>) -> Self {
        self.transport_message_id = Some(id.into());
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = Some(params);
        self
    }
}
