//! Chat store: persistence and queries for users, chat threads, and messages.
//!
//! Uses [`SqlitePoolManager`] and the row models. Generation parameters are
//! persisted as JSON and clamped to their configured ranges on write, so a
//! malformed or out-of-range value can never reach a model call.

use crate::models::{ChatRecord, NewMessage, StoredMessage, UserSettings};
use crate::sqlite_pool::SqlitePoolManager;
use chrono::{DateTime, Utc};
use relay_core::{ContentKind, Role};
use relay_model::GenerationParams;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Not found: {0}")]
    NotFound(String),
}

#[derive(Clone)]
pub struct ChatStore {
    pool_manager: SqlitePoolManager,
}

type ChatRow = (i64, i64, String, String, String, String, DateTime<Utc>);
type MessageRow = (
    i64,
    i64,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    DateTime<Utc>,
);

impl ChatStore {
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        let pool_manager = SqlitePoolManager::new(database_url).await?;
        let store = Self { pool_manager };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<(), StorageError> {
        info!("Creating database tables if not exist");

        let pool = self.pool_manager.pool();

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY,
                selected_model TEXT,
                model_version TEXT,
                model_params TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chats (
                chat_id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                model TEXT NOT NULL,
                model_version TEXT NOT NULL,
                lang_code TEXT NOT NULL DEFAULT 'en-US',
                is_deleted INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(user_id)
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                message_id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id INTEGER NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                content_type TEXT NOT NULL DEFAULT 'text',
                file_path TEXT,
                transport_message_id TEXT,
                model_params TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (chat_id) REFERENCES chats(chat_id)
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_chats_user_id ON chats(user_id);
            CREATE INDEX IF NOT EXISTS idx_messages_chat_id ON messages(chat_id);
            CREATE INDEX IF NOT EXISTS idx_messages_transport_id ON messages(transport_message_id);
            "#,
        )
        .execute(pool)
        .await?;

        info!("Database tables created successfully");
        Ok(())
    }

    /// Creates the user row on first interaction; later calls are no-ops.
    pub async fn ensure_user(&self, user_id: i64) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO users (user_id, created_at) VALUES (?, ?) \
             ON CONFLICT(user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(Utc::now())
        .execute(self.pool_manager.pool())
        .await?;
        Ok(())
    }

    /// Returns the user's durable settings. An unknown user gets empty
    /// model/version and default parameters.
    pub async fn get_user_settings(&self, user_id: i64) -> Result<UserSettings, StorageError> {
        let row: Option<(Option<String>, Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT selected_model, model_version, model_params FROM users WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(self.pool_manager.pool())
        .await?;

        let Some((model, version, params_json)) = row else {
            return Ok(UserSettings {
                model: None,
                version: None,
                params: GenerationParams::defaults(),
            });
        };

        let params = match params_json {
            Some(json) => GenerationParams::from_json(&json),
            None => GenerationParams::defaults(),
        };

        Ok(UserSettings {
            model,
            version,
            params,
        })
    }

    pub async fn update_user_model(
        &self,
        user_id: i64,
        model: &str,
        version: &str,
    ) -> Result<(), StorageError> {
        self.ensure_user(user_id).await?;
        sqlx::query("UPDATE users SET selected_model = ?, model_version = ? WHERE user_id = ?")
            .bind(model)
            .bind(version)
            .bind(user_id)
            .execute(self.pool_manager.pool())
            .await?;
        Ok(())
    }

    /// Persists generation parameters, clamped and rounded per spec so the
    /// stored value always matches what the menus display.
    pub async fn update_user_params(
        &self,
        user_id: i64,
        params: &GenerationParams,
    ) -> Result<(), StorageError> {
        self.ensure_user(user_id).await?;
        let mut clamped = params.clone();
        for spec in relay_model::PARAMETERS {
            if let Some(value) = clamped.get(spec.name) {
                clamped.set(spec.name, value);
            }
        }
        sqlx::query("UPDATE users SET model_params = ? WHERE user_id = ?")
            .bind(clamped.to_json())
            .bind(user_id)
            .execute(self.pool_manager.pool())
            .await?;
        Ok(())
    }

    pub async fn create_chat(
        &self,
        user_id: i64,
        title: &str,
        model: &str,
        version: &str,
    ) -> Result<i64, StorageError> {
        self.ensure_user(user_id).await?;
        let result = sqlx::query(
            r#"
            INSERT INTO chats (user_id, title, model, model_version, lang_code, created_at)
            VALUES (?, ?, ?, ?, 'en-US', ?)
            "#,
        )
        .bind(user_id)
        .bind(title)
        .bind(model)
        .bind(version)
        .bind(Utc::now())
        .execute(self.pool_manager.pool())
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// The user's live chats, newest first.
    pub async fn get_user_chats(&self, user_id: i64) -> Result<Vec<ChatRecord>, StorageError> {
        let rows: Vec<ChatRow> = sqlx::query_as(
            r#"
            SELECT chat_id, user_id, title, model, model_version, lang_code, created_at
            FROM chats
            WHERE user_id = ? AND is_deleted = 0
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool_manager.pool())
        .await?;
        Ok(rows.into_iter().map(chat_from_row).collect())
    }

    pub async fn get_chat_info(&self, chat_id: i64) -> Result<Option<ChatRecord>, StorageError> {
        let row: Option<ChatRow> = sqlx::query_as(
            r#"
            SELECT chat_id, user_id, title, model, model_version, lang_code, created_at
            FROM chats
            WHERE chat_id = ? AND is_deleted = 0
            "#,
        )
        .bind(chat_id)
        .fetch_optional(self.pool_manager.pool())
        .await?;
        Ok(row.map(chat_from_row))
    }

    pub async fn update_chat_title(&self, chat_id: i64, title: &str) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE chats SET title = ? WHERE chat_id = ? AND is_deleted = 0")
            .bind(title)
            .bind(chat_id)
            .execute(self.pool_manager.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("chat {}", chat_id)));
        }
        Ok(())
    }

    /// Soft delete: the chat disappears from queries but rows are kept.
    pub async fn delete_chat(&self, chat_id: i64) -> Result<(), StorageError> {
        sqlx::query("UPDATE chats SET is_deleted = 1 WHERE chat_id = ?")
            .bind(chat_id)
            .execute(self.pool_manager.pool())
            .await?;
        Ok(())
    }

    pub async fn update_chat_language(
        &self,
        chat_id: i64,
        lang_code: &str,
    ) -> Result<(), StorageError> {
        sqlx::query("UPDATE chats SET lang_code = ? WHERE chat_id = ?")
            .bind(lang_code)
            .bind(chat_id)
            .execute(self.pool_manager.pool())
            .await?;
        Ok(())
    }

    pub async fn add_message(&self, message: NewMessage) -> Result<i64, StorageError> {
        let result = sqlx::query(
            r#"
            INSERT INTO messages
                (chat_id, role, content, content_type, file_path, transport_message_id,
                 model_params, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(message.chat_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.kind.as_str())
        .bind(&message.file_path)
        .bind(&message.transport_message_id)
        .bind(message.params.as_ref().map(|p| p.to_json()))
        .bind(Utc::now())
        .execute(self.pool_manager.pool())
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// All messages of a chat, oldest first.
    pub async fn get_chat_history(&self, chat_id: i64) -> Result<Vec<StoredMessage>, StorageError> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"
            SELECT message_id, chat_id, role, content, content_type, file_path,
                   transport_message_id, model_params, created_at
            FROM messages
            WHERE chat_id = ?
            ORDER BY message_id ASC
            "#,
        )
        .bind(chat_id)
        .fetch_all(self.pool_manager.pool())
        .await?;
        Ok(rows.into_iter().map(message_from_row).collect())
    }

    pub async fn get_message_by_transport_id(
        &self,
        transport_message_id: &str,
    ) -> Result<Option<StoredMessage>, StorageError> {
        let row: Option<MessageRow> = sqlx::query_as(
            r#"
            SELECT message_id, chat_id, role, content, content_type, file_path,
                   transport_message_id, model_params, created_at
            FROM messages
            WHERE transport_message_id = ?
            ORDER BY message_id DESC
            "#,
        )
        .bind(transport_message_id)
        .fetch_optional(self.pool_manager.pool())
        .await?;
        Ok(row.map(message_from_row))
    }
}

fn chat_from_row(row: ChatRow) -> ChatRecord {
    let (chat_id, user_id, title, model, model_version, lang_code, created_at) = row;
    ChatRecord {
        chat_id,
        user_id,
        title,
        model,
        model_version,
        lang_code,
        created_at,
    }
}

fn message_from_row(row: MessageRow) -> StoredMessage {
    let (
        message_id,
        chat_id,
        role,
        content,
        content_type,
        file_path,
        transport_message_id,
        params_json,
        created_at,
    ) = row;
    StoredMessage {
        message_id,
        chat_id,
        role: Role::from_str(&role),
        content,
        kind: ContentKind::from_tag(&content_type),
        file_path,
        transport_message_id,
        params: params_json.map(|json| GenerationParams::from_json(&json)),
        created_at,
    }
}
