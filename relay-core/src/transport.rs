//! Transport abstraction for delivering messages, plus the Telegram implementation.
//!
//! [`Transport`] is transport-agnostic; [`TelegramTransport`] maps it onto
//! teloxide. Every method returns the typed [`TransportError`] taxonomy so
//! callers (the delivery engine above all) can branch on failure kind.

use crate::error::TransportError;
use crate::types::{ChatRef, Controls};
use async_trait::async_trait;
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQueryId, ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId,
    ParseMode, ReplyParameters,
};

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Abstraction over the messenger client. Message ids are transport-specific
/// strings (Telegram: numeric). All calls are awaited and may fail with any
/// [`TransportError`] variant; callers decide recovery.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a message and returns its transport id.
    async fn send_message(&self, chat: &ChatRef, text: &str) -> TransportResult<String>;

    /// Sends a reply to an existing message, returning the new message id.
    async fn reply_to(&self, chat: &ChatRef, reply_to: &str, text: &str)
        -> TransportResult<String>;

    /// Sends a message with controls attached; returns the new message id.
    async fn send_menu(
        &self,
        chat: &ChatRef,
        text: &str,
        controls: &Controls,
    ) -> TransportResult<String>;

    /// Edits a message's text. Editing without controls clears any attached controls.
    async fn edit_message(&self, chat: &ChatRef, message_id: &str, text: &str)
        -> TransportResult<()>;

    /// Edits a message's text and controls in one operation (menu views).
    async fn edit_menu(
        &self,
        chat: &ChatRef,
        message_id: &str,
        text: &str,
        controls: &Controls,
    ) -> TransportResult<()>;

    /// Replaces the controls attached to a message.
    async fn edit_controls(
        &self,
        chat: &ChatRef,
        message_id: &str,
        controls: &Controls,
    ) -> TransportResult<()>;

    async fn delete_message(&self, chat: &ChatRef, message_id: &str) -> TransportResult<()>;

    /// Answers a callback query; `alert` pops a modal instead of a toast.
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        alert: bool,
    ) -> TransportResult<()>;

    /// Sends an audio artifact as a voice reply; returns the new message id.
    async fn send_voice(
        &self,
        chat: &ChatRef,
        reply_to: &str,
        path: &Path,
    ) -> TransportResult<String>;

    /// Sends a file as a document with a caption; returns the new message id.
    async fn send_document(
        &self,
        chat: &ChatRef,
        path: &Path,
        caption: &str,
    ) -> TransportResult<String>;
}

/// Parses a transport message id string into Telegram's numeric id.
pub fn parse_message_id(s: &str) -> TransportResult<i32> {
    s.parse()
        .map_err(|_| TransportError::BadRequest(format!("invalid message id: {}", s)))
}

/// Teloxide-based implementation of [`Transport`]. All text goes out as HTML,
/// which is why the formatter must only ever produce render-safe markup.
pub struct TelegramTransport {
    bot: teloxide::Bot,
}

impl TelegramTransport {
    /// Creates a transport from an existing teloxide Bot.
    pub fn new(bot: teloxide::Bot) -> Self {
        Self { bot }
    }

    /// Returns the underlying teloxide Bot for direct API use when needed.
    pub fn inner(&self) -> &teloxide::Bot {
        &self.bot
    }

    fn map_err(e: teloxide::RequestError) -> TransportError {
        TransportError::classify(&e.to_string())
    }
}

fn to_markup(controls: &Controls) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(controls.rows.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.data.clone()))
            .collect::<Vec<_>>()
    }))
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_message(&self, chat: &ChatRef, text: &str) -> TransportResult<String> {
        let sent = self
            .bot
            .send_message(ChatId(chat.id), text.to_string())
            .parse_mode(ParseMode::Html)
            .await
            .map_err(Self::map_err)?;
        Ok(sent.id.to_string())
    }

    async fn reply_to(
        &self,
        chat: &ChatRef,
        reply_to: &str,
        text: &str,
    ) -> TransportResult<String> {
        let id = parse_message_id(reply_to)?;
        let sent = self
            .bot
            .send_message(ChatId(chat.id), text.to_string())
            .parse_mode(ParseMode::Html)
            .reply_parameters(ReplyParameters::new(MessageId(id)))
            .await
            .map_err(Self::map_err)?;
        Ok(sent.id.to_string())
    }

    async fn send_menu(
        &self,
        chat: &ChatRef,
        text: &str,
        controls: &Controls,
    ) -> TransportResult<String> {
        let sent = self
            .bot
            .send_message(ChatId(chat.id), text.to_string())
            .parse_mode(ParseMode::Html)
            .reply_markup(to_markup(controls))
            .await
            .map_err(Self::map_err)?;
        Ok(sent.id.to_string())
    }

    async fn edit_message(
        &self,
        chat: &ChatRef,
        message_id: &str,
        text: &str,
    ) -> TransportResult<()> {
        let id = parse_message_id(message_id)?;
        self.bot
            .edit_message_text(ChatId(chat.id), MessageId(id), text.to_string())
            .parse_mode(ParseMode::Html)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn edit_menu(
        &self,
        chat: &ChatRef,
        message_id: &str,
        text: &str,
        controls: &Controls,
    ) -> TransportResult<()> {
        let id = parse_message_id(message_id)?;
        self.bot
            .edit_message_text(ChatId(chat.id), MessageId(id), text.to_string())
            .parse_mode(ParseMode::Html)
            .reply_markup(to_markup(controls))
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn edit_controls(
        &self,
        chat: &ChatRef,
        message_id: &str,
        controls: &Controls,
    ) -> TransportResult<()> {
        let id = parse_message_id(message_id)?;
        self.bot
            .edit_message_reply_markup(ChatId(chat.id), MessageId(id))
            .reply_markup(to_markup(controls))
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn delete_message(&self, chat: &ChatRef, message_id: &str) -> TransportResult<()> {
        let id = parse_message_id(message_id)?;
        self.bot
            .delete_message(ChatId(chat.id), MessageId(id))
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        alert: bool,
    ) -> TransportResult<()> {
        let mut req = self
            .bot
            .answer_callback_query(CallbackQueryId(callback_id.to_string()))
            .show_alert(alert);
        if let Some(text) = text {
            req = req.text(text.to_string());
        }
        req.await.map_err(Self::map_err)?;
        Ok(())
    }

    async fn send_voice(
        &self,
        chat: &ChatRef,
        reply_to: &str,
        path: &Path,
    ) -> TransportResult<String> {
        let id = parse_message_id(reply_to)?;
        let sent = self
            .bot
            .send_voice(ChatId(chat.id), InputFile::file(path.to_path_buf()))
            .reply_parameters(ReplyParameters::new(MessageId(id)))
            .await
            .map_err(Self::map_err)?;
        Ok(sent.id.to_string())
    }

    async fn send_document(
        &self,
        chat: &ChatRef,
        path: &Path,
        caption: &str,
    ) -> TransportResult<String> {
        let sent = self
            .bot
            .send_document(ChatId(chat.id), InputFile::file(path.to_path_buf()))
            .caption(caption.to_string())
            .await
            .map_err(Self::map_err)?;
        Ok(sent.id.to_string())
    }
}
