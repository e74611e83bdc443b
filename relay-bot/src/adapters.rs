//! Adapters from Telegram (teloxide) update types to the core inbound shapes.
//! Depends only on teloxide and relay_core type definitions.

use relay_core::{CallbackAction, ChatRef, Incoming};

/// Wraps a teloxide Message for conversion to [`Incoming`].
pub struct TelegramMessageWrapper<'a>(pub &'a teloxide::types::Message);

impl<'a> TelegramMessageWrapper<'a> {
    /// Returns the reduced inbound message, or `None` for non-text updates
    /// and messages without a sender (channel posts).
    pub fn to_incoming(&self) -> Option<Incoming> {
        let text = self.0.text()?;
        let from = self.0.from.as_ref()?;
        Some(Incoming {
            message_id: self.0.id.to_string(),
            user_id: from.id.0 as i64,
            chat: ChatRef::new(self.0.chat.id.0),
            text: text.to_string(),
        })
    }
}

/// Wraps a teloxide CallbackQuery for conversion to [`CallbackAction`].
pub struct TelegramCallbackWrapper<'a>(pub &'a teloxide::types::CallbackQuery);

impl<'a> TelegramCallbackWrapper<'a> {
    /// Returns the reduced action, or `None` when the query carries no
    /// payload or its message is inaccessible.
    pub fn to_action(&self) -> Option<CallbackAction> {
        let data = self.0.data.as_ref()?;
        let message = self.0.message.as_ref()?;
        Some(CallbackAction {
            callback_id: self.0.id.0.clone(),
            user_id: self.0.from.id.0 as i64,
            chat: ChatRef::new(message.chat().id.0),
            message_id: message.id().to_string(),
            data: data.clone(),
        })
    }
}
