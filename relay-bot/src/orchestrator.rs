//! Conversation/settings orchestrator: the per-user state machine tying the
//! selected model, active chat, generation parameters, and transient UI modes
//! together across callback-driven interactions.
//!
//! **Data flow:** inbound action → resolve session state → when model output
//! is needed, open a response session (placeholder → history → stream →
//! buffered delivery passes → final flush) → persist the result → optional
//! speech synthesis. No failure here is fatal to the process; only the one
//! user interaction degrades, with a user-visible error message.

use crate::command::CallbackCommand;
use crate::export::TranscriptExporter;
use crate::keyboards::{self, language_name};
use crate::session::{SessionRegistry, UiMode, UserSession};
use crate::speech::SpeechSynthesizer;
use chrono::Local;
use relay_core::{
    CallbackAction, ChatRef, ContentKind, Controls, Incoming, RelayError, Result, Role, Transport,
};
use relay_delivery::{format, split_message, DeliveryEngine, ResponseSession};
use relay_model::{catalog, param_spec, GenerationParams, HistoryMessage, ModelProvider,
    ModelRequest, ParamSpec};
use relay_storage::{ChatStore, NewMessage, StorageError, StoredMessage};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

// ---------- User-facing messages ----------
const MSG_THINKING: &str = "🤔 Thinking...";
const MSG_REGENERATING: &str = "🔄 Regenerating response...";
const MSG_SEND_FAILED: &str = "❌ Failed to send message. Please try again.";
const MSG_SELECT_MODEL_FIRST: &str = "⚠️ Please select a model first using /start";
const MSG_SELECT_CHAT_FIRST: &str = "Please start a new chat or select an existing one:";
const MSG_TITLE_TOO_LONG: &str =
    "❌ Title too long. Please use a shorter title (max 100 characters).";
const MSG_RENAMED: &str = "✅ Chat renamed successfully!";
const MSG_RENAME_FAILED: &str = "❌ Failed to rename chat. Please try again.";
const MSG_EMPTY_RESPONSE: &str = "❌ Failed to generate response. Please try again.";
const MSG_REGENERATE_FAILED: &str = "❌ Error: Could not regenerate response. Please try again.";
const MSG_UNKNOWN_ACTION: &str = "Unknown action";
const MSG_CALLBACK_ERROR: &str = "❌ An error occurred. Please try again.";
const MSG_VOICE_STATUS: &str = "🎤 Generating voice message...";
const MSG_VOICE_FAILED: &str = "❌ Could not generate voice message.";
const MSG_CANCELLED: &str = "Operation cancelled. Send a message to continue!";

const WELCOME_TEXT: &str = "👋 Welcome to AI Assistant Bot!\n\n\
    I support multiple AI models that can help you with various tasks:\n\n\
    ✨ <b>Google Gemini</b>\n\
    • Latest versions (1.5 Flash, 1.5 Pro, 2.0)\n\
    • Supports text, images, video, and audio\n\n\
    🧠 <b>Anthropic Claude</b>\n\
    • Latest versions (3.5 Haiku and Sonnet)\n\
    • Supports text and images\n\n\
    🐳 <b>DeepSeek</b>\n\
    • Latest version (V3)\n\
    • Specializes in text processing\n\n\
    Please select a model to begin:";

const NEW_CHAT_TEXT: &str = "🆕 New chat created!\n\n\
    You can now:\n\
    • Send text messages\n\
    • Send images (Gemini and Claude)\n\
    • Send videos (Gemini only)\n\
    • Send audio (Gemini only)\n\
    • Send documents for analysis (Gemini and Claude)\n\n\
    Send your first message to begin!";

const SETTINGS_HELP_TEXT: &str = "📚 <b>Settings Guide</b>\n\n\
    <b>Temperature (Creativity)</b>\n\
    Controls how creative or focused the responses are.\n\
    • Lower = more focused and precise\n\
    • Higher = more creative and varied\n\n\
    <b>Top P (Diversity)</b>\n\
    Controls how varied the word choices are.\n\
    • Lower = more conservative choices\n\
    • Higher = more diverse vocabulary\n\n\
    <b>Top K (Range)</b>\n\
    Limits the vocabulary range.\n\
    • Lower = strict vocabulary\n\
    • Higher = broader word selection\n\n\
    <b>Max Tokens (Length)</b>\n\
    Sets maximum response length.\n\
    • Lower = shorter responses\n\
    • Higher = longer, detailed responses\n\n\
    Note: For most conversations, the default values work well.";

const MAX_TITLE_LEN: usize = 100;
const PREVIEW_COUNT: usize = 3;
const PREVIEW_LEN: usize = 100;

fn store_err(e: StorageError) -> RelayError {
    RelayError::Storage(e.to_string())
}

/// Rephrases known failure classes before showing them to the user.
fn user_facing_error(message: &str) -> String {
    let lower = message.to_lowercase();
    if lower.contains("api key") || lower.contains("unauthorized") {
        "Invalid API key. Please contact the bot administrator.".to_string()
    } else if lower.contains("rate limit") || lower.contains("too many requests") {
        "Rate limit exceeded. Please try again later.".to_string()
    } else {
        message.to_string()
    }
}

fn settings_text(model: &str, params: &GenerationParams) -> String {
    let mut text = format!(
        "🛠️ <b>Advanced Settings</b>\n\nCurrent settings for {}:\n\n",
        model.to_uppercase()
    );
    for spec in relay_model::PARAMETERS {
        let value = params.get(spec.name).unwrap_or(spec.min);
        text.push_str(&format!(
            "• <b>{}:</b> {}\n",
            spec.display_name(),
            spec.format(value)
        ));
    }
    text.push_str("\nClick on any parameter to adjust it.");
    text
}

fn adjustment_text(spec: &ParamSpec, value: f64) -> String {
    format!(
        "<b>Adjusting {}</b>\n\nCurrent Value: {}\n\nDescription: {}\n\n{}",
        spec.display_name(),
        spec.format(value),
        spec.description,
        spec.detail
    )
}

fn history_message(msg: &StoredMessage) -> HistoryMessage {
    HistoryMessage {
        role: msg.role,
        content: msg.content.clone(),
        kind: msg.kind,
    }
}

/// How one streamed response ended.
enum StreamOutcome {
    Completed(String),
    /// A newer action bumped the user's epoch; the stream was closed.
    Superseded,
    Failed(String),
}

/// **Entry point.** The orchestrator owns every inbound interaction:
/// [`handle_command`](Self::handle_command) for slash commands,
/// [`handle_text`](Self::handle_text) for free text, and
/// [`handle_callback`](Self::handle_callback) for menu taps.
pub struct Orchestrator {
    transport: Arc<dyn Transport>,
    engine: Arc<DeliveryEngine>,
    store: ChatStore,
    provider: Arc<dyn ModelProvider>,
    registry: SessionRegistry,
    exporters: Vec<Arc<dyn TranscriptExporter>>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
}

impl Orchestrator {
    pub fn new(
        transport: Arc<dyn Transport>,
        engine: Arc<DeliveryEngine>,
        store: ChatStore,
        provider: Arc<dyn ModelProvider>,
        exporters: Vec<Arc<dyn TranscriptExporter>>,
        speech: Option<Arc<dyn SpeechSynthesizer>>,
    ) -> Self {
        Self {
            transport,
            engine,
            store,
            provider,
            registry: SessionRegistry::new(),
            exporters,
            speech,
        }
    }

    /// Loads the user's session, pulling durable settings from the store on
    /// first contact.
    async fn session_for(&self, user_id: i64) -> Result<UserSession> {
        if self.registry.contains(user_id) {
            return Ok(self.registry.session(user_id));
        }
        self.store.ensure_user(user_id).await.map_err(store_err)?;
        let settings = self
            .store
            .get_user_settings(user_id)
            .await
            .map_err(store_err)?;
        let session = UserSession {
            model: settings.model,
            version: settings.version,
            active_chat: None,
            params: settings.params,
            mode: UiMode::Idle,
        };
        self.registry.insert(user_id, session.clone());
        Ok(session)
    }

    // ---------- Commands ----------

    #[instrument(skip(self, incoming), fields(user_id = incoming.user_id))]
    pub async fn handle_command(&self, incoming: &Incoming, command: &str) -> Result<()> {
        let name = command
            .split_whitespace()
            .next()
            .unwrap_or("")
            .split('@')
            .next()
            .unwrap_or("");
        match name {
            "start" | "help" => {
                self.session_for(incoming.user_id).await?;
                self.registry
                    .set_mode(incoming.user_id, UiMode::SelectingModel);
                self.send_menu(&incoming.chat, WELCOME_TEXT, &keyboards::model_selection())
                    .await;
            }
            "settings" => {
                let session = self.session_for(incoming.user_id).await?;
                let model = session.model.as_deref().unwrap_or("model");
                self.send_menu(
                    &incoming.chat,
                    &settings_text(model, &session.params),
                    &keyboards::settings(&session.params),
                )
                .await;
            }
            "cancel" => {
                self.session_for(incoming.user_id).await?;
                self.registry.set_mode(incoming.user_id, UiMode::Idle);
                if let Err(e) = self.transport.send_message(&incoming.chat, MSG_CANCELLED).await {
                    error!(error = %e, "Failed to confirm cancel");
                }
            }
            _ => info!(command = name, "Ignoring unknown command"),
        }
        Ok(())
    }

    // ---------- Free text ----------

    /// Free text is interpreted against the user's transient mode: a rename
    /// in progress consumes it as the new title; otherwise it becomes a model
    /// prompt once a model and an active chat exist.
    #[instrument(skip(self, incoming), fields(user_id = incoming.user_id))]
    pub async fn handle_text(&self, incoming: &Incoming) -> Result<()> {
        let session = self.session_for(incoming.user_id).await?;

        if let UiMode::RenamingChat(chat_id) = &session.mode {
            return self.finish_rename(incoming, *chat_id).await;
        }

        let (Some(model), Some(version)) = (session.model.clone(), session.version.clone())
        else {
            self.send_menu(
                &incoming.chat,
                MSG_SELECT_MODEL_FIRST,
                &keyboards::model_selection(),
            )
            .await;
            return Ok(());
        };

        let Some(chat_id) = session.active_chat else {
            self.send_menu(
                &incoming.chat,
                MSG_SELECT_CHAT_FIRST,
                &keyboards::chat_options(),
            )
            .await;
            return Ok(());
        };

        if let Err(e) = self
            .run_response(incoming, chat_id, model, version, session.params)
            .await
        {
            error!(error = %e, user_id = incoming.user_id, "Error processing text message");
            let summary = user_facing_error(&e.to_string());
            let _ = self
                .transport
                .send_message(&incoming.chat, &format!("❌ Error: {}", summary))
                .await;
        }
        Ok(())
    }

    /// Placeholder → history → stream → persist → optional voice.
    async fn run_response(
        &self,
        incoming: &Incoming,
        chat_id: i64,
        model: String,
        version: String,
        params: GenerationParams,
    ) -> Result<()> {
        let anchor = match self
            .transport
            .reply_to(&incoming.chat, &incoming.message_id, MSG_THINKING)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "Failed to send placeholder");
                let _ = self.transport.send_message(&incoming.chat, MSG_SEND_FAILED).await;
                return Ok(());
            }
        };

        let history = self.load_history(chat_id).await?;
        let request = ModelRequest {
            model,
            version,
            content: incoming.text.clone(),
            kind: ContentKind::Text,
            file_path: None,
            history,
            params: params.clone(),
        };

        match self
            .stream_response(incoming.user_id, &incoming.chat, &anchor, ContentKind::Text, request)
            .await
        {
            StreamOutcome::Completed(text) if !text.trim().is_empty() => {
                self.store
                    .add_message(
                        NewMessage::text(chat_id, Role::User, incoming.text.clone())
                            .with_transport_id(incoming.message_id.clone()),
                    )
                    .await
                    .map_err(store_err)?;
                self.store
                    .add_message(
                        NewMessage::text(chat_id, Role::Assistant, text.clone())
                            .with_transport_id(anchor.clone())
                            .with_params(params),
                    )
                    .await
                    .map_err(store_err)?;
                self.maybe_send_voice(&incoming.chat, &anchor, &text, chat_id).await;
            }
            StreamOutcome::Completed(_) => {
                self.edit_menu(
                    &incoming.chat,
                    &anchor,
                    MSG_EMPTY_RESPONSE,
                    &keyboards::message_actions(&anchor),
                )
                .await;
            }
            StreamOutcome::Superseded => {
                info!(user_id = incoming.user_id, "Response superseded by a newer action");
            }
            StreamOutcome::Failed(summary) => {
                if let Err(e) = self
                    .transport
                    .edit_message(&incoming.chat, &anchor, &format!("❌ Error: {}", summary))
                    .await
                {
                    error!(error = %e, "Failed to surface model error");
                }
            }
        }
        Ok(())
    }

    /// Consumes one model stream into buffered delivery passes. Every
    /// iteration re-checks the user's response epoch; a newer action closes
    /// this stream instead of racing it.
    async fn stream_response(
        &self,
        user_id: i64,
        chat: &ChatRef,
        anchor: &str,
        kind: ContentKind,
        request: ModelRequest,
    ) -> StreamOutcome {
        let epoch = self.registry.begin_response(user_id);

        let mut stream = match self.provider.open_stream(request).await {
            Ok(stream) => stream,
            Err(e) => {
                error!(error = %e, "Failed to open model stream");
                return StreamOutcome::Failed(user_facing_error(&e.to_string()));
            }
        };

        let controls = keyboards::message_actions(anchor);
        let mut session = ResponseSession::new(chat.clone(), anchor.to_string(), kind);

        while let Some(increment) = stream.next().await {
            if self.registry.current_epoch(user_id) != epoch {
                stream.close();
                return StreamOutcome::Superseded;
            }
            if session.push(&increment) {
                session.flush(&self.engine, Some(&controls)).await;
            }
        }

        let text = session.finish(&self.engine, Some(&controls)).await.to_string();
        StreamOutcome::Completed(text)
    }

    async fn load_history(&self, chat_id: i64) -> Result<Vec<HistoryMessage>> {
        let messages = self
            .store
            .get_chat_history(chat_id)
            .await
            .map_err(store_err)?;
        Ok(messages.iter().map(history_message).collect())
    }

    /// Synthesizes and sends a voice reply in the chat's language, then
    /// deletes the audio artifact. Entirely best-effort.
    async fn maybe_send_voice(&self, chat: &ChatRef, anchor: &str, text: &str, chat_id: i64) {
        let Some(speech) = &self.speech else { return };

        let lang_code = match self.store.get_chat_info(chat_id).await {
            Ok(Some(info)) => info.lang_code,
            _ => "en-US".to_string(),
        };

        let status = match self.transport.reply_to(chat, anchor, MSG_VOICE_STATUS).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "Failed to send voice status");
                None
            }
        };

        match speech.synthesize(text, &lang_code).await {
            Ok(path) => {
                match self.transport.send_voice(chat, anchor, &path).await {
                    Ok(_) => {
                        if let Some(status) = &status {
                            let _ = self.transport.delete_message(chat, status).await;
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Error sending voice message");
                        if let Some(status) = &status {
                            let _ = self.transport.edit_message(chat, status, MSG_VOICE_FAILED).await;
                        }
                    }
                }
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    error!(error = %e, "Error removing audio file");
                }
            }
            Err(e) => {
                error!(error = %e, "Speech synthesis failed");
                if let Some(status) = &status {
                    let _ = self.transport.edit_message(chat, status, MSG_VOICE_FAILED).await;
                }
            }
        }
    }

    async fn finish_rename(&self, incoming: &Incoming, chat_id: i64) -> Result<()> {
        let title = incoming.text.trim().to_string();
        // rejected before any store mutation
        if title.chars().count() > MAX_TITLE_LEN {
            let _ = self.transport.send_message(&incoming.chat, MSG_TITLE_TOO_LONG).await;
            return Ok(());
        }

        match self.store.update_chat_title(chat_id, &title).await {
            Ok(()) => {
                self.registry.set_mode(incoming.user_id, UiMode::Idle);
                let chats = self
                    .store
                    .get_user_chats(incoming.user_id)
                    .await
                    .map_err(store_err)?;
                self.send_menu(&incoming.chat, MSG_RENAMED, &keyboards::chat_list(&chats))
                    .await;
            }
            Err(e) => {
                warn!(error = %e, chat_id, "Rename failed");
                self.send_menu(
                    &incoming.chat,
                    MSG_RENAME_FAILED,
                    &keyboards::chat_management(chat_id),
                )
                .await;
            }
        }
        Ok(())
    }

    // ---------- Callbacks ----------

    /// **Entry point.** Decodes the payload once, dispatches exhaustively,
    /// and turns any handler error into a user-visible alert.
    #[instrument(skip(self, action), fields(user_id = action.user_id, data = %action.data))]
    pub async fn handle_callback(&self, action: &CallbackAction) -> Result<()> {
        let Some(command) = CallbackCommand::parse(&action.data) else {
            warn!(data = %action.data, "Unhandled callback data");
            self.answer(action, Some(MSG_UNKNOWN_ACTION), true).await;
            return Ok(());
        };

        if let Err(e) = self.dispatch(action, command).await {
            error!(error = %e, "Error in callback handler");
            self.answer(action, Some(MSG_CALLBACK_ERROR), true).await;
        }
        Ok(())
    }

    async fn dispatch(&self, action: &CallbackAction, command: CallbackCommand) -> Result<()> {
        use CallbackCommand::*;
        match command {
            SelectModel(model) => self.show_versions(action, &model).await,
            SelectVersion { model, version } => {
                self.apply_model_selection(action, &model, &version).await
            }
            NewChat => self.create_chat(action).await,
            ListChats | BackToChats => self.show_chat_list(action).await,
            SelectChat(chat_id) => self.select_chat(action, chat_id).await,
            ManageChat(chat_id) | CancelDelete(chat_id) => {
                self.show_chat_management(action, chat_id).await
            }
            RenameChat(chat_id) => self.begin_rename(action, chat_id).await,
            DeleteChat(chat_id) => self.confirm_delete(action, chat_id).await,
            ConfirmDelete(chat_id) => self.delete_chat(action, chat_id).await,
            ChangeLang(chat_id) => self.show_language_menu(action, chat_id).await,
            SelectLang { chat_id, code } => self.apply_language(action, chat_id, &code).await,
            ExportChat(chat_id) => self.show_export_formats(action, chat_id).await,
            ExportFormat { chat_id, format } => self.export_chat(action, chat_id, &format).await,
            Regenerate(message_id) => self.regenerate(action, &message_id).await,
            ModelSettings | AdvancedSettings | BackToSettings => self.show_settings(action).await,
            AdjustParam(name) => self.show_param_adjustment(action, &name).await,
            IncParam(name) => self.adjust_param(action, &name, 1).await,
            DecParam(name) => self.adjust_param(action, &name, -1).await,
            SettingsHelp => self.show_settings_help(action).await,
            ChangeModel | BackToModels => self.show_model_menu(action).await,
            BackToOptions => self.back_to_options(action).await,
            BackToMessage => self.back_to_message(action).await,
        }
    }

    async fn show_model_menu(&self, action: &CallbackAction) -> Result<()> {
        self.edit_menu(
            &action.chat,
            &action.message_id,
            "Select a model:",
            &keyboards::model_selection(),
        )
        .await;
        self.answer(action, None, false).await;
        Ok(())
    }

    async fn show_versions(&self, action: &CallbackAction, model: &str) -> Result<()> {
        if catalog::model_info(model).is_none() {
            self.answer(action, Some("Unknown model."), true).await;
            return Ok(());
        }
        self.edit_menu(
            &action.chat,
            &action.message_id,
            &format!("Select the version of {} you want to use:", model),
            &keyboards::model_versions(model),
        )
        .await;
        self.answer(action, None, false).await;
        Ok(())
    }

    async fn apply_model_selection(
        &self,
        action: &CallbackAction,
        model: &str,
        version: &str,
    ) -> Result<()> {
        let valid = catalog::model_info(model)
            .map(|info| info.has_version(version))
            .unwrap_or(false);
        if !valid {
            self.answer(action, Some("Unknown model version."), true).await;
            return Ok(());
        }

        self.store
            .update_user_model(action.user_id, model, version)
            .await
            .map_err(store_err)?;
        self.session_for(action.user_id).await?;
        let model_owned = model.to_string();
        let version_owned = version.to_string();
        self.registry.update(action.user_id, move |s| {
            s.model = Some(model_owned);
            s.version = Some(version_owned);
            s.mode = UiMode::Idle;
        });

        self.edit_menu(
            &action.chat,
            &action.message_id,
            &format!(
                "✅ Model set to {} ({})\n\nWhat would you like to do?",
                model, version
            ),
            &keyboards::chat_options(),
        )
        .await;
        self.answer(action, None, false).await;
        Ok(())
    }

    async fn create_chat(&self, action: &CallbackAction) -> Result<()> {
        let session = self.session_for(action.user_id).await?;
        let (Some(model), Some(version)) = (session.model, session.version) else {
            self.edit_menu(
                &action.chat,
                &action.message_id,
                MSG_SELECT_MODEL_FIRST,
                &keyboards::model_selection(),
            )
            .await;
            self.answer(action, None, false).await;
            return Ok(());
        };

        let title = format!("Chat {}", Local::now().format("%Y-%m-%d %H:%M"));
        let chat_id = self
            .store
            .create_chat(action.user_id, &title, &model, &version)
            .await
            .map_err(store_err)?;
        self.registry.update(action.user_id, |s| {
            s.active_chat = Some(chat_id);
            s.mode = UiMode::Idle;
        });
        info!(user_id = action.user_id, chat_id, "Created new chat");

        self.edit_menu(
            &action.chat,
            &action.message_id,
            NEW_CHAT_TEXT,
            &keyboards::message_actions("0"),
        )
        .await;
        self.answer(action, None, false).await;
        Ok(())
    }

    async fn show_chat_list(&self, action: &CallbackAction) -> Result<()> {
        let chats = self
            .store
            .get_user_chats(action.user_id)
            .await
            .map_err(store_err)?;
        if chats.is_empty() {
            self.edit_menu(
                &action.chat,
                &action.message_id,
                "You don't have any chats yet.",
                &keyboards::chat_options(),
            )
            .await;
        } else {
            self.edit_menu(
                &action.chat,
                &action.message_id,
                "Select a chat to continue:",
                &keyboards::chat_list(&chats),
            )
            .await;
        }
        self.answer(action, None, false).await;
        Ok(())
    }

    async fn select_chat(&self, action: &CallbackAction, chat_id: i64) -> Result<()> {
        if self
            .store
            .get_chat_info(chat_id)
            .await
            .map_err(store_err)?
            .is_none()
        {
            self.answer(action, Some("Chat not found."), true).await;
            return Ok(());
        }

        self.session_for(action.user_id).await?;
        self.registry.update(action.user_id, |s| {
            s.active_chat = Some(chat_id);
            s.mode = UiMode::Idle;
        });

        let messages = self
            .store
            .get_chat_history(chat_id)
            .await
            .map_err(store_err)?;
        if messages.is_empty() {
            self.edit_menu(
                &action.chat,
                &action.message_id,
                "Chat selected. Send a message to begin!",
                &keyboards::message_actions("0"),
            )
            .await;
        } else {
            let recent = &messages[messages.len().saturating_sub(PREVIEW_COUNT)..];
            let mut text = String::from("Recent messages in this chat:\n\n");
            for msg in recent {
                let icon = match msg.role {
                    Role::User => "👤",
                    Role::Assistant => "🤖",
                };
                let preview: String = msg.content.chars().take(PREVIEW_LEN).collect();
                let ellipsis = if msg.content.chars().count() > PREVIEW_LEN {
                    "..."
                } else {
                    ""
                };
                text.push_str(&format!(
                    "{} {}{}\n\n",
                    icon,
                    format::escape_text(&preview),
                    ellipsis
                ));
            }
            text.push_str("You can continue the conversation...");

            let last_id = recent
                .iter()
                .rev()
                .find_map(|m| m.transport_message_id.clone())
                .unwrap_or_else(|| "0".to_string());
            self.edit_menu(
                &action.chat,
                &action.message_id,
                &text,
                &keyboards::message_actions(&last_id),
            )
            .await;
        }
        self.answer(action, None, false).await;
        Ok(())
    }

    async fn show_chat_management(&self, action: &CallbackAction, chat_id: i64) -> Result<()> {
        self.edit_menu(
            &action.chat,
            &action.message_id,
            "What would you like to do with this chat?",
            &keyboards::chat_management(chat_id),
        )
        .await;
        self.answer(action, None, false).await;
        Ok(())
    }

    async fn begin_rename(&self, action: &CallbackAction, chat_id: i64) -> Result<()> {
        self.session_for(action.user_id).await?;
        self.registry
            .set_mode(action.user_id, UiMode::RenamingChat(chat_id));
        self.edit_menu(
            &action.chat,
            &action.message_id,
            "Please send the new title for this chat:",
            &keyboards::back(CallbackCommand::BackToChats),
        )
        .await;
        self.answer(action, None, false).await;
        Ok(())
    }

    async fn confirm_delete(&self, action: &CallbackAction, chat_id: i64) -> Result<()> {
        self.edit_menu(
            &action.chat,
            &action.message_id,
            "⚠️ Are you sure you want to delete this chat? This action cannot be undone.",
            &keyboards::delete_confirmation(chat_id),
        )
        .await;
        self.answer(action, None, false).await;
        Ok(())
    }

    async fn delete_chat(&self, action: &CallbackAction, chat_id: i64) -> Result<()> {
        self.store.delete_chat(chat_id).await.map_err(store_err)?;
        self.session_for(action.user_id).await?;
        self.registry.update(action.user_id, |s| {
            if s.active_chat == Some(chat_id) {
                s.active_chat = None;
            }
        });

        let chats = self
            .store
            .get_user_chats(action.user_id)
            .await
            .map_err(store_err)?;
        if chats.is_empty() {
            self.edit_menu(
                &action.chat,
                &action.message_id,
                "Chat deleted. You have no active chats.",
                &keyboards::chat_options(),
            )
            .await;
        } else {
            self.edit_menu(
                &action.chat,
                &action.message_id,
                "Chat deleted successfully!",
                &keyboards::chat_list(&chats),
            )
            .await;
        }
        self.answer(action, None, false).await;
        Ok(())
    }

    async fn show_language_menu(&self, action: &CallbackAction, chat_id: i64) -> Result<()> {
        self.edit_menu(
            &action.chat,
            &action.message_id,
            "Select language:",
            &keyboards::language_selection(chat_id),
        )
        .await;
        self.answer(action, None, false).await;
        Ok(())
    }

    async fn apply_language(
        &self,
        action: &CallbackAction,
        chat_id: i64,
        code: &str,
    ) -> Result<()> {
        let Some(name) = language_name(code) else {
            self.answer(action, Some("Unsupported language."), true).await;
            return Ok(());
        };
        self.store
            .update_chat_language(chat_id, code)
            .await
            .map_err(store_err)?;
        self.edit_menu(
            &action.chat,
            &action.message_id,
            &format!("✅ Language set to {}", name),
            &keyboards::chat_management(chat_id),
        )
        .await;
        self.answer(action, None, false).await;
        Ok(())
    }

    async fn show_export_formats(&self, action: &CallbackAction, chat_id: i64) -> Result<()> {
        self.edit_menu(
            &action.chat,
            &action.message_id,
            "📤 Select export format:",
            &keyboards::export_formats(chat_id),
        )
        .await;
        self.answer(action, None, false).await;
        Ok(())
    }

    async fn export_chat(
        &self,
        action: &CallbackAction,
        chat_id: i64,
        format_tag: &str,
    ) -> Result<()> {
        let Some(exporter) = self
            .exporters
            .iter()
            .find(|e| e.format_tag() == format_tag)
        else {
            self.answer(action, Some("Unsupported export format."), true).await;
            return Ok(());
        };

        let messages = self
            .store
            .get_chat_history(chat_id)
            .await
            .map_err(store_err)?;
        if messages.is_empty() {
            self.answer(action, Some("No messages to export."), true).await;
            return Ok(());
        }
        let Some(info) = self.store.get_chat_info(chat_id).await.map_err(store_err)? else {
            self.answer(action, Some("Chat not found."), true).await;
            return Ok(());
        };

        let _ = self
            .transport
            .edit_message(
                &action.chat,
                &action.message_id,
                &format!(
                    "📊 Processing export to {}...\nPlease wait...",
                    format_tag.to_uppercase()
                ),
            )
            .await;

        let title = info.title.replace(' ', "_");
        let path = exporter
            .export(&title, &messages)
            .await
            .map_err(|e| RelayError::Export(e.to_string()))?;

        let caption = format!(
            "📥 Chat export - {}\nFormat: {}\nMessages: {}",
            info.title,
            format_tag.to_uppercase(),
            messages.len()
        );
        if let Err(e) = self.transport.send_document(&action.chat, &path, &caption).await {
            error!(error = %e, "Error sending exported file");
        }
        if let Err(e) = tokio::fs::remove_file(&path).await {
            error!(error = %e, "Error removing exported file");
        }

        self.edit_menu(
            &action.chat,
            &action.message_id,
            "What would you like to do with this chat?",
            &keyboards::chat_management(chat_id),
        )
        .await;
        self.answer(action, None, false).await;
        Ok(())
    }

    /// Regenerates a prior assistant response: finds the stored message by
    /// transport id, scans backward for the user message that produced it,
    /// drops the old chunk tail, and streams a fresh response into the same
    /// anchor.
    async fn regenerate(&self, action: &CallbackAction, message_id: &str) -> Result<()> {
        let session = self.session_for(action.user_id).await?;
        let Some(chat_id) = session.active_chat else {
            self.answer(
                action,
                Some("No active chat found. Please start a new chat."),
                true,
            )
            .await;
            return Ok(());
        };
        let (Some(model), Some(version)) = (session.model, session.version) else {
            self.answer(action, Some("Please select a model first"), true).await;
            return Ok(());
        };

        let all_messages = self
            .store
            .get_chat_history(chat_id)
            .await
            .map_err(store_err)?;
        let Some(index) = all_messages
            .iter()
            .position(|m| m.transport_message_id.as_deref() == Some(message_id))
        else {
            self.answer(action, Some("Message not found."), true).await;
            return Ok(());
        };

        let Some(user_message) = all_messages[..index]
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
        else {
            self.answer(action, Some("Original message not found."), true).await;
            return Ok(());
        };

        let mut content = user_message.content.trim().to_string();
        let kind = user_message.kind;
        if content.is_empty() && kind == ContentKind::Text {
            self.answer(action, Some("Cannot regenerate empty message."), true).await;
            return Ok(());
        }

        // media regeneration needs the original file on disk; checked before
        // any model call
        let mut file_path = None;
        if kind != ContentKind::Text {
            match &user_message.file_path {
                Some(path) if Path::new(path).exists() => {
                    file_path = Some(std::path::PathBuf::from(path));
                }
                _ => {
                    self.answer(
                        action,
                        Some(&format!("Original {} file not found.", kind.as_str())),
                        true,
                    )
                    .await;
                    return Ok(());
                }
            }
            if content.is_empty() {
                content = format!("Analyze this {}", kind.as_str());
            }
        }

        self.answer(action, None, false).await;

        // the old rendering is being replaced wholesale
        self.engine.delete_all(&action.chat, message_id).await;
        let _ = self
            .transport
            .edit_message(&action.chat, message_id, MSG_REGENERATING)
            .await;

        let history: Vec<HistoryMessage> = all_messages[..index]
            .iter()
            .filter(|m| m.transport_message_id.as_deref() != Some(message_id))
            .map(history_message)
            .collect();

        let request = ModelRequest {
            model,
            version,
            content,
            kind,
            file_path,
            history,
            params: session.params.clone(),
        };

        match self
            .stream_response(action.user_id, &action.chat, message_id, kind, request)
            .await
        {
            StreamOutcome::Completed(text) if !text.trim().is_empty() => {
                let mut record = NewMessage::text(chat_id, Role::Assistant, text.clone())
                    .with_transport_id(message_id.to_string())
                    .with_params(session.params);
                record.kind = kind;
                self.store.add_message(record).await.map_err(store_err)?;
                self.maybe_send_voice(&action.chat, message_id, &text, chat_id).await;
            }
            StreamOutcome::Completed(_) => {
                self.edit_menu(
                    &action.chat,
                    message_id,
                    MSG_EMPTY_RESPONSE,
                    &keyboards::message_actions(message_id),
                )
                .await;
            }
            StreamOutcome::Superseded => {
                info!(user_id = action.user_id, "Regeneration superseded");
            }
            StreamOutcome::Failed(summary) => {
                warn!(summary = %summary, "Regeneration failed");
                self.edit_menu(
                    &action.chat,
                    message_id,
                    MSG_REGENERATE_FAILED,
                    &keyboards::message_actions(message_id),
                )
                .await;
            }
        }
        Ok(())
    }

    // ---------- Settings ----------

    async fn show_settings(&self, action: &CallbackAction) -> Result<()> {
        let session = self.session_for(action.user_id).await?;
        let Some(model) = session.model else {
            self.answer(action, Some("Please select a model first"), true).await;
            return Ok(());
        };

        // snapshot the rendering this menu is about to obscure
        let anchor = self.response_identity(action);
        if !self.engine.has_restore_state(&anchor) {
            self.engine
                .save_restore_state(&anchor, Some(keyboards::message_actions(&anchor)));
        }

        self.edit_menu(
            &action.chat,
            &action.message_id,
            &settings_text(&model, &session.params),
            &keyboards::settings(&session.params),
        )
        .await;
        self.registry.set_mode(action.user_id, UiMode::Idle);
        self.answer(action, None, false).await;
        Ok(())
    }

    async fn show_param_adjustment(&self, action: &CallbackAction, name: &str) -> Result<()> {
        let Some(spec) = param_spec(name) else {
            self.answer(action, Some(&format!("Invalid parameter: {}", name)), true)
                .await;
            return Ok(());
        };
        let session = self.session_for(action.user_id).await?;
        let value = session.params.get(name).unwrap_or(spec.min);
        self.registry
            .set_mode(action.user_id, UiMode::AdjustingParam(name.to_string()));

        self.edit_menu(
            &action.chat,
            &action.message_id,
            &adjustment_text(spec, value),
            &keyboards::parameter_adjustment(spec, value),
        )
        .await;
        self.answer(action, None, false).await;
        Ok(())
    }

    async fn adjust_param(
        &self,
        action: &CallbackAction,
        name: &str,
        direction: i8,
    ) -> Result<()> {
        let Some(spec) = param_spec(name) else {
            self.answer(action, Some(&format!("Invalid parameter: {}", name)), true)
                .await;
            return Ok(());
        };

        let mut session = self.session_for(action.user_id).await?;
        let Some(new_value) = session.params.adjust(name, direction) else {
            self.answer(action, Some(&format!("Invalid parameter: {}", name)), true)
                .await;
            return Ok(());
        };

        self.store
            .update_user_params(action.user_id, &session.params)
            .await
            .map_err(store_err)?;
        let updated = session.params.clone();
        self.registry
            .update(action.user_id, move |s| s.params = updated);

        // push the live value to the active model handler
        if let (Some(model), Some(version)) = (&session.model, &session.version) {
            if let Err(e) = self
                .provider
                .update_params(model, version, &session.params)
                .await
            {
                warn!(error = %e, "Failed to push parameters to model handler");
            }
        }

        self.edit_menu(
            &action.chat,
            &action.message_id,
            &adjustment_text(spec, new_value),
            &keyboards::parameter_adjustment(spec, new_value),
        )
        .await;
        self.answer(
            action,
            Some(&format!(
                "{} updated to {}",
                spec.display_name(),
                spec.format(new_value)
            )),
            false,
        )
        .await;
        Ok(())
    }

    async fn show_settings_help(&self, action: &CallbackAction) -> Result<()> {
        self.edit_menu(
            &action.chat,
            &action.message_id,
            SETTINGS_HELP_TEXT,
            &keyboards::settings_help(),
        )
        .await;
        self.answer(action, None, false).await;
        Ok(())
    }

    // ---------- Back navigation ----------

    async fn back_to_options(&self, action: &CallbackAction) -> Result<()> {
        let anchor = self.response_identity(action);
        if self.engine.has_restore_state(&anchor) {
            self.engine.restore(&action.chat, &anchor).await;
        } else if let Err(e) = self
            .transport
            .edit_controls(&action.chat, &action.message_id, &keyboards::chat_options())
            .await
        {
            warn!(error = %e, "Error returning to previous menu");
        }
        self.answer(action, None, false).await;
        Ok(())
    }

    async fn back_to_message(&self, action: &CallbackAction) -> Result<()> {
        let anchor = self.response_identity(action);
        if self.engine.restore(&action.chat, &anchor).await {
            self.answer(action, None, false).await;
            return Ok(());
        }

        // no snapshot; rebuild from the stored message, or fall back to a hint
        match self
            .store
            .get_message_by_transport_id(&anchor)
            .await
            .map_err(store_err)?
        {
            Some(msg) => {
                let formatted = format::format_content(&msg.content, msg.kind);
                let chunks = split_message(&formatted);
                self.engine
                    .deliver_or_update(
                        &action.chat,
                        &anchor,
                        chunks,
                        Some(&keyboards::message_actions(&anchor)),
                    )
                    .await;
            }
            None => {
                let session = self.session_for(action.user_id).await?;
                let text = match (&session.model, &session.version) {
                    (Some(model), Some(version)) => {
                        format!("Using {} ({}). Send a message to begin!", model, version)
                    }
                    _ => "Send a message to continue!".to_string(),
                };
                self.edit_menu(
                    &action.chat,
                    &action.message_id,
                    &text,
                    &keyboards::message_actions(&anchor),
                )
                .await;
            }
        }
        self.answer(action, None, false).await;
        Ok(())
    }

    // ---------- Helpers ----------

    /// Resolves the tapped message back to its response identity. Controls
    /// live on the last handle of a multi-message response, so the tapped id
    /// is not necessarily the anchor.
    fn response_identity(&self, action: &CallbackAction) -> String {
        self.engine
            .identity_of_handle(&action.message_id)
            .unwrap_or_else(|| action.message_id.clone())
    }

    async fn send_menu(&self, chat: &ChatRef, text: &str, controls: &Controls) {
        if let Err(e) = self.transport.send_menu(chat, text, controls).await {
            error!(error = %e, "Failed to send menu");
        }
    }

    async fn edit_menu(&self, chat: &ChatRef, message_id: &str, text: &str, controls: &Controls) {
        if let Err(e) = self
            .transport
            .edit_menu(chat, message_id, text, controls)
            .await
        {
            error!(error = %e, message_id, "Failed to edit menu");
        }
    }

    /// Best-effort callback answer; failures only log.
    async fn answer(&self, action: &CallbackAction, text: Option<&str>, alert: bool) {
        if let Err(e) = self
            .transport
            .answer_callback(&action.callback_id, text, alert)
            .await
        {
            warn!(error = %e, "Failed to answer callback");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_error_substitutions() {
        assert_eq!(
            user_facing_error("API key not valid. Please pass a valid key."),
            "Invalid API key. Please contact the bot administrator."
        );
        assert_eq!(
            user_facing_error("Rate limit exceeded for requests"),
            "Rate limit exceeded. Please try again later."
        );
        assert_eq!(user_facing_error("connection reset"), "connection reset");
    }

    #[test]
    fn test_settings_text_lists_all_parameters() {
        let text = settings_text("gemini", &GenerationParams::defaults());
        assert!(text.contains("GEMINI"));
        assert!(text.contains("<b>Temperature:</b> 0.7"));
        assert!(text.contains("<b>Top P:</b> 0.95"));
        assert!(text.contains("<b>Top K:</b> 40"));
        assert!(text.contains("<b>Max Tokens:</b> 2048"));
    }

    #[test]
    fn test_adjustment_text_shows_value_and_detail() {
        let spec = param_spec("temperature").unwrap();
        let text = adjustment_text(spec, 0.7);
        assert!(text.contains("Adjusting Temperature"));
        assert!(text.contains("Current Value: 0.7"));
        assert!(text.contains(spec.description));
    }
}
