//! Callback command decoding: the raw callback payload is decoded once at the
//! boundary into a tagged variant and dispatched exhaustively. Unknown
//! payloads fall out as `None` and are answered as "Unknown action"; there is
//! no prefix-matching chain to fall through.

/// One decoded menu tap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackCommand {
    SelectModel(String),
    SelectVersion { model: String, version: String },
    NewChat,
    ListChats,
    SelectChat(i64),
    ManageChat(i64),
    RenameChat(i64),
    DeleteChat(i64),
    ConfirmDelete(i64),
    CancelDelete(i64),
    ChangeLang(i64),
    SelectLang { chat_id: i64, code: String },
    ExportChat(i64),
    ExportFormat { chat_id: i64, format: String },
    /// Payload carries the transport id of the response to regenerate.
    Regenerate(String),
    AdvancedSettings,
    SettingsHelp,
    BackToSettings,
    AdjustParam(String),
    IncParam(String),
    DecParam(String),
    ModelSettings,
    ChangeModel,
    BackToModels,
    BackToOptions,
    BackToMessage,
    BackToChats,
}

impl CallbackCommand {
    /// Decodes a raw callback payload. `None` means the payload is unknown.
    pub fn parse(data: &str) -> Option<Self> {
        use CallbackCommand::*;

        match data {
            "new_chat" => return Some(NewChat),
            "select_chat" => return Some(ListChats),
            "settings:advanced" => return Some(AdvancedSettings),
            "settings_help" => return Some(SettingsHelp),
            "back_to_settings" => return Some(BackToSettings),
            "model_settings" => return Some(ModelSettings),
            "change_model" => return Some(ChangeModel),
            "back_to_models" => return Some(BackToModels),
            "back_to_options" => return Some(BackToOptions),
            "back_to_message" => return Some(BackToMessage),
            "back_to_chats" => return Some(BackToChats),
            _ => {}
        }

        if let Some(rest) = data.strip_prefix("select_model:") {
            return Some(SelectModel(rest.to_string()));
        }
        if let Some(rest) = data.strip_prefix("select_version:") {
            let (model, version) = rest.split_once(':')?;
            return Some(SelectVersion {
                model: model.to_string(),
                version: version.to_string(),
            });
        }
        if let Some(rest) = data.strip_prefix("select_chat:") {
            return Some(SelectChat(rest.parse().ok()?));
        }
        if let Some(rest) = data.strip_prefix("manage_chat:") {
            return Some(ManageChat(rest.parse().ok()?));
        }
        if let Some(rest) = data.strip_prefix("rename_chat:") {
            return Some(RenameChat(rest.parse().ok()?));
        }
        if let Some(rest) = data.strip_prefix("delete_chat:") {
            return Some(DeleteChat(rest.parse().ok()?));
        }
        if let Some(rest) = data.strip_prefix("confirm_delete:") {
            return Some(ConfirmDelete(rest.parse().ok()?));
        }
        if let Some(rest) = data.strip_prefix("cancel_delete:") {
            return Some(CancelDelete(rest.parse().ok()?));
        }
        if let Some(rest) = data.strip_prefix("change_lang:") {
            return Some(ChangeLang(rest.parse().ok()?));
        }
        if let Some(rest) = data.strip_prefix("select_lang:") {
            let (chat_id, code) = rest.split_once(':')?;
            return Some(SelectLang {
                chat_id: chat_id.parse().ok()?,
                code: code.to_string(),
            });
        }
        if let Some(rest) = data.strip_prefix("export_chat:") {
            return Some(ExportChat(rest.parse().ok()?));
        }
        if let Some(rest) = data.strip_prefix("export_format:") {
            let (chat_id, format) = rest.split_once(':')?;
            return Some(ExportFormat {
                chat_id: chat_id.parse().ok()?,
                format: format.to_string(),
            });
        }
        if let Some(rest) = data.strip_prefix("regenerate:") {
            return Some(Regenerate(rest.to_string()));
        }
        if let Some(rest) = data.strip_prefix("adjust_") {
            return Some(AdjustParam(rest.to_string()));
        }
        if let Some(rest) = data.strip_prefix("inc_") {
            return Some(IncParam(rest.to_string()));
        }
        if let Some(rest) = data.strip_prefix("dec_") {
            return Some(DecParam(rest.to_string()));
        }

        None
    }

    /// Encodes the command back into its wire payload; inverse of [`parse`](Self::parse).
    pub fn encode(&self) -> String {
        use CallbackCommand::*;
        match self {
            SelectModel(model) => format!("select_model:{}", model),
            SelectVersion { model, version } => format!("select_version:{}:{}", model, version),
            NewChat => "new_chat".to_string(),
            ListChats => "select_chat".to_string(),
            SelectChat(id) => format!("select_chat:{}", id),
            ManageChat(id) => format!("manage_chat:{}", id),
            RenameChat(id) => format!("rename_chat:{}", id),
            DeleteChat(id) => format!("delete_chat:{}", id),
            ConfirmDelete(id) => format!("confirm_delete:{}", id),
            CancelDelete(id) => format!("cancel_delete:{}", id),
            ChangeLang(id) => format!("change_lang:{}", id),
            SelectLang { chat_id, code } => format!("select_lang:{}:{}", chat_id, code),
            ExportChat(id) => format!("export_chat:{}", id),
            ExportFormat { chat_id, format } => format!("export_format:{}:{}", chat_id, format),
            Regenerate(message_id) => format!("regenerate:{}", message_id),
            AdvancedSettings => "settings:advanced".to_string(),
            SettingsHelp => "settings_help".to_string(),
            BackToSettings => "back_to_settings".to_string(),
            AdjustParam(name) => format!("adjust_{}", name),
            IncParam(name) => format!("inc_{}", name),
            DecParam(name) => format!("dec_{}", name),
            ModelSettings => "model_settings".to_string(),
            ChangeModel => "change_model".to_string(),
            BackToModels => "back_to_models".to_string(),
            BackToOptions => "back_to_options".to_string(),
            BackToMessage => "back_to_message".to_string(),
            BackToChats => "back_to_chats".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CallbackCommand::{self, *};

    #[test]
    fn test_encode_parse_round_trip() {
        let commands = vec![
            SelectModel("gemini".into()),
            SelectVersion {
                model: "claude".into(),
                version: "claude-3.5-sonnet".into(),
            },
            NewChat,
            ListChats,
            SelectChat(7),
            ManageChat(7),
            RenameChat(7),
            DeleteChat(7),
            ConfirmDelete(7),
            CancelDelete(7),
            ChangeLang(7),
            SelectLang {
                chat_id: 7,
                code: "de-DE".into(),
            },
            ExportChat(7),
            ExportFormat {
                chat_id: 7,
                format: "md".into(),
            },
            Regenerate("1234".into()),
            AdvancedSettings,
            SettingsHelp,
            BackToSettings,
            AdjustParam("top_p".into()),
            IncParam("temperature".into()),
            DecParam("max_tokens".into()),
            ModelSettings,
            ChangeModel,
            BackToModels,
            BackToOptions,
            BackToMessage,
            BackToChats,
        ];
        for command in commands {
            assert_eq!(
                CallbackCommand::parse(&command.encode()),
                Some(command.clone()),
                "round trip failed for {:?}",
                command
            );
        }
    }

    #[test]
    fn test_bare_select_chat_lists_while_suffixed_selects() {
        assert_eq!(CallbackCommand::parse("select_chat"), Some(ListChats));
        assert_eq!(CallbackCommand::parse("select_chat:3"), Some(SelectChat(3)));
    }

    #[test]
    fn test_multi_segment_param_names_survive() {
        assert_eq!(
            CallbackCommand::parse("inc_top_p"),
            Some(IncParam("top_p".into()))
        );
        assert_eq!(
            CallbackCommand::parse("adjust_max_tokens"),
            Some(AdjustParam("max_tokens".into()))
        );
    }

    #[test]
    fn test_unknown_and_malformed_payloads_are_none() {
        assert_eq!(CallbackCommand::parse("bogus"), None);
        assert_eq!(CallbackCommand::parse("select_chat:not_a_number"), None);
        assert_eq!(CallbackCommand::parse("select_version:gemini"), None);
        assert_eq!(CallbackCommand::parse(""), None);
    }
}
