//! Keyboard builders: every menu the bot shows, as [`Controls`] rows whose
//! payloads are [`CallbackCommand`] encodings.

use crate::command::CallbackCommand as Cmd;
use relay_core::{btn, Button, Controls};
use relay_model::{catalog, GenerationParams, ParamSpec, MODELS, PARAMETERS};
use relay_storage::ChatRecord;

/// Languages offered for per-chat speech synthesis.
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("en-US", "English"),
    ("fr-FR", "French"),
    ("de-DE", "German"),
    ("es-ES", "Spanish"),
    ("it-IT", "Italian"),
    ("pt-PT", "Portuguese"),
    ("ru-RU", "Russian"),
    ("ja-JP", "Japanese"),
    ("ko-KR", "Korean"),
    ("zh-CN", "Chinese (Simplified)"),
    ("ar-AE", "Arabic"),
    ("hi-IN", "Hindi"),
    ("fa-IR", "Persian"),
];

pub fn language_name(code: &str) -> Option<&'static str> {
    SUPPORTED_LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

fn cmd_btn(label: impl Into<String>, command: Cmd) -> Button {
    btn(label, command.encode())
}

pub fn model_selection() -> Controls {
    let mut controls = Controls::new();
    for model in MODELS {
        controls = controls.row(vec![cmd_btn(
            model.label,
            Cmd::SelectModel(model.name.to_string()),
        )]);
    }
    controls.row(vec![cmd_btn("🔙 Back", Cmd::BackToOptions)])
}

pub fn model_versions(model: &str) -> Controls {
    let mut controls = Controls::new();
    if let Some(info) = catalog::model_info(model) {
        for version in info.versions {
            controls = controls.row(vec![cmd_btn(
                format!("{} {}", catalog::version_icon(version), version),
                Cmd::SelectVersion {
                    model: model.to_string(),
                    version: version.to_string(),
                },
            )]);
        }
    }
    controls.row(vec![cmd_btn("🔙 Back", Cmd::BackToModels)])
}

pub fn chat_options() -> Controls {
    Controls::new()
        .row(vec![
            cmd_btn("🆕 New Chat", Cmd::NewChat),
            cmd_btn("💬 Previous Chats", Cmd::ListChats),
        ])
        .row(vec![
            cmd_btn("⚙️ Model Settings", Cmd::ModelSettings),
            cmd_btn("🔄 Change Model", Cmd::ChangeModel),
        ])
        .row(vec![cmd_btn("🔙 Back", Cmd::BackToModels)])
}

pub fn chat_list(chats: &[ChatRecord]) -> Controls {
    let mut controls = Controls::new();
    for chat in chats {
        controls = controls.row(vec![
            cmd_btn(format!("💬 {}", chat.title), Cmd::SelectChat(chat.chat_id)),
            cmd_btn("⚙️", Cmd::ManageChat(chat.chat_id)),
        ]);
    }
    controls
        .row(vec![cmd_btn("➕ New Chat", Cmd::NewChat)])
        .row(vec![cmd_btn("🔙 Back", Cmd::BackToOptions)])
}

pub fn chat_management(chat_id: i64) -> Controls {
    Controls::new()
        .row(vec![
            cmd_btn("✏️ Rename", Cmd::RenameChat(chat_id)),
            cmd_btn("🗑️ Delete", Cmd::DeleteChat(chat_id)),
        ])
        .row(vec![cmd_btn("🌐 Language", Cmd::ChangeLang(chat_id))])
        .row(vec![cmd_btn("📥 Export Chat", Cmd::ExportChat(chat_id))])
        .row(vec![cmd_btn("🔙 Back to Chats", Cmd::BackToChats)])
}

pub fn delete_confirmation(chat_id: i64) -> Controls {
    Controls::new().row(vec![
        cmd_btn("✅ Yes, delete", Cmd::ConfirmDelete(chat_id)),
        cmd_btn("❌ Cancel", Cmd::CancelDelete(chat_id)),
    ])
}

/// Actions attached to a delivered response (on its last message).
pub fn message_actions(message_id: &str) -> Controls {
    Controls::new()
        .row(vec![
            cmd_btn("🔄 Regenerate", Cmd::Regenerate(message_id.to_string())),
            cmd_btn("⚙️ Advanced Settings", Cmd::AdvancedSettings),
        ])
        .row(vec![cmd_btn("🔙 Back", Cmd::BackToOptions)])
}

pub fn settings(params: &GenerationParams) -> Controls {
    let mut controls = Controls::new();
    for spec in PARAMETERS {
        let value = params.get(spec.name).unwrap_or(spec.min);
        controls = controls.row(vec![cmd_btn(
            format!("{}: {}", spec.display_name(), spec.format(value)),
            Cmd::AdjustParam(spec.name.to_string()),
        )]);
    }
    controls
        .row(vec![cmd_btn("📚 Help", Cmd::SettingsHelp)])
        .row(vec![cmd_btn("🔙 Back", Cmd::BackToMessage)])
}

pub fn parameter_adjustment(spec: &ParamSpec, value: f64) -> Controls {
    Controls::new()
        .row(vec![
            cmd_btn("➖", Cmd::DecParam(spec.name.to_string())),
            cmd_btn(spec.format(value), Cmd::AdjustParam(spec.name.to_string())),
            cmd_btn("➕", Cmd::IncParam(spec.name.to_string())),
        ])
        .row(vec![cmd_btn("🔙 Back", Cmd::BackToSettings)])
}

pub fn settings_help() -> Controls {
    Controls::new().row(vec![cmd_btn("🔙 Back", Cmd::BackToSettings)])
}

pub fn export_formats(chat_id: i64) -> Controls {
    Controls::new()
        .row(vec![
            cmd_btn(
                "📄 Text",
                Cmd::ExportFormat {
                    chat_id,
                    format: "txt".to_string(),
                },
            ),
            cmd_btn(
                "📝 Markdown",
                Cmd::ExportFormat {
                    chat_id,
                    format: "md".to_string(),
                },
            ),
        ])
        .row(vec![cmd_btn("🔙 Back", Cmd::ManageChat(chat_id))])
}

pub fn language_selection(chat_id: i64) -> Controls {
    let mut controls = Controls::new();
    for pair in SUPPORTED_LANGUAGES.chunks(2) {
        let row = pair
            .iter()
            .map(|(code, name)| {
                cmd_btn(
                    *name,
                    Cmd::SelectLang {
                        chat_id,
                        code: code.to_string(),
                    },
                )
            })
            .collect();
        controls = controls.row(row);
    }
    controls.row(vec![cmd_btn("🔙 Back", Cmd::ManageChat(chat_id))])
}

pub fn back(command: Cmd) -> Controls {
    Controls::new().row(vec![cmd_btn("🔙 Back", command)])
}
