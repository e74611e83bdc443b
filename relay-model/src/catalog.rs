//! Model catalog: hosted models, their versions, and which content kinds each
//! accepts. The orchestrator consults this before any model call.

use relay_core::ContentKind;

pub struct ModelInfo {
    pub name: &'static str,
    /// Menu label, icon included.
    pub label: &'static str,
    pub versions: &'static [&'static str],
    pub inputs: &'static [ContentKind],
}

pub const MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: "gemini",
        label: "✨ Google Gemini",
        versions: &[
            "gemini-1.5-flash-002",
            "gemini-1.5-pro-002",
            "gemini-2.0-flash-exp",
        ],
        inputs: &[
            ContentKind::Text,
            ContentKind::Image,
            ContentKind::Video,
            ContentKind::Audio,
            ContentKind::Document,
        ],
    },
    ModelInfo {
        name: "claude",
        label: "🧠 Anthropic Claude",
        versions: &["claude-3.5-haiku", "claude-3.5-sonnet"],
        inputs: &[ContentKind::Text, ContentKind::Image],
    },
    ModelInfo {
        name: "deepseek",
        label: "🐳 DeepSeek",
        versions: &["deepseek-v3"],
        inputs: &[ContentKind::Text],
    },
];

pub fn model_info(name: &str) -> Option<&'static ModelInfo> {
    MODELS.iter().find(|m| m.name == name)
}

/// Icon shown next to a version in the selection menu.
pub fn version_icon(version: &str) -> &'static str {
    match version {
        "gemini-1.5-flash-002" => "⚡",
        "gemini-1.5-pro-002" => "⭐️",
        "gemini-2.0-flash-exp" => "💫",
        "claude-3.5-haiku" => "🎯",
        "claude-3.5-sonnet" => "🎭",
        "deepseek-v3" => "🔮",
        _ => "🤖",
    }
}

impl ModelInfo {
    pub fn supports(&self, kind: ContentKind) -> bool {
        self.inputs.contains(&kind)
    }

    pub fn has_version(&self, version: &str) -> bool {
        self.versions.contains(&version)
    }
}
