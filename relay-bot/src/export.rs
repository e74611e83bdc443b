//! Transcript export: the exporter boundary plus text and markdown writers.
//!
//! The orchestrator forwards the produced file to the transport and deletes it
//! afterwards; exporters only write files. Richer formats (PDF, DOCX) can
//! implement the same trait externally.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use relay_core::Role;
use relay_storage::StoredMessage;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait TranscriptExporter: Send + Sync {
    /// Format tag used in the export menu ("txt", "md", ...).
    fn format_tag(&self) -> &'static str;

    /// Writes the transcript and returns the file path.
    async fn export(&self, chat_title: &str, messages: &[StoredMessage]) -> Result<PathBuf>;
}

fn role_icon(role: Role) -> &'static str {
    match role {
        Role::User => "👤",
        Role::Assistant => "🤖",
    }
}

async fn write_export(dir: &Path, filename: &str, content: String) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("creating export dir {}", dir.display()))?;
    let path = dir.join(filename);
    tokio::fs::write(&path, content)
        .await
        .with_context(|| format!("writing export {}", path.display()))?;
    Ok(path)
}

fn export_filename(chat_title: &str, extension: &str) -> String {
    format!(
        "{}_{}.{}",
        chat_title,
        Utc::now().format("%Y%m%d_%H%M%S"),
        extension
    )
}

/// Plain-text transcript: role, timestamp, content, dashed separators.
pub struct TextExporter {
    export_dir: PathBuf,
}

impl TextExporter {
    pub fn new(export_dir: impl Into<PathBuf>) -> Self {
        Self {
            export_dir: export_dir.into(),
        }
    }
}

#[async_trait]
impl TranscriptExporter for TextExporter {
    fn format_tag(&self) -> &'static str {
        "txt"
    }

    async fn export(&self, chat_title: &str, messages: &[StoredMessage]) -> Result<PathBuf> {
        let mut content = String::new();
        for msg in messages {
            content.push_str(&format!(
                "{} {} - {}\n",
                role_icon(msg.role),
                msg.role.as_str().to_uppercase(),
                msg.created_at.format("%Y-%m-%d %H:%M:%S")
            ));
            content.push_str(&msg.content);
            content.push('\n');
            content.push_str(&"-".repeat(80));
            content.push_str("\n\n");
        }
        write_export(
            &self.export_dir,
            &export_filename(chat_title, "txt"),
            content,
        )
        .await
    }
}

/// Markdown transcript: heading per message, horizontal rules between.
pub struct MarkdownExporter {
    export_dir: PathBuf,
}

impl MarkdownExporter {
    pub fn new(export_dir: impl Into<PathBuf>) -> Self {
        Self {
            export_dir: export_dir.into(),
        }
    }
}

#[async_trait]
impl TranscriptExporter for MarkdownExporter {
    fn format_tag(&self) -> &'static str {
        "md"
    }

    async fn export(&self, chat_title: &str, messages: &[StoredMessage]) -> Result<PathBuf> {
        let mut content = String::new();
        for msg in messages {
            let role = msg.role.as_str();
            let mut chars = role.chars();
            let title = match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            };
            content.push_str(&format!(
                "### {} {} - {}\n\n",
                role_icon(msg.role),
                title,
                msg.created_at.format("%Y-%m-%d %H:%M:%S")
            ));
            content.push_str(&msg.content);
            content.push_str("\n\n---\n\n");
        }
        write_export(
            &self.export_dir,
            &export_filename(chat_title, "md"),
            content,
        )
        .await
    }
}
