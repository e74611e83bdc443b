//! Speech-synthesis boundary. The orchestrator sends the produced audio as a
//! voice reply and deletes the artifact afterwards; how the audio is obtained
//! is entirely the implementation's business (external vendor, local engine).

use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesizes speech for `text` in the given language, returning the
    /// path of the written audio file.
    async fn synthesize(&self, text: &str, lang_code: &str) -> Result<PathBuf>;
}
