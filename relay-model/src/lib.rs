//! # relay-model
//!
//! The model-provider boundary: a [`ModelProvider`] opens a cancellable
//! [`ModelStream`] of text increments for a request. An increment may itself
//! be an error-described string, since no separate error channel exists at
//! this boundary; the orchestrator renders whatever arrives.

pub mod catalog;
mod openai_compat;
pub mod params;

pub use catalog::{model_info, ModelInfo, MODELS};
pub use openai_compat::OpenAiCompatProvider;
pub use params::{param_spec, GenerationParams, ParamSpec, PARAMETERS};

use async_trait::async_trait;
use relay_core::{ContentKind, Role};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One message of prior conversation handed to the model.
#[derive(Debug, Clone)]
pub struct HistoryMessage {
    pub role: Role,
    pub content: String,
    pub kind: ContentKind,
}

/// Everything a provider needs to produce one response.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model: String,
    pub version: String,
    pub content: String,
    pub kind: ContentKind,
    pub file_path: Option<PathBuf>,
    pub history: Vec<HistoryMessage>,
    pub params: GenerationParams,
}

/// Model provider interface: opens a streamed generation and accepts live
/// parameter updates.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Opens a generation stream. Failing to even open surfaces as `Err`;
    /// failures mid-stream arrive as error-text increments instead.
    async fn open_stream(&self, request: ModelRequest) -> anyhow::Result<ModelStream>;

    /// Pushes updated generation parameters to the live handler. Providers
    /// that read parameters per-request can keep the default no-op.
    async fn update_params(
        &self,
        _model: &str,
        _version: &str,
        _params: &GenerationParams,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A cancellable asynchronous sequence of text increments. Consumption is
/// strictly sequential; [`close`](Self::close) lets the orchestrator stop a
/// stream that a newer user action has superseded.
pub struct ModelStream {
    rx: mpsc::UnboundedReceiver<String>,
    task: Option<JoinHandle<()>>,
}

impl ModelStream {
    /// Wraps a channel fed by a producer task. The task is aborted on close.
    pub fn from_channel(rx: mpsc::UnboundedReceiver<String>, task: JoinHandle<()>) -> Self {
        Self {
            rx,
            task: Some(task),
        }
    }

    /// A stream over a fixed set of increments (tests, canned replies).
    pub fn from_increments(increments: Vec<String>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        for inc in increments {
            let _ = tx.send(inc);
        }
        Self { rx, task: None }
    }

    /// Next increment; `None` once generation ends (or the stream was closed).
    pub async fn next(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Stops consumption and aborts the producer. Idempotent.
    pub fn close(&mut self) {
        self.rx.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ModelStream {
    fn drop(&mut self) {
        self.close();
    }
}
