//! Test doubles for orchestrator tests: a recording transport and a scripted
//! model provider. Neither touches the network.

// each test binary uses a different subset of the helpers
#![allow(dead_code)]

use async_trait::async_trait;
use relay_core::{ChatRef, Controls, Transport, TransportError, TransportResult};
use relay_model::{ModelProvider, ModelRequest, ModelStream};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

/// One recorded transport operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Send { text: String },
    SendMenu { text: String, rows: usize },
    Reply { reply_to: String, text: String },
    Edit { message_id: String, text: String },
    EditMenu { message_id: String, text: String, rows: usize },
    EditControls { message_id: String, rows: usize },
    Delete { message_id: String },
    AnswerCallback { text: Option<String>, alert: bool },
    Voice { path: PathBuf },
    Document { path: PathBuf, caption: String },
}

/// Transport mock: sequential ids for sends, records all calls, scripted
/// failures keyed by `"<op>:<message_id>"`.
#[derive(Default)]
pub struct RecordingTransport {
    ops: Mutex<Vec<Op>>,
    next_id: AtomicI64,
    failures: Mutex<HashMap<String, VecDeque<TransportError>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            ops: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(100),
            failures: Mutex::new(HashMap::new()),
        }
    }

    #[allow(dead_code)]
    pub fn queue_failure(&self, key: &str, error: TransportError) {
        self.failures
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push_back(error);
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }

    /// Texts of every menu shown (sent or edited), in order.
    pub fn menu_texts(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::SendMenu { text, .. } | Op::EditMenu { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn edits_of(&self, message_id: &str) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Edit { message_id: id, text } if id == message_id => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn answers(&self) -> Vec<(Option<String>, bool)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::AnswerCallback { text, alert } => Some((text, alert)),
                _ => None,
            })
            .collect()
    }

    pub fn sends(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Send { text } => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, op: Op) {
        self.ops.lock().unwrap().push(op);
    }

    fn take_failure(&self, key: &str) -> Option<TransportError> {
        self.failures
            .lock()
            .unwrap()
            .get_mut(key)
            .and_then(|q| q.pop_front())
    }

    fn allocate_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::SeqCst).to_string()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_message(&self, _chat: &ChatRef, text: &str) -> TransportResult<String> {
        if let Some(e) = self.take_failure("send") {
            return Err(e);
        }
        self.record(Op::Send {
            text: text.to_string(),
        });
        Ok(self.allocate_id())
    }

    async fn send_menu(
        &self,
        _chat: &ChatRef,
        text: &str,
        controls: &Controls,
    ) -> TransportResult<String> {
        if let Some(e) = self.take_failure("send_menu") {
            return Err(e);
        }
        self.record(Op::SendMenu {
            text: text.to_string(),
            rows: controls.rows.len(),
        });
        Ok(self.allocate_id())
    }

    async fn reply_to(
        &self,
        _chat: &ChatRef,
        reply_to: &str,
        text: &str,
    ) -> TransportResult<String> {
        if let Some(e) = self.take_failure(&format!("reply:{}", reply_to)) {
            return Err(e);
        }
        self.record(Op::Reply {
            reply_to: reply_to.to_string(),
            text: text.to_string(),
        });
        Ok(self.allocate_id())
    }

    async fn edit_message(
        &self,
        _chat: &ChatRef,
        message_id: &str,
        text: &str,
    ) -> TransportResult<()> {
        if let Some(e) = self.take_failure(&format!("edit:{}", message_id)) {
            return Err(e);
        }
        self.record(Op::Edit {
            message_id: message_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn edit_menu(
        &self,
        _chat: &ChatRef,
        message_id: &str,
        text: &str,
        controls: &Controls,
    ) -> TransportResult<()> {
        if let Some(e) = self.take_failure(&format!("edit_menu:{}", message_id)) {
            return Err(e);
        }
        self.record(Op::EditMenu {
            message_id: message_id.to_string(),
            text: text.to_string(),
            rows: controls.rows.len(),
        });
        Ok(())
    }

    async fn edit_controls(
        &self,
        _chat: &ChatRef,
        message_id: &str,
        controls: &Controls,
    ) -> TransportResult<()> {
        self.record(Op::EditControls {
            message_id: message_id.to_string(),
            rows: controls.rows.len(),
        });
        Ok(())
    }

    async fn delete_message(&self, _chat: &ChatRef, message_id: &str) -> TransportResult<()> {
        self.record(Op::Delete {
            message_id: message_id.to_string(),
        });
        Ok(())
    }

    async fn answer_callback(
        &self,
        _callback_id: &str,
        text: Option<&str>,
        alert: bool,
    ) -> TransportResult<()> {
        self.record(Op::AnswerCallback {
            text: text.map(String::from),
            alert,
        });
        Ok(())
    }

    async fn send_voice(
        &self,
        _chat: &ChatRef,
        _reply_to: &str,
        path: &Path,
    ) -> TransportResult<String> {
        self.record(Op::Voice {
            path: path.to_path_buf(),
        });
        Ok(self.allocate_id())
    }

    async fn send_document(
        &self,
        _chat: &ChatRef,
        path: &Path,
        caption: &str,
    ) -> TransportResult<String> {
        self.record(Op::Document {
            path: path.to_path_buf(),
            caption: caption.to_string(),
        });
        Ok(self.allocate_id())
    }
}

/// Provider double: pops one scripted increment list per open_stream call and
/// records every request it saw.
#[derive(Default)]
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Vec<String>>>,
    pub requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, increments: &[&str]) {
        self.scripts
            .lock()
            .unwrap()
            .push_back(increments.iter().map(|s| s.to_string()).collect());
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn open_stream(&self, request: ModelRequest) -> anyhow::Result<ModelStream> {
        self.requests.lock().unwrap().push(request);
        let increments = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        Ok(ModelStream::from_increments(increments))
    }
}
