//! Recording implementation of [`relay_core::Transport`] for delivery tests.
//!
//! Records every transport operation so tests can assert on the exact
//! create/update/delete sequence, and lets tests script failures per
//! operation (e.g. "first edit of message 1 fails with TooLong").

// each test binary uses a different subset of the helpers
#![allow(dead_code)]

use async_trait::async_trait;
use relay_core::{ChatRef, Controls, Transport, TransportError, TransportResult};
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
    Document { path: PathBuf },
}

/// Transport mock: returns sequential ids for sends, records all calls, and
/// pops scripted failures keyed by `"<op>:<message_id>"`.
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

    /// Scripts the next failure for an operation key, e.g. `"edit:1"`.
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

    /// All `Edit` texts applied to the given message id, in order.
    pub fn edits_of(&self, message_id: &str) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Edit { message_id: id, text } if id == message_id => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Delete { message_id } => Some(message_id),
                _ => None,
            })
            .collect()
    }

    pub fn replies(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Reply { text, .. } => Some(text),
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
        if let Some(e) = self.take_failure(&format!("controls:{}", message_id)) {
            return Err(e);
        }
        self.record(Op::EditControls {
            message_id: message_id.to_string(),
            rows: controls.rows.len(),
        });
        Ok(())
    }

    async fn delete_message(&self, _chat: &ChatRef, message_id: &str) -> TransportResult<()> {
        if let Some(e) = self.take_failure(&format!("delete:{}", message_id)) {
            return Err(e);
        }
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
        _caption: &str,
    ) -> TransportResult<String> {
        self.record(Op::Document {
            path: path.to_path_buf(),
        });
        Ok(self.allocate_id())
    }
}
