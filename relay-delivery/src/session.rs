//! Response session state: one streamed model answer from placeholder to
//! final flush.
//!
//! Increments accumulate into a transient buffer; only when the buffer crosses
//! the flush threshold does the formatter → chunker → engine pipeline run.
//! This batches transport edits instead of issuing one per token, trading a
//! little latency for rate-limit headroom. Stream end forces one last delivery
//! so a below-threshold remainder is never lost.

use crate::{chunk, engine::DeliveryEngine, format};
use relay_core::{ChatRef, ContentKind, Controls};

/// Buffered characters required before a mid-stream delivery pass.
pub const FLUSH_THRESHOLD: usize = 100;

/// Per in-flight response: the accumulated text, the unflushed buffer, and
/// the identity/content-kind needed to drive delivery.
pub struct ResponseSession {
    chat: ChatRef,
    anchor: String,
    kind: ContentKind,
    accumulated: String,
    buffer: String,
    threshold: usize,
}

impl ResponseSession {
    pub fn new(chat: ChatRef, anchor: String, kind: ContentKind) -> Self {
        Self {
            chat,
            anchor,
            kind,
            accumulated: String::new(),
            buffer: String::new(),
            threshold: FLUSH_THRESHOLD,
        }
    }

    /// Overrides the flush threshold (tests use small values).
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    /// Identity of the response (anchor message id).
    pub fn anchor(&self) -> &str {
        &self.anchor
    }

    /// Full text received so far.
    pub fn text(&self) -> &str {
        &self.accumulated
    }

    /// Appends one stream increment. Returns true when the buffer crossed the
    /// threshold and the caller should [`flush`](Self::flush).
    pub fn push(&mut self, increment: &str) -> bool {
        self.accumulated.push_str(increment);
        self.buffer.push_str(increment);
        self.buffer.len() >= self.threshold
    }

    /// Runs one delivery pass over the accumulated text and clears the buffer.
    /// No-op when nothing is buffered.
    pub async fn flush(&mut self, engine: &DeliveryEngine, controls: Option<&Controls>) {
        if self.buffer.is_empty() {
            return;
        }
        self.buffer.clear();
        self.deliver(engine, controls).await;
    }

    /// Final delivery at stream end: flushes whatever remains even below the
    /// threshold. Returns the full accumulated text.
    pub async fn finish(
        &mut self,
        engine: &DeliveryEngine,
        controls: Option<&Controls>,
    ) -> &str {
        if !self.buffer.is_empty() {
            self.buffer.clear();
            self.deliver(engine, controls).await;
        }
        &self.accumulated
    }

    async fn deliver(&self, engine: &DeliveryEngine, controls: Option<&Controls>) {
        let formatted = format::format_content(&self.accumulated, self.kind);
        let chunks = chunk::split_message(&formatted);
        engine
            .deliver_or_update(&self.chat, &self.anchor, chunks, controls)
            .await;
    }
}
