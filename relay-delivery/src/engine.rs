//! Delivery engine: owns the mapping from one logical response to the set of
//! live transport messages displaying it, and reconciles that set against
//! every new chunk set.
//!
//! The identity of a response is the transport id of its anchor (first)
//! message. Delivery is loosely consistent and self-healing: any single
//! message operation may fail without corrupting the others, and the next
//! [`DeliveryEngine::deliver_or_update`] re-reconciles against the desired
//! chunk set instead of trusting prior state.

use crate::chunk;
use dashmap::DashMap;
use relay_core::{ChatRef, Controls, Transport, TransportError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Delay between consecutive sends, to stay under transport rate limits.
const SEND_SPACING: Duration = Duration::from_millis(100);
/// Retry attempts for a rate-limited operation before giving up on it.
const RETRY_BUDGET: u32 = 3;

/// Live transport messages currently displaying one response: a distinguished
/// anchor plus the ordered tail, never an undifferentiated list. Controls are
/// attached to the last handle only.
#[derive(Debug, Clone)]
pub struct DeliveredMessages {
    /// The placeholder/first message; its id is the response identity.
    pub anchor: String,
    /// Extra messages showing chunks `1..N`, oldest first.
    pub tail: Vec<String>,
    /// Chunk texts as of the last delivery pass; source for restore snapshots.
    chunks: Vec<String>,
}

impl DeliveredMessages {
    fn new(anchor: &str) -> Self {
        Self {
            anchor: anchor.to_string(),
            tail: Vec::new(),
            chunks: Vec::new(),
        }
    }

    fn len(&self) -> usize {
        1 + self.tail.len()
    }

    fn handle_at(&self, index: usize) -> &str {
        if index == 0 {
            &self.anchor
        } else {
            &self.tail[index - 1]
        }
    }

    fn last_handle(&self) -> &str {
        self.tail.last().map(String::as_str).unwrap_or(&self.anchor)
    }
}

/// Snapshot of `{chunk texts, controls}` saved per response identity so a
/// later back-navigation can reconstruct the exact prior rendering.
#[derive(Debug, Clone)]
pub struct RestoreState {
    pub chunks: Vec<String>,
    pub controls: Option<Controls>,
}

/// Process-wide delivery state, scoped to process lifetime. Entries are
/// cleared on explicit navigation-away ([`DeliveryEngine::delete_all`]); a
/// restart simply re-delivers fresh, which the reconciliation makes safe.
pub struct DeliveryEngine {
    transport: Arc<dyn Transport>,
    delivered: DashMap<String, DeliveredMessages>,
    saved: DashMap<String, RestoreState>,
    send_spacing: Duration,
}

impl DeliveryEngine {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            delivered: DashMap::new(),
            saved: DashMap::new(),
            send_spacing: SEND_SPACING,
        }
    }

    /// Overrides the inter-send delay (tests pass zero).
    pub fn with_send_spacing(mut self, spacing: Duration) -> Self {
        self.send_spacing = spacing;
        self
    }

    /// Makes the given chunk set visible for `anchor`, creating, editing, and
    /// deleting transport messages as needed. Controls land on the last
    /// message only. Individual failures are logged and skipped; a TooLong
    /// failure triggers the delete-rechunk-resend recovery.
    pub async fn deliver_or_update(
        &self,
        chat: &ChatRef,
        anchor: &str,
        chunks: Vec<String>,
        controls: Option<&Controls>,
    ) {
        if chunks.is_empty() {
            return;
        }

        let prior = self.delivered.get(anchor).map(|e| e.clone());
        let result = match prior {
            Some(set) => self.reconcile(chat, set, &chunks, controls).await,
            None => {
                self.place_fresh(chat, DeliveredMessages::new(anchor), &chunks, controls)
                    .await
            }
        };

        match result {
            Ok(set) => {
                self.delivered.insert(anchor.to_string(), set);
            }
            Err(TransportError::TooLong) => {
                warn!(anchor, "Chunk exceeded transport limit mid-delivery, re-sending from scratch");
                self.rechunk_and_resend(chat, anchor, &chunks, controls).await;
            }
            Err(e) => {
                error!(error = %e, anchor, "Delivery pass failed");
            }
        }
    }

    /// First delivery for an identity: edit the anchor to chunk 0, send the
    /// rest as replies with spacing, attach controls to the last handle.
    async fn place_fresh(
        &self,
        chat: &ChatRef,
        mut set: DeliveredMessages,
        chunks: &[String],
        controls: Option<&Controls>,
    ) -> Result<DeliveredMessages, TransportError> {
        match self.edit_with_retry(chat, &set.anchor, &chunks[0]).await {
            Ok(()) => {}
            Err(TransportError::TooLong) => return Err(TransportError::TooLong),
            Err(e) => error!(error = %e, "Error editing first message"),
        }

        for chunk in &chunks[1..] {
            tokio::time::sleep(self.send_spacing).await;
            match self.send_reply_with_retry(chat, &set.anchor, chunk).await {
                Ok(id) => set.tail.push(id),
                Err(TransportError::TooLong) => return Err(TransportError::TooLong),
                Err(e) => error!(error = %e, "Error sending message chunk"),
            }
        }

        self.attach_controls(chat, set.last_handle(), controls).await;
        set.chunks = chunks.to_vec();
        Ok(set)
    }

    /// Subsequent delivery: grow or shrink the handle set to match the chunk
    /// count, then update every position.
    async fn reconcile(
        &self,
        chat: &ChatRef,
        mut set: DeliveredMessages,
        chunks: &[String],
        controls: Option<&Controls>,
    ) -> Result<DeliveredMessages, TransportError> {
        while set.len() < chunks.len() {
            tokio::time::sleep(self.send_spacing).await;
            let next = &chunks[set.len()];
            match self.send_reply_with_retry(chat, &set.anchor, next).await {
                Ok(id) => set.tail.push(id),
                Err(e) => {
                    error!(error = %e, "Error growing message set");
                    break;
                }
            }
        }

        while set.len() > chunks.len() {
            // anchor is never popped; chunks is non-empty so len() >= 1 holds
            let excess = match set.tail.pop() {
                Some(id) => id,
                None => break,
            };
            if let Err(e) = self.delete_with_retry(chat, &excess).await {
                error!(error = %e, "Error deleting excess message");
            }
        }

        let positions = set.len().min(chunks.len());
        for (i, chunk) in chunks.iter().enumerate().take(positions) {
            let handle = set.handle_at(i).to_string();
            match self.edit_with_retry(chat, &handle, chunk).await {
                Ok(()) => {}
                Err(TransportError::TooLong) => return Err(TransportError::TooLong),
                Err(e) => error!(error = %e, position = i, "Error updating chunk"),
            }
        }

        self.attach_controls(chat, set.last_handle(), controls).await;
        set.chunks = chunks.to_vec();
        Ok(set)
    }

    /// TooLong recovery: drop every message after the anchor, re-run the
    /// chunker over the joined text, and place the result fresh. Hard-wrapping
    /// in the chunker guarantees the second pass fits.
    async fn rechunk_and_resend(
        &self,
        chat: &ChatRef,
        anchor: &str,
        chunks: &[String],
        controls: Option<&Controls>,
    ) {
        self.delete_all(chat, anchor).await;
        let rechunked = chunk::split_message(&chunks.join("\n"));
        if rechunked.is_empty() {
            return;
        }
        match self
            .place_fresh(chat, DeliveredMessages::new(anchor), &rechunked, controls)
            .await
        {
            Ok(set) => {
                self.delivered.insert(anchor.to_string(), set);
            }
            Err(e) => error!(error = %e, anchor, "Re-send from scratch failed"),
        }
    }

    /// Re-displays the saved chunk set for `anchor` after back-navigation.
    /// Chunk 0 is applied by editing the anchor; the rest may have been
    /// deleted in the interim, so they are sent anew and the recorded handles
    /// replaced. The snapshot is consumed.
    pub async fn restore(&self, chat: &ChatRef, anchor: &str) -> bool {
        let Some((_, state)) = self.saved.remove(anchor) else {
            return false;
        };
        if state.chunks.is_empty() {
            return false;
        }

        // Old tail handles may show an obscuring view by now; drop them so
        // the restored rendering is the only one visible
        if let Some((_, stale)) = self.delivered.remove(anchor) {
            for id in &stale.tail {
                if let Err(e) = self.delete_with_retry(chat, id).await {
                    warn!(error = %e, "Error clearing stale message before restore");
                }
            }
        }

        let mut set = DeliveredMessages::new(anchor);
        for (i, chunk) in state.chunks.iter().enumerate() {
            if i == 0 {
                if let Err(e) = self.edit_with_retry(chat, anchor, chunk).await {
                    error!(error = %e, position = i, "Error restoring chunk");
                }
            } else {
                tokio::time::sleep(self.send_spacing).await;
                match self.send_reply_with_retry(chat, anchor, chunk).await {
                    Ok(id) => set.tail.push(id),
                    Err(e) => error!(error = %e, position = i, "Error restoring chunk"),
                }
            }
        }

        self.attach_controls(chat, set.last_handle(), state.controls.as_ref())
            .await;
        set.chunks = state.chunks;
        self.delivered.insert(anchor.to_string(), set);
        true
    }

    /// Snapshots the current rendering of `anchor` (chunks + the controls to
    /// reattach) before it is obscured by another view.
    pub fn save_restore_state(&self, anchor: &str, controls: Option<Controls>) {
        if let Some(set) = self.delivered.get(anchor) {
            self.saved.insert(
                anchor.to_string(),
                RestoreState {
                    chunks: set.chunks.clone(),
                    controls,
                },
            );
        }
    }

    /// True when a saved snapshot exists for `anchor`.
    pub fn has_restore_state(&self, anchor: &str) -> bool {
        self.saved.contains_key(anchor)
    }

    /// Deletes every message after the anchor (the anchor itself belongs to
    /// the caller) and clears the delivery entry.
    pub async fn delete_all(&self, chat: &ChatRef, anchor: &str) {
        if let Some((_, set)) = self.delivered.remove(anchor) {
            for id in &set.tail {
                if let Err(e) = self.delete_with_retry(chat, id).await {
                    error!(error = %e, "Error deleting message chunk");
                }
            }
        }
    }

    /// Resolves any live handle (anchor or tail member) back to its response
    /// identity. Controls sit on the last handle, so a menu tap may arrive on
    /// a tail message; the engine is the only component that knows the link.
    pub fn identity_of_handle(&self, handle: &str) -> Option<String> {
        self.delivered.iter().find_map(|entry| {
            let set = entry.value();
            if set.anchor == handle || set.tail.iter().any(|h| h == handle) {
                Some(set.anchor.clone())
            } else {
                None
            }
        })
    }

    /// Number of live handles for `anchor` (0 when not delivered).
    pub fn delivered_len(&self, anchor: &str) -> usize {
        self.delivered.get(anchor).map(|s| s.len()).unwrap_or(0)
    }

    // ---------- Per-operation failure handling ----------

    /// Edit with per-failure recovery: NotModified is success, RateLimited
    /// retries within the budget, BadRequest deletes the broken target, and
    /// everything else surfaces to the caller to log and skip.
    async fn edit_with_retry(
        &self,
        chat: &ChatRef,
        message_id: &str,
        text: &str,
    ) -> Result<(), TransportError> {
        let mut attempts = 0;
        loop {
            match self.transport.edit_message(chat, message_id, text).await {
                Ok(()) => return Ok(()),
                Err(TransportError::NotModified) => {
                    debug!(message_id, "Edit skipped: content unchanged");
                    return Ok(());
                }
                Err(TransportError::RateLimited { retry_after }) if attempts < RETRY_BUDGET => {
                    attempts += 1;
                    warn!(message_id, attempts, "Rate limited, retrying edit after {:?}", retry_after);
                    tokio::time::sleep(retry_after).await;
                }
                Err(TransportError::BadRequest(reason)) => {
                    // Target gone; delete it so we do not keep failing on it
                    let _ = self.transport.delete_message(chat, message_id).await;
                    return Err(TransportError::BadRequest(reason));
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_reply_with_retry(
        &self,
        chat: &ChatRef,
        reply_to: &str,
        text: &str,
    ) -> Result<String, TransportError> {
        let mut attempts = 0;
        loop {
            match self.transport.reply_to(chat, reply_to, text).await {
                Ok(id) => return Ok(id),
                Err(TransportError::RateLimited { retry_after }) if attempts < RETRY_BUDGET => {
                    attempts += 1;
                    warn!(attempts, "Rate limited, retrying send after {:?}", retry_after);
                    tokio::time::sleep(retry_after).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn delete_with_retry(&self, chat: &ChatRef, message_id: &str) -> Result<(), TransportError> {
        let mut attempts = 0;
        loop {
            match self.transport.delete_message(chat, message_id).await {
                Ok(()) => return Ok(()),
                Err(TransportError::RateLimited { retry_after }) if attempts < RETRY_BUDGET => {
                    attempts += 1;
                    tokio::time::sleep(retry_after).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Best-effort controls attachment; NotModified and failures only log.
    async fn attach_controls(&self, chat: &ChatRef, message_id: &str, controls: Option<&Controls>) {
        let Some(controls) = controls else { return };
        match self.transport.edit_controls(chat, message_id, controls).await {
            Ok(()) | Err(TransportError::NotModified) => {}
            Err(e) => error!(error = %e, message_id, "Error adding reply controls"),
        }
    }
}
