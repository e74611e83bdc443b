//! Session registry: the explicit in-memory keyed store for per-user state.
//!
//! One entry per user id, created on first interaction, never persisted; the
//! durable parts (model, version, params) are mirrored to the chat store by
//! the orchestrator. The registry also owns the per-user response epoch used
//! to supersede an in-flight stream when a newer action arrives.

use dashmap::DashMap;
use relay_model::GenerationParams;

/// Transient UI mode a user can be in. Free text is interpreted against this.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum UiMode {
    #[default]
    Idle,
    SelectingModel,
    /// Next free-text message is consumed as the new title for this chat.
    RenamingChat(i64),
    /// A parameter adjustment menu is open for this parameter.
    AdjustingParam(String),
}

/// Per-user state: selected model+version, active chat, generation params,
/// and the transient UI mode.
#[derive(Debug, Clone, Default)]
pub struct UserSession {
    pub model: Option<String>,
    pub version: Option<String>,
    pub active_chat: Option<i64>,
    pub params: GenerationParams,
    pub mode: UiMode,
}

/// Concurrent keyed store for [`UserSession`]s plus response epochs. Entries
/// for unrelated users are fully independent; one user's handlers run
/// single-writer (serialized by the user's own input cadence), so no
/// per-entry locking beyond the map's own sharding is needed.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<i64, UserSession>,
    epochs: DashMap<i64, u64>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when a session entry already exists for the user.
    pub fn contains(&self, user_id: i64) -> bool {
        self.sessions.contains_key(&user_id)
    }

    /// Snapshot of the user's session (default when absent).
    pub fn session(&self, user_id: i64) -> UserSession {
        self.sessions
            .get(&user_id)
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn insert(&self, user_id: i64, session: UserSession) {
        self.sessions.insert(user_id, session);
    }

    /// Mutates the user's session in place, creating it when absent.
    pub fn update(&self, user_id: i64, f: impl FnOnce(&mut UserSession)) {
        let mut entry = self.sessions.entry(user_id).or_default();
        f(&mut entry);
    }

    pub fn mode(&self, user_id: i64) -> UiMode {
        self.sessions
            .get(&user_id)
            .map(|s| s.mode.clone())
            .unwrap_or_default()
    }

    pub fn set_mode(&self, user_id: i64, mode: UiMode) {
        self.update(user_id, |s| s.mode = mode);
    }

    /// Starts a new response for the user: bumps the epoch so any older
    /// stream still being consumed sees itself superseded.
    pub fn begin_response(&self, user_id: i64) -> u64 {
        let mut entry = self.epochs.entry(user_id).or_insert(0);
        *entry += 1;
        *entry
    }

    /// Epoch of the newest response for the user.
    pub fn current_epoch(&self, user_id: i64) -> u64 {
        self.epochs.get(&user_id).map(|e| *e).unwrap_or(0)
    }
}
