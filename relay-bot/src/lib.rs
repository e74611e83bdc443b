//! # relay-bot
//!
//! The orchestration layer: per-user conversation/settings state machine,
//! callback command decoding, keyboard construction, transcript export, the
//! speech-synthesis boundary, and env config. The binary in `main.rs` wires
//! it all onto a teloxide dispatcher.

pub mod adapters;
pub mod command;
pub mod config;
pub mod export;
pub mod keyboards;
pub mod orchestrator;
pub mod session;
pub mod speech;

pub use adapters::{TelegramCallbackWrapper, TelegramMessageWrapper};
pub use command::CallbackCommand;
pub use config::BotConfig;
pub use export::{MarkdownExporter, TextExporter, TranscriptExporter};
pub use orchestrator::Orchestrator;
pub use session::{SessionRegistry, UiMode, UserSession};
pub use speech::SpeechSynthesizer;
