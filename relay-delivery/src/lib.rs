//! # relay-delivery
//!
//! The long-message delivery subsystem: streams incrementally-generated model
//! output into the transport's edit/length constraints.
//!
//! Pipeline: [`format::format_content`] makes the text render-safe →
//! [`chunk::split_message`] cuts it into per-message chunks →
//! [`engine::DeliveryEngine`] reconciles the live transport messages with the
//! chunk set → [`session::ResponseSession`] drives the pipeline from buffered
//! stream increments and keeps restore metadata alive for back-navigation.

pub mod chunk;
pub mod engine;
pub mod format;
pub mod session;

pub use chunk::{split_message, MAX_MESSAGE_LEN};
pub use engine::{DeliveredMessages, DeliveryEngine, RestoreState};
pub use format::format_content;
pub use session::{ResponseSession, FLUSH_THRESHOLD};
