//! # relay-core
//!
//! Transport-agnostic core for the relay bot: chat/controls value types, the
//! [`Transport`] trait with its failure taxonomy, the Telegram (teloxide)
//! implementation, and tracing setup. No model, storage, or delivery logic here.

mod error;
mod logger;
mod transport;
mod types;

pub use error::{RelayError, Result, TransportError};
pub use logger::init_tracing;
pub use transport::{parse_message_id, TelegramTransport, Transport, TransportResult};
pub use types::{btn, Button, CallbackAction, ChatRef, ContentKind, Controls, Incoming, Role};
