/// CoHub Messaging Client Core
///
/// Client-side engine for the CoHub messaging subsystem: read-state
/// tracking, conversation summaries, unread evaluation, optimistic message
/// composition, and polling synchronization against the platform's REST
/// backend.

pub mod api;
pub mod cli_app;
pub mod config;
pub mod error;
pub mod messenger;
pub mod read_marker;
pub mod storage;
pub mod summary;
pub mod transcript;
pub mod types;
pub mod unread;

pub use config::Config;
pub use error::{ClientError, Result};
pub use messenger::Messenger;
pub use types::{DeliveryStatus, Message, PartnerId};
