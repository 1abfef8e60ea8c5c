//! Conversation history and message-log persistence.
//!
//! Both tables are append-only. History is read back as a bounded window of
//! the most recent turns; nothing is ever summarised or compacted.

pub mod db;
pub mod error;
pub mod manager;
pub mod types;

pub use error::MemoryError;
pub use manager::MemoryManager;
pub use types::{ConversationMessage, Direction, MessageLog};
