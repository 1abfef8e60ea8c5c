//! Channel-agnostic inbound message handling.
//!
//! Channel hosts normalise their payloads into an `InboundMessage` and call
//! `process_inbound`; delivering the reply stays with the channel.

pub mod context;
pub mod process;

pub use context::MessageContext;
pub use process::{process_inbound, ProcessedMessage, ValidationError};
