//! Channel adapters: turn platform webhook payloads into `InboundMessage`s
//! and deliver replies back to the platform.

pub mod adapter;
pub mod api;
pub mod error;
pub mod slack;
pub mod telegram;
pub mod widget;

pub use adapter::{adapter_for, ChannelAdapter, Delivery, RequestMeta};
pub use error::ChannelError;
pub use flowbot_core::InboundMessage;
