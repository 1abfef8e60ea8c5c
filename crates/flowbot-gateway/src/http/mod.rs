pub mod api;
pub mod error;
pub mod health;
pub mod inbound;
pub mod webhooks;
pub mod widget;
pub mod workflows;
