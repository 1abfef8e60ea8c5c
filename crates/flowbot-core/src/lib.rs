pub mod config;
pub mod error;
pub mod types;
pub mod workflow;

pub use error::{FlowbotError, Result};
pub use types::{ChannelConfig, ConversationKey, DeploymentId, InboundMessage, Platform};
pub use workflow::{AgentProfile, WorkflowSpec, WorkflowStep, WorkflowTrigger};
