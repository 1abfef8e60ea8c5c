//! Workflow execution: step selection, prompt assembly, the completion
//! gateway client and the channel-agnostic message pipeline.

pub mod gateway;
pub mod pipeline;
pub mod provider;
pub mod router;
pub mod workflow;

pub use gateway::{GatewayClient, RetryPolicy};
pub use provider::{ChatRequest, ChatResponse, CompletionError, LlmProvider, Message, Role};
pub use router::{ProviderRouter, ProviderSlot};
pub use workflow::executor::{ExecutionInput, ExecutionOutcome, ExecutionResult, WorkflowExecutor};
