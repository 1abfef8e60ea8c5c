//! The workflow-execution path: pick a step, build the prompt, call the
//! completion provider, and report what happened.

pub mod executor;
pub mod generate;
pub mod prompt;
pub mod selector;

pub use executor::{ExecutionInput, ExecutionOutcome, ExecutionResult, WorkflowExecutor, FALLBACK_REPLY};
pub use generate::{edit_workflow, generate_workflow, GenerateError};
pub use prompt::{build_messages, PromptInput, HISTORY_WINDOW};
pub use selector::{select_step, SelectError, StepMatch};
