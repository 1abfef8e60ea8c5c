use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, instrument, warn};

use flowbot_core::{AgentProfile, Platform, WorkflowSpec, WorkflowStep};
use flowbot_memory::ConversationMessage;

use crate::provider::{ChatRequest, LlmProvider};

use super::prompt::{build_messages, PromptInput, HISTORY_WINDOW};
use super::selector::{select_step, StepMatch};

/// What end users see when a turn fails. The detail goes to logs and to
/// API callers through `ExecutionOutcome::Failed`.
pub const FALLBACK_REPLY: &str =
    "Sorry, I ran into a problem while handling your message. Please try again in a moment.";

/// Label of the placeholder step reported when a workflow has no steps.
pub const ERROR_STEP_LABEL: &str = "Error";

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// A keyword rule picked the step.
    Matched,
    /// No rule matched and the first step answered.
    NoMatch,
    /// Selection or completion failed; the reply is `FALLBACK_REPLY`.
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub response_text: String,
    pub matched_step: WorkflowStep,
    pub matched_step_index: usize,
    pub elapsed_millis: u64,
    pub outcome: ExecutionOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub tokens_in: u32,
    pub tokens_out: u32,
}

impl ExecutionResult {
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, ExecutionOutcome::Failed { .. })
    }

    /// Failure detail, for API and dashboard callers only.
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            ExecutionOutcome::Failed { reason } => Some(reason),
            _ => None,
        }
    }
}

/// One turn's worth of input beyond the workflow itself.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionInput<'a> {
    pub agent: &'a AgentProfile,
    pub history: &'a [ConversationMessage],
    pub user_message: &'a str,
    pub user_name: Option<&'a str>,
    pub platform: Option<Platform>,
    pub history_window: usize,
}

impl<'a> ExecutionInput<'a> {
    pub fn new(agent: &'a AgentProfile, user_message: &'a str) -> Self {
        Self {
            agent,
            history: &[],
            user_message,
            user_name: None,
            platform: None,
            history_window: HISTORY_WINDOW,
        }
    }
}

/// Runs one inbound message through a workflow.
///
/// Never fails: every error is folded into the returned result so the
/// channel that called it can always answer.
pub struct WorkflowExecutor {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl WorkflowExecutor {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: 1000,
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run a bare workflow with no history, as the dashboard test console does.
    pub async fn execute(
        &self,
        spec: &WorkflowSpec,
        user_message: &str,
        user_name: Option<&str>,
    ) -> ExecutionResult {
        let agent = AgentProfile::from_workflow(spec.clone());
        let input = ExecutionInput {
            user_name,
            ..ExecutionInput::new(&agent, user_message)
        };
        self.execute_with(input).await
    }

    #[instrument(skip_all, fields(workflow = %input.agent.workflow.name))]
    pub async fn execute_with(&self, input: ExecutionInput<'_>) -> ExecutionResult {
        let started = Instant::now();
        let spec = &input.agent.workflow;

        let selected = match select_step(spec, input.user_message) {
            Ok(m) => m,
            Err(e) => return failed(spec, e.to_string(), started),
        };
        debug!(
            step = %selected.step().label,
            index = selected.index(),
            matched = selected.is_match(),
            "step selected"
        );

        let prompt = PromptInput {
            agent: input.agent,
            step: selected.step(),
            history: input.history,
            user_message: input.user_message,
            user_name: input.user_name,
            platform: input.platform,
            window: input.history_window,
        };
        let request = ChatRequest {
            model: self.model.clone(),
            messages: build_messages(&prompt),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        match self.provider.send(&request).await {
            Ok(resp) => ExecutionResult {
                response_text: resp.content,
                matched_step: selected.step().clone(),
                matched_step_index: selected.index(),
                elapsed_millis: elapsed_ms(started),
                outcome: match selected {
                    StepMatch::Matched { .. } => ExecutionOutcome::Matched,
                    StepMatch::NoMatch { .. } => ExecutionOutcome::NoMatch,
                },
                model: Some(resp.model),
                tokens_in: resp.tokens_in,
                tokens_out: resp.tokens_out,
            },
            Err(e) => failed(spec, e.to_string(), started),
        }
    }
}

fn failed(spec: &WorkflowSpec, reason: String, started: Instant) -> ExecutionResult {
    warn!(workflow = %spec.name, %reason, "workflow execution failed");
    let matched_step = spec
        .steps
        .first()
        .cloned()
        .unwrap_or_else(|| WorkflowStep::new(ERROR_STEP_LABEL, reason.clone()));
    ExecutionResult {
        response_text: FALLBACK_REPLY.to_string(),
        matched_step,
        matched_step_index: 0,
        elapsed_millis: elapsed_ms(started),
        outcome: ExecutionOutcome::Failed { reason },
        model: None,
        tokens_in: 0,
        tokens_out: 0,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatResponse, CompletionError, Role};
    use async_trait::async_trait;
    use flowbot_core::WorkflowTrigger;
    use std::sync::Mutex;

    /// Keeps the last request so tests can inspect the prompt.
    struct Recorder {
        last: Mutex<Option<ChatRequest>>,
    }

    #[async_trait]
    impl LlmProvider for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }
        async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, CompletionError> {
            *self.last.lock().unwrap() = Some(req.clone());
            Ok(ChatResponse {
                content: "sure thing".to_string(),
                model: req.model.clone(),
                tokens_in: 12,
                tokens_out: 3,
                finish_reason: "stop".to_string(),
            })
        }
    }

    struct Broken;

    #[async_trait]
    impl LlmProvider for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, CompletionError> {
            Err(CompletionError::EmptyChoices)
        }
    }

    fn support_flow() -> WorkflowSpec {
        WorkflowSpec {
            name: "Support".to_string(),
            description: String::new(),
            trigger: WorkflowTrigger { label: "msg".to_string(), description: String::new() },
            steps: vec![
                WorkflowStep::new("Analyze", "analyze customer intent"),
                WorkflowStep::new("Route", "route to human support"),
            ],
        }
    }

    #[tokio::test]
    async fn matched_step_reaches_the_prompt() {
        let recorder = Arc::new(Recorder { last: Mutex::new(None) });
        let exec = WorkflowExecutor::new(recorder.clone(), "model-a");

        let result = exec.execute(&support_flow(), "get me a human", Some("Sam")).await;
        assert_eq!(result.outcome, ExecutionOutcome::Matched);
        assert_eq!(result.matched_step_index, 1);
        assert_eq!(result.response_text, "sure thing");
        assert_eq!(result.model.as_deref(), Some("model-a"));

        let req = recorder.last.lock().unwrap().clone().unwrap();
        assert_eq!(req.messages[0].role, Role::System);
        assert!(req.messages[0].content.contains("## Current step: Route"));
        assert_eq!(req.messages.len(), 2);
    }

    #[tokio::test]
    async fn no_match_is_distinct_from_failure() {
        let exec = WorkflowExecutor::new(Arc::new(Recorder { last: Mutex::new(None) }), "m");
        let result = exec.execute(&support_flow(), "hello", None).await;
        assert_eq!(result.outcome, ExecutionOutcome::NoMatch);
        assert_eq!(result.matched_step_index, 0);
        assert!(!result.is_error());
    }

    #[tokio::test]
    async fn completion_failure_becomes_fallback_reply() {
        let exec = WorkflowExecutor::new(Arc::new(Broken), "m");
        let result = exec.execute(&support_flow(), "escalate please", None).await;

        assert!(result.is_error());
        assert_eq!(result.response_text, FALLBACK_REPLY);
        assert_eq!(result.matched_step.label, "Analyze");
        assert_eq!(result.matched_step_index, 0);
        assert!(result.error().unwrap().contains("no choices"));
    }

    #[tokio::test]
    async fn empty_workflow_reports_error_pseudo_step() {
        let mut spec = support_flow();
        spec.steps.clear();
        let exec = WorkflowExecutor::new(Arc::new(Recorder { last: Mutex::new(None) }), "m");

        let result = exec.execute(&spec, "hi", None).await;
        assert_eq!(result.matched_step.label, ERROR_STEP_LABEL);
        assert_eq!(result.error(), Some("workflow has no steps"));
    }

    #[test]
    fn result_serializes_camel_case() {
        let result = ExecutionResult {
            response_text: "hi".to_string(),
            matched_step: WorkflowStep::new("A", "a"),
            matched_step_index: 0,
            elapsed_millis: 5,
            outcome: ExecutionOutcome::NoMatch,
            model: None,
            tokens_in: 0,
            tokens_out: 0,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["responseText"], "hi");
        assert_eq!(json["matchedStepIndex"], 0);
        assert_eq!(json["elapsedMillis"], 5);
        assert_eq!(json["outcome"]["kind"], "no_match");
    }
}
