use tracing::{info, instrument};

use flowbot_core::WorkflowSpec;

use crate::provider::{ChatRequest, CompletionError, LlmProvider, Message};

const GENERATE_TEMPERATURE: f32 = 0.4;
const GENERATE_MAX_TOKENS: u32 = 1500;

const SCHEMA_HINT: &str = r#"Respond with a single JSON object and nothing else, shaped exactly like:
{"name": "...", "description": "...", "trigger": {"label": "...", "description": "..."}, "steps": [{"label": "...", "description": "..."}]}
Use 2 to 6 steps. Describe each step in one sentence. Where it fits, use the words
"analyze", "support", "route" or "guide" in step descriptions."#;

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("prompt is required")]
    EmptyPrompt,

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("generated workflow is invalid: {0}")]
    InvalidSpec(String),
}

/// Turn a plain-language description of an agent into a workflow.
#[instrument(skip(provider, prompt), fields(provider = provider.name()))]
pub async fn generate_workflow(
    provider: &dyn LlmProvider,
    model: &str,
    prompt: &str,
) -> Result<WorkflowSpec, GenerateError> {
    if prompt.trim().is_empty() {
        return Err(GenerateError::EmptyPrompt);
    }
    let system = format!(
        "You design conversational workflows for customer-facing chat agents.\n{}",
        SCHEMA_HINT
    );
    let spec = request_spec(provider, model, system, prompt.trim().to_string()).await?;
    info!(name = %spec.name, steps = spec.steps.len(), "workflow generated");
    Ok(spec)
}

/// Revise an existing workflow according to an instruction.
#[instrument(skip(provider, current, instruction), fields(provider = provider.name(), workflow = %current.name))]
pub async fn edit_workflow(
    provider: &dyn LlmProvider,
    model: &str,
    current: &WorkflowSpec,
    instruction: &str,
) -> Result<WorkflowSpec, GenerateError> {
    if instruction.trim().is_empty() {
        return Err(GenerateError::EmptyPrompt);
    }
    let current_json = serde_json::to_string_pretty(current)
        .map_err(|e| GenerateError::InvalidSpec(e.to_string()))?;
    let system = format!(
        "You revise conversational workflows for customer-facing chat agents. \
         Keep everything the instruction does not ask to change.\n{}",
        SCHEMA_HINT
    );
    let user = format!(
        "Current workflow:\n{}\n\nChange requested:\n{}",
        current_json,
        instruction.trim()
    );
    let spec = request_spec(provider, model, system, user).await?;
    info!(name = %spec.name, steps = spec.steps.len(), "workflow edited");
    Ok(spec)
}

async fn request_spec(
    provider: &dyn LlmProvider,
    model: &str,
    system: String,
    user: String,
) -> Result<WorkflowSpec, GenerateError> {
    let req = ChatRequest {
        model: model.to_string(),
        messages: vec![Message::system(system), Message::user(user)],
        temperature: GENERATE_TEMPERATURE,
        max_tokens: GENERATE_MAX_TOKENS,
    };
    let resp = provider.send(&req).await?;
    parse_spec(&resp.content)
}

/// Parse model output into a workflow, tolerating a Markdown code fence.
pub fn parse_spec(raw: &str) -> Result<WorkflowSpec, GenerateError> {
    let json = strip_code_fences(raw);
    let spec: WorkflowSpec =
        serde_json::from_str(json).map_err(|e| GenerateError::InvalidSpec(e.to_string()))?;
    if spec.steps.is_empty() {
        return Err(GenerateError::InvalidSpec("workflow has no steps".to_string()));
    }
    if spec.name.trim().is_empty() {
        return Err(GenerateError::InvalidSpec("workflow has no name".to_string()));
    }
    Ok(spec)
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().trim_end_matches("```").trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ChatResponse;
    use async_trait::async_trait;

    struct Canned(&'static str);

    #[async_trait]
    impl LlmProvider for Canned {
        fn name(&self) -> &str {
            "canned"
        }
        async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, CompletionError> {
            Ok(ChatResponse {
                content: self.0.to_string(),
                model: req.model.clone(),
                tokens_in: 0,
                tokens_out: 0,
                finish_reason: "stop".to_string(),
            })
        }
    }

    const FENCED: &str = "```json\n{\"name\":\"Support\",\"description\":\"d\",\
        \"trigger\":{\"label\":\"New message\",\"description\":\"\"},\
        \"steps\":[{\"label\":\"Analyze\",\"description\":\"analyze intent\"}]}\n```";

    #[tokio::test]
    async fn generates_from_fenced_json() {
        let spec = generate_workflow(&Canned(FENCED), "m", "a support bot").await.unwrap();
        assert_eq!(spec.name, "Support");
        assert_eq!(spec.steps[0].label, "Analyze");
    }

    #[tokio::test]
    async fn blank_prompt_is_rejected_before_any_call() {
        let err = generate_workflow(&Canned("unused"), "m", "   ").await.unwrap_err();
        assert!(matches!(err, GenerateError::EmptyPrompt));
    }

    #[tokio::test]
    async fn edit_round_trips_through_provider() {
        let current = parse_spec(FENCED).unwrap();
        let spec = edit_workflow(&Canned(FENCED), "m", &current, "rename it").await.unwrap();
        assert_eq!(spec, current);
    }

    #[test]
    fn stepless_or_prose_output_is_invalid() {
        let stepless = r#"{"name":"x","trigger":{"label":"t"},"steps":[]}"#;
        assert!(matches!(parse_spec(stepless), Err(GenerateError::InvalidSpec(_))));
        assert!(matches!(parse_spec("Sure! Here is"), Err(GenerateError::InvalidSpec(_))));
    }

    #[test]
    fn bare_json_passes_through_fence_stripping() {
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
    }
}
