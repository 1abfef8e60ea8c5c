use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use tracing::{info, instrument, warn};

use flowbot_core::{ConversationKey, InboundMessage};
use flowbot_deployments::Deployment;
use flowbot_memory::{ConversationMessage, Direction, MessageLog};

use crate::workflow::{ExecutionInput, ExecutionResult};

use super::context::MessageContext;

/// Required fields missing from an inbound request. Surfaces as HTTP 400.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("message is required")]
    MissingMessage,
    #[error("userId is required")]
    MissingUserId,
}

/// Outcome of one pipeline turn.
#[derive(Debug, Clone)]
pub struct ProcessedMessage {
    /// Text to deliver on the channel. On failure this is the apology.
    pub reply: String,
    pub execution: ExecutionResult,
    /// Failure detail. Only API and dashboard callers should see it.
    pub error: Option<String>,
    pub conversation_key: ConversationKey,
}

/// Run one inbound message for a deployment.
///
/// 1. Validate the required fields.
/// 2. Log the inbound message.
/// 3. Load the conversation's recent history.
/// 4. Execute the deployment's workflow.
/// 5. Save both turns and log the outbound reply.
///
/// Only validation can fail. Persistence errors are logged and dropped so
/// they never stop the reply, and execution failures are already folded
/// into the result.
#[instrument(skip_all, fields(deployment = %deployment.id, platform = %inbound.platform))]
pub async fn process_inbound<C: MessageContext + ?Sized>(
    ctx: &C,
    deployment: &Deployment,
    inbound: &InboundMessage,
) -> Result<ProcessedMessage, ValidationError> {
    if inbound.message.trim().is_empty() {
        return Err(ValidationError::MissingMessage);
    }
    if inbound.user_id.trim().is_empty() {
        return Err(ValidationError::MissingUserId);
    }

    let started = Instant::now();
    let key = ConversationKey::new(&deployment.id, &inbound.user_id, inbound.platform);

    if let Err(e) = ctx.memory().log_message(&MessageLog {
        id: 0,
        deployment_id: deployment.id.to_string(),
        user_id: inbound.user_id.clone(),
        platform: inbound.platform.to_string(),
        chat_id: inbound.chat_id.clone(),
        direction: Direction::Inbound,
        content: inbound.message.clone(),
        error: None,
        elapsed_ms: None,
        created_at: now(),
    }) {
        warn!(error = %e, "failed to log inbound message");
    }

    let history = ctx
        .memory()
        .get_history(key.as_str(), ctx.history_window())
        .unwrap_or_else(|e| {
            warn!(error = %e, key = %key, "failed to load history, continuing without it");
            Vec::new()
        });

    let execution = ctx
        .executor()
        .execute_with(ExecutionInput {
            agent: &deployment.agent,
            history: &history,
            user_message: &inbound.message,
            user_name: inbound.user_name.as_deref(),
            platform: Some(inbound.platform),
            history_window: ctx.history_window(),
        })
        .await;

    // A failed turn is not remembered; the user will usually just retry.
    if !execution.is_error() {
        save_turns(ctx, deployment, inbound, &key, &execution);
    }

    let error = execution.error().map(str::to_string);
    if let Err(e) = ctx.memory().log_message(&MessageLog {
        id: 0,
        deployment_id: deployment.id.to_string(),
        user_id: inbound.user_id.clone(),
        platform: inbound.platform.to_string(),
        chat_id: inbound.chat_id.clone(),
        direction: Direction::Outbound,
        content: execution.response_text.clone(),
        error: error.clone(),
        elapsed_ms: Some(started.elapsed().as_millis() as u64),
        created_at: now(),
    }) {
        warn!(error = %e, "failed to log outbound message");
    }

    info!(
        key = %key,
        step = %execution.matched_step.label,
        elapsed_ms = execution.elapsed_millis,
        tokens_in = execution.tokens_in,
        tokens_out = execution.tokens_out,
        failed = execution.is_error(),
        "pipeline: message processed"
    );

    Ok(ProcessedMessage {
        reply: execution.response_text.clone(),
        execution,
        error,
        conversation_key: key,
    })
}

fn save_turns<C: MessageContext + ?Sized>(
    ctx: &C,
    deployment: &Deployment,
    inbound: &InboundMessage,
    key: &ConversationKey,
    execution: &ExecutionResult,
) {
    let at = now();
    let turn = |role: &str, content: &str| ConversationMessage {
        id: 0,
        conversation_key: key.to_string(),
        deployment_id: deployment.id.to_string(),
        user_id: inbound.user_id.clone(),
        platform: inbound.platform.to_string(),
        role: role.to_string(),
        content: content.to_string(),
        model_used: None,
        tokens_in: 0,
        tokens_out: 0,
        created_at: at.clone(),
    };

    let user = turn("user", &inbound.message);
    let assistant = ConversationMessage {
        model_used: execution.model.clone(),
        tokens_in: execution.tokens_in,
        tokens_out: execution.tokens_out,
        ..turn("assistant", &execution.response_text)
    };

    for msg in [user, assistant] {
        if let Err(e) = ctx.memory().save_message(&msg) {
            warn!(error = %e, key = %key, role = %msg.role, "failed to save conversation turn");
        }
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
