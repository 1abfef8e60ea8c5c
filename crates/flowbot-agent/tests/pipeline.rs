// End-to-end pipeline runs over in-memory SQLite and a scripted provider.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::Connection;

use flowbot_agent::pipeline::{process_inbound, MessageContext, ValidationError};
use flowbot_agent::provider::Role;
use flowbot_agent::workflow::FALLBACK_REPLY;
use flowbot_agent::{
    ChatRequest, ChatResponse, CompletionError, ExecutionOutcome, LlmProvider, WorkflowExecutor,
};
use flowbot_core::{
    AgentProfile, ChannelConfig, DeploymentId, InboundMessage, Platform, WorkflowSpec, WorkflowStep,
    WorkflowTrigger,
};
use flowbot_deployments::{Deployment, DeploymentStatus};
use flowbot_memory::{ConversationMessage, Direction, MemoryManager};

/// Replies with a fixed text, or fails, and keeps every request it saw.
struct Scripted {
    reply: Option<&'static str>,
    seen: Mutex<Vec<ChatRequest>>,
}

#[async_trait]
impl LlmProvider for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }
    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, CompletionError> {
        self.seen.lock().unwrap().push(req.clone());
        match self.reply {
            Some(text) => Ok(ChatResponse {
                content: text.to_string(),
                model: req.model.clone(),
                tokens_in: 10,
                tokens_out: 2,
                finish_reason: "stop".to_string(),
            }),
            None => Err(CompletionError::Api { status: 503, message: "gateway down".to_string() }),
        }
    }
}

struct Host {
    executor: WorkflowExecutor,
    memory: MemoryManager,
    provider: Arc<Scripted>,
}

impl MessageContext for Host {
    fn executor(&self) -> &WorkflowExecutor {
        &self.executor
    }
    fn memory(&self) -> &MemoryManager {
        &self.memory
    }
}

fn host(reply: Option<&'static str>) -> Host {
    let conn = Connection::open_in_memory().unwrap();
    flowbot_memory::db::init_db(&conn).unwrap();
    let provider = Arc::new(Scripted { reply, seen: Mutex::new(Vec::new()) });
    Host {
        executor: WorkflowExecutor::new(provider.clone(), "primary-model"),
        memory: MemoryManager::new(conn),
        provider,
    }
}

fn deployment() -> Deployment {
    let workflow = WorkflowSpec {
        name: "Support".to_string(),
        description: "Customer support".to_string(),
        trigger: WorkflowTrigger { label: "New message".to_string(), description: String::new() },
        steps: vec![
            WorkflowStep::new("Analyze", "analyze customer intent"),
            WorkflowStep::new("Route", "route to human support"),
        ],
    };
    Deployment {
        id: DeploymentId::from("dep-1"),
        owner_id: "owner-1".to_string(),
        name: "Support bot".to_string(),
        status: DeploymentStatus::Active,
        agent: AgentProfile::from_workflow(workflow),
        channel: ChannelConfig::Api { api_key: "k".to_string() },
        created_at: "2026-01-01T00:00:00Z".to_string(),
        updated_at: "2026-01-01T00:00:00Z".to_string(),
    }
}

fn inbound(message: &str) -> InboundMessage {
    InboundMessage {
        message: message.to_string(),
        user_id: "u1".to_string(),
        platform: Platform::Api,
        chat_id: None,
        user_name: Some("Sam".to_string()),
    }
}

#[tokio::test]
async fn human_request_is_routed_and_remembered() {
    let host = host(Some("Connecting you to a person."));
    let dep = deployment();

    let out = process_inbound(&host, &dep, &inbound("I want to speak to a human agent"))
        .await
        .unwrap();

    assert_eq!(out.execution.matched_step.label, "Route");
    assert_eq!(out.execution.matched_step_index, 1);
    assert_eq!(out.execution.outcome, ExecutionOutcome::Matched);
    assert_eq!(out.reply, "Connecting you to a person.");
    assert!(out.error.is_none());
    assert_eq!(out.conversation_key.as_str(), "dep-1_u1_api");

    let history = host.memory.get_history("dep-1_u1_api", 10).unwrap();
    let roles: Vec<_> = history.iter().map(|m| m.role.as_str()).collect();
    assert_eq!(roles, ["user", "assistant"]);
    assert_eq!(history[1].model_used.as_deref(), Some("primary-model"));

    let logs = host.memory.recent_logs("dep-1", 10).unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].direction, Direction::Outbound);
    assert!(logs[0].elapsed_ms.is_some());
}

#[tokio::test]
async fn greeting_falls_back_to_first_step() {
    let host = host(Some("Hello!"));
    let out = process_inbound(&host, &deployment(), &inbound("hello")).await.unwrap();
    assert_eq!(out.execution.matched_step_index, 0);
    assert_eq!(out.execution.outcome, ExecutionOutcome::NoMatch);
}

#[tokio::test]
async fn only_the_last_ten_turns_are_sent() {
    let host = host(Some("ok"));
    let dep = deployment();
    for i in 0..15 {
        host.memory
            .save_message(&ConversationMessage {
                id: 0,
                conversation_key: "dep-1_u1_api".to_string(),
                deployment_id: "dep-1".to_string(),
                user_id: "u1".to_string(),
                platform: "api".to_string(),
                role: if i % 2 == 0 { "user" } else { "assistant" }.to_string(),
                content: format!("old {i}"),
                model_used: None,
                tokens_in: 0,
                tokens_out: 0,
                created_at: format!("2026-01-01T00:00:{:02}Z", i),
            })
            .unwrap();
    }

    process_inbound(&host, &dep, &inbound("what now?")).await.unwrap();

    let seen = host.provider.seen.lock().unwrap();
    let messages = &seen[0].messages;
    let non_system: Vec<_> = messages.iter().filter(|m| m.role != Role::System).collect();
    assert_eq!(non_system.len(), 11);
    assert_eq!(non_system[0].content, "old 5");
    assert_eq!(non_system[10].content, "what now?");
}

#[tokio::test]
async fn failed_completion_still_replies_and_reports_detail() {
    let host = host(None);
    let out = process_inbound(&host, &deployment(), &inbound("escalate")).await.unwrap();

    assert_eq!(out.reply, FALLBACK_REPLY);
    assert!(out.error.as_deref().unwrap().contains("gateway down"));
    assert!(host.memory.get_history("dep-1_u1_api", 10).unwrap().is_empty());

    let logs = host.memory.recent_logs("dep-1", 10).unwrap();
    assert_eq!(logs[0].error.as_deref(), out.error.as_deref());
}

#[tokio::test]
async fn persistence_failure_does_not_block_the_reply() {
    let conn = Connection::open_in_memory().unwrap();
    // No init_db: every read and write fails.
    let provider = Arc::new(Scripted { reply: Some("still here"), seen: Mutex::new(Vec::new()) });
    let host = Host {
        executor: WorkflowExecutor::new(provider.clone(), "m"),
        memory: MemoryManager::new(conn),
        provider,
    };

    let out = process_inbound(&host, &deployment(), &inbound("hi")).await.unwrap();
    assert_eq!(out.reply, "still here");
    assert!(out.error.is_none());
}

#[tokio::test]
async fn missing_fields_are_validation_errors() {
    let host = host(Some("unused"));
    let dep = deployment();

    let err = process_inbound(&host, &dep, &inbound("  ")).await.unwrap_err();
    assert_eq!(err, ValidationError::MissingMessage);

    let mut no_user = inbound("hi");
    no_user.user_id.clear();
    let err = process_inbound(&host, &dep, &no_user).await.unwrap_err();
    assert_eq!(err, ValidationError::MissingUserId);
    assert!(host.provider.seen.lock().unwrap().is_empty());
}
