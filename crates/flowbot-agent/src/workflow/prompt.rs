use flowbot_core::{AgentProfile, Platform, WorkflowStep};
use flowbot_memory::ConversationMessage;

use crate::provider::{Message, Role};

/// Most recent history turns sent with each request.
pub const HISTORY_WINDOW: usize = 10;

/// Everything the prompt is built from for one turn.
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    pub agent: &'a AgentProfile,
    pub step: &'a WorkflowStep,
    /// Prior turns, oldest first. Only the last `window` are used.
    pub history: &'a [ConversationMessage],
    pub user_message: &'a str,
    pub user_name: Option<&'a str>,
    pub platform: Option<Platform>,
    pub window: usize,
}

impl<'a> PromptInput<'a> {
    pub fn new(agent: &'a AgentProfile, step: &'a WorkflowStep, user_message: &'a str) -> Self {
        Self {
            agent,
            step,
            history: &[],
            user_message,
            user_name: None,
            platform: None,
            window: HISTORY_WINDOW,
        }
    }
}

/// One system message, then the history window, then the new user message.
pub fn build_messages(input: &PromptInput<'_>) -> Vec<Message> {
    let skip = input.history.len().saturating_sub(input.window);
    let history = &input.history[skip..];

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Message::system(build_system_prompt(input)));
    messages.extend(history.iter().map(|m| Message {
        role: Role::from_stored(&m.role),
        content: m.content.clone(),
    }));
    messages.push(Message::user(input.user_message));
    messages
}

/// The system prompt. Never truncated.
pub fn build_system_prompt(input: &PromptInput<'_>) -> String {
    let agent = input.agent;
    let workflow = &agent.workflow;

    let mut out = format!("You are {}.", agent.name);
    if !agent.description.is_empty() {
        out.push(' ');
        out.push_str(&agent.description);
    }

    out.push_str(&format!("\n\n## Workflow: {}\n", workflow.name));
    if !workflow.description.is_empty() {
        out.push_str(&workflow.description);
        out.push('\n');
    }
    out.push_str(&format!("Trigger: {}", workflow.trigger.label));
    if !workflow.trigger.description.is_empty() {
        out.push_str(&format!(" ({})", workflow.trigger.description));
    }

    out.push_str(&format!(
        "\n\n## Current step: {}\n{}\nFocus your reply on this step.",
        input.step.label, input.step.description
    ));

    if let Some(platform) = input.platform {
        out.push_str("\n\n## Formatting\n");
        out.push_str(platform_guidance(platform));
    }

    if let Some(name) = input.user_name.filter(|n| !n.trim().is_empty()) {
        out.push_str(&format!("\n\nYou are talking with {}.", name));
    }

    for extra in [&agent.instructions, &agent.behavior].into_iter().flatten() {
        out.push_str("\n\n");
        out.push_str(extra);
    }

    out
}

fn platform_guidance(platform: Platform) -> &'static str {
    match platform {
        Platform::Telegram => {
            "You are replying in a Telegram chat. Keep messages short and \
             conversational. Plain text only; avoid tables and headings."
        }
        Platform::Slack => {
            "You are replying in Slack. Use Slack mrkdwn (*bold*, _italic_, \
             bullet lists) sparingly and keep replies concise."
        }
        Platform::Widget => {
            "You are replying in a small website chat widget. Use short \
             paragraphs of plain text."
        }
        Platform::Api => {
            "Your reply is returned to an API client. Answer in plain text \
             without decorative formatting."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowbot_core::{WorkflowSpec, WorkflowTrigger};

    fn agent() -> AgentProfile {
        AgentProfile {
            name: "Ava".to_string(),
            description: "A support assistant for Acme.".to_string(),
            instructions: Some("Never promise refunds.".to_string()),
            behavior: Some("Be warm but brief.".to_string()),
            workflow: WorkflowSpec {
                name: "Support".to_string(),
                description: "Customer support flow".to_string(),
                trigger: WorkflowTrigger {
                    label: "New message".to_string(),
                    description: String::new(),
                },
                steps: vec![WorkflowStep::new("Analyze", "analyze customer intent")],
            },
        }
    }

    fn turn(i: usize) -> ConversationMessage {
        ConversationMessage {
            id: i as i64,
            conversation_key: "k".to_string(),
            deployment_id: "d".to_string(),
            user_id: "u".to_string(),
            platform: "api".to_string(),
            role: if i % 2 == 0 { "user" } else { "assistant" }.to_string(),
            content: format!("turn {i}"),
            model_used: None,
            tokens_in: 0,
            tokens_out: 0,
            created_at: String::new(),
        }
    }

    #[test]
    fn fifteen_turns_are_cut_to_the_last_ten() {
        let agent = agent();
        let history: Vec<_> = (0..15).map(turn).collect();
        let input = PromptInput {
            history: &history,
            ..PromptInput::new(&agent, &agent.workflow.steps[0], "new question")
        };

        let messages = build_messages(&input);
        let non_system: Vec<_> = messages.iter().filter(|m| m.role != Role::System).collect();
        assert_eq!(non_system.len(), 11);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "turn 5");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages.last().unwrap(), &Message::user("new question"));
    }

    #[test]
    fn stored_system_rows_replay_as_user_text() {
        let agent = agent();
        let mut row = turn(0);
        row.role = "system".to_string();
        let history = vec![row];
        let input = PromptInput {
            history: &history,
            ..PromptInput::new(&agent, &agent.workflow.steps[0], "hi")
        };

        let messages = build_messages(&input);
        let systems = messages.iter().filter(|m| m.role == Role::System).count();
        assert_eq!(systems, 1);
        assert_eq!(messages[1], Message::user("turn 0"));
    }

    #[test]
    fn system_prompt_carries_step_platform_and_extras_verbatim() {
        let agent = agent();
        let input = PromptInput {
            platform: Some(Platform::Telegram),
            user_name: Some("Sam"),
            ..PromptInput::new(&agent, &agent.workflow.steps[0], "hi")
        };

        let prompt = build_system_prompt(&input);
        assert!(prompt.starts_with("You are Ava. A support assistant for Acme."));
        assert!(prompt.contains("## Current step: Analyze\nanalyze customer intent"));
        assert!(prompt.contains("Telegram"));
        assert!(prompt.contains("talking with Sam"));
        assert!(prompt.ends_with("Never promise refunds.\n\nBe warm but brief."));
    }

    #[test]
    fn short_history_is_kept_whole() {
        let agent = agent();
        let history: Vec<_> = (0..3).map(turn).collect();
        let input = PromptInput {
            history: &history,
            ..PromptInput::new(&agent, &agent.workflow.steps[0], "x")
        };
        assert_eq!(build_messages(&input).len(), 5);
    }
}
