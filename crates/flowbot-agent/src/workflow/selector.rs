use flowbot_core::{WorkflowSpec, WorkflowStep};

/// A keyword-pair rule: a step whose description or label mentions `step`
/// is chosen for a message that mentions any of `message`.
struct KeywordRule {
    step: &'static str,
    message: &'static [&'static str],
}

// Matching is plain substring search on lower-cased text, so "how" also
// matches "show". Rule order does not matter; step order does.
const RULES: &[KeywordRule] = &[
    KeywordRule { step: "analyze", message: &["help", "question"] },
    KeywordRule { step: "support", message: &["support", "problem"] },
    KeywordRule { step: "route", message: &["transfer", "human", "escalate"] },
    KeywordRule { step: "guide", message: &["how", "guide"] },
];

/// Which step handles a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMatch<'a> {
    /// A keyword rule selected this step.
    Matched { index: usize, step: &'a WorkflowStep },
    /// Nothing matched; the first step handles the message.
    NoMatch { default: &'a WorkflowStep },
}

impl<'a> StepMatch<'a> {
    pub fn index(&self) -> usize {
        match self {
            StepMatch::Matched { index, .. } => *index,
            StepMatch::NoMatch { .. } => 0,
        }
    }

    pub fn step(&self) -> &'a WorkflowStep {
        match self {
            StepMatch::Matched { step, .. } => step,
            StepMatch::NoMatch { default } => default,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, StepMatch::Matched { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectError {
    #[error("workflow has no steps")]
    EmptyWorkflow,
}

/// Map a free-text message to one workflow step. Steps are scanned in
/// order and the first one with a matching rule wins.
pub fn select_step<'a>(spec: &'a WorkflowSpec, message: &str) -> Result<StepMatch<'a>, SelectError> {
    let first = spec.steps.first().ok_or(SelectError::EmptyWorkflow)?;
    let message = message.to_lowercase();

    let matched = spec
        .steps
        .iter()
        .enumerate()
        .find(|(_, step)| step_matches(step, &message));

    Ok(match matched {
        Some((index, step)) => StepMatch::Matched { index, step },
        None => StepMatch::NoMatch { default: first },
    })
}

fn step_matches(step: &WorkflowStep, message: &str) -> bool {
    let description = step.description.to_lowercase();
    let label = step.label.to_lowercase();
    RULES.iter().any(|rule| {
        (description.contains(rule.step) || label.contains(rule.step))
            && rule.message.iter().any(|kw| message.contains(kw))
    })
}
