use serde::{Deserialize, Serialize};

/// Declarative description of a conversational agent: a trigger plus
/// ordered steps. Produced by the generation step and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub trigger: WorkflowTrigger,
    /// Order matters only for the fallback: step 0 wins when nothing matches.
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowTrigger {
    pub label: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub label: String,
    #[serde(default)]
    pub description: String,
}

impl WorkflowStep {
    pub fn new(label: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: description.into(),
        }
    }
}

/// The agent a deployment runs: persona, free-form guidance, and workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Appended verbatim to the system prompt.
    #[serde(default)]
    pub instructions: Option<String>,
    /// Appended verbatim to the system prompt, after `instructions`.
    #[serde(default)]
    pub behavior: Option<String>,
    pub workflow: WorkflowSpec,
}

impl AgentProfile {
    /// A bare profile whose persona is taken from the workflow itself.
    pub fn from_workflow(workflow: WorkflowSpec) -> Self {
        Self {
            name: workflow.name.clone(),
            description: workflow.description.clone(),
            instructions: None,
            behavior: None,
            workflow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_generated_workflow_json() {
        let json = r#"{
            "name": "Support Bot",
            "description": "Answers customer questions",
            "trigger": {"label": "New message", "description": "A customer writes in"},
            "steps": [
                {"label": "Analyze", "description": "analyze customer intent"},
                {"label": "Route", "description": "route to human support"}
            ]
        }"#;
        let spec: WorkflowSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.steps.len(), 2);
        assert_eq!(spec.steps[1], WorkflowStep::new("Route", "route to human support"));
    }

    #[test]
    fn profile_from_workflow_copies_persona() {
        let spec = WorkflowSpec {
            name: "Helper".to_string(),
            description: "helps".to_string(),
            trigger: WorkflowTrigger {
                label: "msg".to_string(),
                description: String::new(),
            },
            steps: Vec::new(),
        };
        let profile = AgentProfile::from_workflow(spec);
        assert_eq!(profile.name, "Helper");
        assert_eq!(profile.description, "helps");
        assert!(profile.instructions.is_none());
    }
}
