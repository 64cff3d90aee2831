// AICoder: Workflow State Model
// Typed shared state threaded through every agent node by copy-then-merge

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::agents::planner::ProjectPlan;
use crate::validator::ValidationReport;

/// Workflow status tags. A closed enum: the router only ever produces values
/// from this set, and `allowed_next` is the explicit transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Initialized,
    Planning,
    Coding,
    Testing,
    Enhancing,
    Completed,
    Failed,
    Paused,
}

impl WorkflowStatus {
    pub const ALL: [WorkflowStatus; 8] = [
        WorkflowStatus::Initialized,
        WorkflowStatus::Planning,
        WorkflowStatus::Coding,
        WorkflowStatus::Testing,
        WorkflowStatus::Enhancing,
        WorkflowStatus::Completed,
        WorkflowStatus::Failed,
        WorkflowStatus::Paused,
    ];

    /// States this status may legally transition to. `Failed` is reachable
    /// from everywhere and is handled by the router directly, so it is listed
    /// for every non-terminal state.
    pub fn allowed_next(&self) -> &'static [WorkflowStatus] {
        use WorkflowStatus::*;
        match self {
            Initialized => &[Planning, Failed, Paused],
            Planning => &[Planning, Coding, Failed, Paused],
            Coding => &[Coding, Testing, Failed, Paused],
            Testing => &[Testing, Enhancing, Failed, Paused],
            Enhancing => &[Enhancing, Completed, Failed, Paused],
            Completed => &[],
            Failed => &[],
            // A paused workflow resumes to whatever state it was in before.
            Paused => &[Initialized, Planning, Coding, Testing, Enhancing],
        }
    }

    /// Terminal states stop routing entirely.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::Completed | WorkflowStatus::Failed)
    }

    /// Progress fraction shown in workflow metadata.
    pub fn progress(&self) -> f32 {
        match self {
            WorkflowStatus::Initialized => 0.0,
            WorkflowStatus::Planning => 0.2,
            WorkflowStatus::Coding => 0.4,
            WorkflowStatus::Testing => 0.6,
            WorkflowStatus::Enhancing => 0.8,
            WorkflowStatus::Completed => 1.0,
            WorkflowStatus::Failed | WorkflowStatus::Paused => 0.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Initialized => "initialized",
            WorkflowStatus::Planning => "planning",
            WorkflowStatus::Coding => "coding",
            WorkflowStatus::Testing => "testing",
            WorkflowStatus::Enhancing => "enhancing",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
            WorkflowStatus::Paused => "paused",
        }
    }
}

/// Names of the agent nodes the router can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentName {
    Orchestrator,
    Planner,
    Coder,
    Tester,
    Enhancer,
    Memory,
    Toolbox,
}

impl AgentName {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentName::Orchestrator => "orchestrator",
            AgentName::Planner => "planner",
            AgentName::Coder => "coder",
            AgentName::Tester => "tester",
            AgentName::Enhancer => "enhancer",
            AgentName::Memory => "memory",
            AgentName::Toolbox => "toolbox",
        }
    }

    /// Parse a configured agent name. Unknown names are a config error.
    pub fn parse(name: &str) -> Option<AgentName> {
        match name {
            "orchestrator" => Some(AgentName::Orchestrator),
            "planner" => Some(AgentName::Planner),
            "coder" => Some(AgentName::Coder),
            "tester" => Some(AgentName::Tester),
            "enhancer" => Some(AgentName::Enhancer),
            "memory" => Some(AgentName::Memory),
            "toolbox" => Some(AgentName::Toolbox),
            _ => None,
        }
    }

    /// The state-key each agent sets in `agent_results` when it finishes.
    pub fn status_key(&self) -> &'static str {
        match self {
            AgentName::Orchestrator => "orchestration_status",
            AgentName::Planner => "planning_status",
            AgentName::Coder => "code_generation_status",
            AgentName::Tester => "testing_status",
            AgentName::Enhancer => "enhancement_status",
            AgentName::Memory => "memory_status",
            AgentName::Toolbox => "toolbox_status",
        }
    }
}

/// Metadata maintained by the orchestrator on every transition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    pub current_step: u32,
    pub total_steps: u32,
    pub progress: f32,
    pub estimated_completion: String,
}

/// The shared workflow state. Agent nodes receive a clone, merge their own
/// results in, and return the new value; they never mutate the caller's copy
/// and never drop unrelated fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowState {
    pub user_input: String,
    #[serde(default)]
    pub requirements: String,
    #[serde(default)]
    pub context: String,
    pub workflow_status: Option<WorkflowStatus>,
    pub next_agent: Option<AgentName>,
    /// State to resume to after a pause.
    pub previous_status: Option<WorkflowStatus>,
    pub plan: Option<ProjectPlan>,
    pub generated_code: Option<String>,
    #[serde(default)]
    pub parsed_files: BTreeMap<String, String>,
    pub validation: Option<ValidationReport>,
    /// Per-agent outputs, keyed by agent name. Values carry the agent's
    /// `*_status` flag plus whatever structured output it produced.
    #[serde(default)]
    pub agent_results: HashMap<String, serde_json::Value>,
    pub error: Option<String>,
    #[serde(default)]
    pub orchestration_notes: String,
    #[serde(default)]
    pub workflow_metadata: WorkflowMetadata,
    pub timestamp: Option<String>,
}

impl WorkflowState {
    pub fn new(user_input: &str) -> Self {
        Self {
            user_input: user_input.to_string(),
            workflow_status: Some(WorkflowStatus::Initialized),
            timestamp: Some(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        }
    }

    pub fn status(&self) -> WorkflowStatus {
        self.workflow_status.unwrap_or(WorkflowStatus::Initialized)
    }

    /// Look up an agent's completion flag in `agent_results`.
    pub fn agent_status(&self, agent: AgentName) -> Option<&str> {
        self.agent_results
            .get(agent.as_str())
            .and_then(|v| v.get(agent.status_key()))
            .and_then(|v| v.as_str())
    }

    pub fn agent_completed(&self, agent: AgentName) -> bool {
        self.agent_status(agent) == Some("completed")
    }

    /// Record an agent's result object, setting its completion flag.
    pub fn record_agent_result(
        &mut self,
        agent: AgentName,
        status: &str,
        mut result: serde_json::Value,
    ) {
        if let Some(obj) = result.as_object_mut() {
            obj.insert(
                agent.status_key().to_string(),
                serde_json::Value::String(status.to_string()),
            );
        }
        self.agent_results.insert(agent.as_str().to_string(), result);
    }

    /// Fold an error into state the way every node does: set the error field
    /// and mark the agent failed. Never panics, never propagates.
    pub fn record_agent_failure(&mut self, agent: AgentName, error: &str) {
        self.error = Some(error.to_string());
        self.record_agent_result(agent, "failed", serde_json::json!({}));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_to_lowercase_strings() {
        let s = serde_json::to_string(&WorkflowStatus::Planning).unwrap();
        assert_eq!(s, "\"planning\"");
        let back: WorkflowStatus = serde_json::from_str("\"enhancing\"").unwrap();
        assert_eq!(back, WorkflowStatus::Enhancing);
    }

    #[test]
    fn transition_table_is_closed() {
        // Every allowed successor must itself be a member of the enum's fixed
        // set, and terminal states must have no successors.
        for status in WorkflowStatus::ALL {
            for next in status.allowed_next() {
                assert!(WorkflowStatus::ALL.contains(next));
            }
            if status.is_terminal() {
                assert!(status.allowed_next().is_empty());
            }
        }
    }

    #[test]
    fn agent_completion_flag_round_trip() {
        let mut state = WorkflowState::new("build a site");
        assert!(!state.agent_completed(AgentName::Coder));

        state.record_agent_result(
            AgentName::Coder,
            "completed",
            serde_json::json!({"generated_code": "export default function Home() {}"}),
        );
        assert!(state.agent_completed(AgentName::Coder));
        assert_eq!(state.agent_status(AgentName::Coder), Some("completed"));
    }

    #[test]
    fn failure_sets_error_and_failed_flag() {
        let mut state = WorkflowState::new("x");
        state.record_agent_failure(AgentName::Planner, "boom");
        assert_eq!(state.error.as_deref(), Some("boom"));
        assert_eq!(state.agent_status(AgentName::Planner), Some("failed"));
    }
}
