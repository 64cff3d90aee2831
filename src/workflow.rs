// AICoder: Workflow Orchestrator
// Status-driven routing between agent nodes. `determine_next_action` is total:
// every (status, completion-flag) pair yields a defined action, and anything
// unrecognized routes to Failed. The run loop bounds per-state retries; a
// state that repeats past the cap without its completion flag advancing goes
// terminal instead of looping forever.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agents::{self, AgentNode};
use crate::config::AppConfig;
use crate::llm::LlmGateway;
use crate::state::{AgentName, WorkflowState, WorkflowStatus};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Workflow failed: {0}")]
    Failed(String),
    #[error("Retry limit exceeded in state '{status}' after {attempts} attempts")]
    RetriesExhausted { status: String, attempts: u32 },
    #[error("No agent node registered for {0}")]
    UnknownAgent(String),
}

/// Routing decision for one orchestration step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextAction {
    pub status: WorkflowStatus,
    pub agent: Option<AgentName>,
    pub step: u32,
    pub notes: String,
}

impl NextAction {
    fn new(status: WorkflowStatus, agent: Option<AgentName>, step: u32, notes: &str) -> Self {
        Self {
            status,
            agent,
            step,
            notes: notes.to_string(),
        }
    }
}

/// Route from the current status to the next action. Any recorded error
/// forces Failed; a paused workflow resumes to its remembered status.
pub fn determine_next_action(status: WorkflowStatus, state: &WorkflowState) -> NextAction {
    use WorkflowStatus::*;

    if state.error.is_some() {
        return NextAction::new(Failed, None, 0, "Workflow failed due to agent error");
    }

    match status {
        Initialized => NextAction::new(
            Planning,
            Some(AgentName::Planner),
            1,
            "Initializing project planning phase",
        ),
        Planning => {
            if state.agent_completed(AgentName::Planner) {
                NextAction::new(
                    Coding,
                    Some(AgentName::Coder),
                    2,
                    "Planning complete, proceeding to code generation",
                )
            } else {
                NextAction::new(Planning, Some(AgentName::Planner), 1, "Continuing planning phase")
            }
        }
        Coding => {
            if state.agent_completed(AgentName::Coder) {
                NextAction::new(
                    Testing,
                    Some(AgentName::Tester),
                    3,
                    "Code generation complete, proceeding to testing",
                )
            } else {
                NextAction::new(Coding, Some(AgentName::Coder), 2, "Continuing code generation")
            }
        }
        Testing => {
            if state.agent_completed(AgentName::Tester) {
                NextAction::new(
                    Enhancing,
                    Some(AgentName::Enhancer),
                    4,
                    "Testing complete, proceeding to enhancement",
                )
            } else {
                NextAction::new(Testing, Some(AgentName::Tester), 3, "Continuing testing phase")
            }
        }
        Enhancing => {
            if state.agent_completed(AgentName::Enhancer) {
                NextAction::new(Completed, None, 5, "All phases complete")
            } else {
                NextAction::new(
                    Enhancing,
                    Some(AgentName::Enhancer),
                    4,
                    "Continuing enhancement phase",
                )
            }
        }
        Paused => {
            let resume_to = state.previous_status.unwrap_or(Initialized);
            NextAction::new(resume_to, None, 0, "Resuming paused workflow")
        }
        Completed => NextAction::new(Completed, None, 5, "Workflow already complete"),
        Failed => NextAction::new(Failed, None, 0, "Workflow already failed"),
    }
}

/// Textual completion estimate by step.
pub fn estimate_completion(step: u32) -> &'static str {
    match step {
        1 => "10-15 minutes",
        2 => "5-10 minutes",
        3 => "3-5 minutes",
        4 => "2-3 minutes",
        _ => "Less than 1 minute",
    }
}

/// Status shown while a given agent runs in the linear workflow. Memory and
/// toolbox steps keep whatever phase the run is already in.
fn linear_phase(agent: AgentName) -> Option<WorkflowStatus> {
    match agent {
        AgentName::Planner => Some(WorkflowStatus::Planning),
        AgentName::Coder => Some(WorkflowStatus::Coding),
        AgentName::Tester => Some(WorkflowStatus::Testing),
        AgentName::Enhancer => Some(WorkflowStatus::Enhancing),
        _ => None,
    }
}

/// The orchestrator: owns the routing loop and retry bookkeeping.
pub struct Orchestrator {
    max_retries: u32,
    total_steps: u32,
}

impl Orchestrator {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            total_steps: 6,
        }
    }

    /// One orchestration step: route, apply the transition, refresh metadata.
    pub fn step(&self, state: &mut WorkflowState) -> NextAction {
        let current = state.status();
        let action = determine_next_action(current, state);

        state.workflow_status = Some(action.status);
        state.next_agent = action.agent;
        state.orchestration_notes = action.notes.clone();
        state.workflow_metadata.current_step = action.step;
        state.workflow_metadata.total_steps = self.total_steps;
        state.workflow_metadata.progress = current.progress();
        state.workflow_metadata.estimated_completion = estimate_completion(action.step).to_string();

        state.record_agent_result(
            AgentName::Orchestrator,
            "completed",
            serde_json::json!({ "notes": action.notes }),
        );

        log::info!(
            "Orchestration: {} -> {} (next agent: {:?})",
            current.as_str(),
            action.status.as_str(),
            action.agent
        );
        action
    }

    /// Drive the workflow to a terminal state with the standard agent nodes.
    pub async fn run(
        &self,
        state: WorkflowState,
        gateway: &LlmGateway,
    ) -> Result<WorkflowState, WorkflowError> {
        self.run_with_nodes(state, gateway, agents::node_for).await
    }

    /// Drive the workflow to a terminal state, resolving agents through
    /// `lookup`. A status repeating past `max_retries` without its completion
    /// flag advancing fails the run.
    pub async fn run_with_nodes<F>(
        &self,
        mut state: WorkflowState,
        gateway: &LlmGateway,
        lookup: F,
    ) -> Result<WorkflowState, WorkflowError>
    where
        F: Fn(AgentName) -> Option<Box<dyn AgentNode>>,
    {
        let mut last_status: Option<WorkflowStatus> = None;
        let mut repeats: u32 = 0;

        loop {
            let action = self.step(&mut state);

            if action.status.is_terminal() {
                if action.status == WorkflowStatus::Failed {
                    let reason = state
                        .error
                        .clone()
                        .unwrap_or_else(|| action.notes.clone());
                    log::error!("Workflow failed: {}", reason);
                    return Err(WorkflowError::Failed(reason));
                }
                log::info!("Workflow completed");
                return Ok(state);
            }

            if last_status == Some(action.status) {
                repeats += 1;
                if repeats > self.max_retries {
                    let err = WorkflowError::RetriesExhausted {
                        status: action.status.as_str().to_string(),
                        attempts: repeats,
                    };
                    state.error = Some(err.to_string());
                    state.workflow_status = Some(WorkflowStatus::Failed);
                    return Err(err);
                }
            } else {
                repeats = 0;
            }
            last_status = Some(action.status);

            let Some(agent_name) = action.agent else {
                continue;
            };
            let node = lookup(agent_name)
                .ok_or_else(|| WorkflowError::UnknownAgent(agent_name.as_str().to_string()))?;

            state = node.run(state, gateway).await;
        }
    }

    /// Linear routing: run the configured agents once each, in order, with no
    /// status-driven re-dispatch. Any agent error ends the run as failed.
    pub async fn run_linear(
        &self,
        mut state: WorkflowState,
        gateway: &LlmGateway,
        agent_names: &[String],
    ) -> Result<WorkflowState, WorkflowError> {
        for (index, name) in agent_names.iter().enumerate() {
            let agent = AgentName::parse(name)
                .ok_or_else(|| WorkflowError::UnknownAgent(name.clone()))?;
            let node = agents::node_for(agent)
                .ok_or_else(|| WorkflowError::UnknownAgent(name.clone()))?;

            if let Some(phase) = linear_phase(agent) {
                state.workflow_status = Some(phase);
            }
            state.workflow_metadata.current_step = index as u32 + 1;
            state.workflow_metadata.total_steps = agent_names.len() as u32;

            log::info!("Linear workflow: running {}", agent.as_str());
            state = node.run(state, gateway).await;

            if let Some(error) = state.error.clone() {
                state.workflow_status = Some(WorkflowStatus::Failed);
                return Err(WorkflowError::Failed(error));
            }
        }

        state.workflow_status = Some(WorkflowStatus::Completed);
        state.workflow_metadata.progress = 1.0;
        Ok(state)
    }

    /// Pause the workflow, remembering the status to resume to.
    pub fn pause(&self, state: &mut WorkflowState) {
        let current = state.status();
        if !current.is_terminal() && current != WorkflowStatus::Paused {
            state.previous_status = Some(current);
            state.workflow_status = Some(WorkflowStatus::Paused);
            log::info!("Workflow paused at {}", current.as_str());
        }
    }

    /// Resume a paused workflow to its remembered status.
    pub fn resume(&self, state: &mut WorkflowState) {
        if state.status() == WorkflowStatus::Paused {
            let resume_to = state.previous_status.take().unwrap_or(WorkflowStatus::Initialized);
            state.workflow_status = Some(resume_to);
            log::info!("Workflow resumed to {}", resume_to.as_str());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::WorkflowStatus::*;

    fn state_with_status(status: WorkflowStatus) -> WorkflowState {
        let mut state = WorkflowState::new("build a site");
        state.workflow_status = Some(status);
        state
    }

    #[test]
    fn routing_is_total_and_respects_the_transition_table() {
        // Every status routes somewhere, and always to an allowed successor
        // (or stays terminal).
        for status in WorkflowStatus::ALL {
            let state = state_with_status(status);
            let action = determine_next_action(status, &state);
            if status.is_terminal() {
                assert_eq!(action.status, status);
            } else {
                assert!(
                    status.allowed_next().contains(&action.status),
                    "{:?} -> {:?} not in transition table",
                    status,
                    action.status
                );
            }
        }
    }

    #[test]
    fn completion_flags_advance_the_pipeline() {
        let mut state = state_with_status(Planning);
        // Incomplete: stay and re-dispatch the planner.
        let action = determine_next_action(Planning, &state);
        assert_eq!(action.status, Planning);
        assert_eq!(action.agent, Some(AgentName::Planner));

        state.record_agent_result(AgentName::Planner, "completed", serde_json::json!({}));
        let action = determine_next_action(Planning, &state);
        assert_eq!(action.status, Coding);
        assert_eq!(action.agent, Some(AgentName::Coder));
        assert_eq!(action.step, 2);
    }

    #[test]
    fn any_error_forces_failed() {
        for status in WorkflowStatus::ALL {
            let mut state = state_with_status(status);
            state.error = Some("boom".to_string());
            let action = determine_next_action(status, &state);
            assert_eq!(action.status, Failed);
            assert!(action.agent.is_none());
        }
    }

    #[test]
    fn pause_and_resume_round_trip() {
        let config = AppConfig::default();
        let orchestrator = Orchestrator::new(&config);

        let mut state = state_with_status(Coding);
        orchestrator.pause(&mut state);
        assert_eq!(state.status(), Paused);
        assert_eq!(state.previous_status, Some(Coding));

        orchestrator.resume(&mut state);
        assert_eq!(state.status(), Coding);
        assert!(state.previous_status.is_none());
    }

    #[test]
    fn step_updates_metadata() {
        let config = AppConfig::default();
        let orchestrator = Orchestrator::new(&config);

        let mut state = state_with_status(Initialized);
        let action = orchestrator.step(&mut state);

        assert_eq!(action.status, Planning);
        assert_eq!(state.workflow_metadata.current_step, 1);
        assert_eq!(state.workflow_metadata.total_steps, 6);
        assert_eq!(state.workflow_metadata.estimated_completion, "10-15 minutes");
        assert_eq!(state.orchestration_notes, "Initializing project planning phase");
    }

    #[tokio::test]
    async fn linear_workflow_rejects_unknown_agents() {
        let config = AppConfig::default();
        let orchestrator = Orchestrator::new(&config);

        let mut llm = crate::llm::LlmConfig::openai();
        llm.api_key = None;
        let gateway = LlmGateway::new(llm, vec![]);

        let result = orchestrator
            .run_linear(
                WorkflowState::new("x"),
                &gateway,
                &["sommelier".to_string(), "planner".to_string()],
            )
            .await;
        assert!(matches!(result, Err(WorkflowError::UnknownAgent(_))));
    }

    #[tokio::test]
    async fn linear_workflow_with_no_agents_completes() {
        let config = AppConfig::default();
        let orchestrator = Orchestrator::new(&config);

        let mut llm = crate::llm::LlmConfig::openai();
        llm.api_key = None;
        let gateway = LlmGateway::new(llm, vec![]);

        let state = orchestrator
            .run_linear(WorkflowState::new("x"), &gateway, &[])
            .await
            .unwrap();
        assert_eq!(state.status(), Completed);
    }

    #[tokio::test]
    async fn failing_agents_terminate_the_run() {
        // With no API keys every planner attempt fails, which sets
        // state.error and routes to Failed on the next step; the run must
        // terminate with an error, never loop.
        let config = AppConfig::default();
        let orchestrator = Orchestrator::new(&config);

        let mut llm = crate::llm::LlmConfig::openai();
        llm.api_key = None;
        let gateway = LlmGateway::new(llm, vec![]);

        let result = orchestrator
            .run(WorkflowState::new("build a site"), &gateway)
            .await;
        assert!(result.is_err());
    }

    // A node that neither completes nor errors: the state comes back exactly
    // as it went in, so the router re-dispatches it forever.
    struct StalledNode;

    #[async_trait::async_trait]
    impl AgentNode for StalledNode {
        fn name(&self) -> AgentName {
            AgentName::Planner
        }

        async fn run(&self, state: WorkflowState, _gateway: &LlmGateway) -> WorkflowState {
            state
        }
    }

    #[tokio::test]
    async fn stalled_agent_exhausts_the_retry_cap() {
        let config = AppConfig::default();
        let orchestrator = Orchestrator::new(&config);

        let mut llm = crate::llm::LlmConfig::openai();
        llm.api_key = None;
        let gateway = LlmGateway::new(llm, vec![]);

        let result = orchestrator
            .run_with_nodes(WorkflowState::new("build a site"), &gateway, |_| {
                Some(Box::new(StalledNode))
            })
            .await;

        match result {
            Err(WorkflowError::RetriesExhausted { status, attempts }) => {
                assert_eq!(status, "planning");
                assert!(attempts > config.max_retries);
            }
            other => panic!("expected RetriesExhausted, got {:?}", other),
        }
    }
}
