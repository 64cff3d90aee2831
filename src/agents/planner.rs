// AICoder: Planner Agent
// Produces a structured project plan from the user's request. The LLM response
// is free-form text; `parse_plan` buckets it into sections by header keywords.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::AgentNode;
use crate::llm::LlmGateway;
use crate::state::{AgentName, WorkflowState};

/// Structured plan extracted from the planner's response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectPlan {
    pub architecture: String,
    pub file_structure: Vec<String>,
    pub technology_stack: Vec<String>,
    pub implementation_steps: Vec<String>,
    pub dependencies: Vec<String>,
    pub testing_strategy: String,
    pub deployment_notes: String,
}

impl ProjectPlan {
    /// A plan is usable when the sections other agents consume are present.
    pub fn is_complete(&self) -> bool {
        !self.architecture.is_empty()
            && !self.file_structure.is_empty()
            && !self.implementation_steps.is_empty()
    }
}

/// Section the scanner is currently filling.
#[derive(Clone, Copy, PartialEq)]
enum Section {
    None,
    Architecture,
    FileStructure,
    TechnologyStack,
    ImplementationSteps,
    Dependencies,
    TestingStrategy,
    DeploymentNotes,
}

/// Bucket a free-form plan into sections. A line naming a section switches the
/// current bucket; every other non-empty line lands in the active one.
pub fn parse_plan(plan_content: &str) -> ProjectPlan {
    let mut plan = ProjectPlan::default();
    let mut current = Section::None;

    for line in plan_content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let lower = line.to_lowercase();
        let detected = if lower.contains("architecture") || lower.contains("overview") {
            Some(Section::Architecture)
        } else if lower.contains("file structure") || lower.contains("organization") {
            Some(Section::FileStructure)
        } else if lower.contains("technology stack") || lower.contains("tech stack") {
            Some(Section::TechnologyStack)
        } else if lower.contains("implementation") || lower.contains("steps") {
            Some(Section::ImplementationSteps)
        } else if lower.contains("dependencies") {
            Some(Section::Dependencies)
        } else if lower.contains("testing") {
            Some(Section::TestingStrategy)
        } else if lower.contains("deployment") {
            Some(Section::DeploymentNotes)
        } else {
            None
        };

        if let Some(section) = detected {
            current = section;
            continue;
        }

        match current {
            Section::None => {}
            Section::Architecture => append_text(&mut plan.architecture, line),
            Section::FileStructure => plan.file_structure.push(line.to_string()),
            Section::TechnologyStack => plan.technology_stack.push(line.to_string()),
            Section::ImplementationSteps => plan.implementation_steps.push(line.to_string()),
            Section::Dependencies => plan.dependencies.push(line.to_string()),
            Section::TestingStrategy => append_text(&mut plan.testing_strategy, line),
            Section::DeploymentNotes => append_text(&mut plan.deployment_notes, line),
        }
    }

    plan
}

fn append_text(target: &mut String, line: &str) {
    if !target.is_empty() {
        target.push('\n');
    }
    target.push_str(line);
}

pub struct Planner;

#[async_trait]
impl AgentNode for Planner {
    fn name(&self) -> AgentName {
        AgentName::Planner
    }

    async fn run(&self, state: WorkflowState, gateway: &LlmGateway) -> WorkflowState {
        let mut state = state;

        let prompt = format!(
            "Create a comprehensive plan for the following project:\n\n\
             User Input: {}\n\
             Requirements: {}\n\
             Context: {}\n\n\
             Please provide:\n\
             1. Project Architecture Overview\n\
             2. File Structure and Organization\n\
             3. Technology Stack Recommendations\n\
             4. Implementation Steps (detailed breakdown)\n\
             5. Dependencies and Requirements\n\
             6. Testing Strategy\n\
             7. Deployment Considerations\n\n\
             Format your response as a structured plan that can be easily parsed and followed by other agents.",
            state.user_input, state.requirements, state.context
        );

        let response = gateway.generate_for_agent("planner", &prompt).await;
        if LlmGateway::is_sentinel(&response) {
            state.record_agent_failure(AgentName::Planner, &response);
            return state;
        }

        let plan = parse_plan(&response);
        let result = serde_json::json!({
            "file_structure": plan.file_structure,
            "implementation_steps": plan.implementation_steps,
        });
        state.plan = Some(plan);
        state.record_agent_result(AgentName::Planner, "completed", result);

        log::info!("Planning completed successfully");
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_are_bucketed_by_headers() {
        let content = "1. Project Architecture Overview\nA single-page marketing site.\n\n2. File Structure and Organization\npage.tsx\nlayout.tsx\n\n4. Implementation Steps\nScaffold the app\nBuild the hero section\n\n5. Dependencies\nnext\nreact\n\n6. Testing Strategy\nManual review.";
        let plan = parse_plan(content);

        assert_eq!(plan.architecture, "A single-page marketing site.");
        assert_eq!(plan.file_structure, vec!["page.tsx", "layout.tsx"]);
        assert_eq!(
            plan.implementation_steps,
            vec!["Scaffold the app", "Build the hero section"]
        );
        assert_eq!(plan.dependencies, vec!["next", "react"]);
        assert_eq!(plan.testing_strategy, "Manual review.");
        assert!(plan.is_complete());
    }

    #[test]
    fn content_before_any_header_is_dropped() {
        let plan = parse_plan("Here is your plan!\n\nArchitecture\nLayered.");
        assert_eq!(plan.architecture, "Layered.");
        assert!(!plan.is_complete());
    }

    #[tokio::test]
    async fn gateway_failure_folds_into_state() {
        let mut config = crate::llm::LlmConfig::openai();
        config.api_key = None;
        let gateway = LlmGateway::new(config, vec![]);

        let state = Planner.run(WorkflowState::new("build a site"), &gateway).await;
        assert!(state.error.is_some());
        assert_eq!(state.agent_status(AgentName::Planner), Some("failed"));
        assert!(state.plan.is_none());
    }
}
