// AICoder: Coder Agent
// Turns the plan and requirements into source code. The raw response is kept
// verbatim in `generated_code`; splitting and repair happen downstream.

use async_trait::async_trait;

use super::AgentNode;
use crate::llm::LlmGateway;
use crate::state::{AgentName, WorkflowState};

pub struct Coder;

#[async_trait]
impl AgentNode for Coder {
    fn name(&self) -> AgentName {
        AgentName::Coder
    }

    async fn run(&self, state: WorkflowState, gateway: &LlmGateway) -> WorkflowState {
        let mut state = state;

        let file_structure = state
            .plan
            .as_ref()
            .map(|p| p.file_structure.join("\n"))
            .unwrap_or_default();

        let prompt = format!(
            "Generate high-quality, production-ready code based on the following requirements:\n\n\
             Requirements: {}\n\
             User Input: {}\n\
             Context: {}\n\
             File Structure:\n{}\n\n\
             Please generate code that:\n\
             1. Follows best practices and design patterns\n\
             2. Is well-documented and readable\n\
             3. Includes proper error handling\n\
             4. Is modular and maintainable\n\
             5. Follows the specified file structure and naming conventions\n\n\
             Return only the code without explanations.",
            state.requirements, state.user_input, state.context, file_structure
        );

        let response = gateway.generate_for_agent("coder", &prompt).await;
        if LlmGateway::is_sentinel(&response) {
            state.record_agent_failure(AgentName::Coder, &response);
            return state;
        }

        state.generated_code = Some(response);
        state.record_agent_result(AgentName::Coder, "completed", serde_json::json!({}));

        log::info!("Code generation completed successfully");
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failure_leaves_no_generated_code() {
        let mut config = crate::llm::LlmConfig::openai();
        config.api_key = None;
        let gateway = LlmGateway::new(config, vec![]);

        let state = Coder.run(WorkflowState::new("a site"), &gateway).await;
        assert!(state.generated_code.is_none());
        assert_eq!(state.agent_status(AgentName::Coder), Some("failed"));
    }
}
