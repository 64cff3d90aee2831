// AICoder: Agent System
// Role-specialized nodes the orchestrator routes between. Every node follows
// the same contract: clone the incoming state, merge its own results in, set
// its status key, and fold any error into the state instead of propagating.

pub mod coder;
pub mod enhancer;
pub mod memory;
pub mod planner;
pub mod tester;
pub mod toolbox;

pub use coder::Coder;
pub use enhancer::Enhancer;
pub use memory::MemoryAgent;
pub use planner::Planner;
pub use tester::Tester;
pub use toolbox::Toolbox;

use async_trait::async_trait;

use crate::llm::{LlmGateway, SystemPrompts};
use crate::state::{AgentName, WorkflowState};

/// Base trait for all agent nodes.
#[async_trait]
pub trait AgentNode: Send + Sync {
    /// The agent's routing name
    fn name(&self) -> AgentName;

    /// The agent's system prompt
    fn system_prompt(&self) -> &'static str {
        SystemPrompts::for_agent(self.name().as_str())
    }

    /// Run the node against a snapshot of the workflow state and return the
    /// merged state. Implementations must not panic: failures set
    /// `state.error` and the agent's `*_status` to `"failed"`.
    async fn run(&self, state: WorkflowState, gateway: &LlmGateway) -> WorkflowState;
}

/// Look up a node by routing name.
pub fn node_for(name: AgentName) -> Option<Box<dyn AgentNode>> {
    match name {
        AgentName::Planner => Some(Box::new(Planner)),
        AgentName::Coder => Some(Box::new(Coder)),
        AgentName::Tester => Some(Box::new(Tester)),
        AgentName::Enhancer => Some(Box::new(Enhancer)),
        AgentName::Memory => Some(Box::new(MemoryAgent::default())),
        AgentName::Toolbox => Some(Box::new(Toolbox)),
        AgentName::Orchestrator => None,
    }
}
