// AICoder: Unified LLM API Layer
// A consistent interface for all LLM operations using rig-core. The gateway
// is an explicit constructed object; nothing in this module is global.

pub mod gateway;
pub mod prompts;
pub mod provider;

pub use gateway::{ErrorKind, GatewayStats, LlmGateway, RetryConfig, SERVICE_UNAVAILABLE};
pub use prompts::{PromptTemplate, SystemPrompts};
pub use provider::{LlmConfig, LlmProvider, LlmResponse, Message, ProviderType, Role};
