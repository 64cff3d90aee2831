// AICoder: LLM Provider Abstraction
// One consistent text-in/text-out interface over rig-core:
// - OpenAI / Anthropic: primary providers
// - OpenRouter / OpenAI-compatible: custom base_url endpoints

use serde::{Deserialize, Serialize};
use std::env;

/// Supported LLM providers
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub enum ProviderType {
    #[default]
    OpenAI,
    Anthropic,
    /// OpenRouter.ai - unified API for multiple models
    OpenRouter,
    /// Any OpenAI-compatible API (requires base_url)
    OpenAICompatible,
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: ProviderType,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::openai()
    }
}

impl LlmConfig {
    /// OpenAI configuration (default primary provider)
    pub fn openai() -> Self {
        Self {
            provider: ProviderType::OpenAI,
            model: "gpt-4-turbo-preview".to_string(),
            api_key: env::var("OPENAI_API_KEY").ok(),
            base_url: None,
            temperature: 0.1,
            max_tokens: 4000,
        }
    }

    /// Anthropic Claude configuration (default fallback)
    pub fn anthropic() -> Self {
        Self {
            provider: ProviderType::Anthropic,
            model: "claude-3-sonnet-20240229".to_string(),
            api_key: env::var("ANTHROPIC_API_KEY").ok(),
            base_url: None,
            temperature: 0.1,
            max_tokens: 4000,
        }
    }

    /// OpenRouter configuration (access multiple models via one API)
    pub fn openrouter() -> Self {
        Self {
            provider: ProviderType::OpenRouter,
            model: "anthropic/claude-3-sonnet".to_string(),
            api_key: env::var("OPENROUTER_API_KEY").ok(),
            base_url: Some("https://openrouter.ai/api/v1".to_string()),
            temperature: 0.1,
            max_tokens: 4000,
        }
    }

    /// Custom OpenAI-compatible API (e.g., local LLM servers)
    pub fn openai_compatible(base_url: &str, model: &str, api_key: Option<String>) -> Self {
        Self {
            provider: ProviderType::OpenAICompatible,
            model: model.to_string(),
            api_key,
            base_url: Some(base_url.to_string()),
            temperature: 0.1,
            max_tokens: 4000,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Message role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: &str) -> Self {
        Self { role: Role::System, content: content.to_string() }
    }

    pub fn user(content: &str) -> Self {
        Self { role: Role::User, content: content.to_string() }
    }

    pub fn assistant(content: &str) -> Self {
        Self { role: Role::Assistant, content: content.to_string() }
    }
}

/// LLM response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub tokens_used: Option<u32>,
    pub finish_reason: Option<String>,
}

/// Unified LLM provider
#[derive(Debug, Clone)]
pub struct LlmProvider {
    config: LlmConfig,
}

impl LlmProvider {
    pub fn new(config: LlmConfig) -> Result<Self, anyhow::Error> {
        if config.api_key.is_none() {
            anyhow::bail!("API key not configured for {:?}", config.provider);
        }
        Ok(Self { config })
    }

    pub fn model_info(&self) -> serde_json::Value {
        serde_json::json!({
            "provider": format!("{:?}", self.config.provider),
            "model": self.config.model,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        })
    }

    /// Complete a chat conversation
    pub async fn complete(&self, messages: Vec<Message>) -> Result<LlmResponse, anyhow::Error> {
        let system_prompt = messages
            .iter()
            .find(|m| matches!(m.role, Role::System))
            .map(|m| m.content.as_str())
            .unwrap_or("");

        let user_messages: Vec<&str> = messages
            .iter()
            .filter(|m| matches!(m.role, Role::User))
            .map(|m| m.content.as_str())
            .collect();

        let user_prompt = user_messages.join("\n\n");

        let content = self.call_llm(system_prompt, &user_prompt).await?;

        Ok(LlmResponse {
            content,
            model: self.config.model.clone(),
            tokens_used: None,
            finish_reason: Some("stop".to_string()),
        })
    }

    async fn call_llm(&self, system: &str, user: &str) -> Result<String, anyhow::Error> {
        match self.config.provider {
            ProviderType::Anthropic => self.call_anthropic(system, user).await,
            ProviderType::OpenAI => self.call_openai(system, user, None).await,
            ProviderType::OpenRouter => self.call_openrouter(system, user).await,
            ProviderType::OpenAICompatible => {
                let base_url = self
                    .config
                    .base_url
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("base_url required for OpenAICompatible"))?;
                self.call_openai(system, user, Some(base_url)).await
            }
        }
    }

    /// Call Anthropic using rig-core
    async fn call_anthropic(&self, system: &str, user: &str) -> Result<String, anyhow::Error> {
        use rig::client::{CompletionClient, ProviderClient};
        use rig::completion::Prompt;
        use rig::providers::anthropic;

        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Anthropic API key not configured"))?;

        // rig-core reads the key from the environment
        std::env::set_var("ANTHROPIC_API_KEY", api_key);

        let client = anthropic::Client::from_env();
        let agent = client
            .agent(&self.config.model)
            .preamble(system)
            .build();

        let response = agent.prompt(user).await?;
        Ok(response)
    }

    /// Call OpenRouter using rig-core's native openrouter provider
    async fn call_openrouter(&self, system: &str, user: &str) -> Result<String, anyhow::Error> {
        use rig::client::CompletionClient;
        use rig::completion::Prompt;
        use rig::providers::openrouter;

        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("OpenRouter API key not configured"))?;

        let client: openrouter::Client = openrouter::Client::new(api_key)?;
        let agent = client
            .agent(&self.config.model)
            .preamble(system)
            .build();

        let response = agent.prompt(user).await?;
        Ok(response)
    }

    /// Call OpenAI or an OpenAI-compatible API using rig-core
    async fn call_openai(
        &self,
        system: &str,
        user: &str,
        base_url: Option<&str>,
    ) -> Result<String, anyhow::Error> {
        use rig::client::CompletionClient;
        use rig::completion::Prompt;
        use rig::providers::openai;

        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("OpenAI API key not configured"))?;

        let client: openai::Client = match base_url {
            Some(url) => openai::Client::builder()
                .api_key(api_key)
                .base_url(url)
                .build()?,
            None => openai::Client::new(api_key)?,
        };

        let agent = client
            .agent(&self.config.model)
            .preamble(system)
            .build();

        let response = agent.prompt(user).await?;
        Ok(response)
    }
}
