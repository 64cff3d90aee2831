// AICoder: Resilient LLM Gateway
// Ordered provider fallback with per-provider retry (exponential backoff and
// jitter). Constructed explicitly and passed by reference into the workflow;
// there is no process-wide provider registry.

use super::{LlmConfig, LlmProvider, LlmResponse, Message, SystemPrompts};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Error string returned when every configured provider has failed. Callers
/// detect total failure by matching this content.
pub const SERVICE_UNAVAILABLE: &str =
    "All LLM services are currently unavailable. Please check your API keys and network connection.";

/// Configuration for retry behavior with exponential backoff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts per provider
    pub max_retries: u32,
    /// Base delay between retries (will be multiplied exponentially)
    pub base_delay_ms: u64,
    /// Maximum delay between retries (caps exponential growth)
    pub max_delay_ms: u64,
    /// Jitter factor (0.0 to 1.0) to add randomness to delays
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 1000,
            max_delay_ms: 15000,
            jitter_factor: 0.2,
        }
    }
}

impl RetryConfig {
    /// Calculate delay for a given attempt (0-indexed)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponential_delay = self.base_delay_ms * 2u64.pow(attempt);
        let capped_delay = exponential_delay.min(self.max_delay_ms);

        let jitter_range = (capped_delay as f64 * self.jitter_factor) as u64;
        let jitter = if jitter_range > 0 {
            fastrand::u64(0..jitter_range)
        } else {
            0
        };

        Duration::from_millis(capped_delay + jitter)
    }
}

/// Error classification for determining retry behavior
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// May succeed on retry: network trouble, rate limits, server hiccups,
    /// and this gateway's own per-call timeout.
    Transient,
    /// Will not succeed on retry against the same config: auth failures, a
    /// provider constructed without a key or base_url, rejected requests.
    Permanent,
    /// Unclassified - retried, but within the normal attempt budget.
    Unknown,
}

/// Substrings marking an error as retryable. Covers provider HTTP failures
/// surfaced through rig-core plus the gateway's "call timed out" message.
const TRANSIENT_MARKERS: &[&str] = &[
    "timeout",
    "timed out",
    "connection",
    "network",
    "temporarily",
    "service unavailable",
    "rate limit",
    "too many requests",
    "quota",
    "internal server error",
    "429",
    "500",
    "502",
    "503",
    "504",
];

/// Substrings marking an error as pointless to retry. The "not configured"
/// entries are this crate's own provider-construction failures; retrying them
/// would only burn the backoff budget before the fallback provider gets
/// a turn.
const PERMANENT_MARKERS: &[&str] = &[
    "api key not configured",
    "base_url required",
    "invalid api key",
    "unauthorized",
    "authentication",
    "forbidden",
    "bad request",
    "not found",
    "context length",
    "unsupported model",
    "401",
    "403",
    "400",
    "404",
];

impl ErrorKind {
    /// Classify by error text. Heuristic: rig-core surfaces provider errors
    /// as display strings, so substring scans are the contract we have.
    pub fn classify(error: &anyhow::Error) -> Self {
        let text = error.to_string().to_lowercase();

        if TRANSIENT_MARKERS.iter().any(|m| text.contains(m)) {
            Self::Transient
        } else if PERMANENT_MARKERS.iter().any(|m| text.contains(m)) {
            Self::Permanent
        } else {
            Self::Unknown
        }
    }

    /// Whether this error type should trigger a retry
    pub fn should_retry(&self) -> bool {
        matches!(self, Self::Transient | Self::Unknown)
    }
}

/// Statistics for gateway operations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub retry_count: u64,
    pub fallback_count: u64,
    pub permanent_failures: u64,
}

/// The LLM gateway: an ordered provider chain (primary first, then fallbacks)
/// with retry, per-call timeout, and a sentinel error string on total failure.
pub struct LlmGateway {
    provider_configs: Vec<LlmConfig>,
    retry_config: RetryConfig,
    call_timeout: Duration,
    stats: std::sync::Mutex<GatewayStats>,
}

impl LlmGateway {
    /// Create a gateway with a primary config and ordered fallbacks.
    pub fn new(primary: LlmConfig, fallbacks: Vec<LlmConfig>) -> Self {
        let mut provider_configs = vec![primary];
        provider_configs.extend(fallbacks);

        Self {
            provider_configs,
            retry_config: RetryConfig::default(),
            call_timeout: Duration::from_secs(30),
            stats: std::sync::Mutex::new(GatewayStats::default()),
        }
    }

    /// Build the fallback chain from the environment: OpenAI primary when its
    /// key is present, Anthropic after it. Keyless configs are skipped.
    pub fn from_env() -> Self {
        let mut configs = Vec::new();
        let openai = LlmConfig::openai();
        if openai.is_configured() {
            configs.push(openai);
        }
        let anthropic = LlmConfig::anthropic();
        if anthropic.is_configured() {
            configs.push(anthropic);
        }

        if configs.is_empty() {
            log::warn!("No LLM services configured. Please set up API keys.");
            // Keep the primary slot occupied so every call fails fast with the
            // sentinel rather than panicking on an empty chain.
            configs.push(LlmConfig::openai());
        }

        let primary = configs.remove(0);
        Self::new(primary, configs)
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Get current gateway statistics
    pub fn stats(&self) -> GatewayStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Info about the configured provider chain, for startup logging.
    pub fn available_services(&self) -> Vec<serde_json::Value> {
        self.provider_configs
            .iter()
            .map(|c| {
                serde_json::json!({
                    "provider": format!("{:?}", c.provider),
                    "model": c.model,
                    "status": if c.is_configured() { "available" } else { "missing_api_key" },
                })
            })
            .collect()
    }

    /// True when `response` is the gateway's total-failure sentinel.
    pub fn is_sentinel(response: &str) -> bool {
        response == SERVICE_UNAVAILABLE
    }

    /// Generate a response for a named agent: the agent's system prompt plus
    /// the given user prompt. Returns the sentinel string instead of an error
    /// when every provider fails; agent nodes fold that into state.
    pub async fn generate_for_agent(&self, agent_name: &str, prompt: &str) -> String {
        let system = SystemPrompts::for_agent(agent_name);
        self.generate(prompt, system).await
    }

    /// Generate a response with an explicit system message. Never errors:
    /// total failure yields the sentinel string.
    pub async fn generate(&self, prompt: &str, system_message: &str) -> String {
        let messages = vec![Message::system(system_message), Message::user(prompt)];

        match self.complete(messages).await {
            Ok(response) => response.content,
            Err(e) => {
                log::error!("{} (last error: {})", SERVICE_UNAVAILABLE, e);
                SERVICE_UNAVAILABLE.to_string()
            }
        }
    }

    /// Complete a request with retry and fallback logic
    pub async fn complete(&self, messages: Vec<Message>) -> Result<LlmResponse, anyhow::Error> {
        self.bump(|s| s.total_requests += 1);

        let mut last_error: Option<anyhow::Error> = None;

        for (provider_idx, config) in self.provider_configs.iter().enumerate() {
            let provider_name = format!("{:?}", config.provider);

            if provider_idx > 0 {
                self.bump(|s| s.fallback_count += 1);
                log::warn!(
                    "Falling back to provider {} ({}/{})",
                    provider_name,
                    provider_idx + 1,
                    self.provider_configs.len()
                );
            }

            match self
                .try_provider_with_retries(config, &messages, &provider_name)
                .await
            {
                Ok(response) => {
                    self.bump(|s| s.successful_requests += 1);
                    if provider_idx > 0 {
                        log::info!(
                            "Fallback to {} succeeded after {} provider(s) failed",
                            provider_name,
                            provider_idx
                        );
                    }
                    return Ok(response);
                }
                Err(e) => {
                    let error_kind = ErrorKind::classify(&e);
                    log::warn!(
                        "Provider {} failed with {:?} error: {}",
                        provider_name,
                        error_kind,
                        e
                    );
                    if error_kind == ErrorKind::Permanent {
                        self.bump(|s| s.permanent_failures += 1);
                        // Still try the next provider - the failure might be
                        // specific to this config.
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("No providers configured")))
    }

    /// Try a single provider with retry logic and a per-call timeout.
    async fn try_provider_with_retries(
        &self,
        config: &LlmConfig,
        messages: &[Message],
        provider_name: &str,
    ) -> Result<LlmResponse, anyhow::Error> {
        let provider = LlmProvider::new(config.clone())?;
        let mut last_error: Option<anyhow::Error> = None;

        for attempt in 0..=self.retry_config.max_retries {
            if attempt > 0 {
                let delay = self.retry_config.calculate_delay(attempt - 1);
                log::debug!(
                    "Retry attempt {}/{} for {} after {:?} delay",
                    attempt,
                    self.retry_config.max_retries,
                    provider_name,
                    delay
                );
                self.bump(|s| s.retry_count += 1);
                tokio::time::sleep(delay).await;
            }

            let call = provider.complete(messages.to_vec());
            let result = match tokio::time::timeout(self.call_timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!(
                    "Provider {} call timed out after {:?}",
                    provider_name,
                    self.call_timeout
                )),
            };

            match result {
                Ok(response) => {
                    if attempt > 0 {
                        log::info!("Provider {} succeeded after {} retries", provider_name, attempt);
                    }
                    return Ok(response);
                }
                Err(e) => {
                    let error_kind = ErrorKind::classify(&e);
                    log::debug!(
                        "Provider {} attempt {}/{} failed ({:?}): {}",
                        provider_name,
                        attempt + 1,
                        self.retry_config.max_retries + 1,
                        error_kind,
                        e
                    );

                    if !error_kind.should_retry() {
                        return Err(e);
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            anyhow::anyhow!("Provider {} exhausted all retries", provider_name)
        }))
    }

    fn bump(&self, f: impl FnOnce(&mut GatewayStats)) {
        if let Ok(mut stats) = self.stats.lock() {
            f(&mut stats);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_grows_exponentially_and_caps() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10000,
            jitter_factor: 0.0,
        };

        assert_eq!(config.calculate_delay(0).as_millis(), 1000);
        assert_eq!(config.calculate_delay(1).as_millis(), 2000);
        assert_eq!(config.calculate_delay(2).as_millis(), 4000);
        assert_eq!(config.calculate_delay(3).as_millis(), 8000);
        // Would be 16000ms but capped
        assert_eq!(config.calculate_delay(4).as_millis(), 10000);
    }

    #[test]
    fn error_classification() {
        assert_eq!(
            ErrorKind::classify(&anyhow::anyhow!("Connection timeout")),
            ErrorKind::Transient
        );
        assert_eq!(
            ErrorKind::classify(&anyhow::anyhow!("Rate limit exceeded (429)")),
            ErrorKind::Transient
        );
        assert_eq!(
            ErrorKind::classify(&anyhow::anyhow!("Unauthorized: Invalid API key")),
            ErrorKind::Permanent
        );
        assert_eq!(
            ErrorKind::classify(&anyhow::anyhow!("Something went wrong")),
            ErrorKind::Unknown
        );
        assert!(ErrorKind::Transient.should_retry());
        assert!(!ErrorKind::Permanent.should_retry());
    }

    #[test]
    fn this_gateways_own_errors_classify_correctly() {
        // Construction failures are permanent: retrying a provider with no
        // key only delays the fallback.
        assert_eq!(
            ErrorKind::classify(&anyhow::anyhow!("API key not configured for OpenAi")),
            ErrorKind::Permanent
        );
        assert_eq!(
            ErrorKind::classify(&anyhow::anyhow!("base_url required for OpenAICompatible")),
            ErrorKind::Permanent
        );
        // The gateway's own per-call timeout is worth a retry.
        assert_eq!(
            ErrorKind::classify(&anyhow::anyhow!("Provider openai call timed out after 30s")),
            ErrorKind::Transient
        );
    }

    #[tokio::test]
    async fn keyless_chain_yields_sentinel() {
        let mut config = LlmConfig::openai();
        config.api_key = None;
        let gateway = LlmGateway::new(config, vec![]);

        let out = gateway.generate("hello", "system").await;
        assert!(LlmGateway::is_sentinel(&out));
    }

    #[test]
    fn sentinel_detection_is_exact() {
        assert!(LlmGateway::is_sentinel(SERVICE_UNAVAILABLE));
        assert!(!LlmGateway::is_sentinel("some other error"));
    }
}
