use super::{ChatMessage, LLMConfig, LLMProvider, LLMResponse, LLM};
use crate::error::{RecommendationError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

fn build_client(config: &LLMConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .build()?)
}

async fn error_for_status(provider: LLMProvider, response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    Err(RecommendationError::Llm(format!("{:?} API error {}: {}", provider, status, text)))
}

/// Provider for OpenAI and OpenAI-compatible local servers such as LMStudio
pub struct OpenAICompatibleProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
    usage: Option<ChatCompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionUsage {
    total_tokens: u32,
}

impl OpenAICompatibleProvider {
    pub fn new(config: LLMConfig) -> Result<Self> {
        if config.provider == LLMProvider::OpenAI && config.api_key.is_none() {
            return Err(RecommendationError::Configuration("OpenAI API key required".to_string()));
        }

        let client = build_client(&config)?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> &str {
        self.config.endpoint.as_deref().unwrap_or(OPENAI_CHAT_URL)
    }
}

#[async_trait]
impl LLM for OpenAICompatibleProvider {
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<LLMResponse> {
        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        debug!("Sending chat request to {:?} at {}", self.config.provider, self.endpoint());

        let mut builder = self.client.post(self.endpoint()).json(&request);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = error_for_status(self.config.provider, builder.send().await?).await?;
        let completion: ChatCompletionResponse = response.json().await?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| RecommendationError::Llm(format!("No response from {:?}", self.config.provider)))?;

        Ok(LLMResponse {
            content,
            tokens_used: completion.usage.map(|u| u.total_tokens),
        })
    }

    async fn is_available(&self) -> bool {
        let models_url = self.endpoint().replace("/chat/completions", "/models");
        let mut builder = self.client.get(&models_url);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }

        match builder.send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn provider_type(&self) -> LLMProvider {
        self.config.provider
    }
}

/// Claude provider using the Anthropic Messages API
pub struct ClaudeProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContentBlock>,
    usage: Option<ClaudeUsage>,
}

#[derive(Debug, Deserialize)]
struct ClaudeContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl ClaudeProvider {
    pub fn new(config: LLMConfig) -> Result<Self> {
        if config.api_key.is_none() {
            return Err(RecommendationError::Configuration("Claude API key required".to_string()));
        }

        let client = build_client(&config)?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> &str {
        self.config
            .endpoint
            .as_deref()
            .unwrap_or(ANTHROPIC_MESSAGES_URL)
    }
}

#[async_trait]
impl LLM for ClaudeProvider {
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<LLMResponse> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| RecommendationError::Configuration("Claude API key not configured".to_string()))?;

        // The Messages API takes the system prompt as a top-level field
        let (system, conversation): (Vec<ChatMessage>, Vec<ChatMessage>) =
            messages.into_iter().partition(|m| m.role == "system");
        let system = if system.is_empty() {
            None
        } else {
            Some(system.into_iter().map(|m| m.content).collect::<Vec<_>>().join("\n\n"))
        };

        let request = ClaudeRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system,
            messages: conversation,
        };

        debug!("Sending request to Claude API");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;
        let response = error_for_status(LLMProvider::Claude, response).await?;
        let claude_response: ClaudeResponse = response.json().await?;

        let content = claude_response
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        if content.is_empty() {
            return Err(RecommendationError::Llm("No response from Claude".to_string()));
        }

        Ok(LLMResponse {
            content,
            tokens_used: claude_response.usage.map(|u| u.input_tokens + u.output_tokens),
        })
    }

    async fn is_available(&self) -> bool {
        // No cheap health endpoint; a configured key is the best signal
        self.config.api_key.as_ref().map_or(false, |k| !k.is_empty())
    }

    fn provider_type(&self) -> LLMProvider {
        LLMProvider::Claude
    }
}
