pub mod providers;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// LLM provider types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum LLMProvider {
    LMStudio,
    OpenAI,
    Claude,
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::LMStudio,
            endpoint: Some("http://localhost:1234/v1/chat/completions".to_string()),
            api_key: None,
            model: "local-model".to_string(),
            max_tokens: 2048,
            temperature: 0.1,
            timeout_seconds: 60,
        }
    }
}

impl LLMConfig {
    /// Claude configuration with the given API key
    pub fn claude(api_key: String) -> Self {
        Self {
            provider: LLMProvider::Claude,
            endpoint: Some("https://api.anthropic.com/v1/messages".to_string()),
            api_key: Some(api_key),
            model: "claude-3-haiku-20240307".to_string(),
            ..Self::default()
        }
    }
}

/// Chat message for LLM communication
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// LLM response
#[derive(Debug, Clone)]
pub struct LLMResponse {
    pub content: String,
    pub tokens_used: Option<u32>,
}

/// Trait for LLM providers
#[async_trait]
pub trait LLM: Send + Sync {
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<LLMResponse>;
    async fn is_available(&self) -> bool;
    fn provider_type(&self) -> LLMProvider;
}

/// Create LLM instance based on configuration
pub fn create_llm(config: &LLMConfig) -> Result<Box<dyn LLM>> {
    match config.provider {
        LLMProvider::LMStudio | LLMProvider::OpenAI => {
            Ok(Box::new(providers::OpenAICompatibleProvider::new(config.clone())?))
        }
        LLMProvider::Claude => Ok(Box::new(providers::ClaudeProvider::new(config.clone())?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_local() {
        let config = LLMConfig::default();
        assert_eq!(config.provider, LLMProvider::LMStudio);
        assert!(config.api_key.is_none());
        assert!(create_llm(&config).is_ok());
    }

    #[test]
    fn test_cloud_providers_require_key() {
        let mut config = LLMConfig::claude("key".to_string());
        assert!(create_llm(&config).is_ok());

        config.api_key = None;
        assert!(create_llm(&config).is_err());

        let config = LLMConfig {
            provider: LLMProvider::OpenAI,
            ..LLMConfig::default()
        };
        assert!(create_llm(&config).is_err());
    }
}
