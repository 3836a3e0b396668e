//! Answer generator: the hosted language model behind informational answers.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use tariffbot_core::config::GeneratorConfig;

use crate::error::GeneratorError;

const SYSTEM_PROMPT: &str = "You are TariffBot, an assistant for the Harmonized Tariff Schedule \
of the United States. Answer the question using only the provided context from the HTS \
General Notes. If the context does not contain the answer, say that you do not know.";

/// Produces answer text from a question and retrieved context.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, query: &str, context: &str) -> Result<String, GeneratorError>;
}

/// Client for an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiGenerator {
    pub fn new(config: &GeneratorConfig, api_key: String) -> Result<Self, GeneratorError> {
        // Overall deadlines belong to GuardedGenerator; this only bounds
        // connection setup.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| GeneratorError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl AnswerGenerator for OpenAiGenerator {
    async fn generate(&self, query: &str, context: &str) -> Result<String, GeneratorError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": format!("Context:\n{}\n\nQuestion: {}", context, query),
                },
            ],
        });

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(GeneratorError::from_status(status.as_u16(), text));
        }

        let payload: Value = res.json().await?;
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| GeneratorError::InvalidResponse("missing message content".to_string()))?
            .trim()
            .to_string();

        debug!(model = %self.model, chars = content.len(), "Generator answered");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> GeneratorConfig {
        GeneratorConfig {
            base_url: base_url.to_string(),
            timeout_secs: 2,
            ..GeneratorConfig::default()
        }
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let generator = OpenAiGenerator::new(&config("https://api.example.com/v1/"), "k".into()).unwrap();
        assert_eq!(generator.base_url, "https://api.example.com/v1");
        assert_eq!(generator.model, "gpt-3.5-turbo");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transient() {
        let generator = OpenAiGenerator::new(&config("http://127.0.0.1:9/v1"), "k".into()).unwrap();
        let err = generator.generate("question", "context").await.unwrap_err();
        assert!(err.is_transient(), "expected transient error, got {:?}", err);
    }
}
