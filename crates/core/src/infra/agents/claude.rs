use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::prompts;
use super::{Agent, AgentError, AgentProvider, AgentRole, AgentTask};
use crate::domain::settings::GeneratorSettings;

/// API キーを読む環境シークレット名
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";

/// Claude API を使用するエージェント
pub struct ClaudeAgent {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    role: AgentRole,
}

#[derive(Serialize)]
struct MessageRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

impl ClaudeAgent {
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        model: String,
        max_tokens: u32,
        role: AgentRole,
    ) -> Self {
        Self {
            client,
            api_key,
            model,
            max_tokens,
            role,
        }
    }
}

#[async_trait]
impl Agent for ClaudeAgent {
    async fn perform(&self, task: &AgentTask) -> Result<String, AgentError> {
        let request = MessageRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: prompts::system_prompt_for_role(self.role).to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompts::build_task_prompt(task),
            }],
        };

        let response = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AgentError::Timeout
                } else {
                    AgentError::Failed(format!("HTTP request failed: {e}"))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Failed(format!(
                "Claude API error: {status} - {body}"
            )));
        }

        let msg_response: MessageResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Failed(format!("Response parse error: {e}")))?;

        let text = msg_response
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(AgentError::Failed("Empty response from Claude API".to_string()));
        }

        Ok(text)
    }

    fn role(&self) -> AgentRole {
        self.role
    }

    fn name(&self) -> &str {
        "claude"
    }
}

/// 環境シークレットの API キーで Claude エージェントを組み立てる
pub struct ClaudeAgentProvider {
    client: reqwest::Client,
    model: String,
    max_tokens: u32,
}

impl ClaudeAgentProvider {
    pub fn new(settings: &GeneratorSettings) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| AgentError::NotAvailable(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
        })
    }
}

impl AgentProvider for ClaudeAgentProvider {
    fn agent_for(
        &self,
        role: AgentRole,
        env: &HashMap<String, String>,
    ) -> Result<Arc<dyn Agent>, AgentError> {
        let api_key = env
            .get(API_KEY_ENV)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AgentError::NotAvailable(format!("{API_KEY_ENV} is not set")))?;

        Ok(Arc::new(ClaudeAgent::new(
            self.client.clone(),
            api_key.clone(),
            self.model.clone(),
            self.max_tokens,
            role,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_requires_api_key() {
        let provider = ClaudeAgentProvider::new(&GeneratorSettings::default()).unwrap();
        let err = provider
            .agent_for(AgentRole::ContentGeneration, &HashMap::new())
            .err()
            .unwrap();
        assert!(matches!(err, AgentError::NotAvailable(_)));
        assert!(err.to_string().contains(API_KEY_ENV));
    }

    #[test]
    fn test_provider_builds_agent_with_role() {
        let provider = ClaudeAgentProvider::new(&GeneratorSettings::default()).unwrap();
        let env = HashMap::from([(API_KEY_ENV.to_string(), "test-key".to_string())]);
        let agent = provider.agent_for(AgentRole::ContentReview, &env).unwrap();
        assert_eq!(agent.name(), "claude");
        assert_eq!(agent.role(), AgentRole::ContentReview);
    }
}
