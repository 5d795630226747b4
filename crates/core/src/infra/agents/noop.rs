use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::{Agent, AgentError, AgentProvider, AgentRole, AgentTask};

/// NoopAgent: 役割ごとに固定の出力を返すモック実装。
/// API キーなしでパイプライン全体を動かすときに使う。
pub struct NoopAgent {
    role: AgentRole,
}

impl NoopAgent {
    pub fn new(role: AgentRole) -> Self {
        Self { role }
    }
}

#[async_trait]
impl Agent for NoopAgent {
    async fn perform(&self, task: &AgentTask) -> Result<String, AgentError> {
        let topic = task
            .inputs
            .get("topic")
            .or_else(|| task.inputs.get("focusTopic"))
            .and_then(|v| v.as_str())
            .unwrap_or("technology");

        let output = match self.role {
            AgentRole::KnowledgeResearch => format!("[noop] {topic} の調査メモ"),
            AgentRole::NewsResearch => serde_json::json!({
                "articlesFound": 0,
                "articlesAnalyzed": 0,
                "articles": [],
            })
            .to_string(),
            AgentRole::ContentGeneration => format!("# {topic}\n\n[noop] 下書き本文"),
            AgentRole::ContentReview => serde_json::json!({
                "approved": false,
                "qualityScore": 0,
                "issues": [],
            })
            .to_string(),
            AgentRole::ContentEnhancement => serde_json::json!({
                "title": topic,
                "content": format!("# {topic}\n\n[noop] 最終稿"),
                "excerpt": format!("{topic} について"),
                "tags": [],
                "sources": [],
            })
            .to_string(),
        };

        Ok(output)
    }

    fn role(&self) -> AgentRole {
        self.role
    }

    fn name(&self) -> &str {
        "noop"
    }
}

pub struct NoopAgentProvider;

impl AgentProvider for NoopAgentProvider {
    fn agent_for(
        &self,
        role: AgentRole,
        _env: &HashMap<String, String>,
    ) -> Result<Arc<dyn Agent>, AgentError> {
        Ok(Arc::new(NoopAgent::new(role)))
    }
}
