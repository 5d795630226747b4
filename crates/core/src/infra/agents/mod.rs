pub mod claude;
mod noop;
pub mod prompts;

pub use claude::{ClaudeAgent, ClaudeAgentProvider};
pub use noop::{NoopAgent, NoopAgentProvider};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// エージェントの役割
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    KnowledgeResearch,
    NewsResearch,
    ContentGeneration,
    ContentReview,
    ContentEnhancement,
}

impl AgentRole {
    pub const ALL: [AgentRole; 5] = [
        AgentRole::KnowledgeResearch,
        AgentRole::NewsResearch,
        AgentRole::ContentGeneration,
        AgentRole::ContentReview,
        AgentRole::ContentEnhancement,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::KnowledgeResearch => "knowledge_research",
            Self::NewsResearch => "news_research",
            Self::ContentGeneration => "content_generation",
            Self::ContentReview => "content_review",
            Self::ContentEnhancement => "content_enhancement",
        }
    }
}

/// エージェントエラー
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Agent not available: {0}")]
    NotAvailable(String),
    #[error("Agent failed: {0}")]
    Failed(String),
    #[error("Agent timeout")]
    Timeout,
}

/// 1ステップ分の依頼内容
#[derive(Debug, Clone)]
pub struct AgentTask {
    pub title: String,
    pub description: String,
    pub expected_output: String,
    /// ワークフロー入力（ジョブ設定など）
    pub inputs: serde_json::Map<String, serde_json::Value>,
    /// 先行ステップの出力（ステップタイトル, 出力）
    pub context: Vec<(String, String)>,
}

/// エージェント trait（LLM 実装やテスト用スタブが実装する）
#[async_trait]
pub trait Agent: Send + Sync {
    async fn perform(&self, task: &AgentTask) -> Result<String, AgentError>;

    fn role(&self) -> AgentRole;

    fn name(&self) -> &str;
}

/// ワークフローに渡すエージェント一式
pub type AgentSet = HashMap<AgentRole, Arc<dyn Agent>>;

/// 役割と環境シークレットからエージェントを組み立てる
pub trait AgentProvider: Send + Sync {
    fn agent_for(
        &self,
        role: AgentRole,
        env: &HashMap<String, String>,
    ) -> Result<Arc<dyn Agent>, AgentError>;

    /// 指定された役割をすべて組み立てる。1つでも失敗すればエラー。
    fn build_set(
        &self,
        roles: &[AgentRole],
        env: &HashMap<String, String>,
    ) -> Result<AgentSet, AgentError> {
        let mut set = AgentSet::new();
        for role in roles {
            if !set.contains_key(role) {
                set.insert(*role, self.agent_for(*role, env)?);
            }
        }
        Ok(set)
    }
}
