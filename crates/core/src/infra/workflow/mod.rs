mod engine;
pub mod output;
pub mod steps;

pub use engine::SequentialWorkflow;

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::error::AppError;
use crate::infra::agents::{AgentError, AgentRole};

/// パイプラインの1ステップ
///
/// title / description / expected_output はエージェントへの指示であり、
/// 出力を機械的に検証する契約ではない。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub id: String,
    pub title: String,
    pub description: String,
    pub expected_output: String,
    pub role: AgentRole,
}

/// 完了したステップの出力
#[derive(Debug, Clone)]
pub struct StepOutput {
    pub step_id: String,
    pub title: String,
    pub role: AgentRole,
    pub output: String,
}

/// ワークフロー全体の実行結果
#[derive(Debug, Clone, Default)]
pub struct WorkflowOutcome {
    pub outputs: Vec<StepOutput>,
}

impl WorkflowOutcome {
    /// 指定した役割の最後の出力
    pub fn output_for(&self, role: AgentRole) -> Option<&str> {
        self.outputs
            .iter()
            .rev()
            .find(|o| o.role == role)
            .map(|o| o.output.as_str())
    }

    pub fn final_output(&self) -> Option<&str> {
        self.outputs.last().map(|o| o.output.as_str())
    }

    pub fn completed_titles(&self) -> Vec<String> {
        self.outputs.iter().map(|o| o.title.clone()).collect()
    }
}

/// ワークフローエラー
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Workflow configuration error: {0}")]
    Config(String),
    #[error("Step '{step}' failed: {source}")]
    Step {
        step: String,
        #[source]
        source: AgentError,
    },
    #[error("Workflow stopped")]
    Stopped,
}

impl From<WorkflowError> for AppError {
    fn from(e: WorkflowError) -> Self {
        match e {
            WorkflowError::Config(_) => AppError::config(e.to_string()),
            WorkflowError::Step { .. } => AppError::generation(e.to_string()),
            WorkflowError::Stopped => AppError::cancelled(e.to_string()),
        }
    }
}

/// パイプライン実行エンジン
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    /// 全ステップを宣言順に実行する
    async fn start(&self) -> Result<WorkflowOutcome, WorkflowError>;

    /// 実行中のワークフローに停止を要求する（ベストエフォート）
    fn stop(&self) -> Result<(), WorkflowError>;
}
