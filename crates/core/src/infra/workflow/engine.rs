use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::watch;

use super::{Step, StepOutput, WorkflowEngine, WorkflowError, WorkflowOutcome};
use crate::infra::agents::{AgentProvider, AgentRole, AgentSet, AgentTask};

/// ステップを1つずつ順番に実行するエンジン
pub struct SequentialWorkflow {
    agents: AgentSet,
    steps: Vec<Step>,
    inputs: serde_json::Map<String, serde_json::Value>,
    stop_tx: watch::Sender<bool>,
}

impl SequentialWorkflow {
    pub fn new(
        agents: AgentSet,
        steps: Vec<Step>,
        inputs: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, WorkflowError> {
        if steps.is_empty() {
            return Err(WorkflowError::Config("no steps".to_string()));
        }
        if let Some(step) = steps.iter().find(|s| !agents.contains_key(&s.role)) {
            return Err(WorkflowError::Config(format!(
                "no agent bound to role {} (step '{}')",
                step.role.as_str(),
                step.title
            )));
        }

        let (stop_tx, _) = watch::channel(false);
        Ok(Self {
            agents,
            steps,
            inputs,
            stop_tx,
        })
    }

    /// プロバイダーと環境シークレットからエージェントを揃えて組み立てる
    pub fn assemble(
        provider: &dyn AgentProvider,
        steps: Vec<Step>,
        inputs: serde_json::Map<String, serde_json::Value>,
        env: &HashMap<String, String>,
    ) -> Result<Self, WorkflowError> {
        let roles: Vec<AgentRole> = steps.iter().map(|s| s.role).collect();
        let agents = provider
            .build_set(&roles, env)
            .map_err(|e| WorkflowError::Config(e.to_string()))?;
        Self::new(agents, steps, inputs)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

#[async_trait]
impl WorkflowEngine for SequentialWorkflow {
    async fn start(&self) -> Result<WorkflowOutcome, WorkflowError> {
        let mut stop_rx = self.stop_tx.subscribe();
        let mut outcome = WorkflowOutcome::default();

        for step in &self.steps {
            if *stop_rx.borrow() {
                return Err(WorkflowError::Stopped);
            }

            let agent = self.agents.get(&step.role).ok_or_else(|| {
                WorkflowError::Config(format!("no agent bound to role {}", step.role.as_str()))
            })?;

            let task = AgentTask {
                title: step.title.clone(),
                description: step.description.clone(),
                expected_output: step.expected_output.clone(),
                inputs: self.inputs.clone(),
                context: outcome
                    .outputs
                    .iter()
                    .map(|o| (o.title.clone(), o.output.clone()))
                    .collect(),
            };

            log::info!("ステップ開始: {} ({})", step.title, agent.name());

            // 実行中のエージェント呼び出しも停止要求で打ち切る
            let result = tokio::select! {
                r = agent.perform(&task) => r,
                _ = wait_stopped(&mut stop_rx) => {
                    log::info!("ステップ中断: {}", step.title);
                    return Err(WorkflowError::Stopped);
                }
            };

            let output = result.map_err(|source| WorkflowError::Step {
                step: step.title.clone(),
                source,
            })?;

            log::debug!("ステップ完了: {} ({} bytes)", step.title, output.len());
            outcome.outputs.push(StepOutput {
                step_id: step.id.clone(),
                title: step.title.clone(),
                role: step.role,
                output,
            });
        }

        Ok(outcome)
    }

    fn stop(&self) -> Result<(), WorkflowError> {
        self.stop_tx.send_replace(true);
        Ok(())
    }
}

async fn wait_stopped(rx: &mut watch::Receiver<bool>) {
    // 送信側はエンジン自身が保持しているため閉じることはない
    let _ = rx.wait_for(|stopped| *stopped).await;
}
