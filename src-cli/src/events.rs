use tokio::sync::broadcast::{self, error::RecvError};

use bg_core::domain::job::{GenerationJob, JobEvent};
use bg_core::usecase::orchestrator::BlogOrchestrator;

use crate::commands::{CliError, CliResult};

/// ジョブの状態変化をログに流しながら、終端状態になるまで待つ
pub async fn wait_terminal(
    orch: &BlogOrchestrator,
    mut rx: broadcast::Receiver<JobEvent>,
    job_id: &str,
) -> CliResult<GenerationJob> {
    loop {
        let job = orch
            .get_job(job_id)
            .await
            .ok_or_else(|| CliError::JobNotFound(job_id.to_string()))?;
        if job.status.is_terminal() {
            return Ok(job);
        }

        match rx.recv().await {
            Ok(event) if event.job_id == job_id => {
                log::info!(
                    "ジョブ状態: {} -> {} ({})",
                    event.prev_status.as_str(),
                    event.new_status.as_str(),
                    event.timestamp
                );
            }
            Ok(_) => {}
            Err(RecvError::Lagged(n)) => log::warn!("イベントを {n} 件取りこぼしました"),
            Err(RecvError::Closed) => return Ok(job),
        }
    }
}
