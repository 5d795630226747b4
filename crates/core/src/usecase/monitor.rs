use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::job_registry::JobRegistry;
use crate::domain::job::{JobUpdate, WorkflowStatus};
use crate::domain::settings::GeneratorSettings;

/// 進捗モニターを起動する
pub fn spawn_monitor(
    registry: Arc<JobRegistry>,
    job_id: String,
    settings: &GeneratorSettings,
) -> JoinHandle<()> {
    let interval = settings.monitor_interval();
    let timeout = settings.monitor_timeout();
    tokio::spawn(async move { monitor_job(registry, job_id, interval, timeout).await })
}

/// ジョブが終端状態になるまで一定間隔で workflow_status を「処理中」に上書きする。
///
/// 実際のステップ状態は反映しない。timeout 経過後はジョブ状態を変えずに終了する。
pub async fn monitor_job(
    registry: Arc<JobRegistry>,
    job_id: String,
    interval: Duration,
    timeout: Duration,
) {
    let poll = async {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // 初回の即時tickを飛ばす
        loop {
            ticker.tick().await;

            let running = registry
                .get_job(&job_id)
                .await
                .is_some_and(|job| !job.status.is_terminal());
            if !running {
                break;
            }

            registry
                .update_job(
                    &job_id,
                    JobUpdate {
                        workflow_status: Some(WorkflowStatus::in_progress()),
                        ..Default::default()
                    },
                )
                .await;
        }
    };

    match tokio::time::timeout(timeout, poll).await {
        Ok(()) => log::debug!("進捗モニター終了: {job_id}"),
        Err(_) => log::warn!("進捗モニターがタイムアウト: {job_id} ({}s)", timeout.as_secs()),
    }
}
