use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::domain::error::AppError;
use crate::domain::job::{
    GenerationConfig, GenerationJob, GenerationStats, JobEvent, JobResults, JobStatus, JobUpdate,
    WorkflowStatus,
};
use crate::infra::workflow::WorkflowEngine;

const EVENT_CAPACITY: usize = 64;

/// キャンセル時にジョブへ記録するメッセージ
pub const CANCELLED_MESSAGE: &str = "ユーザーによりキャンセルされました";

/// ジョブレジストリ: 生成ジョブの登録・状態管理・キャンセル
///
/// ジョブ記録と実行中タスクの管理情報を1つのロックの内側で持つ。
/// 記録は削除しない（プロセス終了まで保持）。
pub struct JobRegistry {
    jobs: Mutex<HashMap<String, JobEntry>>,
    events: broadcast::Sender<JobEvent>,
}

struct JobEntry {
    job: GenerationJob,
    cancel_tx: Option<oneshot::Sender<()>>,
    engine: Option<Arc<dyn WorkflowEngine>>,
    handle: Option<JoinHandle<()>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            jobs: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// ジョブを pending で登録し、キャンセルシグナルの Receiver を返す
    pub async fn create_job(&self, config: GenerationConfig) -> (String, oneshot::Receiver<()>) {
        let job_id = uuid::Uuid::new_v4().to_string();
        let job = GenerationJob::new(job_id.clone(), config, chrono::Utc::now());
        let (cancel_tx, cancel_rx) = oneshot::channel();

        let entry = JobEntry {
            job,
            cancel_tx: Some(cancel_tx),
            engine: None,
            handle: None,
        };

        let mut jobs = self.jobs.lock().await;
        jobs.insert(job_id.clone(), entry);

        (job_id, cancel_rx)
    }

    /// ジョブのJoinHandleを設定（spawn後に呼ぶ）
    pub async fn set_handle(&self, job_id: &str, handle: JoinHandle<()>) {
        let mut jobs = self.jobs.lock().await;
        if let Some(entry) = jobs.get_mut(job_id) {
            entry.handle = Some(handle);
        }
    }

    /// 実行エンジンを紐付ける。1ジョブにつき1つまで。
    /// 終端状態（キャンセル済みなど）のジョブには紐付けない。
    pub async fn attach_engine(
        &self,
        job_id: &str,
        engine: Arc<dyn WorkflowEngine>,
    ) -> Result<(), AppError> {
        let mut jobs = self.jobs.lock().await;
        let entry = jobs
            .get_mut(job_id)
            .ok_or_else(|| AppError::invalid_state(format!("ジョブが存在しません: {job_id}")))?;

        if entry.job.status.is_terminal() {
            return Err(AppError::cancelled(format!(
                "ジョブは既に {} です",
                entry.job.status.as_str()
            )));
        }
        if entry.engine.is_some() {
            return Err(AppError::invalid_state(format!(
                "ジョブ {job_id} には実行中のワークフローがあります"
            )));
        }

        entry.engine = Some(engine);
        Ok(())
    }

    pub async fn get_job(&self, job_id: &str) -> Option<GenerationJob> {
        let jobs = self.jobs.lock().await;
        jobs.get(job_id).map(|e| e.job.clone())
    }

    /// 全ジョブを開始時刻の新しい順に返す
    pub async fn list_jobs(&self) -> Vec<GenerationJob> {
        let jobs = self.jobs.lock().await;
        let mut list: Vec<GenerationJob> = jobs.values().map(|e| e.job.clone()).collect();
        list.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        list
    }

    /// 部分更新をマージする。存在しない・終端状態のジョブには何もしない。
    pub async fn update_job(&self, job_id: &str, update: JobUpdate) {
        let mut jobs = self.jobs.lock().await;
        let Some(entry) = jobs.get_mut(job_id) else {
            return;
        };

        if let Some(prev) = entry.job.apply(update) {
            // パイプライン自身が終端にした場合、タスクはこの後すぐ終わる
            if entry.job.status.is_terminal() {
                entry.cancel_tx = None;
                entry.engine = None;
                entry.handle = None;
            }
            self.emit(job_id, prev, entry.job.status);
        }
    }

    /// ジョブをActive状態に変更
    pub async fn mark_active(&self, job_id: &str) {
        self.update_job(
            job_id,
            JobUpdate {
                status: Some(JobStatus::Active),
                progress: Some(10),
                ..Default::default()
            },
        )
        .await;
    }

    /// ジョブをCompleted状態に変更
    pub async fn mark_completed(
        &self,
        job_id: &str,
        results: JobResults,
        workflow_status: WorkflowStatus,
    ) {
        self.update_job(
            job_id,
            JobUpdate {
                status: Some(JobStatus::Completed),
                progress: Some(100),
                results: Some(results),
                workflow_status: Some(workflow_status),
                ..Default::default()
            },
        )
        .await;
    }

    /// ジョブをFailed状態に変更
    pub async fn mark_failed(&self, job_id: &str, error: String) {
        self.update_job(job_id, JobUpdate::failed(error)).await;
    }

    /// ジョブをキャンセル
    ///
    /// 記録を cancelled に確定させてから、エンジンへの停止要求とタスクへの
    /// キャンセルシグナルを送る。停止の成否は結果に影響しない。
    /// 終端状態・存在しないジョブは false。
    pub async fn cancel_job(&self, job_id: &str) -> bool {
        let (engine, cancel_tx) = {
            let mut jobs = self.jobs.lock().await;
            let Some(entry) = jobs.get_mut(job_id) else {
                return false;
            };
            if entry.job.status.is_terminal() {
                return false;
            }

            let prev = entry.job.apply(JobUpdate {
                status: Some(JobStatus::Cancelled),
                progress: Some(0),
                error: Some(CANCELLED_MESSAGE.to_string()),
                ..Default::default()
            });
            if let Some(prev) = prev {
                self.emit(job_id, prev, JobStatus::Cancelled);
            }
            (entry.engine.take(), entry.cancel_tx.take())
        };

        // ロックの外でエンジンを止める
        if let Some(engine) = engine {
            if let Err(e) = engine.stop() {
                log::warn!("ワークフロー停止に失敗 [{job_id}]: {e}");
            }
        }
        if let Some(tx) = cancel_tx {
            let _ = tx.send(());
        }

        log::info!("ジョブをキャンセル: {job_id}");
        true
    }

    pub async fn stats(&self) -> GenerationStats {
        let jobs = self.jobs.lock().await;
        GenerationStats::from_jobs(jobs.values().map(|e| &e.job))
    }

    /// 状態変化イベントを購読する
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// 全タスクの終了を待つ（abandon なら中断する）
    pub async fn shutdown(&self, abandon: bool) {
        let handles: Vec<(String, JoinHandle<()>)> = {
            let mut jobs = self.jobs.lock().await;
            jobs.iter_mut()
                .filter_map(|(id, entry)| entry.handle.take().map(|h| (id.clone(), h)))
                .collect()
        };

        for (job_id, handle) in handles {
            if abandon {
                handle.abort();
            } else if let Err(e) = handle.await {
                log::error!("ジョブタスクが異常終了 [{job_id}]: {e}");
            }
        }
    }

    fn emit(&self, job_id: &str, prev: JobStatus, new: JobStatus) {
        // 購読者がいない場合の送信エラーは無視
        let _ = self.events.send(JobEvent {
            job_id: job_id.to_string(),
            prev_status: prev,
            new_status: new,
            timestamp: chrono::Utc::now().to_rfc3339(),
        });
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
