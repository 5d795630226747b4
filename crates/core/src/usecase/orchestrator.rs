use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast;

use super::job_registry::JobRegistry;
use super::monitor::spawn_monitor;
use crate::domain::error::AppError;
use crate::domain::job::{
    CustomConfig, GenerationConfig, GenerationJob, GenerationStats, JobEvent, JobResults,
    JobUpdate, ScheduledConfig, WorkflowStatus,
};
use crate::domain::settings::GeneratorSettings;
use crate::infra::agents::{AgentProvider, AgentRole};
use crate::infra::persistence::save_generated_post;
use crate::infra::storage::BlogStore;
use crate::infra::workflow::output::{parse_generated_content, parse_news_digest, parse_review};
use crate::infra::workflow::steps::{steps_for, workflow_inputs};
use crate::infra::workflow::{SequentialWorkflow, WorkflowEngine, WorkflowError, WorkflowOutcome};

/// エンジン完了後、保存前の進捗値
const PROGRESS_PERSISTING: u8 = 90;

/// 記事生成ジョブのオーケストレーター
///
/// ジョブを登録してパイプラインと進捗モニターを起動し、結果を記事として保存する。
pub struct BlogOrchestrator {
    registry: Arc<JobRegistry>,
    store: Arc<dyn BlogStore>,
    provider: Arc<dyn AgentProvider>,
    settings: Arc<GeneratorSettings>,
    secrets: Arc<HashMap<String, String>>,
}

impl BlogOrchestrator {
    /// `secrets` はワークフローエンジンに渡す環境（API キーなど）
    pub fn new(
        store: Arc<dyn BlogStore>,
        provider: Arc<dyn AgentProvider>,
        settings: GeneratorSettings,
        secrets: HashMap<String, String>,
    ) -> Self {
        Self {
            registry: Arc::new(JobRegistry::new()),
            store,
            provider,
            settings: Arc::new(settings),
            secrets: Arc::new(secrets),
        }
    }

    /// 定期生成ジョブを開始し、ジョブIDを返す
    pub async fn start_scheduled(&self, config: ScheduledConfig) -> String {
        self.launch(GenerationConfig::Scheduled(config)).await
    }

    /// トピック指定ジョブを開始し、ジョブIDを返す
    pub async fn start_custom(&self, config: CustomConfig) -> String {
        self.launch(GenerationConfig::Custom(config)).await
    }

    pub async fn get_job(&self, job_id: &str) -> Option<GenerationJob> {
        self.registry.get_job(job_id).await
    }

    pub async fn list_jobs(&self) -> Vec<GenerationJob> {
        self.registry.list_jobs().await
    }

    pub async fn cancel_job(&self, job_id: &str) -> bool {
        self.registry.cancel_job(job_id).await
    }

    pub async fn get_stats(&self) -> GenerationStats {
        self.registry.stats().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.registry.subscribe()
    }

    /// 実行中のパイプラインを待つ（abandon なら中断）
    pub async fn shutdown(&self, abandon: bool) {
        self.registry.shutdown(abandon).await;
    }

    async fn launch(&self, config: GenerationConfig) -> String {
        let (job_id, cancel_rx) = self.registry.create_job(config.clone()).await;
        log::info!("生成ジョブを登録: {job_id} ({})", kind_of(&config));

        let pipeline = Pipeline {
            job_id: job_id.clone(),
            config,
            registry: self.registry.clone(),
            store: self.store.clone(),
            provider: self.provider.clone(),
            settings: self.settings.clone(),
            secrets: self.secrets.clone(),
        };

        let task_id = job_id.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = pipeline.run() => {}
                Ok(()) = cancel_rx => {
                    log::info!("キャンセルを受信、パイプラインを終了: {task_id}");
                }
            }
        });
        self.registry.set_handle(&job_id, handle).await;

        spawn_monitor(self.registry.clone(), job_id.clone(), &self.settings);

        job_id
    }
}

fn kind_of(config: &GenerationConfig) -> &'static str {
    match config {
        GenerationConfig::Scheduled(_) => "scheduled",
        GenerationConfig::Custom(_) => "custom",
    }
}

/// 1ジョブ分のパイプライン実行（spawn されたタスクの中で動く）
struct Pipeline {
    job_id: String,
    config: GenerationConfig,
    registry: Arc<JobRegistry>,
    store: Arc<dyn BlogStore>,
    provider: Arc<dyn AgentProvider>,
    settings: Arc<GeneratorSettings>,
    secrets: Arc<HashMap<String, String>>,
}

impl Pipeline {
    /// エラーはすべてここで捕捉し、ジョブを failed にする
    async fn run(self) {
        let engine = match SequentialWorkflow::assemble(
            self.provider.as_ref(),
            steps_for(&self.config),
            workflow_inputs(&self.config),
            &self.secrets,
        ) {
            Ok(engine) => Arc::new(engine),
            Err(e) => return self.fail(e.into(), None).await,
        };

        if let Err(e) = self.registry.attach_engine(&self.job_id, engine.clone()).await {
            log::info!("ワークフローを起動しません [{}]: {e}", self.job_id);
            return;
        }
        self.registry.mark_active(&self.job_id).await;
        log::info!(
            "ワークフロー開始: {} ({} steps)",
            self.job_id,
            engine.steps().len()
        );

        let outcome = match engine.start().await {
            Ok(outcome) => outcome,
            Err(WorkflowError::Stopped) => {
                log::info!("ワークフローが停止されました: {}", self.job_id);
                return;
            }
            Err(e) => {
                let failed_step = match &e {
                    WorkflowError::Step { step, .. } => Some(step.clone()),
                    _ => None,
                };
                return self.fail(e.into(), failed_step).await;
            }
        };

        self.registry
            .update_job(
                &self.job_id,
                JobUpdate {
                    progress: Some(PROGRESS_PERSISTING),
                    ..Default::default()
                },
            )
            .await;

        match self.finish(&outcome).await {
            Ok(results) => {
                log::info!(
                    "生成ジョブ完了: {} (posts={:?})",
                    self.job_id,
                    results.post_ids
                );
                let workflow_status = WorkflowStatus {
                    completed_steps: outcome.completed_titles(),
                    ..Default::default()
                };
                self.registry
                    .mark_completed(&self.job_id, results, workflow_status)
                    .await;
            }
            Err(e) => self.fail(e, None).await,
        }
    }

    /// エージェント出力を解析し、記事を保存する
    async fn finish(&self, outcome: &WorkflowOutcome) -> Result<JobResults, AppError> {
        let digest = outcome
            .output_for(AgentRole::NewsResearch)
            .map(parse_news_digest)
            .unwrap_or_default();
        let review = outcome
            .output_for(AgentRole::ContentReview)
            .map(parse_review)
            .unwrap_or_default();

        let final_output = outcome
            .final_output()
            .ok_or_else(|| AppError::generation("最終ステップの出力がありません"))?;
        let content = parse_generated_content(final_output)
            .map_err(|e| AppError::generation(format!("生成結果を解析できません: {e}")))?;

        // キャンセル済みなら保存しない
        if self.is_terminal().await {
            return Err(AppError::cancelled("ジョブは既に終了しています"));
        }

        let post = save_generated_post(self.store.as_ref(), &content, &review, &self.settings)?;

        // 保存中にキャンセルされた場合、記事は残るがジョブ結果には載せない
        if self.is_terminal().await {
            log::warn!(
                "キャンセル後に保存された記事があります [{}]: post {}",
                self.job_id,
                post.id
            );
            return Err(AppError::cancelled(format!(
                "保存中にジョブが終了しました (post {})",
                post.id
            )));
        }

        Ok(JobResults {
            articles_found: digest.articles_found,
            articles_analyzed: digest.articles_analyzed,
            post_generated: true,
            post_ids: vec![post.id],
            reviews: vec![review.summary()],
        })
    }

    async fn is_terminal(&self) -> bool {
        self.registry
            .get_job(&self.job_id)
            .await
            .map_or(true, |job| job.status.is_terminal())
    }

    async fn fail(&self, error: AppError, failed_step: Option<String>) {
        log::error!("生成ジョブ失敗 [{}]: {error}", self.job_id);

        let mut update = JobUpdate::failed(error.message);
        if let Some(step) = failed_step {
            update.workflow_status = Some(WorkflowStatus {
                failed_steps: vec![step],
                ..Default::default()
            });
        }
        self.registry.update_job(&self.job_id, update).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::content::{NewPost, NewTag, Post, PostStatus, Tag};
    use crate::domain::error::ErrorCode;
    use crate::domain::job::JobStatus;
    use crate::infra::agents::claude::API_KEY_ENV;
    use crate::infra::agents::{ClaudeAgentProvider, NoopAgentProvider};
    use crate::infra::storage::Storage;
    use crate::infra::workflow::StepOutput;

    fn orchestrator(provider: Arc<dyn AgentProvider>) -> (BlogOrchestrator, Arc<Storage>) {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let orch = BlogOrchestrator::new(
            storage.clone(),
            provider,
            GeneratorSettings::default(),
            HashMap::new(),
        );
        (orch, storage)
    }

    async fn wait_terminal(orch: &BlogOrchestrator, job_id: &str) -> GenerationJob {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let job = orch.get_job(job_id).await.unwrap();
                if job.status.is_terminal() {
                    return job;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_custom_job_saves_draft_with_noop_agents() {
        let (orch, storage) = orchestrator(Arc::new(NoopAgentProvider));
        let job_id = orch
            .start_custom(CustomConfig {
                topic: "Rust ownership".into(),
                user_prompt: None,
            })
            .await;

        let job = wait_terminal(&orch, &job_id).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.workflow_status.completed_steps.len(), 4);

        let results = job.results.unwrap();
        assert!(results.post_generated);
        assert_eq!(results.post_ids.len(), 1);
        assert!(!results.reviews[0].approved);

        let post = storage.get_post(&results.post_ids[0]).unwrap().unwrap();
        assert_eq!(post.status, PostStatus::Draft);
        assert_eq!(post.title, "Rust ownership");
    }

    #[tokio::test]
    async fn test_scheduled_job_runs_five_steps() {
        let (orch, _storage) = orchestrator(Arc::new(NoopAgentProvider));
        let job_id = orch.start_scheduled(ScheduledConfig::default()).await;

        let job = wait_terminal(&orch, &job_id).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.workflow_status.completed_steps.len(), 5);
        assert_eq!(job.results.unwrap().articles_found, 0);
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_job() {
        let provider = ClaudeAgentProvider::new(&GeneratorSettings::default()).unwrap();
        let (orch, storage) = orchestrator(Arc::new(provider));
        let job_id = orch
            .start_custom(CustomConfig {
                topic: "Rust ownership".into(),
                user_prompt: None,
            })
            .await;

        let job = wait_terminal(&orch, &job_id).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.unwrap().contains(API_KEY_ENV));
        assert!(storage.list_posts(10).unwrap().is_empty());
    }

    /// 記事を保存した直後にジョブをキャンセルするストア
    struct CancellingStore {
        inner: Storage,
        registry: Arc<JobRegistry>,
        job_id: String,
    }

    impl BlogStore for CancellingStore {
        fn create_post(&self, post: &NewPost) -> Result<Post, AppError> {
            let saved = self.inner.create_post(post)?;
            tokio::task::block_in_place(|| {
                tokio::runtime::Handle::current().block_on(self.registry.cancel_job(&self.job_id))
            });
            Ok(saved)
        }
        fn get_tags(&self) -> Result<Vec<Tag>, AppError> {
            self.inner.get_tags()
        }
        fn create_tag(&self, tag: &NewTag) -> Result<Tag, AppError> {
            self.inner.create_tag(tag)
        }
        fn attach_tag(&self, post_id: &str, tag_id: &str) -> Result<(), AppError> {
            self.inner.attach_tag(post_id, tag_id)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_during_save_is_not_reported_as_completed() {
        let registry = Arc::new(JobRegistry::new());
        let config = GenerationConfig::Custom(CustomConfig {
            topic: "Rust ownership".into(),
            user_prompt: None,
        });
        let (job_id, _cancel_rx) = registry.create_job(config.clone()).await;
        registry.mark_active(&job_id).await;

        let store = Arc::new(CancellingStore {
            inner: Storage::open_in_memory().unwrap(),
            registry: registry.clone(),
            job_id: job_id.clone(),
        });
        let pipeline = Pipeline {
            job_id: job_id.clone(),
            config,
            registry: registry.clone(),
            store: store.clone(),
            provider: Arc::new(NoopAgentProvider),
            settings: Arc::new(GeneratorSettings::default()),
            secrets: Arc::new(HashMap::new()),
        };
        let outcome = WorkflowOutcome {
            outputs: vec![StepOutput {
                step_id: "finalize_content".into(),
                title: "仕上げと公開準備".into(),
                role: AgentRole::ContentEnhancement,
                output: r#"{"title": "Rust ownership", "content": "本文"}"#.into(),
            }],
        };

        // block_in_place はワーカースレッド上で呼ぶ必要がある
        let err = tokio::spawn(async move { pipeline.finish(&outcome).await })
            .await
            .unwrap()
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Cancelled);

        let saved = store.inner.list_posts(10).unwrap();
        assert_eq!(saved.len(), 1);
        assert!(err.message.contains(&saved[0].id));

        let job = registry.get_job(&job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert!(job.results.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_pipelines() {
        let (orch, _storage) = orchestrator(Arc::new(NoopAgentProvider));
        let job_id = orch.start_scheduled(ScheduledConfig::default()).await;

        orch.shutdown(false).await;
        assert!(orch.get_job(&job_id).await.unwrap().status.is_terminal());
    }
}
