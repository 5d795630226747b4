//! オーケストレーター統合テスト。
//!
//! 役割ごとに台本どおりに応答するエージェントと in-memory SQLite で、
//! ジョブの起動から記事保存までを通しで確認する。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use bg_core::domain::content::PostStatus;
use bg_core::domain::job::{CustomConfig, GenerationJob, JobStatus, ScheduledConfig};
use bg_core::domain::settings::GeneratorSettings;
use bg_core::infra::agents::{Agent, AgentError, AgentProvider, AgentRole, AgentTask};
use bg_core::infra::storage::Storage;
use bg_core::usecase::orchestrator::BlogOrchestrator;

#[derive(Clone)]
enum Script {
    Reply(String),
    Fail(String),
    /// 停止されるまで応答しない
    Hang,
}

struct ScriptedAgent {
    role: AgentRole,
    script: Script,
}

#[async_trait]
impl Agent for ScriptedAgent {
    async fn perform(&self, _task: &AgentTask) -> Result<String, AgentError> {
        match &self.script {
            Script::Reply(text) => Ok(text.clone()),
            Script::Fail(msg) => Err(AgentError::Failed(msg.clone())),
            Script::Hang => std::future::pending().await,
        }
    }

    fn role(&self) -> AgentRole {
        self.role
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct ScriptedProvider {
    scripts: HashMap<AgentRole, Script>,
}

impl ScriptedProvider {
    /// 全役割が成功する台本（レビューは approved で指定）
    fn happy(approved: bool) -> Self {
        let scripts = HashMap::from([
            (
                AgentRole::KnowledgeResearch,
                Script::Reply("- 所有権は値ごとに1つ".into()),
            ),
            (
                AgentRole::NewsResearch,
                Script::Reply(
                    r#"```json
{"articlesFound": 12, "articlesAnalyzed": 5, "articles": []}
```"#
                        .into(),
                ),
            ),
            (
                AgentRole::ContentGeneration,
                Script::Reply("# Rust ownership\n\n下書き".into()),
            ),
            (
                AgentRole::ContentReview,
                Script::Reply(format!(
                    r#"{{"approved": {approved}, "qualityScore": 7.5, "issues": [{{"severity": "low", "message": "typo"}}]}}"#
                )),
            ),
            (
                AgentRole::ContentEnhancement,
                Script::Reply(
                    serde_json::json!({
                        "title": "Rust ownership",
                        "content": "word ".repeat(450),
                        "excerpt": "所有権の基本",
                        "tags": ["Rust", "AI"],
                        "sources": ["https://doc.rust-lang.org/book/"],
                    })
                    .to_string(),
                ),
            ),
        ]);
        Self { scripts }
    }

    fn with(mut self, role: AgentRole, script: Script) -> Self {
        self.scripts.insert(role, script);
        self
    }
}

impl AgentProvider for ScriptedProvider {
    fn agent_for(
        &self,
        role: AgentRole,
        _env: &HashMap<String, String>,
    ) -> Result<Arc<dyn Agent>, AgentError> {
        let script = self
            .scripts
            .get(&role)
            .cloned()
            .ok_or_else(|| AgentError::NotAvailable(role.as_str().to_string()))?;
        Ok(Arc::new(ScriptedAgent { role, script }))
    }
}

fn setup(provider: ScriptedProvider) -> (BlogOrchestrator, Arc<Storage>) {
    let storage = Arc::new(Storage::open_in_memory().unwrap());
    let orch = BlogOrchestrator::new(
        storage.clone(),
        Arc::new(provider),
        GeneratorSettings::default(),
        HashMap::new(),
    );
    (orch, storage)
}

fn rust_ownership() -> CustomConfig {
    CustomConfig {
        topic: "Rust ownership".into(),
        user_prompt: None,
    }
}

async fn wait_for(
    orch: &BlogOrchestrator,
    job_id: &str,
    done: impl Fn(&GenerationJob) -> bool,
) -> GenerationJob {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let job = orch.get_job(job_id).await.unwrap();
            if done(&job) {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap()
}

async fn wait_terminal(orch: &BlogOrchestrator, job_id: &str) -> GenerationJob {
    wait_for(orch, job_id, |job| job.status.is_terminal()).await
}

#[tokio::test]
async fn custom_job_with_rejected_review_saves_draft() {
    let (orch, storage) = setup(ScriptedProvider::happy(false));
    let job_id = orch.start_custom(rust_ownership()).await;

    let job = wait_terminal(&orch, &job_id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
    assert!(job.error.is_none());
    assert!(job.completed_at.is_some());
    assert_eq!(
        job.workflow_status.completed_steps,
        vec!["トピック調査", "下書き生成", "品質レビュー", "仕上げと公開準備"]
    );

    let results = job.results.unwrap();
    assert_eq!(results.post_ids.len(), 1);
    assert_eq!(results.reviews.len(), 1);
    assert!(!results.reviews[0].approved);
    assert_eq!(results.reviews[0].issue_counts.low, 1);
    // custom パイプラインはニュース調査を行わない
    assert_eq!(results.articles_found, 0);

    let post = storage.get_post(&results.post_ids[0]).unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Draft);
    assert!(post.published_at.is_none());
    assert_eq!(post.read_time, 3);
    assert!(post.slug.starts_with("rust-ownership-"));
    assert!(post.metadata.ai_generated);

    let tags: Vec<String> = storage
        .tags_for_post(&post.id)
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(tags.len(), 2);
    assert!(tags.contains(&"Rust".to_string()));
    assert!(tags.contains(&"AI".to_string()));
}

#[tokio::test]
async fn scheduled_job_with_approved_review_publishes() {
    let (orch, storage) = setup(ScriptedProvider::happy(true));
    let job_id = orch
        .start_scheduled(ScheduledConfig {
            focus_topic: Some("Rust".into()),
            ..Default::default()
        })
        .await;

    let job = wait_terminal(&orch, &job_id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.workflow_status.completed_steps.len(), 5);

    let results = job.results.unwrap();
    assert_eq!(results.articles_found, 12);
    assert_eq!(results.articles_analyzed, 5);

    let post = storage.get_post(&results.post_ids[0]).unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Published);
    assert!(post.published_at.is_some());

    let stats = orch.get_stats().await;
    assert_eq!(stats.total_jobs, 1);
    assert_eq!(stats.completed_jobs, 1);
    assert!((stats.average_articles_per_job - 12.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn start_returns_before_job_finishes() {
    let provider =
        ScriptedProvider::happy(true).with(AgentRole::KnowledgeResearch, Script::Hang);
    let (orch, _storage) = setup(provider);

    let job_id = orch.start_custom(rust_ownership()).await;
    let job = orch.get_job(&job_id).await.unwrap();
    assert!(matches!(job.status, JobStatus::Pending | JobStatus::Active));
    assert!(job.completed_at.is_none());

    orch.cancel_job(&job_id).await;
    orch.shutdown(false).await;
}

#[tokio::test]
async fn cancel_running_job() {
    let provider =
        ScriptedProvider::happy(true).with(AgentRole::ContentGeneration, Script::Hang);
    let (orch, storage) = setup(provider);
    let mut events = orch.subscribe();

    let job_id = orch.start_custom(rust_ownership()).await;
    wait_for(&orch, &job_id, |job| job.status == JobStatus::Active).await;

    assert!(orch.cancel_job(&job_id).await);

    let job = orch.get_job(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert_eq!(job.progress, 0);
    assert!(!job.error.unwrap_or_default().is_empty());
    assert!(job.completed_at.is_some());

    // タスクはキャンセルを受けて終了する
    tokio::time::timeout(Duration::from_secs(5), orch.shutdown(false))
        .await
        .unwrap();
    assert!(storage.list_posts(10).unwrap().is_empty());

    // 2回目は終端状態なので false
    let before = orch.get_job(&job_id).await.unwrap();
    assert!(!orch.cancel_job(&job_id).await);
    assert_eq!(orch.get_job(&job_id).await.unwrap(), before);

    let first = events.recv().await.unwrap();
    assert_eq!(first.new_status, JobStatus::Active);
    let second = events.recv().await.unwrap();
    assert_eq!(second.prev_status, JobStatus::Active);
    assert_eq!(second.new_status, JobStatus::Cancelled);
}

#[tokio::test]
async fn cancel_unknown_job_returns_false() {
    let (orch, _storage) = setup(ScriptedProvider::happy(true));
    assert!(!orch.cancel_job("no-such-job").await);
}

#[tokio::test]
async fn failing_step_marks_job_failed() {
    let provider = ScriptedProvider::happy(true).with(
        AgentRole::ContentReview,
        Script::Fail("rate limited".into()),
    );
    let (orch, storage) = setup(provider);

    let job_id = orch.start_custom(rust_ownership()).await;
    let job = wait_terminal(&orch, &job_id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("rate limited"));
    assert_eq!(job.workflow_status.failed_steps, vec!["品質レビュー"]);
    assert!(job.results.is_none());
    assert!(storage.list_posts(10).unwrap().is_empty());

    let stats = orch.get_stats().await;
    assert_eq!(stats.failed_jobs, 1);
    assert_eq!(stats.average_generation_time, 0.0);
}

#[tokio::test]
async fn unparseable_final_output_fails_job() {
    let provider = ScriptedProvider::happy(true).with(
        AgentRole::ContentEnhancement,
        Script::Reply("最終稿をうまく作れませんでした".into()),
    );
    let (orch, storage) = setup(provider);

    let job_id = orch.start_custom(rust_ownership()).await;
    let job = wait_terminal(&orch, &job_id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(!job.error.unwrap().is_empty());
    assert!(storage.list_posts(10).unwrap().is_empty());
}

#[tokio::test]
async fn missing_agent_fails_job() {
    let mut provider = ScriptedProvider::happy(true);
    provider.scripts.remove(&AgentRole::ContentReview);
    let (orch, _storage) = setup(provider);

    let job_id = orch.start_custom(rust_ownership()).await;
    let job = wait_terminal(&orch, &job_id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("content_review"));
}

#[tokio::test]
async fn list_jobs_newest_first() {
    let provider =
        ScriptedProvider::happy(true).with(AgentRole::KnowledgeResearch, Script::Hang);
    let (orch, _storage) = setup(provider);

    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(orch.start_custom(rust_ownership()).await);
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let listed: Vec<String> = orch.list_jobs().await.into_iter().map(|j| j.id).collect();
    ids.reverse();
    assert_eq!(listed, ids);

    orch.shutdown(true).await;
}

#[tokio::test]
async fn stats_without_completed_jobs() {
    let (orch, _storage) = setup(ScriptedProvider::happy(true));
    let stats = orch.get_stats().await;
    assert_eq!(stats.total_jobs, 0);
    assert_eq!(stats.completed_jobs, 0);
    assert_eq!(stats.average_articles_per_job, 0.0);
    assert_eq!(stats.average_generation_time, 0.0);
}
