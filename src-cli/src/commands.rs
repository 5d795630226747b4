use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bg_core::domain::error::AppError;
use bg_core::domain::job::{CustomConfig, JobStatus, ScheduledConfig};
use bg_core::infra::agents::claude::API_KEY_ENV;
use bg_core::infra::agents::{AgentError, AgentProvider, ClaudeAgentProvider, NoopAgentProvider};
use bg_core::infra::storage::Storage;
use bg_core::usecase::orchestrator::BlogOrchestrator;

use crate::events;

/// コマンドエラー型
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    App(#[from] AppError),
    #[error("{0}")]
    Agent(#[from] AgentError),
    #[error("JSON 出力に失敗: {0}")]
    Json(#[from] serde_json::Error),
    #[error("データディレクトリを作成できません: {0}")]
    Io(#[from] std::io::Error),
    #[error("ジョブが見つかりません: {0}")]
    JobNotFound(String),
    #[error("ジョブが {status} で終了しました: {message}")]
    JobUnsuccessful { status: String, message: String },
}

pub type CliResult<T> = Result<T, CliError>;

pub enum JobRequest {
    Scheduled(ScheduledConfig),
    Custom(CustomConfig),
}

/// DB パス（未指定ならユーザーデータディレクトリに配置）
pub fn resolve_db_path(db: Option<PathBuf>) -> CliResult<PathBuf> {
    if let Some(path) = db {
        return Ok(path);
    }
    let dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("blog-gen");
    std::fs::create_dir_all(&dir)?;
    Ok(dir.join("blog-gen.db"))
}

pub fn open_storage(path: &Path) -> CliResult<Arc<Storage>> {
    log::debug!("DB: {}", path.display());
    let storage = Storage::open(&path.to_string_lossy())?;
    Ok(Arc::new(storage))
}

/// 設定を読み込み、エージェントプロバイダーを選んでオーケストレーターを組み立てる
pub fn build_orchestrator(storage: Arc<Storage>, offline: bool) -> CliResult<BlogOrchestrator> {
    let mut settings = storage.get_settings()?;
    if let Ok(key) = std::env::var(API_KEY_ENV) {
        if !key.trim().is_empty() {
            settings.anthropic_api_key = Some(key);
        }
    }

    let mut secrets = HashMap::new();
    if let Some(key) = &settings.anthropic_api_key {
        secrets.insert(API_KEY_ENV.to_string(), key.clone());
    }

    let provider: Arc<dyn AgentProvider> = if offline {
        log::info!("オフラインモード: Noop エージェントを使用");
        Arc::new(NoopAgentProvider)
    } else {
        log::info!("Claude エージェントを使用 (model={})", settings.model);
        Arc::new(ClaudeAgentProvider::new(&settings)?)
    };

    Ok(BlogOrchestrator::new(storage, provider, settings, secrets))
}

/// ジョブを1つ起動し、終了まで待って結果を JSON で出力する
pub async fn run_job(orch: &BlogOrchestrator, request: JobRequest) -> CliResult<()> {
    // 起動前に購読しておく
    let rx = orch.subscribe();
    let job_id = match request {
        JobRequest::Scheduled(config) => orch.start_scheduled(config).await,
        JobRequest::Custom(config) => orch.start_custom(config).await,
    };
    log::info!("ジョブ開始: {job_id}");

    let job = tokio::select! {
        job = events::wait_terminal(orch, rx, &job_id) => job?,
        _ = tokio::signal::ctrl_c() => {
            log::warn!("中断要求を受信、ジョブをキャンセルします: {job_id}");
            orch.cancel_job(&job_id).await;
            orch.get_job(&job_id)
                .await
                .ok_or_else(|| CliError::JobNotFound(job_id.clone()))?
        }
    };
    orch.shutdown(false).await;

    let stats = orch.get_stats().await;
    let report = serde_json::json!({ "job": job, "stats": stats });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if job.status == JobStatus::Completed {
        Ok(())
    } else {
        Err(CliError::JobUnsuccessful {
            status: job.status.as_str().to_string(),
            message: job.error.unwrap_or_default(),
        })
    }
}

pub fn list_posts(storage: &Storage, limit: u32) -> CliResult<()> {
    let posts = storage.list_posts(limit)?;
    println!("{}", serde_json::to_string_pretty(&posts)?);
    Ok(())
}
