use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::content::ReviewSummary;

/// ジョブ状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Active,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Active => 1,
            Self::Completed | Self::Failed | Self::Cancelled => 2,
        }
    }

    /// pending → active → 終端状態 の前進のみ許可（飛び越しは可）
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

/// 定期生成の設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledConfig {
    /// ニュース取得の遡り時間
    pub lookback_hours: u32,
    /// 関連度しきい値 (0.0–1.0)
    pub relevance_threshold: f32,
    /// 分析対象とする最大記事数
    pub max_articles: u32,
    pub focus_topic: Option<String>,
}

impl Default for ScheduledConfig {
    fn default() -> Self {
        Self {
            lookback_hours: 24,
            relevance_threshold: 0.7,
            max_articles: 10,
            focus_topic: None,
        }
    }
}

/// トピック指定生成の設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomConfig {
    pub topic: String,
    pub user_prompt: Option<String>,
}

/// ジョブ種別ごとの生成設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationConfig {
    Scheduled(ScheduledConfig),
    Custom(CustomConfig),
}

/// ワークフロー進行状況（参考値。実際のステップ状態とは一致しない）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    pub current_step: Option<String>,
    pub active_steps: Vec<String>,
    pub completed_steps: Vec<String>,
    pub failed_steps: Vec<String>,
}

impl WorkflowStatus {
    pub const IN_PROGRESS: &'static str = "in_progress";

    /// モニターが書き込む汎用の「処理中」マーカー
    pub fn in_progress() -> Self {
        Self {
            current_step: Some(Self::IN_PROGRESS.to_string()),
            ..Default::default()
        }
    }
}

/// 生成結果サマリー
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResults {
    pub articles_found: u32,
    pub articles_analyzed: u32,
    pub post_generated: bool,
    pub post_ids: Vec<String>,
    pub reviews: Vec<ReviewSummary>,
}

/// 生成ジョブ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationJob {
    pub id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub config: GenerationConfig,
    pub workflow_status: WorkflowStatus,
    pub results: Option<JobResults>,
}

impl GenerationJob {
    pub fn new(id: String, config: GenerationConfig, now: DateTime<Utc>) -> Self {
        Self {
            id,
            status: JobStatus::Pending,
            progress: 0,
            started_at: now,
            completed_at: None,
            error: None,
            config,
            workflow_status: WorkflowStatus::default(),
            results: None,
        }
    }

    /// 部分更新をマージする。終端状態のジョブと後退する状態遷移は無視。
    /// 状態が変わった場合は遷移前の状態を返す。
    pub fn apply(&mut self, update: JobUpdate) -> Option<JobStatus> {
        if self.status.is_terminal() {
            return None;
        }

        let mut prev = None;
        if let Some(next) = update.status {
            if self.status.can_transition_to(next) {
                prev = Some(self.status);
                self.status = next;
            } else if next != self.status {
                log::debug!(
                    "不正な状態遷移を無視: {} -> {} (job {})",
                    self.status.as_str(),
                    next.as_str(),
                    self.id
                );
            }
        }

        if let Some(progress) = update.progress {
            self.progress = progress.min(100);
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
        if let Some(ws) = update.workflow_status {
            self.workflow_status = ws;
        }
        if let Some(results) = update.results {
            self.results = Some(results);
        }
        if self.status.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(update.completed_at.unwrap_or_else(Utc::now));
        }

        prev
    }

    /// 生成にかかった秒数（完了済みのみ）
    pub fn generation_secs(&self) -> Option<f64> {
        self.completed_at
            .map(|done| (done - self.started_at).num_milliseconds() as f64 / 1000.0)
    }
}

/// ジョブの部分更新
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub workflow_status: Option<WorkflowStatus>,
    pub results: Option<JobResults>,
}

impl JobUpdate {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// ジョブ状態変化イベント
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub job_id: String,
    pub prev_status: JobStatus,
    pub new_status: JobStatus,
    pub timestamp: String,
}

/// ダッシュボード向け集計
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStats {
    pub total_jobs: usize,
    pub completed_jobs: usize,
    pub failed_jobs: usize,
    pub average_articles_per_job: f64,
    /// 秒
    pub average_generation_time: f64,
    pub active_jobs: usize,
}

impl GenerationStats {
    pub fn from_jobs<'a>(jobs: impl IntoIterator<Item = &'a GenerationJob>) -> Self {
        let mut total = 0;
        let mut failed = 0;
        let mut active = 0;
        let mut completed = 0;
        let mut articles = 0u64;
        let mut secs = 0.0;

        for job in jobs {
            total += 1;
            match job.status {
                JobStatus::Completed => {
                    completed += 1;
                    articles += job
                        .results
                        .as_ref()
                        .map(|r| r.articles_found as u64)
                        .unwrap_or(0);
                    secs += job.generation_secs().unwrap_or(0.0);
                }
                JobStatus::Failed => failed += 1,
                JobStatus::Active => active += 1,
                JobStatus::Pending | JobStatus::Cancelled => {}
            }
        }

        let (average_articles_per_job, average_generation_time) = if completed == 0 {
            (0.0, 0.0)
        } else {
            (articles as f64 / completed as f64, secs / completed as f64)
        };

        Self {
            total_jobs: total,
            completed_jobs: completed,
            failed_jobs: failed,
            average_articles_per_job,
            average_generation_time,
            active_jobs: active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn custom() -> GenerationConfig {
        GenerationConfig::Custom(CustomConfig {
            topic: "Rust ownership".into(),
            user_prompt: None,
        })
    }

    #[test]
    fn test_forward_transitions() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Active));
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Failed));
        assert!(JobStatus::Active.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Active.can_transition_to(JobStatus::Pending));
        assert!(!JobStatus::Active.can_transition_to(JobStatus::Active));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Cancelled.can_transition_to(JobStatus::Active));
    }

    #[test]
    fn test_apply_sets_completed_at_on_terminal() {
        let mut job = GenerationJob::new("j1".into(), custom(), Utc::now());
        assert_eq!(job.apply(JobUpdate::status(JobStatus::Active)), Some(JobStatus::Pending));
        assert!(job.completed_at.is_none());

        job.apply(JobUpdate::failed("boom"));
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("boom"));
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_apply_is_noop_after_terminal() {
        let mut job = GenerationJob::new("j1".into(), custom(), Utc::now());
        job.apply(JobUpdate::status(JobStatus::Completed));
        let before = job.clone();

        let prev = job.apply(JobUpdate {
            status: Some(JobStatus::Active),
            progress: Some(42),
            error: Some("late".into()),
            ..Default::default()
        });
        assert!(prev.is_none());
        assert_eq!(job, before);
    }

    #[test]
    fn test_apply_ignores_backward_status_but_merges_fields() {
        let mut job = GenerationJob::new("j1".into(), custom(), Utc::now());
        job.apply(JobUpdate::status(JobStatus::Active));
        let prev = job.apply(JobUpdate {
            status: Some(JobStatus::Pending),
            progress: Some(50),
            ..Default::default()
        });
        assert!(prev.is_none());
        assert_eq!(job.status, JobStatus::Active);
        assert_eq!(job.progress, 50);
    }

    #[test]
    fn test_stats_without_completed_jobs() {
        let jobs = vec![
            GenerationJob::new("a".into(), custom(), Utc::now()),
            GenerationJob::new("b".into(), custom(), Utc::now()),
        ];
        let stats = GenerationStats::from_jobs(&jobs);
        assert_eq!(stats.total_jobs, 2);
        assert_eq!(stats.completed_jobs, 0);
        assert_eq!(stats.average_articles_per_job, 0.0);
        assert_eq!(stats.average_generation_time, 0.0);
    }

    #[test]
    fn test_stats_averages() {
        let start = Utc::now();
        let mut a = GenerationJob::new("a".into(), custom(), start);
        a.apply(JobUpdate {
            status: Some(JobStatus::Completed),
            completed_at: Some(start + Duration::seconds(10)),
            results: Some(JobResults {
                articles_found: 4,
                ..Default::default()
            }),
            ..Default::default()
        });
        let mut b = GenerationJob::new("b".into(), custom(), start);
        b.apply(JobUpdate {
            status: Some(JobStatus::Completed),
            completed_at: Some(start + Duration::seconds(30)),
            results: Some(JobResults {
                articles_found: 8,
                ..Default::default()
            }),
            ..Default::default()
        });
        let mut c = GenerationJob::new("c".into(), custom(), start);
        c.apply(JobUpdate::failed("x"));
        let mut d = GenerationJob::new("d".into(), custom(), start);
        d.apply(JobUpdate::status(JobStatus::Active));

        let stats = GenerationStats::from_jobs([&a, &b, &c, &d]);
        assert_eq!(stats.total_jobs, 4);
        assert_eq!(stats.completed_jobs, 2);
        assert_eq!(stats.failed_jobs, 1);
        assert_eq!(stats.active_jobs, 1);
        assert!((stats.average_articles_per_job - 6.0).abs() < f64::EPSILON);
        assert!((stats.average_generation_time - 20.0).abs() < f64::EPSILON);
    }
}
