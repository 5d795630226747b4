use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// パイプライン最終ステップが出力する記事
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub sources: Vec<String>,
}

/// レビュー指摘の重要度
///
/// 想定外の値（"minor" など）や欠落は Unknown として読み、low として数える。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Low,
    Medium,
    High,
    Critical,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewIssue {
    #[serde(default)]
    pub severity: IssueSeverity,
    #[serde(default)]
    pub message: String,
}

/// レビューステップの判定
///
/// LLM の出力から読むため、欠けたフィールドは非承認側に倒す。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewOutcome {
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub quality_score: f32,
    #[serde(default)]
    pub issues: Vec<ReviewIssue>,
}

impl ReviewOutcome {
    pub fn summary(&self) -> ReviewSummary {
        let mut counts = IssueCounts::default();
        for issue in &self.issues {
            match issue.severity {
                IssueSeverity::Low | IssueSeverity::Unknown => counts.low += 1,
                IssueSeverity::Medium => counts.medium += 1,
                IssueSeverity::High => counts.high += 1,
                IssueSeverity::Critical => counts.critical += 1,
            }
        }
        ReviewSummary {
            approved: self.approved,
            quality_score: self.quality_score,
            issue_counts: counts,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCounts {
    pub low: u32,
    pub medium: u32,
    pub high: u32,
    pub critical: u32,
}

/// レビュー判定の要約（記事メタデータ・ジョブ結果に保存）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub approved: bool,
    pub quality_score: f32,
    pub issue_counts: IssueCounts,
}

/// ニュース調査ステップの集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsDigest {
    #[serde(default)]
    pub articles_found: u32,
    #[serde(default)]
    pub articles_analyzed: u32,
}

/// 記事の公開状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    Published,
}

impl PostStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }
}

/// 生成記事の出自メタデータ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMetadata {
    pub sources: Vec<String>,
    pub generated_at: String,
    pub ai_generated: bool,
    pub generator: String,
    pub review: ReviewSummary,
}

/// 記事の挿入用フィールド
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub status: PostStatus,
    pub read_time: u32,
    pub author_id: String,
    pub category_id: String,
    pub metadata: PostMetadata,
    pub published_at: Option<DateTime<Utc>>,
}

/// 保存済み記事
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub status: PostStatus,
    pub read_time: u32,
    pub author_id: String,
    pub category_id: String,
    pub metadata: PostMetadata,
    pub published_at: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTag {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub slug: String,
}
