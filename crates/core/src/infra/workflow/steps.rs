use super::Step;
use crate::domain::job::{CustomConfig, GenerationConfig, ScheduledConfig};
use crate::infra::agents::AgentRole;

const DEFAULT_FOCUS: &str = "ソフトウェア開発の最新動向";

fn step(id: &str, title: &str, role: AgentRole, description: String, expected: &str) -> Step {
    Step {
        id: id.to_string(),
        title: title.to_string(),
        description,
        expected_output: expected.to_string(),
        role,
    }
}

/// 定期生成パイプライン（5ステップ）
pub fn scheduled_steps(config: &ScheduledConfig) -> Vec<Step> {
    let focus = config.focus_topic.as_deref().unwrap_or(DEFAULT_FOCUS);

    vec![
        step(
            "research_knowledge",
            "最新知見の調査",
            AgentRole::KnowledgeResearch,
            format!("「{focus}」に関する最新の知見・重要な概念を調査する。"),
            "出典付きの調査メモ（マークダウン箇条書き）",
        ),
        step(
            "fetch_news",
            "ニュース収集と関連度フィルタ",
            AgentRole::NewsResearch,
            format!(
                "過去 {} 時間のニュースを収集し、「{focus}」との関連度が {:.2} 以上の記事を最大 {} 件まで選別して分析する。",
                config.lookback_hours, config.relevance_threshold, config.max_articles
            ),
            "articlesFound / articlesAnalyzed / articles を含む JSON",
        ),
        step(
            "generate_content",
            "下書き生成",
            AgentRole::ContentGeneration,
            "選別したニュースと調査メモを元に技術ブログ記事の下書きを書く。".to_string(),
            "マークダウン形式の記事下書き",
        ),
        step(
            "review_content",
            "品質レビュー",
            AgentRole::ContentReview,
            "下書きを正確性・読みやすさ・編集方針の観点でレビューし、公開可否を判定する。"
                .to_string(),
            "approved / qualityScore / issues を含む JSON",
        ),
        step(
            "finalize_content",
            "仕上げと公開準備",
            AgentRole::ContentEnhancement,
            "レビュー指摘を反映して最終稿を作成し、タグと要約を付ける。".to_string(),
            "title / content / excerpt / tags / sources を含む JSON",
        ),
    ]
}

/// トピック指定パイプライン（4ステップ）
pub fn custom_steps(config: &CustomConfig) -> Vec<Step> {
    let topic = config.topic.as_str();
    let generate = match config.user_prompt.as_deref().filter(|p| !p.trim().is_empty()) {
        Some(prompt) => format!(
            "調査メモを元に「{topic}」の技術ブログ記事の下書きを書く。次の要望に従うこと: {prompt}"
        ),
        None => format!("調査メモを元に「{topic}」の技術ブログ記事の下書きを書く。"),
    };

    vec![
        step(
            "research_knowledge",
            "トピック調査",
            AgentRole::KnowledgeResearch,
            format!("「{topic}」について、最新の知見・重要な概念・よくある誤解を調査する。"),
            "出典付きの調査メモ（マークダウン箇条書き）",
        ),
        step(
            "generate_content",
            "下書き生成",
            AgentRole::ContentGeneration,
            generate,
            "マークダウン形式の記事下書き",
        ),
        step(
            "review_content",
            "品質レビュー",
            AgentRole::ContentReview,
            "下書きを正確性・読みやすさ・編集方針の観点でレビューし、公開可否を判定する。"
                .to_string(),
            "approved / qualityScore / issues を含む JSON",
        ),
        step(
            "finalize_content",
            "仕上げと公開準備",
            AgentRole::ContentEnhancement,
            "レビュー指摘を反映して最終稿を作成し、タグと要約を付ける。".to_string(),
            "title / content / excerpt / tags / sources を含む JSON",
        ),
    ]
}

pub fn steps_for(config: &GenerationConfig) -> Vec<Step> {
    match config {
        GenerationConfig::Scheduled(c) => scheduled_steps(c),
        GenerationConfig::Custom(c) => custom_steps(c),
    }
}

/// ワークフローへの入力（ジョブ設定をそのまま渡す）
pub fn workflow_inputs(config: &GenerationConfig) -> serde_json::Map<String, serde_json::Value> {
    match serde_json::to_value(config) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    }
}
