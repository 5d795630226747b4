//! 役割別システムプロンプトテンプレート

use super::{AgentRole, AgentTask};

/// Knowledge Research: トピックの最新知見を調査
pub const SYSTEM_KNOWLEDGE: &str = "\
あなたは技術ブログのリサーチャーです。
与えられたトピックについて、以下のルールに従って調査メモを作成してください：
- 最新の動向・重要な概念・よくある誤解を整理
- 出典があれば URL を併記
- 推測と事実を区別する
- 箇条書き（マークダウン）でまとめる";

/// News Research: ニュース収集と関連度フィルタ
pub const SYSTEM_NEWS: &str = "\
あなたは技術ニュースのキュレーターです。
指定された期間と関連度しきい値に従ってニュース記事を選別してください。
出力は次の JSON のみとします：
{\"articlesFound\": <見つけた件数>, \"articlesAnalyzed\": <分析した件数>, \"articles\": [{\"title\": \"...\", \"url\": \"...\", \"summary\": \"...\", \"relevance\": 0.0}]}";

/// Content Generation: 下書き生成
pub const SYSTEM_CONTENT: &str = "\
あなたは技術ブログのライターです。
調査メモやニュースを元に、読者が実際に手を動かせるブログ記事の下書きを書いてください：
- マークダウン形式
- 見出しで構成を明確に
- コードはコードブロック（```）で囲む
- 出典は本文末尾にまとめる";

/// Content Review: 品質・編集方針のレビュー
pub const SYSTEM_REVIEW: &str = "\
あなたは技術ブログの編集者です。
下書きを正確性・読みやすさ・編集方針の観点でレビューしてください。
出力は次の JSON のみとします：
{\"approved\": true|false, \"qualityScore\": <0〜10>, \"issues\": [{\"severity\": \"low|medium|high|critical\", \"message\": \"...\"}]}";

/// Content Enhancement: 最終稿の仕上げ
pub const SYSTEM_ENHANCEMENT: &str = "\
あなたは技術ブログの仕上げ担当です。
レビュー指摘を反映して最終稿を作成してください。
出力は次の JSON のみとします：
{\"title\": \"...\", \"content\": \"<マークダウン本文>\", \"excerpt\": \"<160字以内の要約>\", \"tags\": [\"...\"], \"sources\": [\"<URL>\"]}";

/// 役割に対応するシステムプロンプトを取得する
pub fn system_prompt_for_role(role: AgentRole) -> &'static str {
    match role {
        AgentRole::KnowledgeResearch => SYSTEM_KNOWLEDGE,
        AgentRole::NewsResearch => SYSTEM_NEWS,
        AgentRole::ContentGeneration => SYSTEM_CONTENT,
        AgentRole::ContentReview => SYSTEM_REVIEW,
        AgentRole::ContentEnhancement => SYSTEM_ENHANCEMENT,
    }
}

/// タスク内容と先行ステップの出力を含むユーザープロンプトを構築する
pub fn build_task_prompt(task: &AgentTask) -> String {
    let mut user_msg = String::new();

    user_msg.push_str("【タスク】");
    user_msg.push_str(&task.title);
    user_msg.push('\n');
    user_msg.push_str(&task.description);
    user_msg.push_str("\n\n【期待する出力】\n");
    user_msg.push_str(&task.expected_output);
    user_msg.push('\n');

    if !task.inputs.is_empty() {
        user_msg.push_str("\n【入力】\n");
        for (key, value) in &task.inputs {
            user_msg.push_str("- ");
            user_msg.push_str(key);
            user_msg.push_str(": ");
            match value {
                serde_json::Value::String(s) => user_msg.push_str(s),
                other => user_msg.push_str(&other.to_string()),
            }
            user_msg.push('\n');
        }
    }

    for (title, output) in &task.context {
        user_msg.push_str("\n【前ステップ: ");
        user_msg.push_str(title);
        user_msg.push_str("】\n");
        user_msg.push_str(output);
        user_msg.push('\n');
    }

    user_msg
}
