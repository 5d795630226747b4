//! エージェント出力（テキスト）から構造化データを取り出す。

use serde::de::DeserializeOwned;

use crate::domain::content::{GeneratedContent, NewsDigest, ReviewOutcome};

/// 出力テキストから JSON オブジェクト部分を切り出す
///
/// コードフェンスや前後の説明文が付いていても、最初の `{` から最後の `}` までを返す。
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn parse<T: DeserializeOwned>(text: &str) -> Result<T, String> {
    let json = extract_json(text).ok_or_else(|| "JSON object not found".to_string())?;
    serde_json::from_str(json).map_err(|e| e.to_string())
}

/// 最終ステップの出力。解析できなければエラー。
pub fn parse_generated_content(text: &str) -> Result<GeneratedContent, String> {
    let content: GeneratedContent = parse(text)?;
    if content.title.trim().is_empty() || content.content.trim().is_empty() {
        return Err("title or content is empty".to_string());
    }
    Ok(content)
}

/// レビュー出力。解析できなければ非承認として扱う。
pub fn parse_review(text: &str) -> ReviewOutcome {
    parse(text).unwrap_or_else(|e| {
        log::warn!("レビュー出力を解析できません（非承認として扱う）: {e}");
        ReviewOutcome::default()
    })
}

/// ニュース調査出力。解析できなければ 0 件。
pub fn parse_news_digest(text: &str) -> NewsDigest {
    parse(text).unwrap_or_else(|e| {
        log::debug!("ニュース集計を解析できません: {e}");
        NewsDigest::default()
    })
}
