//! 生成結果を記事・タグとしてストレージに保存する。

use chrono::{DateTime, Utc};

use crate::domain::content::{
    GeneratedContent, NewPost, NewTag, Post, PostMetadata, PostStatus, ReviewOutcome, Tag,
};
use crate::domain::error::AppError;
use crate::domain::settings::GeneratorSettings;
use crate::infra::storage::BlogStore;

/// 読了時間の算出に使う1分あたりの語数
pub const WORDS_PER_MINUTE: usize = 200;

/// URL に使えるスラッグを作る（タイムスタンプなし）
///
/// 小文字化し、ASCII 英数字・空白・`-` 以外を除去、空白を `-` に置換、
/// 連続する `-` をまとめ、前後の `-` を落とす。
pub fn slugify(title: &str) -> String {
    let base = slug_base(title, |c| c.is_ascii_alphanumeric());
    if base.is_empty() {
        "post".to_string()
    } else {
        base
    }
}

/// タグ用スラッグ。日本語などの英数字も残す。
///
/// 何も残らない名前（記号のみなど）は衝突しないよう `tag-` + ランダム ID にする。
pub fn tag_slug(name: &str) -> String {
    let base = slug_base(name, char::is_alphanumeric);
    if base.is_empty() {
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!("tag-{}", &id[..8])
    } else {
        base
    }
}

fn slug_base(text: &str, keep: impl Fn(char) -> bool) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut prev_hyphen = false;

    for ch in text.to_lowercase().chars() {
        if keep(ch) {
            slug.push(ch);
            prev_hyphen = false;
        } else if ch.is_whitespace() || ch == '-' {
            if !prev_hyphen {
                slug.push('-');
            }
            prev_hyphen = true;
        }
    }

    slug.trim_matches('-').to_string()
}

/// 記事用スラッグ（末尾にミリ秒タイムスタンプを付与）
pub fn post_slug(title: &str, now: DateTime<Utc>) -> String {
    format!("{}-{}", slugify(title), now.timestamp_millis())
}

/// 読了時間（分）。切り上げ、最小1分。
pub fn read_time_minutes(content: &str) -> u32 {
    let words = content.split_whitespace().count();
    words.div_ceil(WORDS_PER_MINUTE).max(1) as u32
}

pub fn publication_status(review: &ReviewOutcome) -> PostStatus {
    if review.approved {
        PostStatus::Published
    } else {
        PostStatus::Draft
    }
}

/// 生成記事を保存し、タグを付ける
///
/// 記事の保存に失敗した場合はエラー。タグの作成・関連付けの失敗はログに残して続行する。
pub fn save_generated_post(
    store: &dyn BlogStore,
    content: &GeneratedContent,
    review: &ReviewOutcome,
    settings: &GeneratorSettings,
) -> Result<Post, AppError> {
    let now = Utc::now();
    let status = publication_status(review);

    let new_post = NewPost {
        title: content.title.clone(),
        slug: post_slug(&content.title, now),
        content: content.content.clone(),
        excerpt: content.excerpt.clone(),
        status,
        read_time: read_time_minutes(&content.content),
        author_id: settings.system_author_id.clone(),
        category_id: settings.default_category_id.clone(),
        metadata: PostMetadata {
            sources: content.sources.clone(),
            generated_at: now.to_rfc3339(),
            ai_generated: true,
            generator: settings.generator_name.clone(),
            review: review.summary(),
        },
        published_at: (status == PostStatus::Published).then_some(now),
    };

    let post = store
        .create_post(&new_post)
        .map_err(|e| AppError::storage(format!("生成記事の保存に失敗しました: {}", e.message)))?;

    log::info!(
        "生成記事を保存: {} (slug={}, status={})",
        post.id,
        post.slug,
        post.status.as_str()
    );

    if !content.tags.is_empty() {
        attach_tags(store, &post.id, &content.tags);
    }

    Ok(post)
}

fn attach_tags(store: &dyn BlogStore, post_id: &str, names: &[String]) {
    let mut known: Vec<Tag> = match store.get_tags() {
        Ok(tags) => tags,
        Err(e) => {
            log::warn!("タグ一覧の取得に失敗: {e}");
            Vec::new()
        }
    };

    for name in names {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }

        let lowered = name.to_lowercase();
        let existing = known.iter().find(|t| t.name.to_lowercase() == lowered).cloned();

        let tag = match existing {
            Some(tag) => tag,
            None => {
                let new_tag = NewTag {
                    name: name.to_string(),
                    slug: tag_slug(name),
                };
                match store.create_tag(&new_tag) {
                    Ok(tag) => {
                        known.push(tag.clone());
                        tag
                    }
                    Err(e) => {
                        log::warn!("タグ作成に失敗 [{name}]: {e}");
                        continue;
                    }
                }
            }
        };

        if let Err(e) = store.attach_tag(post_id, &tag.id) {
            log::warn!("タグ関連付けに失敗 [{name}]: {e}");
        }
    }
}
