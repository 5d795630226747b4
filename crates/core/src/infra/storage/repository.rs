use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use super::BlogStore;
use crate::domain::content::{NewPost, NewTag, Post, PostMetadata, PostStatus, Tag};
use crate::domain::error::AppError;
use crate::domain::settings::GeneratorSettings;

/// SQLiteストレージ（posts + tags + settings）
pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    /// 新規接続（ファイルパス指定）
    pub fn open(path: &str) -> Result<Self, AppError> {
        let conn = Connection::open(path)
            .map_err(|e| AppError::storage(format!("DB接続に失敗: {e}")))?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.migrate()?;
        Ok(storage)
    }

    /// in-memory DB（テスト用）
    pub fn open_in_memory() -> Result<Self, AppError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::storage(format!("in-memory DB作成に失敗: {e}")))?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.migrate()?;
        Ok(storage)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.conn
            .lock()
            .map_err(|_| AppError::storage("DB接続のロックが破損しています"))
    }

    /// スキーママイグレーション
    fn migrate(&self) -> Result<(), AppError> {
        self.conn()?
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS posts (
                    id           TEXT PRIMARY KEY,
                    title        TEXT NOT NULL,
                    slug         TEXT NOT NULL UNIQUE,
                    content      TEXT NOT NULL,
                    excerpt      TEXT NOT NULL DEFAULT '',
                    status       TEXT NOT NULL DEFAULT 'draft',
                    read_time    INTEGER NOT NULL DEFAULT 1,
                    author_id    TEXT NOT NULL,
                    category_id  TEXT NOT NULL,
                    metadata     TEXT NOT NULL,
                    published_at TEXT,
                    created_at   TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_posts_created
                    ON posts(created_at DESC);

                CREATE TABLE IF NOT EXISTS tags (
                    id         TEXT PRIMARY KEY,
                    name       TEXT NOT NULL,
                    slug       TEXT NOT NULL UNIQUE,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS post_tags (
                    post_id TEXT NOT NULL,
                    tag_id  TEXT NOT NULL,
                    PRIMARY KEY (post_id, tag_id),
                    FOREIGN KEY (post_id) REFERENCES posts(id),
                    FOREIGN KEY (tag_id) REFERENCES tags(id)
                );

                CREATE TABLE IF NOT EXISTS settings (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );
                ",
            )
            .map_err(|e| AppError::storage(format!("マイグレーション失敗: {e}")))?;
        Ok(())
    }

    // --- Posts ---

    pub fn get_post(&self, post_id: &str) -> Result<Option<Post>, AppError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"))
            .map_err(|e| AppError::storage(format!("クエリ準備失敗: {e}")))?;

        stmt.query_row(params![post_id], map_post_row)
            .optional()
            .map_err(|e| AppError::storage(format!("記事読み取り失敗: {e}")))
    }

    /// 新しい順に記事を返す
    pub fn list_posts(&self, limit: u32) -> Result<Vec<Post>, AppError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC LIMIT ?1"
            ))
            .map_err(|e| AppError::storage(format!("クエリ準備失敗: {e}")))?;

        let posts = stmt
            .query_map(params![limit], map_post_row)
            .map_err(|e| AppError::storage(format!("クエリ実行失敗: {e}")))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::storage(format!("行読み取り失敗: {e}")))?;

        Ok(posts)
    }

    pub fn tags_for_post(&self, post_id: &str) -> Result<Vec<Tag>, AppError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT t.id, t.name, t.slug
                 FROM tags t JOIN post_tags pt ON pt.tag_id = t.id
                 WHERE pt.post_id = ?1
                 ORDER BY t.name",
            )
            .map_err(|e| AppError::storage(format!("クエリ準備失敗: {e}")))?;

        let tags = stmt
            .query_map(params![post_id], map_tag_row)
            .map_err(|e| AppError::storage(format!("クエリ実行失敗: {e}")))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::storage(format!("行読み取り失敗: {e}")))?;

        Ok(tags)
    }

    // --- Settings ---

    pub fn get_settings(&self) -> Result<GeneratorSettings, AppError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT key, value FROM settings")
            .map_err(|e| AppError::storage(format!("クエリ準備失敗: {e}")))?;

        let rows: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(|e| AppError::storage(format!("クエリ実行失敗: {e}")))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::storage(format!("行読み取り失敗: {e}")))?;

        if rows.is_empty() {
            return Ok(GeneratorSettings::default());
        }

        // key-value をJSONに組み立ててデシリアライズ（欠けたキーはデフォルト）
        let mut map = serde_json::Map::new();
        for (key, value) in rows {
            let v = serde_json::from_str(&value).unwrap_or(serde_json::Value::String(value));
            map.insert(key, v);
        }

        match serde_json::from_value::<GeneratorSettings>(serde_json::Value::Object(map)) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                log::warn!("設定の読み込みに失敗したためデフォルトを使用: {e}");
                Ok(GeneratorSettings::default())
            }
        }
    }

    pub fn save_settings(&self, settings: &GeneratorSettings) -> Result<(), AppError> {
        let json = serde_json::to_value(settings)
            .map_err(|e| AppError::internal(format!("settings serialize: {e}")))?;

        let conn = self.conn()?;
        if let Some(obj) = json.as_object() {
            for (key, value) in obj {
                conn.execute(
                    "INSERT INTO settings (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    params![key, value.to_string()],
                )
                .map_err(|e| AppError::storage(format!("設定保存失敗: {e}")))?;
            }
        }

        Ok(())
    }
}

impl BlogStore for Storage {
    fn create_post(&self, post: &NewPost) -> Result<Post, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let published_at = post.published_at.map(|t| t.to_rfc3339());
        let metadata = serde_json::to_string(&post.metadata)
            .map_err(|e| AppError::internal(format!("metadata serialize: {e}")))?;

        self.conn()?
            .execute(
                "INSERT INTO posts (id, title, slug, content, excerpt, status, read_time,
                                    author_id, category_id, metadata, published_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    id,
                    post.title,
                    post.slug,
                    post.content,
                    post.excerpt,
                    post.status.as_str(),
                    post.read_time,
                    post.author_id,
                    post.category_id,
                    metadata,
                    published_at,
                    now,
                ],
            )
            .map_err(|e| AppError::storage(format!("記事挿入失敗: {e}")))?;

        Ok(Post {
            id,
            title: post.title.clone(),
            slug: post.slug.clone(),
            content: post.content.clone(),
            excerpt: post.excerpt.clone(),
            status: post.status,
            read_time: post.read_time,
            author_id: post.author_id.clone(),
            category_id: post.category_id.clone(),
            metadata: post.metadata.clone(),
            published_at,
            created_at: now,
        })
    }

    fn get_tags(&self) -> Result<Vec<Tag>, AppError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, name, slug FROM tags ORDER BY name")
            .map_err(|e| AppError::storage(format!("クエリ準備失敗: {e}")))?;

        let tags = stmt
            .query_map([], map_tag_row)
            .map_err(|e| AppError::storage(format!("クエリ実行失敗: {e}")))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::storage(format!("行読み取り失敗: {e}")))?;

        Ok(tags)
    }

    fn create_tag(&self, tag: &NewTag) -> Result<Tag, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        self.conn()?
            .execute(
                "INSERT INTO tags (id, name, slug, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, tag.name, tag.slug, now],
            )
            .map_err(|e| AppError::storage(format!("タグ挿入失敗: {e}")))?;

        Ok(Tag {
            id,
            name: tag.name.clone(),
            slug: tag.slug.clone(),
        })
    }

    fn attach_tag(&self, post_id: &str, tag_id: &str) -> Result<(), AppError> {
        self.conn()?
            .execute(
                "INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?1, ?2)",
                params![post_id, tag_id],
            )
            .map_err(|e| AppError::storage(format!("タグ関連付け失敗: {e}")))?;
        Ok(())
    }
}

const POST_COLUMNS: &str = "id, title, slug, content, excerpt, status, read_time,
    author_id, category_id, metadata, published_at, created_at";

fn map_post_row(row: &rusqlite::Row) -> rusqlite::Result<Post> {
    let status_str: String = row.get(5)?;
    let metadata_str: String = row.get(9)?;
    let metadata: PostMetadata = serde_json::from_str(&metadata_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        content: row.get(3)?,
        excerpt: row.get(4)?,
        status: parse_post_status(&status_str),
        read_time: row.get(6)?,
        author_id: row.get(7)?,
        category_id: row.get(8)?,
        metadata,
        published_at: row.get(10)?,
        created_at: row.get(11)?,
    })
}

fn map_tag_row(row: &rusqlite::Row) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
    })
}

fn parse_post_status(s: &str) -> PostStatus {
    match s {
        "published" => PostStatus::Published,
        _ => PostStatus::Draft,
    }
}
