mod repository;

pub use repository::Storage;

use crate::domain::content::{NewPost, NewTag, Post, Tag};
use crate::domain::error::AppError;

/// ブログのストレージ（記事・タグ）
pub trait BlogStore: Send + Sync {
    /// 記事を保存し、ID を採番して返す
    fn create_post(&self, post: &NewPost) -> Result<Post, AppError>;

    fn get_tags(&self) -> Result<Vec<Tag>, AppError>;

    fn create_tag(&self, tag: &NewTag) -> Result<Tag, AppError>;

    /// 記事とタグを関連付ける
    fn attach_tag(&self, post_id: &str, tag_id: &str) -> Result<(), AppError>;
}
