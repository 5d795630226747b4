use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 記事生成の設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    /// Claude API キー（ローカル SQLite に保存。環境変数が優先）
    pub anthropic_api_key: Option<String>,
    /// エージェントが使うモデル
    pub model: String,
    pub max_tokens: u32,
    /// エージェント1回あたりの HTTP タイムアウト（秒）
    pub request_timeout_secs: u64,
    /// 生成記事の著者（システムユーザー）
    pub system_author_id: String,
    /// 生成記事のカテゴリ
    pub default_category_id: String,
    /// 進捗モニターの間隔（秒）
    pub monitor_interval_secs: u64,
    /// 進捗モニターの打ち切り（秒）
    pub monitor_timeout_secs: u64,
    /// メタデータに記録する生成器名
    pub generator_name: String,
}

impl GeneratorSettings {
    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs.max(1))
    }

    pub fn monitor_timeout(&self) -> Duration {
        Duration::from_secs(self.monitor_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            anthropic_api_key: None,
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 4096,
            request_timeout_secs: 120,
            system_author_id: "system-ai-author".to_string(),
            default_category_id: "ai-generated".to_string(),
            monitor_interval_secs: 2,
            monitor_timeout_secs: 30 * 60,
            generator_name: "bg-core/multi-agent".to_string(),
        }
    }
}
