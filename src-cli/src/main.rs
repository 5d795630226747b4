//! blog-gen: AI ブログ記事生成ジョブをコマンドラインから実行する。
//!
//!   blog-gen custom --topic <T> [--prompt <P>]   トピック指定で1本生成
//!   blog-gen scheduled [--focus-topic <T>] ...   最新ニュースから1本生成
//!   blog-gen posts [--limit <N>]                 保存済み記事の一覧
//!
//! Claude を使う場合は ANTHROPIC_API_KEY が必要（--offline なら不要）。

mod commands;
mod events;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use bg_core::domain::job::{CustomConfig, ScheduledConfig};

#[derive(Parser)]
#[command(name = "blog-gen", about = "AI ブログ記事生成ジョブを実行する")]
struct Cli {
    /// SQLite データベースのパス
    #[arg(long, global = true, env = "BG_DB_PATH")]
    db: Option<PathBuf>,

    /// API を呼ばず、固定出力のエージェントで実行する
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// トピックを指定して記事を生成する
    Custom {
        #[arg(long)]
        topic: String,

        /// 生成ステップへの追加指示
        #[arg(long)]
        prompt: Option<String>,
    },
    /// 最新ニュースから記事を生成する
    Scheduled {
        #[arg(long, default_value_t = 24)]
        lookback_hours: u32,

        #[arg(long, default_value_t = 0.7)]
        relevance_threshold: f32,

        #[arg(long, default_value_t = 10)]
        max_articles: u32,

        #[arg(long)]
        focus_topic: Option<String>,
    },
    /// 保存済みの記事を新しい順に表示する
    Posts {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // core 側の log レコードも tracing-log 経由でここに流れる
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> commands::CliResult<()> {
    let db_path = commands::resolve_db_path(cli.db)?;
    let storage = commands::open_storage(&db_path)?;

    match cli.command {
        Command::Posts { limit } => commands::list_posts(&storage, limit),
        Command::Custom { topic, prompt } => {
            let orch = commands::build_orchestrator(storage, cli.offline)?;
            let request = commands::JobRequest::Custom(CustomConfig {
                topic,
                user_prompt: prompt,
            });
            commands::run_job(&orch, request).await
        }
        Command::Scheduled {
            lookback_hours,
            relevance_threshold,
            max_articles,
            focus_topic,
        } => {
            let orch = commands::build_orchestrator(storage, cli.offline)?;
            let request = commands::JobRequest::Scheduled(ScheduledConfig {
                lookback_hours,
                relevance_threshold,
                max_articles,
                focus_topic,
            });
            commands::run_job(&orch, request).await
        }
    }
}
