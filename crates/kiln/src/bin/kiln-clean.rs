//! クリーンアップ専用のエントリポイント
//!
//! ビルド状態とは独立に、エンジンリソースの掃除だけを行う。

use clap::Parser;
use colored::Colorize;
use kiln_container::{
    CleanupScope, ResourceCleaner, StdinConfirmation, init_docker_with_error_handling,
};
use kiln_core::Config;

#[derive(Parser)]
#[command(name = "kiln-clean")]
#[command(about = "停止済みコンテナ・不要イメージ・未使用ボリューム等を削除する", long_about = None)]
struct Cli {
    /// プレフィックス配下の名前付きイメージもタグに関係なく削除
    #[arg(long)]
    all: bool,

    /// コンテナのみ削除
    #[arg(long, group = "scope")]
    containers: bool,

    /// danglingイメージのみ削除
    #[arg(long, group = "scope")]
    images: bool,

    /// 未使用ボリュームのみ削除
    #[arg(long, group = "scope")]
    volumes: bool,

    /// 未使用ネットワークのみ削除
    #[arg(long, group = "scope")]
    networks: bool,

    /// ビルドキャッシュのみ削除
    #[arg(long = "build-cache", group = "scope")]
    build_cache: bool,

    /// すべての未使用リソースを削除（対話確認あり）
    #[arg(long, group = "scope")]
    everything: bool,

    /// イメージリポジトリのプレフィックス
    #[arg(long, env = "KILN_PREFIX", default_value = "ml-challenge")]
    prefix: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt::init();

    let scope = if cli.everything {
        CleanupScope::Everything
    } else if cli.containers {
        CleanupScope::Containers
    } else if cli.images {
        CleanupScope::Images
    } else if cli.volumes {
        CleanupScope::Volumes
    } else if cli.networks {
        CleanupScope::Networks
    } else if cli.build_cache {
        CleanupScope::BuildCache
    } else {
        // フラグ未指定: コンテナ + イメージ + ボリューム + ネットワーク
        CleanupScope::Standard
    };

    println!("{}", "Dockerリソースをクリーンアップ中...".green());
    println!("プレフィックス: {}", cli.prefix.cyan());

    let docker = init_docker_with_error_handling().await?;
    let cleaner = ResourceCleaner::new(docker, Config::new(cli.prefix), cli.all);

    // 確認拒否（Everythingのみ）はキャンセル扱いで正常終了する
    if cleaner.clean(scope, &StdinConfirmation).await? {
        println!();
        println!("{}", "✓ クリーンアップ完了".green().bold());
    }

    Ok(())
}
