mod scan;

use clap::Parser;
use colored::Colorize;
use kiln_build::{
    BuildMode, BuildScheduler, RetentionPruner, overall_success, parse_build_args,
};
use kiln_container::{SmokeTester, init_docker_with_error_handling};
use kiln_core::{Config, RetentionPolicy, default_targets, find_target};

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "宣言されたDockerイメージ群をビルドし、タグ付け・検証・世代管理まで面倒を見る", long_about = None)]
struct Cli {
    /// ビルド対象を1つのターゲットに限定
    #[arg(long, value_name = "NAME")]
    service: Option<String>,

    /// 全ターゲットを並列にビルド（デフォルトは逐次）
    #[arg(long)]
    parallel: bool,

    /// ビルド後に古いタグを保持数まで削除
    #[arg(long)]
    cleanup: bool,

    /// 保持する世代数（--cleanup と併用）
    #[arg(long, default_value_t = 3, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    keep: u32,

    /// ビルド後にスモークテストを実行
    #[arg(long)]
    test: bool,

    /// ビルド後に脆弱性スキャンを実行（trivy / grype）
    #[arg(long = "security-scan")]
    security_scan: bool,

    /// ビルド引数（KEY=VALUE 形式、繰り返し指定可）
    #[arg(long = "build-arg", value_name = "KEY=VALUE")]
    build_arg: Vec<String>,

    /// イメージリポジトリのプレフィックス
    #[arg(long, env = "KILN_PREFIX", default_value = "ml-challenge")]
    prefix: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt::init();

    let config = Config::new(cli.prefix.clone());
    let targets = default_targets();

    // ターゲットとビルド引数の解決。設定エラーはここで報告され、
    // Docker接続を含む一切の副作用より前に中断する。
    let selected = match &cli.service {
        Some(name) => vec![find_target(&targets, name)?],
        None => targets,
    };
    let build_args = parse_build_args(&cli.build_arg)?;

    println!("{}", "Dockerイメージをビルド中...".green());
    println!("プレフィックス: {}", config.prefix.cyan());
    println!();
    println!(
        "{}",
        format!("ビルド対象ターゲット ({} 個):", selected.len()).bold()
    );
    for target in &selected {
        println!(
            "  • {} ({})",
            target.name.cyan(),
            target.dockerfile.display()
        );
    }

    println!();
    println!("{}", "Dockerに接続中...".blue());
    let docker = init_docker_with_error_handling().await?;

    let mode = if cli.parallel {
        BuildMode::Parallel
    } else {
        BuildMode::Sequential
    };

    let scheduler = BuildScheduler::new(docker.clone(), config.clone());
    let reports = scheduler.run(&selected, mode, &build_args).await;

    let build_ok = overall_success(&reports);
    let built: Vec<_> = reports.iter().filter(|r| r.success).collect();
    let mut post_failed = false;

    // ビルド後パス: スモークテスト → 脆弱性スキャン → 世代プルーン
    if cli.test && !built.is_empty() {
        println!();
        println!("{}", "🧪 スモークテストを実行中...".blue().bold());

        let tester = SmokeTester::new(docker.clone(), config.clone());
        for report in &built {
            match tester.test(&report.target).await {
                Ok(_) => {
                    println!("  ✓ {}", report.target.name.cyan());
                }
                Err(e) => {
                    post_failed = true;
                    eprintln!("  ✗ {}: {}", report.target.name, e);
                }
            }
        }
    }

    if cli.security_scan && !built.is_empty() {
        println!();
        println!("{}", "🔒 脆弱性スキャンを実行中...".blue().bold());

        match scan::detect_scanner() {
            Some(scanner) => {
                for report in &built {
                    let image = format!("{}:latest", config.repository(&report.target.name));
                    if let Err(e) = scan::scan_image(scanner, &image) {
                        // スキャン実行の失敗は警告。パイプラインは止めない。
                        println!("  ⚠ スキャンエラー ({}): {}", image, e);
                    }
                }
            }
            None => {
                // スキャナ不在も警告のみ
                println!(
                    "{}",
                    "  ⚠ 利用可能なスキャナがありません (trivy / grype)。スキップします。"
                        .yellow()
                );
            }
        }
    }

    if cli.cleanup && !built.is_empty() {
        println!();
        println!("{}", "🧹 古いタグを削除中...".blue().bold());

        let policy = RetentionPolicy::new(cli.keep as usize)?;
        let pruner = RetentionPruner::new(docker.clone(), config.clone());
        for report in &built {
            match pruner.prune(&report.target.name, policy.keep).await {
                Ok(0) => {
                    println!("  ✓ {}: 削除対象なし", report.target.name.cyan());
                }
                Ok(removed) => {
                    println!(
                        "  ✓ {}: {} 個の古いタグを削除",
                        report.target.name.cyan(),
                        removed
                    );
                }
                Err(e) => {
                    post_failed = true;
                    eprintln!("  ✗ {}: プルーンエラー: {}", report.target.name, e);
                }
            }
        }
    }

    // 結果サマリー
    println!();
    println!("{}", "結果サマリー:".bold());
    for report in &reports {
        if report.success {
            for tag in &report.tags {
                println!(
                    "  {} {} ({})",
                    "✓".green(),
                    tag.reference().cyan(),
                    report.image_size.as_deref().unwrap_or("サイズ不明")
                );
            }
        } else {
            println!("  {} {}: ビルド失敗", "✗".red().bold(), report.target.name);
        }
    }

    println!();
    if build_ok && !post_failed {
        println!("{}", "✓ すべてのイメージがビルドされました！".green().bold());
        Ok(())
    } else {
        eprintln!("{}", "✗ 一部の処理が失敗しました".red().bold());
        std::process::exit(1);
    }
}
