//! ビルドスケジューラ
//!
//! 宣言されたターゲット列を逐次または並列で実行し、結果を集約する。

use crate::builder::{BuildReport, ImageBuilder};
use bollard::Docker;
use colored::Colorize;
use futures_util::future::join_all;
use kiln_core::{BuildTarget, Config};
use std::collections::HashMap;

/// スケジューリングモード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// 宣言順に1つずつビルド
    Sequential,
    /// 全ターゲットを同時に起動し、全完了を待つ（join-all）
    Parallel,
}

/// 全レポートが成功のときのみ全体成功
pub fn overall_success(reports: &[BuildReport]) -> bool {
    reports.iter().all(|r| r.success)
}

pub struct BuildScheduler {
    docker: Docker,
    config: Config,
}

impl BuildScheduler {
    pub fn new(docker: Docker, config: Config) -> Self {
        Self { docker, config }
    }

    /// ターゲット列をビルドし、ターゲットごとのレポートを宣言順で返す
    ///
    /// 逐次モードでは失敗してもログを残して次のターゲットへ進む。
    /// 並列モードでは1ターゲットの失敗が他をキャンセルすることはなく、
    /// 全タスクの終了を待ってから結果を集約する。
    pub async fn run(
        &self,
        targets: &[BuildTarget],
        mode: BuildMode,
        build_args: &HashMap<String, String>,
    ) -> Vec<BuildReport> {
        let reports = match mode {
            BuildMode::Sequential => {
                let builder = ImageBuilder::new(self.docker.clone(), self.config.clone());
                let mut reports = Vec::with_capacity(targets.len());
                for target in targets {
                    println!();
                    println!(
                        "{}",
                        format!("🔨 {} をビルド中...", target.name).green().bold()
                    );
                    reports.push(builder.build(target, build_args).await);
                }
                reports
            }
            BuildMode::Parallel => {
                println!();
                println!(
                    "{}",
                    format!("🔨 {} 個のターゲットを並列ビルド中...", targets.len())
                        .green()
                        .bold()
                );

                let handles: Vec<_> = targets
                    .iter()
                    .cloned()
                    .map(|target| {
                        let docker = self.docker.clone();
                        let config = self.config.clone();
                        let build_args = build_args.clone();
                        tokio::spawn(async move {
                            ImageBuilder::new(docker, config)
                                .build(&target, &build_args)
                                .await
                        })
                    })
                    .collect();

                // join-all: 全タスクの終了を待つ。順序保証はないが
                // 結果は宣言順に整列して返る。
                join_all(handles)
                    .await
                    .into_iter()
                    .zip(targets.iter())
                    .map(|(joined, target)| match joined {
                        Ok(report) => report,
                        Err(e) => BuildReport {
                            target: target.clone(),
                            success: false,
                            image_size: None,
                            error_detail: Some(format!("ビルドタスクが異常終了しました: {}", e)),
                            tags: Vec::new(),
                        },
                    })
                    .collect()
            }
        };

        // 成否にかかわらず全レポートを記録する
        for report in &reports {
            log_report(report);
        }

        reports
    }
}

fn log_report(report: &BuildReport) {
    if report.success {
        tracing::info!("Build succeeded: {}", report.target.name);
        println!(
            "  {} {} ({})",
            "✓".green(),
            report.target.name.cyan(),
            report.image_size.as_deref().unwrap_or("サイズ不明")
        );
    } else {
        tracing::error!("Build failed: {}", report.target.name);
        eprintln!(
            "  {} {} ビルドエラー: {}",
            "✗".red().bold(),
            report.target.name,
            report.error_detail.as_deref().unwrap_or("不明なエラー")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn report(name: &str, success: bool) -> BuildReport {
        BuildReport {
            target: BuildTarget {
                name: name.to_string(),
                dockerfile: PathBuf::from(format!("Dockerfile.{}", name)),
                context: PathBuf::from("."),
                smoke: None,
            },
            success,
            image_size: None,
            error_detail: if success {
                None
            } else {
                Some("engine error".to_string())
            },
            tags: Vec::new(),
        }
    }

    #[test]
    fn test_overall_success_all_ok() {
        let reports = vec![report("ml-api", true), report("worker", true)];
        assert!(overall_success(&reports));
    }

    #[test]
    fn test_overall_success_one_failure() {
        // 1つでも失敗すれば全体失敗
        let reports = vec![report("ml-api", true), report("worker", false)];
        assert!(!overall_success(&reports));
    }

    #[test]
    fn test_overall_success_empty() {
        assert!(overall_success(&[]));
    }
}
