//! ビルド済みイメージのスモークテスト
//!
//! ターゲットの `latest` タグから使い捨てコンテナを1つ起動し、
//! 宣言された検証コマンドを実行する。ビルド直後の最小限の
//! サニティゲートであり、ターゲットの状態は変更しない。

use crate::error::{ContainerError, Result};
use bollard::Docker;
use bollard::container::{Config as ContainerConfig, CreateContainerOptions};
use futures_util::stream::StreamExt;
use kiln_core::{BuildTarget, Config};
use std::collections::HashMap;
use std::time::Duration;

/// 検証コマンドの最長実行時間
const SMOKE_TIMEOUT_SECS: u64 = 60;

/// スモークテスト用コンテナの名前
fn smoke_container_name(prefix: &str, target_name: &str) -> String {
    format!("{}-{}-smoke", prefix, target_name)
}

pub struct SmokeTester {
    docker: Docker,
    config: Config,
}

impl SmokeTester {
    pub fn new(docker: Docker, config: Config) -> Self {
        Self { docker, config }
    }

    /// ターゲットのスモークテストを実行
    ///
    /// 終了コード0、かつ期待出力が宣言されている場合は標準出力に
    /// その文字列が含まれることで合格。非ゼロ終了・タイムアウトは失敗。
    /// 検証コマンド未宣言のターゲットはスキップされる。
    pub async fn test(&self, target: &BuildTarget) -> Result<()> {
        let Some(check) = &target.smoke else {
            tracing::info!("No smoke check declared for '{}', skipping", target.name);
            return Ok(());
        };

        let image = format!("{}:latest", self.config.repository(&target.name));

        if let Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        }) = self.docker.inspect_image(&image).await
        {
            return Err(ContainerError::ImageNotFound { image });
        }

        let container_name = smoke_container_name(&self.config.prefix, &target.name);

        // 前回実行の残骸があれば先に片付ける
        self.remove_smoke_container(&container_name).await;

        tracing::info!("Running smoke test for {} ({:?})", image, check.cmd);

        // クリーンアップがプロジェクトラベルで回収できるようにしておく
        let mut labels = HashMap::new();
        labels.insert(
            "com.docker.compose.project".to_string(),
            self.config.prefix.clone(),
        );

        let container_config = ContainerConfig {
            image: Some(image.clone()),
            cmd: Some(check.cmd.clone()),
            labels: Some(labels),
            ..Default::default()
        };
        let options = CreateContainerOptions {
            name: container_name.clone(),
            platform: None,
        };

        self.docker
            .create_container(Some(options), container_config)
            .await?;

        self.docker
            .start_container(
                &container_name,
                None::<bollard::query_parameters::StartContainerOptions>,
            )
            .await?;

        // 終了待ち（タイムアウト付き）
        let mut wait_stream = self.docker.wait_container(
            &container_name,
            None::<bollard::query_parameters::WaitContainerOptions>,
        );
        let waited = tokio::time::timeout(
            Duration::from_secs(SMOKE_TIMEOUT_SECS),
            wait_stream.next(),
        )
        .await;

        let status_code = match waited {
            Err(_) => {
                self.remove_smoke_container(&container_name).await;
                return Err(ContainerError::SmokeTestTimeout {
                    target: target.name.clone(),
                    timeout_secs: SMOKE_TIMEOUT_SECS,
                });
            }
            Ok(Some(Ok(response))) => response.status_code,
            // 非ゼロ終了はbollardがエラーとして返す
            Ok(Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. }))) => code,
            Ok(Some(Err(e))) => {
                self.remove_smoke_container(&container_name).await;
                return Err(e.into());
            }
            Ok(None) => {
                self.remove_smoke_container(&container_name).await;
                return Err(ContainerError::DockerApiError(
                    "wait stream ended without a status".to_string(),
                ));
            }
        };

        // 削除前に標準出力を回収
        let logs_options = bollard::container::LogsOptions::<String> {
            stdout: true,
            stderr: true,
            ..Default::default()
        };
        let mut logs = self.docker.logs(&container_name, Some(logs_options));

        let mut stdout = String::new();
        while let Some(chunk) = logs.next().await {
            if let Ok(log) = chunk {
                let text = log.to_string();
                if let bollard::container::LogOutput::StdOut { .. } = log {
                    stdout.push_str(&text);
                }
            }
        }

        self.remove_smoke_container(&container_name).await;

        if status_code != 0 {
            return Err(ContainerError::SmokeTestFailed {
                target: target.name.clone(),
                detail: format!("検証コマンドが終了コード {} で失敗しました", status_code),
            });
        }

        if let Some(expected) = &check.expect
            && !stdout.contains(expected)
        {
            return Err(ContainerError::SmokeTestFailed {
                target: target.name.clone(),
                detail: format!("期待する出力 '{}' が標準出力にありません", expected),
            });
        }

        tracing::info!("Smoke test passed: {}", target.name);
        Ok(())
    }

    async fn remove_smoke_container(&self, container_name: &str) {
        self.docker
            .remove_container(
                container_name,
                Some(bollard::query_parameters::RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .ok();
    }
}
