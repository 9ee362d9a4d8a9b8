use crate::context::ContextBuilder;
use crate::error::{BuildError, BuildResult};
use bollard::Docker;
use bollard::image::BuildImageOptions;
use chrono::{DateTime, Local};
use colored::Colorize;
use futures_util::stream::StreamExt;
use kiln_core::{BuildTarget, Config, ImageTag};
use std::collections::HashMap;

/// ビルド時刻から生成する並べ替え可能なタグ (YYYYMMDD-HHMMSS)
///
/// 文字列の辞書順がそのまま作成時刻順になる。
pub fn timestamp_tag(at: DateTime<Local>) -> String {
    at.format("%Y%m%d-%H%M%S").to_string()
}

/// 1回のビルド試行の結果
///
/// スケジューラが集計とログ出力のために消費する。永続化はしない。
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub target: BuildTarget,
    pub success: bool,
    pub image_size: Option<String>,
    pub error_detail: Option<String>,
    /// 成功時に付与されたタグ（latest + タイムスタンプ）
    pub tags: Vec<ImageTag>,
}

pub struct ImageBuilder {
    docker: Docker,
    config: Config,
}

impl ImageBuilder {
    pub fn new(docker: Docker, config: Config) -> Self {
        Self { docker, config }
    }

    /// ターゲットを1つビルド
    ///
    /// `{prefix}/{name}:latest` と `{prefix}/{name}:{timestamp}` の
    /// 2つのタグを同一イメージに付与する（ビルドは1回）。
    /// エラーは失敗レポートに畳み込まれ、呼び出し側には常にレポートが返る。
    pub async fn build(
        &self,
        target: &BuildTarget,
        build_args: &HashMap<String, String>,
    ) -> BuildReport {
        let repository = self.config.repository(&target.name);
        let tags = vec![
            ImageTag::new(&repository, "latest"),
            ImageTag::new(&repository, timestamp_tag(Local::now())),
        ];

        match self.try_build(target, build_args, &tags).await {
            Ok(image_size) => BuildReport {
                target: target.clone(),
                success: true,
                image_size,
                error_detail: None,
                tags,
            },
            Err(e) => {
                tracing::error!("Build failed for target '{}': {}", target.name, e);
                BuildReport {
                    target: target.clone(),
                    success: false,
                    image_size: None,
                    error_detail: Some(e.user_message()),
                    tags: Vec::new(),
                }
            }
        }
    }

    async fn try_build(
        &self,
        target: &BuildTarget,
        build_args: &HashMap<String, String>,
        tags: &[ImageTag],
    ) -> BuildResult<Option<String>> {
        // エンジン呼び出しの前にビルドレシピを検証
        if !target.dockerfile.exists() {
            return Err(BuildError::DockerfileNotFound(target.dockerfile.clone()));
        }
        if !target.context.is_dir() {
            return Err(BuildError::ContextNotFound(target.context.clone()));
        }

        for key in build_args.keys() {
            crate::args::validate_build_arg(key);
        }

        let dockerfile = ContextBuilder::dockerfile_in_context(&target.context, &target.dockerfile)?;
        let context_data = ContextBuilder::create_context(&target.context)?;

        let latest = tags[0].reference();
        tracing::info!("Building image: {}", latest);

        // build_argsを&str型に変換
        let build_args_refs: HashMap<&str, &str> = build_args
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let options = BuildImageOptions {
            dockerfile: dockerfile.as_str(),
            t: latest.as_str(),
            buildargs: build_args_refs,
            rm: true,      // 中間コンテナを削除
            forcerm: true, // ビルド失敗時も中間コンテナを削除
            ..Default::default()
        };

        // ビルドストリームの開始
        use bytes::Bytes;
        use http_body_util::{Either, Full};
        let context_bytes = Bytes::from(context_data);
        let body = Full::new(context_bytes);
        let mut stream = self
            .docker
            .build_image(options, None, Some(Either::Left(body)));

        // ビルド進捗の表示
        while let Some(msg) = stream.next().await {
            match msg {
                Ok(output) => {
                    self.handle_build_output(output)?;
                }
                Err(e) => {
                    return Err(BuildError::DockerConnection(e));
                }
            }
        }

        // タイムスタンプタグを同じイメージアーティファクトに付与
        let stamped = &tags[1];
        #[allow(deprecated)]
        let tag_options = bollard::image::TagImageOptions {
            repo: stamped.repository.as_str(),
            tag: stamped.tag.as_str(),
        };
        self.docker.tag_image(&latest, Some(tag_options)).await?;

        tracing::info!("Successfully built: {} + {}", latest, stamped.reference());

        // サイズ取得の失敗は致命的ではない
        let image_size = match self.docker.inspect_image(&latest).await {
            Ok(inspect) => inspect.size.map(format_size),
            Err(e) => {
                tracing::warn!("Failed to query image size for {}: {}", latest, e);
                None
            }
        };

        Ok(image_size)
    }

    /// ビルド出力の処理
    fn handle_build_output(&self, output: bollard::models::BuildInfo) -> BuildResult<()> {
        if let Some(stream) = output.stream {
            // ビルドステップの出力
            print!("{}", stream);
        }

        if let Some(error) = output.error {
            return Err(BuildError::BuildFailed(error));
        }

        if let Some(error_detail) = output.error_detail {
            let error_msg = error_detail
                .message
                .unwrap_or_else(|| "Unknown build error".to_string());
            return Err(BuildError::BuildFailed(error_msg));
        }

        if let Some(status) = output.status {
            // ステータスメッセージ（pull等）
            println!("{}", status.cyan());
        }

        Ok(())
    }
}

/// バイト数を読みやすいMB表記に変換
fn format_size(bytes: i64) -> String {
    format!("{:.1}MB", bytes as f64 / 1_048_576.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_tag_format() {
        let at = Local.with_ymd_and_hms(2026, 8, 6, 9, 30, 5).unwrap();
        assert_eq!(timestamp_tag(at), "20260806-093005");
    }

    #[test]
    fn test_timestamp_tag_sortable() {
        let earlier = Local.with_ymd_and_hms(2026, 8, 6, 9, 59, 59).unwrap();
        let later = Local.with_ymd_and_hms(2026, 8, 6, 10, 0, 0).unwrap();

        // 辞書順 = 作成時刻順
        assert!(timestamp_tag(earlier) < timestamp_tag(later));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(1_048_576), "1.0MB");
        assert_eq!(format_size(157_286_400), "150.0MB");
    }

    #[tokio::test]
    #[ignore] // Docker接続が必要なため、通常のテストではスキップ
    async fn test_build_applies_two_tags() {
        use std::fs;
        use std::path::PathBuf;
        use tempfile::tempdir;

        let temp_dir = tempdir().unwrap();
        fs::write(
            temp_dir.path().join("Dockerfile.test"),
            "FROM alpine:latest\nCMD echo 'test'",
        )
        .unwrap();

        let target = BuildTarget {
            name: "smoke".to_string(),
            dockerfile: temp_dir.path().join("Dockerfile.test"),
            context: PathBuf::from(temp_dir.path()),
            smoke: None,
        };

        let docker = Docker::connect_with_local_defaults().unwrap();
        let builder = ImageBuilder::new(docker.clone(), Config::new("kiln-test"));

        let report = builder.build(&target, &HashMap::new()).await;
        assert!(report.success, "{:?}", report.error_detail);
        assert_eq!(report.tags.len(), 2);

        // 両タグが同一イメージを指すことを確認
        let latest = docker.inspect_image(&report.tags[0].reference()).await.unwrap();
        let stamped = docker.inspect_image(&report.tags[1].reference()).await.unwrap();
        assert_eq!(latest.id, stamped.id);

        // クリーンアップ
        for tag in &report.tags {
            docker.remove_image(&tag.reference(), None::<bollard::query_parameters::RemoveImageOptions>, None).await.ok();
        }
    }
}
