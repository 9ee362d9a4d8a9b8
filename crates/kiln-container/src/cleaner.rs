//! エンジンリソースのクリーンアップ
//!
//! 停止済みコンテナ、danglingイメージ、未使用ボリューム・ネットワーク・
//! ビルドキャッシュの削除を、独立した冪等なサブ操作として提供する。
//! `Everything` のみ対話確認を要求する（このシステムの成果物を超えて
//! 影響する唯一の操作のため）。

use crate::confirm::Confirmation;
use crate::error::Result;
use bollard::Docker;
use colored::Colorize;
use kiln_core::Config;
use std::collections::HashMap;

/// クリーンアップの対象範囲
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupScope {
    /// フラグ未指定時のデフォルト: コンテナ + イメージ + ボリューム + ネットワーク
    Standard,
    Containers,
    Images,
    Volumes,
    Networks,
    BuildCache,
    /// すべての未使用リソース（対話確認が必要）
    Everything,
}

pub struct ResourceCleaner {
    docker: Docker,
    config: Config,
    /// イメージ削除をプレフィックス配下の名前付きイメージまで拡大する
    remove_named: bool,
}

impl ResourceCleaner {
    pub fn new(docker: Docker, config: Config, remove_named: bool) -> Self {
        Self {
            docker,
            config,
            remove_named,
        }
    }

    /// 指定範囲のクリーンアップを実行
    ///
    /// すべてのサブ操作は冪等で、既にクリーンな環境への再実行は
    /// 何も削除せず正常終了する。戻り値は実行有無
    /// （`Everything` の確認拒否のみ `false`）。
    pub async fn clean(
        &self,
        scope: CleanupScope,
        confirmation: &dyn Confirmation,
    ) -> Result<bool> {
        match scope {
            CleanupScope::Standard => {
                self.clean_containers().await?;
                self.clean_images().await?;
                self.clean_volumes().await?;
                self.clean_networks().await?;
            }
            CleanupScope::Containers => self.clean_containers().await?,
            CleanupScope::Images => self.clean_images().await?,
            CleanupScope::Volumes => self.clean_volumes().await?,
            CleanupScope::Networks => self.clean_networks().await?,
            CleanupScope::BuildCache => self.clean_build_cache().await?,
            CleanupScope::Everything => {
                return self.clean_everything(confirmation).await;
            }
        }
        Ok(true)
    }

    /// コンテナの停止・削除
    ///
    /// このシステムが起動したコンテナ（プロジェクトラベルで判別）を
    /// 停止・強制削除し、さらにシステム全体の終了済みコンテナを削除する。
    /// 実行中の無関係なコンテナには触れない。
    async fn clean_containers(&self) -> Result<()> {
        println!();
        println!("{}", "■ コンテナを削除中...".yellow().bold());

        // 1. 自プロジェクトのコンテナ
        let mut filters = HashMap::new();
        filters.insert(
            "label".to_string(),
            vec![format!(
                "com.docker.compose.project={}",
                self.config.prefix
            )],
        );
        let options = bollard::query_parameters::ListContainersOptions {
            all: true,
            filters: Some(filters),
            ..Default::default()
        };
        let own = self.docker.list_containers(Some(options)).await?;

        for container in &own {
            let Some(id) = container.id.as_deref() else {
                continue;
            };
            let name = display_name(container);

            match self
                .docker
                .stop_container(id, None::<bollard::query_parameters::StopContainerOptions>)
                .await
            {
                Ok(_) => {
                    println!("  ✓ {} を停止しました", name.cyan());
                }
                Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: 304, ..
                }) => {
                    // 既に停止中
                }
                Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                }) => {
                    continue;
                }
                Err(e) => {
                    println!("  ⚠ {} 停止エラー: {}", name, e);
                }
            }

            match self
                .docker
                .remove_container(
                    id,
                    Some(bollard::query_parameters::RemoveContainerOptions {
                        force: true,
                        ..Default::default()
                    }),
                )
                .await
            {
                Ok(_) => {
                    println!("  ✓ {} を削除しました", name.cyan());
                }
                Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                }) => {}
                Err(e) => {
                    println!("  ⚠ {} 削除エラー: {}", name, e);
                }
            }
        }

        // 2. システム全体の終了済みコンテナ
        let mut filters = HashMap::new();
        filters.insert("status".to_string(), vec!["exited".to_string()]);
        let options = bollard::query_parameters::ListContainersOptions {
            all: true,
            filters: Some(filters),
            ..Default::default()
        };
        let exited = self.docker.list_containers(Some(options)).await?;

        let mut removed = 0usize;
        for container in &exited {
            let Some(id) = container.id.as_deref() else {
                continue;
            };
            match self
                .docker
                .remove_container(
                    id,
                    None::<bollard::query_parameters::RemoveContainerOptions>,
                )
                .await
            {
                Ok(_) => removed += 1,
                Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                }) => {}
                Err(e) => {
                    println!("  ⚠ {} 削除エラー: {}", display_name(container), e);
                }
            }
        }

        if removed > 0 {
            println!("  ✓ 終了済みコンテナを削除 ({} 個)", removed);
        } else {
            println!("  ✓ 削除対象のコンテナはありません");
        }

        Ok(())
    }

    /// danglingイメージの削除（--all 指定時はプレフィックス配下も削除）
    async fn clean_images(&self) -> Result<()> {
        println!();
        println!("{}", "■ イメージを削除中...".yellow().bold());

        let mut filters = HashMap::new();
        filters.insert("dangling".to_string(), vec!["true".to_string()]);
        let prune_opts = bollard::query_parameters::PruneImagesOptions {
            filters: Some(filters),
        };

        match self.docker.prune_images(Some(prune_opts)).await {
            Ok(result) => {
                let deleted_count = result.images_deleted.as_ref().map(|v| v.len()).unwrap_or(0);
                let reclaimed = result.space_reclaimed.unwrap_or(0);
                if deleted_count > 0 || reclaimed > 0 {
                    let reclaimed_mb = reclaimed as f64 / 1_048_576.0;
                    println!(
                        "  ✓ danglingイメージを削除 ({} 個, {:.1}MB 解放)",
                        deleted_count, reclaimed_mb
                    );
                } else {
                    println!("  ✓ 削除対象のイメージはありません");
                }
            }
            Err(e) => {
                println!("  ⚠ イメージ削除でエラー: {}", e);
            }
        }

        if self.remove_named {
            self.remove_prefixed_images().await?;
        }

        Ok(())
    }

    /// プレフィックス配下の名前付きイメージをタグに関係なく削除
    async fn remove_prefixed_images(&self) -> Result<()> {
        let reference = format!("{}/*", self.config.prefix);
        println!(
            "{}",
            format!("  → 名前付きイメージも削除 ({})", reference).yellow()
        );

        let mut filters = HashMap::new();
        filters.insert("reference".to_string(), vec![reference]);
        let options = bollard::query_parameters::ListImagesOptions {
            filters: Some(filters),
            ..Default::default()
        };
        let images = self.docker.list_images(Some(options)).await?;

        if images.is_empty() {
            println!("  ✓ 削除対象の名前付きイメージはありません");
            return Ok(());
        }

        for image in &images {
            for tag in &image.repo_tags {
                match self
                    .docker
                    .remove_image(
                        tag,
                        Some(bollard::query_parameters::RemoveImageOptions {
                            force: true,
                            ..Default::default()
                        }),
                        None,
                    )
                    .await
                {
                    Ok(_) => {
                        println!("  ✓ {} を削除しました", tag.cyan());
                    }
                    Err(bollard::errors::Error::DockerResponseServerError {
                        status_code: 404,
                        ..
                    }) => {}
                    Err(e) => {
                        println!("  ⚠ {} 削除エラー: {}", tag, e);
                    }
                }
            }
        }

        Ok(())
    }

    /// 未使用ボリュームの削除
    async fn clean_volumes(&self) -> Result<()> {
        println!();
        println!("{}", "■ ボリュームを削除中...".yellow().bold());

        match self
            .docker
            .prune_volumes(None::<bollard::query_parameters::PruneVolumesOptions>)
            .await
        {
            Ok(result) => {
                let deleted_count = result
                    .volumes_deleted
                    .as_ref()
                    .map(|v| v.len())
                    .unwrap_or(0);
                let reclaimed = result.space_reclaimed.unwrap_or(0);
                if deleted_count > 0 {
                    let reclaimed_mb = reclaimed as f64 / 1_048_576.0;
                    println!(
                        "  ✓ 未使用ボリュームを削除 ({} 個, {:.1}MB 解放)",
                        deleted_count, reclaimed_mb
                    );
                } else {
                    println!("  ✓ 削除対象のボリュームはありません");
                }
            }
            Err(e) => {
                println!("  ⚠ ボリューム削除でエラー: {}", e);
            }
        }

        Ok(())
    }

    /// 未使用ネットワークの削除
    async fn clean_networks(&self) -> Result<()> {
        println!();
        println!("{}", "■ ネットワークを削除中...".yellow().bold());

        match self
            .docker
            .prune_networks(None::<bollard::query_parameters::PruneNetworksOptions>)
            .await
        {
            Ok(result) => {
                let deleted_count = result
                    .networks_deleted
                    .as_ref()
                    .map(|v| v.len())
                    .unwrap_or(0);
                if deleted_count > 0 {
                    println!("  ✓ 未使用ネットワークを削除 ({} 個)", deleted_count);
                } else {
                    println!("  ✓ 削除対象のネットワークはありません");
                }
            }
            Err(e) => {
                println!("  ⚠ ネットワーク削除でエラー: {}", e);
            }
        }

        Ok(())
    }

    /// ビルドキャッシュの削除
    async fn clean_build_cache(&self) -> Result<()> {
        println!();
        println!("{}", "■ ビルドキャッシュを削除中...".yellow().bold());

        match self
            .docker
            .prune_build(None::<bollard::query_parameters::PruneBuildOptions>)
            .await
        {
            Ok(result) => {
                let reclaimed = result.space_reclaimed.unwrap_or(0);
                if reclaimed > 0 {
                    let reclaimed_mb = reclaimed as f64 / 1_048_576.0;
                    println!("  ✓ ビルドキャッシュを削除 ({:.1}MB 解放)", reclaimed_mb);
                } else {
                    println!("  ✓ 削除対象のビルドキャッシュはありません");
                }
            }
            Err(e) => {
                println!("  ⚠ ビルドキャッシュ削除でエラー: {}", e);
            }
        }

        Ok(())
    }

    /// すべての未使用リソースを削除（要確認）
    ///
    /// 唯一、このシステムが作成した成果物を超えて影響する操作。
    /// 確認が得られなければ何も触らずに正常終了する（戻り値 `false`）。
    async fn clean_everything(&self, confirmation: &dyn Confirmation) -> Result<bool> {
        println!();
        println!(
            "{}",
            "警告: すべての未使用リソース（ボリューム含む）を削除します。"
                .yellow()
                .bold()
        );
        println!(
            "{}",
            "  プレフィックスに関係なく適用され、元に戻せません。".yellow()
        );

        if !confirmation.confirm("本当に実行しますか?") {
            // 拒否はキャンセル扱い。リソースには一切触れない。
            println!();
            println!(
                "{}",
                "キャンセルしました。リソースは変更されていません。".cyan()
            );
            return Ok(false);
        }

        self.clean_containers().await?;
        self.clean_images().await?;

        // エンジン全体のプルーン（停止済みコンテナと未使用イメージすべて）
        println!();
        println!("{}", "■ エンジン全体をプルーン中...".yellow().bold());

        match self
            .docker
            .prune_containers(None::<bollard::query_parameters::PruneContainersOptions>)
            .await
        {
            Ok(result) => {
                let deleted_count = result
                    .containers_deleted
                    .as_ref()
                    .map(|v| v.len())
                    .unwrap_or(0);
                if deleted_count > 0 {
                    println!("  ✓ 停止済みコンテナを削除 ({} 個)", deleted_count);
                }
            }
            Err(e) => {
                println!("  ⚠ コンテナプルーンでエラー: {}", e);
            }
        }

        // dangling=false: タグ付きを含む未使用イメージすべて
        let mut filters = HashMap::new();
        filters.insert("dangling".to_string(), vec!["false".to_string()]);
        let prune_opts = bollard::query_parameters::PruneImagesOptions {
            filters: Some(filters),
        };
        match self.docker.prune_images(Some(prune_opts)).await {
            Ok(result) => {
                let deleted_count = result.images_deleted.as_ref().map(|v| v.len()).unwrap_or(0);
                let reclaimed = result.space_reclaimed.unwrap_or(0);
                if deleted_count > 0 || reclaimed > 0 {
                    let reclaimed_mb = reclaimed as f64 / 1_048_576.0;
                    println!(
                        "  ✓ 未使用イメージを削除 ({} 個, {:.1}MB 解放)",
                        deleted_count, reclaimed_mb
                    );
                }
            }
            Err(e) => {
                println!("  ⚠ イメージプルーンでエラー: {}", e);
            }
        }

        self.clean_volumes().await?;
        self.clean_networks().await?;
        self.clean_build_cache().await?;

        Ok(true)
    }
}

fn display_name(container: &bollard::models::ContainerSummary) -> String {
    container
        .names
        .as_ref()
        .and_then(|names| names.first())
        .map(|name| name.trim_start_matches('/').to_string())
        .or_else(|| container.id.clone())
        .unwrap_or_else(|| "<unknown>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::AlwaysDeny;

    #[tokio::test]
    async fn test_everything_declined_touches_nothing() {
        // 接続ハンドルの構築はソケットに触れないため、デーモン不要。
        // 確認拒否はAPIを一度も呼ばずに正常終了する。
        let docker = Docker::connect_with_local_defaults().unwrap();
        let cleaner = ResourceCleaner::new(docker, Config::new("ml-challenge"), false);

        let executed = cleaner
            .clean(CleanupScope::Everything, &AlwaysDeny)
            .await
            .unwrap();
        assert!(!executed);
    }

    #[tokio::test]
    #[ignore] // Docker接続が必要なため、通常のテストではスキップ
    async fn test_standard_scope_idempotent() {
        use crate::confirm::AlwaysConfirm;

        let docker = Docker::connect_with_local_defaults().unwrap();
        let cleaner = ResourceCleaner::new(docker, Config::new("kiln-test"), false);

        // クリーン済み環境への再実行はエラーにならない
        cleaner
            .clean(CleanupScope::Standard, &AlwaysConfirm)
            .await
            .unwrap();
        cleaner
            .clean(CleanupScope::Standard, &AlwaysConfirm)
            .await
            .unwrap();
    }
}
