//! 世代ベースのイメージ保持
//!
//! ターゲットごとにタグ付きイメージを新しい順に並べ、
//! 保持数を超えた古い世代を削除する。

use crate::error::BuildResult;
use bollard::Docker;
use kiln_core::Config;
use std::collections::HashMap;

/// ターゲットのタグ一覧の1エントリ
#[derive(Debug, Clone, PartialEq, Eq)]
struct TagEntry {
    reference: String,
    created: i64,
}

/// 保持数を超えたエントリを選出
///
/// 作成時刻の降順、同時刻はタグ文字列の降順で並べる。同一アーティファクト
/// を指す `latest` とタイムスタンプタグは作成時刻が一致するが、`latest` が
/// タグ文字列順で先になるため常に保持側に残る。
fn select_removals(mut entries: Vec<TagEntry>, keep: usize) -> Vec<TagEntry> {
    entries.sort_by(|a, b| {
        b.created
            .cmp(&a.created)
            .then_with(|| b.reference.cmp(&a.reference))
    });

    if entries.len() <= keep {
        return Vec::new();
    }
    entries.split_off(keep)
}

pub struct RetentionPruner {
    docker: Docker,
    config: Config,
}

impl RetentionPruner {
    pub fn new(docker: Docker, config: Config) -> Self {
        Self { docker, config }
    }

    /// ターゲットの古いタグを保持数まで削除し、削除数を返す
    ///
    /// 個別タグの削除失敗（実行中コンテナから参照されている等）は
    /// 警告してスキップし、残りの削除は継続する。
    /// 保持数以下しかタグがない場合は何もせず 0 を返す。
    pub async fn prune(&self, target_name: &str, keep: usize) -> BuildResult<usize> {
        let repository = self.config.repository(target_name);

        let mut filters = HashMap::new();
        filters.insert("reference".to_string(), vec![repository.clone()]);

        let options = bollard::query_parameters::ListImagesOptions {
            filters: Some(filters),
            ..Default::default()
        };

        let images = self.docker.list_images(Some(options)).await?;

        let tag_prefix = format!("{}:", repository);
        let mut entries = Vec::new();
        for image in &images {
            for tag in &image.repo_tags {
                if tag.starts_with(&tag_prefix) {
                    entries.push(TagEntry {
                        reference: tag.clone(),
                        created: image.created,
                    });
                }
            }
        }

        let removals = select_removals(entries, keep);
        if removals.is_empty() {
            tracing::info!("No stale tags for {} (keep={})", repository, keep);
            return Ok(0);
        }

        let mut removed = 0usize;
        for entry in &removals {
            match self.docker.remove_image(&entry.reference, None::<bollard::query_parameters::RemoveImageOptions>, None).await {
                Ok(_) => {
                    tracing::info!("Removed stale tag: {}", entry.reference);
                    removed += 1;
                }
                Err(e) => {
                    tracing::warn!("Skipping tag {} (removal failed): {}", entry.reference, e);
                }
            }
        }

        Ok(removed)
    }
}
