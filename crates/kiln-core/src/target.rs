//! ビルドターゲットの静的テーブル
//!
//! ターゲットの集合は固定の設定であり、実行時状態ではない。
//! ターゲットを追加する場合はこのテーブルに行を足すだけでよく、
//! スケジューラ側のロジックに手を入れる必要はない。

use crate::error::{ConfigError, Result};
use std::path::PathBuf;

/// 1 つのイメージに対応するビルド単位
///
/// Dockerfile のパスとビルドコンテキストのルートで定義される。
/// 宣言後は不変。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    /// 一意なターゲット名（イメージリポジトリ名の末尾になる）
    pub name: String,
    /// Dockerfile のパス
    pub dockerfile: PathBuf,
    /// ビルドコンテキストのルートディレクトリ
    pub context: PathBuf,
    /// ビルド後のスモークテスト定義（省略可）
    pub smoke: Option<SmokeCheck>,
}

/// ビルド済みイメージ内で実行する最小限の検証コマンド
///
/// 必須のランタイム依存が import 可能であることを確認する。
/// 終了コード 0 かつ、`expect` が指定されている場合は標準出力に
/// その文字列が含まれることで合格とする。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeCheck {
    pub cmd: Vec<String>,
    pub expect: Option<String>,
}

impl SmokeCheck {
    fn python_import(module: &str) -> Self {
        Self {
            cmd: vec![
                "python".to_string(),
                "-c".to_string(),
                format!("import {}; print('ok')", module),
            ],
            expect: Some("ok".to_string()),
        }
    }
}

/// 宣言済みターゲットの一覧（宣言順）
pub fn default_targets() -> Vec<BuildTarget> {
    vec![
        BuildTarget {
            name: "ml-api".to_string(),
            dockerfile: PathBuf::from("Dockerfile.api"),
            context: PathBuf::from("."),
            smoke: Some(SmokeCheck::python_import("torch")),
        },
        BuildTarget {
            name: "worker".to_string(),
            dockerfile: PathBuf::from("Dockerfile.worker"),
            context: PathBuf::from("."),
            smoke: Some(SmokeCheck::python_import("celery")),
        },
    ]
}

/// 名前でターゲットを検索
///
/// 未知の名前は設定エラー。副作用が起きる前に呼び出し側で報告される。
pub fn find_target(targets: &[BuildTarget], name: &str) -> Result<BuildTarget> {
    targets
        .iter()
        .find(|t| t.name == name)
        .cloned()
        .ok_or_else(|| ConfigError::UnknownTarget {
            name: name.to_string(),
            available: targets
                .iter()
                .map(|t| t.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_target_names_are_unique() {
        let targets = default_targets();
        let names: HashSet<&str> = targets.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names.len(), targets.len());
    }

    #[test]
    fn test_declared_targets() {
        let targets = default_targets();
        assert_eq!(targets.len(), 2);

        assert_eq!(targets[0].name, "ml-api");
        assert_eq!(targets[0].dockerfile, PathBuf::from("Dockerfile.api"));
        assert_eq!(targets[0].context, PathBuf::from("."));

        assert_eq!(targets[1].name, "worker");
        assert_eq!(targets[1].dockerfile, PathBuf::from("Dockerfile.worker"));
    }

    #[test]
    fn test_every_target_has_smoke_check() {
        for target in default_targets() {
            let smoke = target.smoke.expect("smoke check");
            assert_eq!(smoke.cmd[0], "python");
            assert_eq!(smoke.expect.as_deref(), Some("ok"));
        }
    }

    #[test]
    fn test_find_target_known() {
        let targets = default_targets();
        let target = find_target(&targets, "worker").unwrap();
        assert_eq!(target.name, "worker");
    }

    #[test]
    fn test_find_target_unknown() {
        let targets = default_targets();
        let result = find_target(&targets, "unknown-name");

        match result {
            Err(ConfigError::UnknownTarget { name, available }) => {
                assert_eq!(name, "unknown-name");
                assert!(available.contains("ml-api"));
                assert!(available.contains("worker"));
            }
            other => panic!("Expected UnknownTarget, got {:?}", other),
        }
    }
}
