//! Kiln のコア設定モデル
//!
//! ビルドターゲットの静的テーブル、イメージタグ、保持ポリシーなど、
//! Docker に依存しない設定データを提供します。

pub mod error;
pub mod target;

pub use error::{ConfigError, Result};
pub use target::{BuildTarget, SmokeCheck, default_targets, find_target};

/// イメージリポジトリの命名プレフィックスを持つ実行時設定
///
/// 生成されるイメージはすべて `{prefix}/{target}` リポジトリに属する。
/// プレフィックスはこのシステムが起動するコンテナのプロジェクトラベル
/// としても使われる。
#[derive(Debug, Clone)]
pub struct Config {
    pub prefix: String,
}

impl Config {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// ターゲットのイメージリポジトリ名 (`{prefix}/{name}`)
    pub fn repository(&self, target_name: &str) -> String {
        format!("{}/{}", self.prefix, target_name)
    }
}

/// イメージに付与されるタグ (`repository:tag`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTag {
    pub repository: String,
    pub tag: String,
}

impl ImageTag {
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
        }
    }

    /// `repository:tag` 形式の完全参照
    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

impl std::fmt::Display for ImageTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

/// ターゲットごとのイメージ保持ポリシー
///
/// ターゲット単位で独立に適用される。ターゲットをまたいだ
/// イメージ一覧のマージは行わない。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// 保持する世代数（1 以上）
    pub keep: usize,
}

impl RetentionPolicy {
    pub fn new(keep: usize) -> Result<Self> {
        if keep == 0 {
            return Err(ConfigError::InvalidRetention { keep });
        }
        Ok(Self { keep })
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { keep: 3 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_format() {
        let config = Config::new("ml-challenge");
        assert_eq!(config.repository("ml-api"), "ml-challenge/ml-api");
    }

    #[test]
    fn test_image_tag_reference() {
        let tag = ImageTag::new("ml-challenge/worker", "latest");
        assert_eq!(tag.reference(), "ml-challenge/worker:latest");
        assert_eq!(tag.to_string(), "ml-challenge/worker:latest");
    }

    #[test]
    fn test_retention_policy_default() {
        assert_eq!(RetentionPolicy::default().keep, 3);
    }

    #[test]
    fn test_retention_policy_rejects_zero() {
        let result = RetentionPolicy::new(0);
        assert!(matches!(result, Err(ConfigError::InvalidRetention { .. })));
    }

    #[test]
    fn test_retention_policy_accepts_one() {
        assert_eq!(RetentionPolicy::new(1).unwrap().keep, 1);
    }
}
