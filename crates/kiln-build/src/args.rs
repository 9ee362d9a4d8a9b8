//! ビルド引数の解析と検証

use kiln_core::{ConfigError, Result};
use std::collections::HashMap;

/// `KEY=VALUE` 形式のビルド引数リストを解析
///
/// 形式不正はビルド開始前に設定エラーとして報告される。
/// 値には `=` を含んでもよい（最初の `=` で分割）。
pub fn parse_build_args(raw: &[String]) -> Result<HashMap<String, String>> {
    let mut args = HashMap::new();

    for entry in raw {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidBuildArg(entry.clone()))?;

        if key.is_empty() {
            return Err(ConfigError::InvalidBuildArg(entry.clone()));
        }

        args.insert(key.to_string(), value.to_string());
    }

    Ok(args)
}

/// ビルド引数の検証（機密情報の警告）
pub fn validate_build_arg(key: &str) {
    let sensitive_patterns = ["password", "token", "secret", "api_key", "private_key"];

    let key_lower = key.to_lowercase();
    for pattern in &sensitive_patterns {
        if key_lower.contains(pattern) {
            tracing::warn!(
                "警告: ビルド引数 '{}' は機密情報を含む可能性があります。\n\
                 ビルド引数はイメージ履歴に記録されます。\n\
                 機密情報はビルド引数ではなく、環境変数やシークレットマウントを使用してください。",
                key
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_build_args_basic() {
        let raw = vec![
            "PYTHON_VERSION=3.11".to_string(),
            "TORCH_VARIANT=cpu".to_string(),
        ];

        let args = parse_build_args(&raw).unwrap();
        assert_eq!(args.len(), 2);
        assert_eq!(args.get("PYTHON_VERSION").map(String::as_str), Some("3.11"));
        assert_eq!(args.get("TORCH_VARIANT").map(String::as_str), Some("cpu"));
    }

    #[test]
    fn test_parse_build_args_value_with_equals() {
        let raw = vec!["PIP_INDEX_URL=https://example.com/simple?x=1".to_string()];

        let args = parse_build_args(&raw).unwrap();
        assert_eq!(
            args.get("PIP_INDEX_URL").map(String::as_str),
            Some("https://example.com/simple?x=1")
        );
    }

    #[test]
    fn test_parse_build_args_empty_value() {
        let raw = vec!["DEBUG=".to_string()];

        let args = parse_build_args(&raw).unwrap();
        assert_eq!(args.get("DEBUG").map(String::as_str), Some(""));
    }

    #[test]
    fn test_parse_build_args_missing_equals() {
        let raw = vec!["NOVALUE".to_string()];

        let result = parse_build_args(&raw);
        assert!(matches!(result, Err(ConfigError::InvalidBuildArg(_))));
    }

    #[test]
    fn test_parse_build_args_empty_key() {
        let raw = vec!["=value".to_string()];

        let result = parse_build_args(&raw);
        assert!(matches!(result, Err(ConfigError::InvalidBuildArg(_))));
    }
}
