//! 外部スキャナによる脆弱性スキャン
//!
//! ホストにインストール済みのスキャナを利用する。検出の優先順位は
//! 決定的に trivy → grype（trivy は機械可読なJSONレポートを出すため）。
//! スキャナ不在は警告にとどめ、パイプラインを失敗させることはない。

use colored::Colorize;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::process::Command;

/// ホストで利用可能な脆弱性スキャナ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scanner {
    Trivy,
    Grype,
}

/// 利用可能なスキャナを検出（優先順位: trivy → grype）
pub fn detect_scanner() -> Option<Scanner> {
    if which::which("trivy").is_ok() {
        return Some(Scanner::Trivy);
    }
    if which::which("grype").is_ok() {
        return Some(Scanner::Grype);
    }
    None
}

#[derive(Debug, Default, Deserialize)]
struct TrivyReport {
    #[serde(default, rename = "Results")]
    results: Vec<TrivyResult>,
}

#[derive(Debug, Default, Deserialize)]
struct TrivyResult {
    #[serde(default, rename = "Vulnerabilities")]
    vulnerabilities: Vec<TrivyVulnerability>,
}

#[derive(Debug, Default, Deserialize)]
struct TrivyVulnerability {
    #[serde(default, rename = "Severity")]
    severity: String,
}

/// TrivyのJSONレポートを深刻度ごとの件数に集計
fn summarize_trivy(json: &str) -> Result<BTreeMap<String, usize>, serde_json::Error> {
    let report: TrivyReport = serde_json::from_str(json)?;

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for result in report.results {
        for vuln in result.vulnerabilities {
            *counts.entry(vuln.severity).or_default() += 1;
        }
    }
    Ok(counts)
}

/// イメージをスキャンして結果を表示
///
/// スキャナの非ゼロ終了（検出あり・実行エラー）は警告として表示する。
pub fn scan_image(scanner: Scanner, image: &str) -> anyhow::Result<()> {
    println!();
    println!("{}", format!("■ {} をスキャン中...", image).blue());

    match scanner {
        Scanner::Trivy => scan_with_trivy(image),
        Scanner::Grype => scan_with_grype(image),
    }
}

fn scan_with_trivy(image: &str) -> anyhow::Result<()> {
    let output = Command::new("trivy")
        .args(["image", "--quiet", "--format", "json", image])
        .output()
        .map_err(|e| anyhow::anyhow!("trivyの実行に失敗しました: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        println!("  ⚠ trivy が異常終了しました: {}", stderr.trim());
        return Ok(());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    match summarize_trivy(&stdout) {
        Ok(counts) if counts.is_empty() => {
            println!("  ✓ 既知の脆弱性は検出されませんでした");
        }
        Ok(counts) => {
            let total: usize = counts.values().sum();
            println!("  ⚠ {} 件の脆弱性を検出:", total);
            for (severity, count) in &counts {
                println!("    • {}: {} 件", severity.yellow(), count);
            }
        }
        Err(e) => {
            println!("  ⚠ trivyレポートの解析に失敗しました: {}", e);
        }
    }

    Ok(())
}

fn scan_with_grype(image: &str) -> anyhow::Result<()> {
    // grypeは出力をそのまま端末に流す
    let status = Command::new("grype")
        .arg(image)
        .status()
        .map_err(|e| anyhow::anyhow!("grypeの実行に失敗しました: {}", e))?;

    if !status.success() {
        println!("  ⚠ grype が異常終了しました (status: {})", status);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_trivy_counts_by_severity() {
        let json = r#"{
            "Results": [
                {
                    "Vulnerabilities": [
                        {"Severity": "HIGH"},
                        {"Severity": "CRITICAL"},
                        {"Severity": "HIGH"}
                    ]
                },
                {
                    "Vulnerabilities": [
                        {"Severity": "LOW"}
                    ]
                }
            ]
        }"#;

        let counts = summarize_trivy(json).unwrap();
        assert_eq!(counts.get("HIGH"), Some(&2));
        assert_eq!(counts.get("CRITICAL"), Some(&1));
        assert_eq!(counts.get("LOW"), Some(&1));
    }

    #[test]
    fn test_summarize_trivy_clean_report() {
        // 検出なしのレポートはResultsにVulnerabilitiesキー自体がない
        let json = r#"{"Results": [{"Target": "image"}]}"#;

        let counts = summarize_trivy(json).unwrap();
        assert!(counts.is_empty());
    }

    #[test]
    fn test_summarize_trivy_invalid_json() {
        assert!(summarize_trivy("not json").is_err());
    }

    #[test]
    fn test_detect_scanner_without_path() {
        // PATHが空ならどちらのスキャナも見つからない
        temp_env::with_var("PATH", Some(""), || {
            assert_eq!(detect_scanner(), None);
        });
    }
}
