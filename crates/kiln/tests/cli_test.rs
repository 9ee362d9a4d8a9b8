#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! へ移行

use assert_cmd::Command;
use predicates::prelude::*;

/// CLIヘルプが正しく表示されることを確認
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("kiln").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--service"))
        .stdout(predicate::str::contains("--parallel"))
        .stdout(predicate::str::contains("--cleanup"))
        .stdout(predicate::str::contains("--test"))
        .stdout(predicate::str::contains("--security-scan"))
        .stdout(predicate::str::contains("--build-arg"));
}

/// 不明なフラグでエラーになることを確認（使用方法も表示される）
#[test]
fn test_unknown_flag() {
    let mut cmd = Command::cargo_bin("kiln").unwrap();
    cmd.arg("--frobnicate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unexpected argument"))
        .stderr(predicate::str::contains("Usage"));
}

/// 未知のターゲット名は設定エラーになることを確認
/// （Docker接続前に中断されるため、デーモン不要で動く）
#[test]
fn test_unknown_service_aborts_before_build() {
    let mut cmd = Command::cargo_bin("kiln").unwrap();
    cmd.arg("--service")
        .arg("unknown-name")
        .assert()
        .failure()
        .stderr(predicate::str::contains("ターゲット 'unknown-name' が見つかりません"));
}

/// 形式不正なビルド引数は設定エラーになることを確認
#[test]
fn test_invalid_build_arg() {
    let mut cmd = Command::cargo_bin("kiln").unwrap();
    cmd.arg("--service")
        .arg("ml-api")
        .arg("--build-arg")
        .arg("NOVALUE")
        .assert()
        .failure()
        .stderr(predicate::str::contains("ビルド引数"));
}

/// 保持世代数0は拒否されることを確認
#[test]
fn test_keep_zero_rejected() {
    let mut cmd = Command::cargo_bin("kiln").unwrap();
    cmd.arg("--cleanup")
        .arg("--keep")
        .arg("0")
        .assert()
        .failure();
}

/// kiln-cleanのヘルプが正しく表示されることを確認
#[test]
fn test_clean_help() {
    let mut cmd = Command::cargo_bin("kiln-clean").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--all"))
        .stdout(predicate::str::contains("--volumes"))
        .stdout(predicate::str::contains("--images"))
        .stdout(predicate::str::contains("--containers"))
        .stdout(predicate::str::contains("--everything"));
}

/// 範囲フラグは同時指定できないことを確認
#[test]
fn test_clean_conflicting_scopes() {
    let mut cmd = Command::cargo_bin("kiln-clean").unwrap();
    cmd.arg("--volumes")
        .arg("--images")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

/// kiln-cleanも不明なフラグでエラーになることを確認
#[test]
fn test_clean_unknown_flag() {
    let mut cmd = Command::cargo_bin("kiln-clean").unwrap();
    cmd.arg("--images")
        .arg("--frobnicate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unexpected argument"));
}
