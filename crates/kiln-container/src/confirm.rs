//! 破壊的操作の確認ゲート
//!
//! 対話プロンプトを注入可能なケイパビリティとして切り出してある。
//! テストでは常に拒否/常に承認の実装に差し替えられる。

use std::io::Write;

/// 肯定応答の判定
///
/// `y` / `yes`（大文字小文字を区別しない）のみを肯定とみなす。
/// 空入力を含むそれ以外の入力はすべて拒否。
pub fn is_affirmative(input: &str) -> bool {
    matches!(input.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// 実行確認のケイパビリティ
pub trait Confirmation {
    fn confirm(&self, prompt: &str) -> bool;
}

/// 標準入力から1行読んで確認する実装
///
/// タイムアウトなしで1行の入力を待つ。デフォルトは「いいえ」。
pub struct StdinConfirmation;

impl Confirmation for StdinConfirmation {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{} [y/N]: ", prompt);
        if std::io::stdout().flush().is_err() {
            return false;
        }

        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(_) => is_affirmative(&line),
            Err(_) => false,
        }
    }
}

/// 常に拒否するテスト用実装
pub struct AlwaysDeny;

impl Confirmation for AlwaysDeny {
    fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}

/// 常に承認するテスト用実装
pub struct AlwaysConfirm;

impl Confirmation for AlwaysConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_affirmative_yes_variants() {
        assert!(is_affirmative("y"));
        assert!(is_affirmative("Y"));
        assert!(is_affirmative("yes"));
        assert!(is_affirmative("YES"));
        assert!(is_affirmative("  yes\n"));
    }

    #[test]
    fn test_is_affirmative_rejects_everything_else() {
        // 空入力を含む非肯定入力はすべて拒否
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("\n"));
        assert!(!is_affirmative("n"));
        assert!(!is_affirmative("no"));
        assert!(!is_affirmative("はい"));
        assert!(!is_affirmative("yep"));
        assert!(!is_affirmative("y es"));
    }

    #[test]
    fn test_test_doubles() {
        assert!(!AlwaysDeny.confirm("本当に削除しますか?"));
        assert!(AlwaysConfirm.confirm("本当に削除しますか?"));
    }
}
