use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "ターゲット '{name}' が見つかりません\n\nヒント:\n  • 利用可能なターゲット: {available}\n  • --service を省略すると全ターゲットをビルドします"
    )]
    UnknownTarget { name: String, available: String },

    #[error(
        "ビルド引数 '{0}' の形式が不正です\n\nヒント:\n  • --build-arg KEY=VALUE の形式で指定してください"
    )]
    InvalidBuildArg(String),

    #[error("保持世代数は 1 以上を指定してください（指定値: {keep}）")]
    InvalidRetention { keep: usize },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
