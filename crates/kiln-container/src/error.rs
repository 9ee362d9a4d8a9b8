use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error(
        "Dockerに接続できません: {0}\n\nヒント:\n  • Dockerが起動しているか確認してください\n  • OrbStackまたはDocker Desktopがインストールされているか確認してください"
    )]
    DockerConnectionFailed(String),

    #[error(
        "イメージ '{image}' が見つかりません\n\nヒント:\n  • 先に kiln でイメージをビルドしてください\n  • --prefix の指定がビルド時と一致しているか確認してください"
    )]
    ImageNotFound { image: String },

    #[error("スモークテスト失敗 ({target}): {detail}")]
    SmokeTestFailed { target: String, detail: String },

    #[error(
        "スモークテストがタイムアウトしました ({target}, {timeout_secs}秒)\n\nヒント:\n  • イメージの起動コマンドがハングしていないか確認してください"
    )]
    SmokeTestTimeout { target: String, timeout_secs: u64 },

    #[error("Docker APIエラー: {0}")]
    DockerApiError(String),
}

impl From<bollard::errors::Error> for ContainerError {
    fn from(err: bollard::errors::Error) -> Self {
        // 接続エラーの可能性をチェック
        let err_str = err.to_string();
        if err_str.contains("Connection refused") || err_str.contains("No such file or directory")
        {
            ContainerError::DockerConnectionFailed(err_str)
        } else {
            ContainerError::DockerApiError(err_str)
        }
    }
}

pub type Result<T> = std::result::Result<T, ContainerError>;
