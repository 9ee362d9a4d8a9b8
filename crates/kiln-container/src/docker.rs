use colored::Colorize;

/// Docker接続を初期化（エラーハンドリング付き）
pub async fn init_docker_with_error_handling() -> anyhow::Result<bollard::Docker> {
    match bollard::Docker::connect_with_local_defaults() {
        Ok(docker) => {
            // 接続テスト
            match docker.ping().await {
                Ok(_) => Ok(docker),
                Err(e) => {
                    print_connection_help(&e);
                    Err(anyhow::anyhow!("Docker接続に失敗しました"))
                }
            }
        }
        Err(e) => {
            print_connection_help(&e);
            Err(anyhow::anyhow!("Docker接続に失敗しました"))
        }
    }
}

fn print_connection_help(e: &bollard::errors::Error) {
    eprintln!();
    eprintln!("{}", "✗ Docker接続エラー".red().bold());
    eprintln!();
    eprintln!("{}", "原因:".yellow());
    eprintln!("  {}", e);
    eprintln!();
    eprintln!("{}", "解決方法:".yellow());
    eprintln!("  • Dockerが起動しているか確認してください");
    eprintln!("  • OrbStackまたはDocker Desktopがインストールされているか確認してください");
    eprintln!("  • docker ps コマンドが正常に動作するか確認してください");
}
