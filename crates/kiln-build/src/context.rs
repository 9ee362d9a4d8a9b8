use crate::error::{BuildError, BuildResult};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::path::Path;
use tar::Builder;

pub struct ContextBuilder;

impl ContextBuilder {
    /// ビルドコンテキストをtar.gzアーカイブとして作成
    ///
    /// Dockerfileはコンテキスト内に置かれている前提（`Dockerfile.api` 等の
    /// 命名でコンテキストルート直下）。アーカイブにはコンテキスト全体が
    /// そのまま入る。
    pub fn create_context(context_path: &Path) -> BuildResult<Vec<u8>> {
        tracing::debug!("Creating build context from: {}", context_path.display());

        let mut archive_data = Vec::new();
        {
            let encoder = GzEncoder::new(&mut archive_data, Compression::default());
            let mut tar = Builder::new(encoder);

            // コンテキストディレクトリを再帰的に追加
            tar.append_dir_all(".", context_path)
                .map_err(BuildError::Io)?;

            tar.finish().map_err(BuildError::Io)?;
        }

        tracing::debug!("Build context created: {} bytes", archive_data.len());

        Self::check_context_size(archive_data.len());

        Ok(archive_data)
    }

    /// コンテキストルートから見たDockerfileの相対パスを解決
    ///
    /// エンジンに渡す `dockerfile` パラメータはコンテキスト内の相対パス
    /// でなければならない。コンテキスト外のDockerfileは設定エラー。
    pub fn dockerfile_in_context(
        context_path: &Path,
        dockerfile_path: &Path,
    ) -> BuildResult<String> {
        let relative = dockerfile_path
            .strip_prefix(context_path)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| dockerfile_path.to_path_buf());

        if relative.is_absolute() || relative.starts_with("..") {
            return Err(BuildError::InvalidConfig(format!(
                "Dockerfile is outside the build context: {}",
                dockerfile_path.display()
            )));
        }

        Ok(relative.to_string_lossy().into_owned())
    }

    /// コンテキストサイズのチェックと警告
    fn check_context_size(size: usize) {
        const MAX_CONTEXT_SIZE: usize = 500 * 1024 * 1024; // 500MB

        if size > MAX_CONTEXT_SIZE {
            tracing::warn!(
                "警告: ビルドコンテキストが大きすぎます（{}MB）\n\
                 .dockerignoreファイルで不要なファイルを除外することを推奨します。",
                size / 1024 / 1024
            );
        }
    }
}
