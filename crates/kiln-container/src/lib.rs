//! Kiln のコンテナライフサイクル機能
//!
//! Docker 接続、リソースクリーンアップ、スモークテスト、
//! 破壊的操作の確認ゲートを提供します。

pub mod cleaner;
pub mod confirm;
pub mod docker;
pub mod error;
pub mod smoke;

pub use cleaner::{CleanupScope, ResourceCleaner};
pub use confirm::{AlwaysConfirm, AlwaysDeny, Confirmation, StdinConfirmation, is_affirmative};
pub use docker::init_docker_with_error_handling;
pub use error::{ContainerError, Result};
pub use smoke::SmokeTester;
