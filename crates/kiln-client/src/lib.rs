//! Kiln ビルドサービスクライアント
//!
//! リモートのコンテナイメージビルドサービスの管理APIに対する
//! コラボレータ。ビルドの投入・完了待ち・一覧・ログリンク解決と、
//! 認証情報ファイルの読み込みを提供する。

pub mod auth;
pub mod client;
pub mod error;
pub mod model;

// Re-exports
pub use auth::{CredentialStore, Credentials};
pub use client::{BuildsClient, DEFAULT_ENDPOINT, RegistryLogSource};
pub use error::{ClientError, Result};
pub use model::{
    BuildArgument, BuildHandle, BuildPage, BuildResult, BuildSpec, BuildStatus, BuildSummary,
    ListFilter, PlatformProperties, QuickBuildSpec,
};
