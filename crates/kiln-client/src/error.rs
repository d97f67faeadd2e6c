//! ビルドサービスクライアントのエラー型

use std::path::PathBuf;

use thiserror::Error;

use crate::model::BuildStatus;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTPリクエストに失敗しました: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ビルドサービスがエラーを返しました ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("認証情報ファイルが見つかりません: {0}")]
    CredentialFileNotFound(PathBuf),

    #[error("認証情報ファイル {path} を解釈できません: {source}")]
    CredentialFileInvalid {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("認証情報ファイル {path} に {field} がありません")]
    MissingCredential { path: PathBuf, field: &'static str },

    #[error("ビルドの投入が拒否されました: {0}")]
    BuildSubmission(String),

    #[error("ビルド {build_id} が {timeout_secs} 秒以内に完了しませんでした")]
    BuildTimeout { build_id: String, timeout_secs: u64 },

    #[error("ビルド {build_id} は {status} で終了しました")]
    BuildFailed {
        build_id: String,
        status: BuildStatus,
    },

    #[error("ビルド {0} のログリンクがありません")]
    LogLinkUnavailable(String),

    #[error("応答ボディを解釈できません: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
