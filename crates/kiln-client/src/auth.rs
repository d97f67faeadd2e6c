//! 認証情報の発見
//!
//! 管理APIのアクセストークンとサブスクリプションIDをJSONファイルから
//! 読み込む。ファイルの場所は明示的なパラメータで、プロセス環境変数を
//! 書き換えるような迂回はしない。デフォルトは `~/.kiln/credentials.json`。

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ClientError, Result};

/// credentials.json の構造
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    /// 管理APIのBearerトークン
    pub access_token: String,
    pub subscription_id: String,
    /// 管理APIエンドポイントの上書き（通常は未設定）
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// 認証情報ファイルの読み込み元
#[derive(Debug)]
pub struct CredentialStore {
    path: PathBuf,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore {
    /// デフォルトの `~/.kiln/credentials.json` を使用
    pub fn new() -> Self {
        let path = dirs::home_dir()
            .map(|h| h.join(".kiln"))
            .unwrap_or_else(|| PathBuf::from(".kiln"))
            .join("credentials.json");
        Self { path }
    }

    /// 指定したパスのファイルを使用
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 認証情報を読み込んで検証する
    pub fn load(&self) -> Result<Credentials> {
        if !self.path.exists() {
            return Err(ClientError::CredentialFileNotFound(self.path.clone()));
        }
        let raw = std::fs::read_to_string(&self.path)?;
        let credentials: Credentials =
            serde_json::from_str(&raw).map_err(|source| ClientError::CredentialFileInvalid {
                path: self.path.clone(),
                source,
            })?;

        if credentials.access_token.trim().is_empty() {
            return Err(ClientError::MissingCredential {
                path: self.path.clone(),
                field: "accessToken",
            });
        }
        if credentials.subscription_id.trim().is_empty() {
            return Err(ClientError::MissingCredential {
                path: self.path.clone(),
                field: "subscriptionId",
            });
        }

        tracing::debug!("認証情報を読み込み: {}", self.path.display());
        Ok(credentials)
    }
}
