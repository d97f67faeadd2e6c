//! ビルドサービス管理APIクライアント
//!
//! ビルドの投入・完了待ち・一覧・ログリンク解決を提供する。コントロール
//! プレーン呼び出しはすべて60秒のリクエストタイムアウトの下で行う。
//! ログ本体のダウンロードはここではなく kiln-stream が担当する。

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use kiln_stream::{LogSource, SignedLogLocation, StreamError};

use crate::auth::Credentials;
use crate::error::{ClientError, Result};
use crate::model::{
    BuildHandle, BuildPage, BuildResult, BuildSpec, BuildStatus, BuildSummary, ListFilter,
};

pub const DEFAULT_ENDPOINT: &str = "https://api.kilnbuild.dev";

const CONTROL_PLANE_TIMEOUT: Duration = Duration::from_secs(60);
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// ログリンク応答
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogLink {
    #[serde(default)]
    log_link: Option<String>,
}

/// ビルドリソースを操作するクライアント
pub struct BuildsClient {
    client: reqwest::Client,
    endpoint: String,
    access_token: String,
    subscription_id: String,
}

impl BuildsClient {
    pub fn new(credentials: Credentials) -> Result<Self> {
        let endpoint = credentials
            .endpoint
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let client = reqwest::Client::builder()
            .timeout(CONTROL_PLANE_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            endpoint,
            access_token: credentials.access_token,
            subscription_id: credentials.subscription_id,
        })
    }

    fn builds_url(&self, resource_group: &str, registry: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/registries/{}/builds",
            self.endpoint, self.subscription_id, resource_group, registry
        )
    }

    /// クイックビルドをキューに投入する
    pub async fn submit_build(
        &self,
        resource_group: &str,
        registry: &str,
        spec: &BuildSpec,
    ) -> Result<BuildHandle> {
        let url = self.builds_url(resource_group, registry);
        tracing::debug!("ビルドを投入: {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(spec)
            .send()
            .await?;
        let response = check(response).await.map_err(|err| match err {
            ClientError::Api { status, message } => {
                ClientError::BuildSubmission(format!("{status}: {message}"))
            }
            other => other,
        })?;

        Ok(response.json::<BuildHandle>().await?)
    }

    /// 単一ビルドの現在のメタデータを取得する
    pub async fn get_build(
        &self,
        resource_group: &str,
        registry: &str,
        build_id: &str,
    ) -> Result<BuildSummary> {
        let url = format!("{}/{}", self.builds_url(resource_group, registry), build_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let response = check(response).await?;
        Ok(response.json::<BuildSummary>().await?)
    }

    /// ビルドが終端ステータスに到達するまでポーリングで待機する
    ///
    /// `deadline` を超えると `BuildTimeout`、Succeeded 以外で終了すると
    /// `BuildFailed` を返す。
    pub async fn await_completion(
        &self,
        resource_group: &str,
        registry: &str,
        handle: &BuildHandle,
        deadline: Duration,
    ) -> Result<BuildResult> {
        let started = Instant::now();
        loop {
            let summary = self
                .get_build(resource_group, registry, &handle.build_id)
                .await?;
            if summary.status.is_terminal() {
                if summary.status != BuildStatus::Succeeded {
                    return Err(ClientError::BuildFailed {
                        build_id: summary.build_id,
                        status: summary.status,
                    });
                }
                return Ok(BuildResult {
                    build_id: summary.build_id,
                    status: summary.status,
                    finish_time: summary.finish_time,
                });
            }
            if started.elapsed() >= deadline {
                return Err(ClientError::BuildTimeout {
                    build_id: handle.build_id.clone(),
                    timeout_secs: deadline.as_secs(),
                });
            }
            tracing::debug!(
                "ビルド {} は {} 。{:?} 後に再確認",
                handle.build_id,
                summary.status,
                POLL_INTERVAL
            );
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// ビルド一覧を1ページ取得する
    pub async fn list_builds(
        &self,
        resource_group: &str,
        registry: &str,
        filter: &ListFilter,
        page_size: u32,
        continuation: Option<&str>,
    ) -> Result<BuildPage> {
        let mut request = self
            .client
            .get(self.builds_url(resource_group, registry))
            .bearer_auth(&self.access_token)
            .query(&[("top", page_size.to_string())]);
        if let Some(status) = filter.status {
            request = request.query(&[("status", status.to_string())]);
        }
        if let Some(token) = continuation {
            request = request.query(&[("continuationToken", token)]);
        }

        let response = check(request.send().await?).await?;
        Ok(response.json::<BuildPage>().await?)
    }

    /// ビルドのログオブジェクトへの署名付きURLを取得する
    ///
    /// 署名付きURLはリクエストごとに発行される短命のものなので、
    /// 取得したら即座に使うこと。
    pub async fn get_log_location(
        &self,
        resource_group: &str,
        registry: &str,
        build_id: &str,
    ) -> Result<SignedLogLocation> {
        let url = format!(
            "{}/{}/listLogUrl",
            self.builds_url(resource_group, registry),
            build_id
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::LogLinkUnavailable(build_id.to_string()));
        }
        let response = check(response).await?;

        let link = response.json::<LogLink>().await?;
        match link.log_link {
            Some(url) if !url.trim().is_empty() => Ok(SignedLogLocation::new(url)),
            // ログがまだ無いビルドは空リンクで返ってくる
            _ => Err(ClientError::LogLinkUnavailable(build_id.to_string())),
        }
    }
}

/// エラー応答を `ClientError::Api` に変換する
async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

/// 1つのレジストリにスコープした、パイプライン用のログリンク解決器
pub struct RegistryLogSource<'a> {
    client: &'a BuildsClient,
    resource_group: String,
    registry: String,
}

impl<'a> RegistryLogSource<'a> {
    pub fn new(
        client: &'a BuildsClient,
        resource_group: impl Into<String>,
        registry: impl Into<String>,
    ) -> Self {
        Self {
            client,
            resource_group: resource_group.into(),
            registry: registry.into(),
        }
    }
}

#[async_trait]
impl LogSource for RegistryLogSource<'_> {
    async fn log_location(&self, build_id: &str) -> kiln_stream::Result<SignedLogLocation> {
        self.client
            .get_log_location(&self.resource_group, &self.registry, build_id)
            .await
            .map_err(|err| match err {
                ClientError::LogLinkUnavailable(_) => StreamError::LogLinkUnavailable,
                ClientError::Http(e) => StreamError::Transient(e.to_string()),
                other => StreamError::Unexpected(other.to_string()),
            })
    }
}
