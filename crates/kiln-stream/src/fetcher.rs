//! 署名付きURLに対する Range フェッチ
//!
//! ログオブジェクトの一部（または全体）を1回のGETで取得する層。
//! フェッチ間で状態は一切保持しない。リトライ判断は上位の
//! ResumableStream が行い、ここではエラーの分類だけを担当する。

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::StatusCode;
use reqwest::header::{CONTENT_RANGE, RANGE};

use crate::error::{Result, StreamError};

/// ログオブジェクトへの読み取りアクセスを許可する短命の署名付きURL
///
/// ビルドサービスがリクエストごとに発行し、サーバー側で期限切れになる。
/// プロセスをまたいでキャッシュしてはいけない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedLogLocation(String);

impl SignedLogLocation {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// ログがまだ無いビルドに対してサービスが空のリンクを返すことがある
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

/// リモートオブジェクトのバイト範囲。`count: None` は「offset から末尾まで」
///
/// 不変条件: 両端が既知の場合 `offset + count <= オブジェクト長`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub count: Option<u64>,
}

impl ByteRange {
    pub fn from_offset(offset: u64) -> Self {
        Self {
            offset,
            count: None,
        }
    }

    /// HTTP `Range` ヘッダ値に変換
    pub fn header_value(&self) -> String {
        match self.count {
            Some(count) => {
                debug_assert!(count > 0, "空の範囲はリクエストできない");
                format!("bytes={}-{}", self.offset, self.offset + count - 1)
            }
            None => format!("bytes={}-", self.offset),
        }
    }
}

/// 1回のフェッチ応答のボディ（チャンク列）
pub type ChunkBody = BoxStream<'static, Result<Bytes>>;

/// 1回の Range フェッチの結果
pub struct FetchResult {
    /// 応答ボディ。読み取り中のエラーは `Transient` として流れてくる
    pub body: ChunkBody,
    /// ストアが今回の呼び出しで報告したオブジェクト全長
    ///
    /// 同一オブジェクトに対する全フェッチで安定している。最初に成功した
    /// 呼び出しの値が正とされ、以後サイズ確認のためだけの再問い合わせは
    /// 行わない。
    pub total_length: u64,
    /// ストアが Range リクエストを尊重したかどうか
    pub range_honored: bool,
}

/// 署名付きURLへの単発 Range GET
///
/// 1回のネットワーク往復のみを行い、呼び出し間で状態を持たない。
/// 失敗は `Transient`（リトライ可）、`AuthExpired` / `NotFound`（致命的）
/// のいずれかに分類して返す。
#[async_trait]
pub trait RangeFetcher: Send + Sync {
    async fn fetch(&self, location: &SignedLogLocation, range: ByteRange) -> Result<FetchResult>;
}

#[async_trait]
impl<F: RangeFetcher + ?Sized> RangeFetcher for std::sync::Arc<F> {
    async fn fetch(&self, location: &SignedLogLocation, range: ByteRange) -> Result<FetchResult> {
        (**self).fetch(location, range).await
    }
}

/// HTTP フェッチャの設定
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    /// 1フェッチあたりの読み取りタイムアウト
    ///
    /// ストリーミングは全体の壁時計時間では縛らず、フェッチ単位の
    /// タイムアウトとリトライ上限で制御する。
    pub read_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// reqwest による RangeFetcher 実装
pub struct HttpRangeFetcher {
    client: reqwest::Client,
}

impl HttpRangeFetcher {
    pub fn new() -> Result<Self> {
        Self::with_config(HttpFetcherConfig::default())
    }

    pub fn with_config(config: HttpFetcherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .build()
            .map_err(|e| StreamError::Unexpected(format!("HTTPクライアントの構築に失敗: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RangeFetcher for HttpRangeFetcher {
    async fn fetch(&self, location: &SignedLogLocation, range: ByteRange) -> Result<FetchResult> {
        // URLは署名付きの機密情報なのでログには範囲だけを出す
        tracing::debug!("ログオブジェクトをフェッチ: {}", range.header_value());

        let response = self
            .client
            .get(location.as_str())
            .header(RANGE, range.header_value())
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        match status {
            StatusCode::OK | StatusCode::PARTIAL_CONTENT => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(StreamError::AuthExpired(format!("ストア応答 {status}")));
            }
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                return Err(StreamError::NotFound(format!("ストア応答 {status}")));
            }
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(StreamError::Transient(format!("ストア応答 {status}")));
            }
            s if s.is_server_error() => {
                return Err(StreamError::Transient(format!("ストア応答 {s}")));
            }
            s => {
                return Err(StreamError::Unexpected(format!("ストア応答 {s}")));
            }
        }

        // 200はRange無視（全体送信）。offset 0 のリクエストなら実質的に
        // 要求どおりなので honored とみなす。
        let range_honored = status == StatusCode::PARTIAL_CONTENT || range.offset == 0;

        let total_length = if status == StatusCode::PARTIAL_CONTENT {
            content_range_total(&response)?
        } else {
            response.content_length().ok_or_else(|| {
                StreamError::Unexpected("ストア応答に Content-Length がありません".to_string())
            })?
        };

        let body = response
            .bytes_stream()
            .map_err(|e| StreamError::Transient(format!("ボディ読み取りに失敗: {e}")))
            .boxed();

        Ok(FetchResult {
            body,
            total_length,
            range_honored,
        })
    }
}

/// `Content-Range: bytes 0-4999/10000` からオブジェクト全長を取り出す
fn content_range_total(response: &reqwest::Response) -> Result<u64> {
    let header = response
        .headers()
        .get(CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            StreamError::Unexpected("206応答に Content-Range がありません".to_string())
        })?;
    header
        .rsplit('/')
        .next()
        .and_then(|total| total.parse().ok())
        .ok_or_else(|| StreamError::Unexpected(format!("Content-Range を解釈できません: {header}")))
}

fn classify_request_error(err: reqwest::Error) -> StreamError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        StreamError::Transient(err.to_string())
    } else {
        StreamError::Unexpected(err.to_string())
    }
}
