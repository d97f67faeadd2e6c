//! テスト用のスクリプト化フェッチャ
//!
//! ネットワークに出ずに RangeFetcher の振る舞いを台本どおりに再現する。
//! 要求された範囲を記録するので、再開オフセットの検証に使える。

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;

use crate::error::{Result, StreamError};
use crate::fetcher::{ByteRange, FetchResult, RangeFetcher, SignedLogLocation};
use crate::stream::RetryConfig;

/// 1回の fetch 呼び出しへの台本
pub(crate) enum ScriptedFetch {
    /// フェッチは成功し、このチャンク列をボディとして流す
    Body {
        total: u64,
        range_honored: bool,
        chunks: Vec<Result<Bytes>>,
    },
    /// フェッチ呼び出し自体が失敗する
    Fail(StreamError),
}

pub(crate) struct ScriptedFetcher {
    script: Mutex<VecDeque<ScriptedFetch>>,
    requested: Mutex<Vec<ByteRange>>,
}

impl ScriptedFetcher {
    pub(crate) fn new(script: Vec<ScriptedFetch>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// これまでに要求された範囲（呼び出し順）
    pub(crate) fn requested_ranges(&self) -> Vec<ByteRange> {
        self.requested.lock().unwrap().clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.requested.lock().unwrap().len()
    }
}

#[async_trait]
impl RangeFetcher for ScriptedFetcher {
    async fn fetch(&self, _location: &SignedLogLocation, range: ByteRange) -> Result<FetchResult> {
        self.requested.lock().unwrap().push(range);
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .expect("台本の範囲を超えて fetch が呼ばれた");
        match next {
            ScriptedFetch::Fail(err) => Err(err),
            ScriptedFetch::Body {
                total,
                range_honored,
                chunks,
            } => Ok(FetchResult {
                body: futures_util::stream::iter(chunks).boxed(),
                total_length: total,
                range_honored,
            }),
        }
    }
}

/// 成功チャンク
pub(crate) fn ok_chunk(data: &[u8]) -> Result<Bytes> {
    Ok(Bytes::copy_from_slice(data))
}

/// 決定的なテストデータ（オフセット依存のパターンなので重複・欠落が
/// 内容ずれとして検出できる）
pub(crate) fn patterned(seed: u8, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u64).wrapping_mul(31).wrapping_add(seed as u64) as u8)
        .collect()
}

/// テストを待たせないリトライ設定
pub(crate) fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
        backoff_multiplier: 2.0,
    }
}
