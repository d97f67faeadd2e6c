//! ログ取得パイプライン
//!
//! 署名付きURLの解決 → ResumableStream 構築 → ProgressReporter で包む →
//! 終端か致命的エラーまで出力先へコピー、という流れを束ねる。
//! パイプライン自身はリトライしない。リトライはストリーム内部の責務で、
//! ここは終端状態にだけ反応する。

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{Result, StreamError};
use crate::fetcher::{RangeFetcher, SignedLogLocation};
use crate::progress::ProgressReporter;
use crate::stream::{ByteSource, ResumableStream, RetryConfig};

/// ビルドIDから署名付きログURLを解決する外部コラボレータ
///
/// ビルドサービスクライアント側で実装する。リンクが存在しない場合は
/// `LogLinkUnavailable` を返すこと。
#[async_trait]
pub trait LogSource: Send + Sync {
    async fn log_location(&self, build_id: &str) -> Result<SignedLogLocation>;
}

/// ログダウンロードのオーケストレータ
pub struct LogPipeline<F: RangeFetcher> {
    fetcher: F,
    retry: RetryConfig,
}

impl<F: RangeFetcher> LogPipeline<F> {
    pub fn new(fetcher: F) -> Self {
        Self::with_retry(fetcher, RetryConfig::default())
    }

    pub fn with_retry(fetcher: F, retry: RetryConfig) -> Self {
        Self { fetcher, retry }
    }

    /// ビルドのログを `sink` へ流し込み、書き込んだバイト数を返す
    ///
    /// 進捗コールバックはチャンクが届くたびに同期的に呼ばれる。
    /// 致命的エラー時、書き込み済みのバイトはそのまま残る
    /// （ロールバックしない）。
    pub async fn run<W>(
        self,
        source: &dyn LogSource,
        build_id: &str,
        sink: &mut W,
        on_progress: impl FnMut(u64, u64) + Send,
    ) -> Result<u64>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let location = source.log_location(build_id).await?;
        if location.is_blank() {
            // 空リンクならネットワークに出る前に打ち切る
            return Err(StreamError::LogLinkUnavailable);
        }
        tracing::debug!("ビルド {} のログリンクを解決", build_id);

        let stream = ResumableStream::with_retry(self.fetcher, location, self.retry);
        let mut stream = ProgressReporter::new(stream, on_progress);

        let mut written = 0u64;
        while let Some(chunk) = stream.next_chunk().await? {
            sink.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        sink.flush().await?;

        tracing::debug!("ビルド {} のログ {} バイトを出力", build_id, written);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedFetch, ScriptedFetcher, fast_retry, ok_chunk, patterned};
    use std::sync::Arc;

    struct FixedSource(Result<SignedLogLocation>);

    #[async_trait]
    impl LogSource for FixedSource {
        async fn log_location(&self, _build_id: &str) -> Result<SignedLogLocation> {
            match &self.0 {
                Ok(location) => Ok(location.clone()),
                Err(StreamError::LogLinkUnavailable) => Err(StreamError::LogLinkUnavailable),
                Err(err) => Err(StreamError::Unexpected(err.to_string())),
            }
        }
    }

    /// 空のログリンクはネットワークフェッチ0回で LogLinkUnavailable になる
    #[tokio::test]
    async fn blank_location_fails_without_any_fetch() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![]));
        let pipeline = LogPipeline::with_retry(Arc::clone(&fetcher), fast_retry(3));
        let source = FixedSource(Ok(SignedLogLocation::new("   ")));
        let mut sink = Vec::new();

        let err = pipeline
            .run(&source, "build-1", &mut sink, |_, _| {})
            .await
            .unwrap_err();

        assert!(matches!(err, StreamError::LogLinkUnavailable));
        assert_eq!(fetcher.calls(), 0);
        assert!(sink.is_empty());
    }

    /// リンク解決自体の失敗も伝播し、フェッチは発行されない
    #[tokio::test]
    async fn source_error_propagates_without_fetch() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![]));
        let pipeline = LogPipeline::with_retry(Arc::clone(&fetcher), fast_retry(3));
        let source = FixedSource(Err(StreamError::LogLinkUnavailable));
        let mut sink = Vec::new();

        let err = pipeline
            .run(&source, "build-2", &mut sink, |_, _| {})
            .await
            .unwrap_err();

        assert!(matches!(err, StreamError::LogLinkUnavailable));
        assert_eq!(fetcher.calls(), 0);
    }

    /// リトライ境界をまたいでも sink には全バイトが順序どおり
    /// ちょうど一度だけ書かれ、進捗イベントが流れることを確認
    #[tokio::test]
    async fn drains_all_bytes_into_sink_with_progress() {
        let data = patterned(5, 10_000);
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            ScriptedFetch::Body {
                total: 10_000,
                range_honored: true,
                chunks: vec![ok_chunk(&data[..5_000])],
            },
            ScriptedFetch::Body {
                total: 10_000,
                range_honored: true,
                chunks: vec![ok_chunk(&data[5_000..])],
            },
        ]));
        let pipeline = LogPipeline::with_retry(Arc::clone(&fetcher), fast_retry(3));
        let source = FixedSource(Ok(SignedLogLocation::new("https://store.example/log?sig=x")));
        let mut sink = Vec::new();
        let mut events: Vec<(u64, u64)> = Vec::new();

        let written = pipeline
            .run(&source, "build-3", &mut sink, |delivered, total| {
                events.push((delivered, total));
            })
            .await
            .unwrap();

        assert_eq!(written, 10_000);
        assert_eq!(sink, data);
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(events.last(), Some(&(10_000, 10_000)));
        for window in events.windows(2) {
            assert!(window[0].0 <= window[1].0);
        }
    }

    /// 致命的エラーで途中終了しても、書き込み済みバイトは残る
    #[tokio::test]
    async fn partial_output_is_left_in_place_on_abort() {
        let data = patterned(9, 6);
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            ScriptedFetch::Body {
                total: 12,
                range_honored: true,
                chunks: vec![ok_chunk(&data)],
            },
            ScriptedFetch::Fail(StreamError::AuthExpired("期限切れ".to_string())),
        ]));
        let pipeline = LogPipeline::with_retry(Arc::clone(&fetcher), fast_retry(3));
        let source = FixedSource(Ok(SignedLogLocation::new("https://store.example/log?sig=x")));
        let mut sink = Vec::new();

        let err = pipeline
            .run(&source, "build-4", &mut sink, |_, _| {})
            .await
            .unwrap_err();

        assert!(matches!(err, StreamError::AuthExpired(_)));
        assert_eq!(sink, data);
    }
}
