//! 再開可能なログストリーム
//!
//! RangeFetcher を包み、途中で切れても最後に届けた位置から Range で
//! 再開する pull 型のバイト列。呼び出し元からはリトライは見えず、
//! 常に「次の論理的な位置のバイト」か終端シグナルだけが返る。
//!
//! 状態遷移: `Idle → Streaming → {Completed | Exhausted | Aborted}`
//!
//! ログは数MBから数GBになり得て、リモートストアは長命コネクションに
//! 読み取りタイムアウトを課す。サーバー側 Range で再開できないと
//! ネットワークの瞬断のたびに全量やり直しになるため、バイト精度の
//! 再開が必須になる。

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::time::sleep;

use crate::error::{Result, StreamError};
use crate::fetcher::{ByteRange, ChunkBody, RangeFetcher, SignedLogLocation};

/// 一時的なフェッチ失敗に対するリトライ設定
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 許容する連続失敗回数。この回数に達した時点で打ち切る
    pub max_retries: u32,
    /// 初回リトライまでの待機時間
    pub initial_delay: Duration,
    /// 待機時間の上限
    pub max_delay: Duration,
    /// Exponential backoff の倍率
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 4,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// `attempt` 回目（1始まり）のリトライ前の待機時間
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self
            .backoff_multiplier
            .powi(attempt.saturating_sub(1) as i32);
        self.initial_delay.mul_f64(exp).min(self.max_delay)
    }
}

/// ストリーム内部のカーソル。ストリームインスタンスが排他的に所有し、
/// タスク間で共有されない。
#[derive(Debug, Default)]
struct StreamCursor {
    /// 呼び出し元に届けた累計バイト数。再開フェッチは常にこの位置から
    bytes_delivered: u64,
    /// 連続した一時的失敗の回数。チャンク配送に成功するとリセット
    retries_used: u32,
}

/// 終端失敗の種別。2回目以降の pull でも同じ条件を報告できるよう
/// フェッチを再発行せずに保持する。
#[derive(Debug, Clone)]
enum TerminalFailure {
    AuthExpired(String),
    NotFound(String),
    Exhausted { attempts: u32, last: String },
    RangeNotSupported { offset: u64 },
    Unexpected(String),
}

impl TerminalFailure {
    fn to_error(&self) -> StreamError {
        match self {
            TerminalFailure::AuthExpired(msg) => StreamError::AuthExpired(msg.clone()),
            TerminalFailure::NotFound(msg) => StreamError::NotFound(msg.clone()),
            TerminalFailure::Exhausted { attempts, last } => StreamError::RetryBudgetExhausted {
                attempts: *attempts,
                last: last.clone(),
            },
            TerminalFailure::RangeNotSupported { offset } => {
                StreamError::RangeNotSupported { offset: *offset }
            }
            TerminalFailure::Unexpected(msg) => StreamError::Unexpected(msg.clone()),
        }
    }
}

enum State {
    /// アクティブなボディなし。次の pull で `bytes_delivered` からフェッチ
    Idle,
    /// フェッチ済みボディからチャンクを配送中
    Streaming(ChunkBody),
    /// 全バイト配送済み
    Completed,
    /// 致命的な失敗で終端。以後フェッチは発行しない
    Failed(TerminalFailure),
}

/// pull 型のバイトチャンク列
///
/// ResumableStream と ProgressReporter が共に実装する配送インターフェース。
#[async_trait]
pub trait ByteSource: Send {
    /// 次の順序どおりのチャンクを返す。`Ok(None)` はストリーム終端
    async fn next_chunk(&mut self) -> Result<Option<Bytes>>;

    /// これまでに配送した累計バイト数
    fn bytes_delivered(&self) -> u64;

    /// オブジェクト全長。最初のフェッチ成功後に確定する
    fn total_length(&self) -> Option<u64>;
}

/// RangeFetcher の上に途切れない1本のバイト列という錯覚を作るストリーム
pub struct ResumableStream<F: RangeFetcher> {
    fetcher: F,
    location: SignedLogLocation,
    retry: RetryConfig,
    cursor: StreamCursor,
    total_length: Option<u64>,
    state: State,
}

impl<F: RangeFetcher> ResumableStream<F> {
    pub fn new(fetcher: F, location: SignedLogLocation) -> Self {
        Self::with_retry(fetcher, location, RetryConfig::default())
    }

    pub fn with_retry(fetcher: F, location: SignedLogLocation, retry: RetryConfig) -> Self {
        Self {
            fetcher,
            location,
            retry,
            cursor: StreamCursor::default(),
            total_length: None,
            state: State::Idle,
        }
    }

    /// 次のチャンクを取得する。内部のリトライは呼び出し元に見えない。
    async fn pull(&mut self) -> Result<Option<Bytes>> {
        loop {
            match std::mem::replace(&mut self.state, State::Idle) {
                State::Completed => {
                    self.state = State::Completed;
                    return Ok(None);
                }
                State::Failed(failure) => {
                    let err = failure.to_error();
                    self.state = State::Failed(failure);
                    return Err(err);
                }
                State::Idle => {
                    // 全長既知で配送済みなら自然終端
                    if let Some(total) = self.total_length
                        && self.cursor.bytes_delivered >= total
                    {
                        self.state = State::Completed;
                        continue;
                    }
                    self.open_body().await?;
                }
                State::Streaming(mut body) => match body.next().await {
                    Some(Ok(chunk)) => {
                        self.state = State::Streaming(body);
                        if chunk.is_empty() {
                            continue;
                        }
                        self.cursor.bytes_delivered += chunk.len() as u64;
                        self.cursor.retries_used = 0;
                        return Ok(Some(chunk));
                    }
                    Some(Err(err)) => {
                        // ボディ途中の失敗。state は Idle に戻っているので
                        // 次のフェッチは bytes_delivered から再開される
                        drop(body);
                        self.register_transient(err).await?;
                    }
                    None => {
                        // ボディ終端。全長に満たなければサーバーに
                        // 切られたとみなして一時的失敗として再開する
                        if let Some(total) = self.total_length
                            && self.cursor.bytes_delivered < total
                        {
                            let err = StreamError::Transient(format!(
                                "{} / {} バイトで接続が終了しました",
                                self.cursor.bytes_delivered, total
                            ));
                            self.register_transient(err).await?;
                        }
                    }
                },
            }
        }
    }

    /// `bytes_delivered` からのフェッチを1回発行し、状態を更新する
    async fn open_body(&mut self) -> Result<()> {
        let range = ByteRange::from_offset(self.cursor.bytes_delivered);
        match self.fetcher.fetch(&self.location, range).await {
            Ok(result) => {
                if range.offset > 0 && !result.range_honored {
                    // 再開時に Range を無視された場合は 0 から再送せず
                    // 明示的に失敗させる（重複配送・暗黙の再ダウンロード防止）
                    return Err(self.fail(TerminalFailure::RangeNotSupported {
                        offset: range.offset,
                    }));
                }
                if self.total_length.is_none() {
                    // 最初に成功したフェッチの報告値が正
                    self.total_length = Some(result.total_length);
                    tracing::debug!("ログオブジェクト全長: {} バイト", result.total_length);
                }
                self.state = State::Streaming(result.body);
                Ok(())
            }
            Err(err @ StreamError::Transient(_)) => self.register_transient(err).await,
            Err(StreamError::AuthExpired(msg)) => {
                Err(self.fail(TerminalFailure::AuthExpired(msg)))
            }
            Err(StreamError::NotFound(msg)) => Err(self.fail(TerminalFailure::NotFound(msg))),
            Err(err) => Err(self.fail(TerminalFailure::Unexpected(err.to_string()))),
        }
    }

    /// 一時的失敗を記録する。上限内なら backoff 後に Ok を返し、
    /// 呼び出し側のループが再フェッチする。上限到達で終端。
    async fn register_transient(&mut self, err: StreamError) -> Result<()> {
        self.cursor.retries_used += 1;
        if self.cursor.retries_used >= self.retry.max_retries {
            return Err(self.fail(TerminalFailure::Exhausted {
                attempts: self.cursor.retries_used,
                last: err.to_string(),
            }));
        }
        let delay = self.retry.delay_for_attempt(self.cursor.retries_used);
        tracing::warn!(
            "一時的なフェッチ失敗（{}/{} 回目、{:?} 後に offset {} から再開）: {}",
            self.cursor.retries_used,
            self.retry.max_retries,
            delay,
            self.cursor.bytes_delivered,
            err
        );
        sleep(delay).await;
        Ok(())
    }

    fn fail(&mut self, failure: TerminalFailure) -> StreamError {
        let err = failure.to_error();
        self.state = State::Failed(failure);
        err
    }
}

#[async_trait]
impl<F: RangeFetcher> ByteSource for ResumableStream<F> {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        self.pull().await
    }

    fn bytes_delivered(&self) -> u64 {
        self.cursor.bytes_delivered
    }

    fn total_length(&self) -> Option<u64> {
        self.total_length
    }
}
