//! 進捗レポート付きストリームデコレータ

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::stream::ByteSource;

/// ByteSource を包み、チャンクを呼び出し元へ返すたびに登録された
/// コールバックへ `(累計配送バイト数, オブジェクト全長)` を通知する。
///
/// コールバックは同期で、ストリームの時間予算の中で実行されるため
/// ブロックする処理（I/O等）を行ってはいけない。終端シグナルとエラーは
/// 一切加工せずそのまま転送する。観測するのは成功した配送だけ。
pub struct ProgressReporter<S, C>
where
    S: ByteSource,
    C: FnMut(u64, u64) + Send,
{
    inner: S,
    callback: C,
}

impl<S, C> ProgressReporter<S, C>
where
    S: ByteSource,
    C: FnMut(u64, u64) + Send,
{
    pub fn new(inner: S, callback: C) -> Self {
        Self { inner, callback }
    }
}

#[async_trait]
impl<S, C> ByteSource for ProgressReporter<S, C>
where
    S: ByteSource,
    C: FnMut(u64, u64) + Send,
{
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        let chunk = self.inner.next_chunk().await?;
        if let Some(chunk) = &chunk
            && !chunk.is_empty()
        {
            let total = self.inner.total_length().unwrap_or(0);
            (self.callback)(self.inner.bytes_delivered(), total);
        }
        Ok(chunk)
    }

    fn bytes_delivered(&self) -> u64 {
        self.inner.bytes_delivered()
    }

    fn total_length(&self) -> Option<u64> {
        self.inner.total_length()
    }
}
