//! Kiln ログストリーミングコア
//!
//! ビルドサービスが発行する署名付きURLから、中断に強いストリーミング
//! ダウンロードでログを取り出すための部品群。
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │               LogPipeline                 │
//! │  リンク解決 → ストリーム構築 → sink へコピー │
//! └──────────────────┬───────────────────────┘
//!                    │
//! ┌──────────────────▼───────────────────────┐
//! │             ProgressReporter              │
//! │   チャンク配送ごとに進捗コールバック呼び出し  │
//! └──────────────────┬───────────────────────┘
//!                    │
//! ┌──────────────────▼───────────────────────┐
//! │             ResumableStream               │
//! │  bytes_delivered からの Range 再開 + retry  │
//! └──────────────────┬───────────────────────┘
//!                    │
//! ┌──────────────────▼───────────────────────┐
//! │          RangeFetcher (reqwest)           │
//! │        署名付きURLへの単発 Range GET        │
//! └──────────────────────────────────────────┘
//! ```

pub mod error;
pub mod fetcher;
pub mod pipeline;
pub mod progress;
pub mod stream;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports
pub use error::{Result, StreamError};
pub use fetcher::{
    ByteRange, ChunkBody, FetchResult, HttpFetcherConfig, HttpRangeFetcher, RangeFetcher,
    SignedLogLocation,
};
pub use pipeline::{LogPipeline, LogSource};
pub use progress::ProgressReporter;
pub use stream::{ByteSource, ResumableStream, RetryConfig};
