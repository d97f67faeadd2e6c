//! ログストリーミングのエラー型

use thiserror::Error;

/// ログ取得パイプラインのエラー
///
/// ResumableStream は `Transient` のみリトライし、それ以外は即座に
/// 呼び出し元へ伝播する。`RetryBudgetExhausted` は単発の `Transient` と
/// 区別して表面化する（運用上「一時的なエラー」と「回線が不安定」を
/// 見分けられるようにするため）。
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("一時的なネットワークエラー: {0}")]
    Transient(String),

    #[error("署名付きURLが無効です（期限切れの可能性）: {0}")]
    AuthExpired(String),

    #[error("ログオブジェクトが見つかりません: {0}")]
    NotFound(String),

    #[error("ビルドサービスからログリンクを取得できません")]
    LogLinkUnavailable,

    #[error("リトライ上限に到達しました（連続 {attempts} 回失敗）: {last}")]
    RetryBudgetExhausted { attempts: u32, last: String },

    #[error("リモートストアが offset {offset} の Range リクエストを無視しました")]
    RangeNotSupported { offset: u64 },

    #[error("ログストアから想定外の応答: {0}")]
    Unexpected(String),

    #[error("出力先への書き込みに失敗しました: {0}")]
    Sink(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StreamError>;
