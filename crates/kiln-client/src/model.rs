//! ビルドサービス管理APIのワイヤ型

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// ビルドキューが受け付けるリクエストの種別
///
/// コアのストリーミング層はこの variant を一切知らない。種別の分岐は
/// このコラボレータ境界で閉じる。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BuildSpec {
    #[serde(rename = "QuickBuild")]
    QuickBuild(QuickBuildSpec),
}

/// ソースアーカイブとDockerfileからの単発ビルド
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickBuildSpec {
    pub image_name: String,
    /// ソースアーカイブ（tar.gz）のURL
    pub source_location: String,
    pub dockerfile_path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_arguments: Vec<BuildArgument>,
    pub is_push_enabled: bool,
    /// サーバー側のビルドタイムアウト（秒）
    pub timeout: u64,
    pub platform: PlatformProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildArgument {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformProperties {
    /// "Linux" または "Windows"
    pub os_type: String,
    /// 省略時はサーバー側のデフォルト（2）になる
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u32>,
}

/// キューに積まれたビルドへのハンドル。完了待ちのポーリングに使う
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildHandle {
    pub build_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl BuildStatus {
    /// これ以上状態が変わらないステータスかどうか
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BuildStatus::Succeeded | BuildStatus::Failed | BuildStatus::Canceled
        )
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildStatus::Queued => "Queued",
            BuildStatus::Running => "Running",
            BuildStatus::Succeeded => "Succeeded",
            BuildStatus::Failed => "Failed",
            BuildStatus::Canceled => "Canceled",
        };
        f.write_str(name)
    }
}

impl FromStr for BuildStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Queued" => Ok(BuildStatus::Queued),
            "Running" => Ok(BuildStatus::Running),
            "Succeeded" => Ok(BuildStatus::Succeeded),
            "Failed" => Ok(BuildStatus::Failed),
            "Canceled" => Ok(BuildStatus::Canceled),
            other => Err(format!(
                "不明なビルドステータス: {other}（Queued / Running / Succeeded / Failed / Canceled）"
            )),
        }
    }
}

/// 一覧表示用のビルドメタデータ
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSummary {
    pub build_id: String,
    pub status: BuildStatus,
    #[serde(default)]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finish_time: Option<DateTime<Utc>>,
}

/// ポーリングで終端ステータスを観測したビルドの最終結果
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub build_id: String,
    pub status: BuildStatus,
    pub finish_time: Option<DateTime<Utc>>,
}

/// ビルド一覧の絞り込み条件
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub status: Option<BuildStatus>,
}

/// ビルド一覧の1ページ
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildPage {
    pub value: Vec<BuildSummary>,
    /// 次ページがある場合の継続トークン
    #[serde(default)]
    pub continuation_token: Option<String>,
}
