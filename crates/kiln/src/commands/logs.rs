use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use kiln_client::{BuildsClient, CredentialStore, RegistryLogSource};
use kiln_stream::{HttpRangeFetcher, LogPipeline};

const PB_STYLE: &str =
    "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec})";

pub async fn handle(
    store: &CredentialStore,
    resource_group: &str,
    registry: &str,
    build_id: &str,
) -> anyhow::Result<()> {
    tracing::debug!("ビルド {} のログ取得を開始", build_id);

    // ログ本体はstdoutへそのまま流すので、状態表示はすべてstderr側
    eprintln!("{}", "ログのダウンロードを準備中...".blue());
    let credentials = store.load()?;
    let client = BuildsClient::new(credentials)?;
    let source = RegistryLogSource::new(&client, resource_group, registry);

    // 全長は最初のフェッチ成功までわからないのでスピナーで開始
    let progress = ProgressBar::no_length();
    progress.set_style(ProgressStyle::with_template(PB_STYLE)?.progress_chars("█▓▒░  "));

    let pipeline = LogPipeline::new(HttpRangeFetcher::new()?);
    let mut stdout = tokio::io::stdout();
    let result = pipeline
        .run(&source, build_id, &mut stdout, |transferred, total| {
            if total > 0 && progress.length() != Some(total) {
                progress.set_length(total);
            }
            progress.set_position(transferred);
        })
        .await;

    match result {
        Ok(written) => {
            progress.finish_and_clear();
            eprintln!(
                "{} {} バイトのログをダウンロードしました",
                "✓".green(),
                written
            );
            Ok(())
        }
        Err(err) => {
            progress.abandon();
            Err(err.into())
        }
    }
}
