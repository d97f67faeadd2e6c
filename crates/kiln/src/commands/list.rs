use chrono::{DateTime, Utc};
use colored::Colorize;

use kiln_client::{BuildStatus, BuildsClient, CredentialStore, ListFilter};

pub async fn handle(
    store: &CredentialStore,
    resource_group: &str,
    registry: &str,
    page_size: u32,
    status: Option<BuildStatus>,
) -> anyhow::Result<()> {
    println!("{}", "ビルド一覧を取得中...".blue());
    let client = BuildsClient::new(store.load()?)?;
    let filter = ListFilter { status };

    println!();
    println!(
        "{}",
        format!(
            "{:<16} {:<11} {:<20} {:<20} {:<20}",
            "BUILD ID", "STATUS", "CREATE TIME", "START TIME", "FINISH TIME"
        )
        .bold()
    );
    println!("{}", "─".repeat(90).dimmed());

    let mut continuation: Option<String> = None;
    let mut total = 0usize;
    loop {
        let page = client
            .list_builds(
                resource_group,
                registry,
                &filter,
                page_size,
                continuation.as_deref(),
            )
            .await?;

        for build in &page.value {
            let status_colored = match build.status {
                BuildStatus::Succeeded => build.status.to_string().green(),
                BuildStatus::Failed | BuildStatus::Canceled => build.status.to_string().red(),
                BuildStatus::Queued | BuildStatus::Running => build.status.to_string().yellow(),
            };
            println!(
                "{:<16} {:<11} {:<20} {:<20} {:<20}",
                build.build_id,
                status_colored,
                format_time(build.create_time),
                format_time(build.start_time),
                format_time(build.finish_time),
            );
        }
        total += page.value.len();

        match page.continuation_token {
            Some(token) => continuation = Some(token),
            None => break,
        }
    }

    if total == 0 {
        println!("{}", "ビルドはありません".dimmed());
    }
    Ok(())
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}
