use std::time::Duration;

use colored::Colorize;

use kiln_client::{
    BuildArgument, BuildSpec, BuildsClient, CredentialStore, PlatformProperties, QuickBuildSpec,
};

/// ポーリング待機はサーバー側タイムアウトより少し長く取る
const AWAIT_MARGIN: Duration = Duration::from_secs(60);

pub struct BuildOptions {
    pub image: String,
    pub source: String,
    pub dockerfile: String,
    pub build_args: Vec<String>,
    pub no_push: bool,
    pub timeout: u64,
    pub os: String,
}

pub async fn handle(
    store: &CredentialStore,
    resource_group: &str,
    registry: &str,
    options: BuildOptions,
) -> anyhow::Result<()> {
    let build_arguments = parse_build_args(&options.build_args)?;

    println!("{}", "認証情報を読み込み中...".blue());
    let credentials = store.load()?;
    let client = BuildsClient::new(credentials)?;

    let spec = BuildSpec::QuickBuild(QuickBuildSpec {
        image_name: options.image,
        source_location: options.source,
        dockerfile_path: options.dockerfile,
        build_arguments,
        is_push_enabled: !options.no_push,
        timeout: options.timeout,
        platform: PlatformProperties {
            os_type: options.os,
            // CPUは指定しない（サーバー側のデフォルトは2）
            cpu: None,
        },
    });

    println!("{}", "ビルドをキューに投入中...".blue());
    let handle = client.submit_build(resource_group, registry, &spec).await?;
    println!("ビルドID: {}", handle.build_id.cyan());

    println!("{}", "ビルドの完了を待機中...".blue());
    let deadline = Duration::from_secs(options.timeout) + AWAIT_MARGIN;
    let result = client
        .await_completion(resource_group, registry, &handle, deadline)
        .await?;

    println!();
    println!(
        "{} ビルドが完了しました: {}",
        "✓".green(),
        result.build_id.cyan()
    );
    Ok(())
}

/// `NAME=VALUE` 形式のビルド引数をパースする
fn parse_build_args(raw: &[String]) -> anyhow::Result<Vec<BuildArgument>> {
    raw.iter()
        .map(|arg| {
            arg.split_once('=')
                .map(|(name, value)| BuildArgument {
                    name: name.to_string(),
                    value: value.to_string(),
                })
                .ok_or_else(|| {
                    anyhow::anyhow!("ビルド引数は NAME=VALUE 形式で指定してください: {arg}")
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_value_pairs() {
        let args = parse_build_args(&["VERSION=1.2".to_string(), "FLAG=a=b".to_string()]).unwrap();
        assert_eq!(args[0].name, "VERSION");
        assert_eq!(args[0].value, "1.2");
        // 値側の '=' はそのまま残る
        assert_eq!(args[1].value, "a=b");
    }

    #[test]
    fn rejects_malformed_argument() {
        assert!(parse_build_args(&["NOEQUALS".to_string()]).is_err());
    }
}
