mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use kiln_client::{BuildStatus, CredentialStore};

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "コンテナイメージビルドサービスのCLIクライアント", long_about = None)]
struct Cli {
    /// 認証情報ファイルのパス（デフォルト: ~/.kiln/credentials.json）
    #[arg(long, global = true, env = "KILN_CREDENTIALS")]
    credentials: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// クイックビルドをキューに投入し、完了まで待機
    Build {
        /// リソースグループ名
        #[arg(long = "rg")]
        resource_group: String,
        /// レジストリ名
        #[arg(short = 'n', long = "name")]
        registry: String,
        /// ビルドするイメージ名
        #[arg(short, long)]
        image: String,
        /// ソースアーカイブ（tar.gz）のURL
        #[arg(short, long)]
        source: String,
        /// Dockerfileのパス
        #[arg(long, default_value = "Dockerfile")]
        dockerfile: String,
        /// ビルド引数（NAME=VALUE、複数指定可）
        #[arg(long = "build-arg")]
        build_args: Vec<String>,
        /// ビルド後にイメージをpushしない
        #[arg(long)]
        no_push: bool,
        /// サーバー側のビルドタイムアウト（秒）
        #[arg(long, default_value = "600")]
        timeout: u64,
        /// ビルドプラットフォームのOS
        #[arg(long, default_value = "Linux")]
        os: String,
    },
    /// ビルド一覧を表示
    List {
        /// リソースグループ名
        #[arg(long = "rg")]
        resource_group: String,
        /// レジストリ名
        #[arg(short = 'n', long = "name")]
        registry: String,
        /// 1ページあたりの件数
        #[arg(long, default_value = "20")]
        page_size: u32,
        /// ステータスで絞り込み（Queued / Running / Succeeded / Failed / Canceled）
        #[arg(long)]
        status: Option<BuildStatus>,
    },
    /// ビルドログを表示
    Logs {
        /// リソースグループ名
        #[arg(long = "rg")]
        resource_group: String,
        /// レジストリ名
        #[arg(short = 'n', long = "name")]
        registry: String,
        /// ビルドID
        #[arg(short = 'b', long = "build-id")]
        build_id: String,
    },
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt::init();

    // Versionコマンドは認証情報不要
    if matches!(cli.command, Commands::Version) {
        println!("kiln {}", env!("CARGO_PKG_VERSION"));
        println!(
            "platform: {}/{}",
            std::env::consts::OS,
            std::env::consts::ARCH
        );
        return Ok(());
    }

    let store = match cli.credentials {
        Some(path) => CredentialStore::with_path(path),
        None => CredentialStore::new(),
    };

    match cli.command {
        Commands::Build {
            resource_group,
            registry,
            image,
            source,
            dockerfile,
            build_args,
            no_push,
            timeout,
            os,
        } => {
            commands::build::handle(
                &store,
                &resource_group,
                &registry,
                commands::build::BuildOptions {
                    image,
                    source,
                    dockerfile,
                    build_args,
                    no_push,
                    timeout,
                    os,
                },
            )
            .await
        }
        Commands::List {
            resource_group,
            registry,
            page_size,
            status,
        } => commands::list::handle(&store, &resource_group, &registry, page_size, status).await,
        Commands::Logs {
            resource_group,
            registry,
            build_id,
        } => commands::logs::handle(&store, &resource_group, &registry, &build_id).await,
        Commands::Version => unreachable!(),
    }
}
