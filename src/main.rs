mod assets;
mod background;
mod compose;
mod config;
mod cutout;
mod dedup;
mod fetch;
mod layout;
mod media;
mod pipeline;
mod sheet;
mod storage;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crate::assets::AssetBundle;
use crate::config::Config;
use crate::cutout::HttpCutout;
use crate::fetch::HttpFetcher;
use crate::media::MediaStore;
use crate::pipeline::Pipeline;
use crate::sheet::SheetsClient;
use crate::storage::DiskClient;

/// Generates marketplace listing cards for LEGO part photos from a catalog
/// spreadsheet and publishes them to cloud storage.
#[derive(Parser, Debug)]
#[command(name = "cardgen", version)]
struct Args {
    /// First sheet row to process (1-indexed; clamped to the first data row)
    start: u32,
    /// Last sheet row to process, inclusive
    end: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = Config::from_env().context("loading configuration")?;
    let http = config.http_client().context("building http client")?;
    std::fs::create_dir_all(&config.work_dir).context("creating work dir")?;

    let assets = AssetBundle::load(&config.assets_dir).context("loading drawing assets")?;

    let store = match &config.database_url {
        Some(url) => Some(
            MediaStore::connect(url, config.author_id, config.author_ver.clone())
                .await
                .context("connecting to the media database")?,
        ),
        None => None,
    };

    let rows = SheetsClient::new(
        http.clone(),
        config.sheets_api_key.clone(),
        config.sheet_id.clone(),
        config.sheet_tab.clone(),
    );
    let storage = DiskClient::new(http.clone(), config.disk_token.clone());
    let cutout = HttpCutout::new(
        http.clone(),
        config.cutout_url.clone(),
        config.cutout_api_key.clone(),
    );
    let fetcher = HttpFetcher::new(http.clone());

    let pipeline = Pipeline {
        config: &config,
        composer: &assets,
        fetcher: &fetcher,
        rows: &rows,
        cutout: &cutout,
        storage: &storage,
        store: store.as_ref(),
    };

    let summary = pipeline.run(args.start, args.end).await?;
    info!(
        published = summary.published,
        skipped = summary.skipped,
        failed = summary.failed,
        "run complete"
    );
    Ok(())
}
