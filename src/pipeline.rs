//! Row processing pipeline.
//!
//! Rows are handled strictly sequentially: fetch, classify, cutout when
//! needed, compose, publish, record. Failures are isolated per row and the
//! run always advances to the next one; transient files are removed by
//! drop guards on every exit path.

use std::path::{Path, PathBuf};

use tracing::{info, warn};
use uuid::Uuid;

use crate::background;
use crate::compose::{self, CardComposer, CardText, ComposeError};
use crate::config::Config;
use crate::cutout::{CutoutError, CutoutService};
use crate::dedup::DedupGate;
use crate::fetch::{FetchError, PhotoFetcher};
use crate::media::{MediaError, MediaRecord, MediaStore};
use crate::sheet::{self, RowInput, RowSource, SheetError};
use crate::storage::{self, StorageError, StorageSink};

/// First data row; everything above is sheet headers.
const FIRST_DATA_ROW: u32 = 3;

/// Category marker drawn on every card.
const KIND_LABEL: &str = "Part";

#[derive(Debug, thiserror::Error)]
pub enum RowError {
    #[error("fetch: {0}")]
    Fetch(#[from] FetchError),
    #[error("cutout: {0}")]
    Cutout(#[from] CutoutError),
    #[error("compose: {0}")]
    Compose(#[from] ComposeError),
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("media: {0}")]
    Media(#[from] MediaError),
    #[error("image: {0}")]
    Image(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    MissingArticle,
    MissingUrl,
    AlreadyCurrent,
}

impl SkipReason {
    fn as_str(self) -> &'static str {
        match self {
            SkipReason::MissingArticle => "article missing",
            SkipReason::MissingUrl => "photo url missing",
            SkipReason::AlreadyCurrent => "card already current",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum RowOutcome {
    Published,
    Skipped(SkipReason),
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub published: u32,
    pub skipped: u32,
    pub failed: u32,
}

/// Removes the file on drop, success or failure alike.
struct TempFile {
    path: PathBuf,
}

impl TempFile {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

pub struct Pipeline<'a> {
    pub config: &'a Config,
    pub composer: &'a dyn CardComposer,
    pub fetcher: &'a dyn PhotoFetcher,
    pub rows: &'a dyn RowSource,
    pub cutout: &'a dyn CutoutService,
    pub storage: &'a dyn StorageSink,
    pub store: Option<&'a MediaStore>,
}

impl Pipeline<'_> {
    pub async fn run(&self, start: u32, end: u32) -> Result<RunSummary, SheetError> {
        let start = start.max(FIRST_DATA_ROW);
        if end < start {
            info!(start, end, "requested range ends above the first data row, nothing to process");
            return Ok(RunSummary::default());
        }

        let rows =
            sheet::fetch_rows(self.rows, start, end, self.config.price_column.as_deref()).await?;

        let mut gate = match self.store {
            Some(store) => DedupGate::persistent(store),
            None => DedupGate::ephemeral(),
        };

        let mut summary = RunSummary::default();
        for (i, row) in rows.iter().enumerate() {
            let row_number = start + i as u32;
            match self.process_row(&mut gate, row).await {
                Ok(RowOutcome::Published) => {
                    info!(row = row_number, article = %row.article, "card published");
                    summary.published += 1;
                    tokio::time::sleep(self.config.pace).await;
                }
                Ok(RowOutcome::Skipped(reason)) => {
                    info!(row = row_number, article = %row.article, reason = reason.as_str(), "row skipped");
                    summary.skipped += 1;
                }
                Err(e) => {
                    warn!(row = row_number, article = %row.article, error = %e, "row failed");
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }

    async fn process_row(
        &self,
        gate: &mut DedupGate<'_>,
        row: &RowInput,
    ) -> Result<RowOutcome, RowError> {
        if row.article.is_empty() {
            return Ok(RowOutcome::Skipped(SkipReason::MissingArticle));
        }

        let identity = row.identity();
        if gate.should_skip(&identity).await? {
            return Ok(RowOutcome::Skipped(SkipReason::AlreadyCurrent));
        }

        let Some(url) = row.source_url.as_deref() else {
            return Ok(RowOutcome::Skipped(SkipReason::MissingUrl));
        };

        let source = TempFile::new(
            self.config
                .work_dir
                .join(format!("buffer_{}.jpg", row.article)),
        );
        self.fetcher.download(url, source.path()).await?;

        // White-background photos keep their original pixels; everything
        // else goes through the cutout service. The guard must outlive the
        // compose step, hence the binding outside the branch.
        let mut _cutout_guard: Option<TempFile> = None;
        let subject_path = if background::file_has_white_background(source.path()) {
            source.path().to_path_buf()
        } else {
            let raw = tokio::fs::read(source.path()).await?;
            let cut = self.cutout.remove_background(&raw).await?;
            let file = TempFile::new(
                self.config
                    .work_dir
                    .join(format!("buffer_{}_no_bg.png", row.article)),
            );
            tokio::fs::write(file.path(), &cut).await?;
            let path = file.path().to_path_buf();
            _cutout_guard = Some(file);
            path
        };

        let subject = image::open(&subject_path)
            .map_err(|e| RowError::Image(e.to_string()))?
            .to_rgba8();

        let card = self.composer.compose(
            &subject,
            &CardText {
                article: &row.article,
                name: &row.name,
                color: row.color.as_deref(),
                kind: KIND_LABEL,
                price: if self.config.render_price {
                    row.price.as_deref()
                } else {
                    None
                },
            },
        )?;

        let subject_name = subject_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("card.png");
        let final_name = compose::final_filename(subject_name, row.color.as_deref());
        let final_file = TempFile::new(self.config.work_dir.join(&final_name));
        save_card(&card, final_file.path())?;

        let (remote_dir, remote_path) =
            remote_paths(&self.config.category, &final_name, &row.article);
        storage::reset_dir(self.storage, &remote_dir).await?;
        self.storage
            .upload(final_file.path(), &remote_path, true)
            .await?;
        let public_url = self.storage.publish(&remote_path).await?;

        if let Some(store) = self.store {
            let record = MediaRecord {
                id: Uuid::new_v4(),
                author_id: store.author_id(),
                author_ver: store.author_ver().to_string(),
                resource_id: identity.clone(),
                product_id: format!("ID-P-{}-0-0", row.article),
                url: public_url,
                name: remote_path.clone(),
                description: Some(format!(
                    "Part card, BrickLink photo, {}, {} {}",
                    row.article,
                    row.color.as_deref().unwrap_or("Colorless"),
                    row.name
                )),
            };
            store.delete(&record.resource_id, &record.name).await?;
            store.create(&record).await?;
        }

        gate.record(&identity);
        Ok(RowOutcome::Published)
    }
}

/// `<category>/<final-filename-stem>/<article>.<ext>`
fn remote_paths(category: &str, final_name: &str, article: &str) -> (String, String) {
    let stem = Path::new(final_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(final_name);
    let ext = Path::new(final_name)
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("png");
    let dir = format!("{category}/{stem}");
    let file = format!("{dir}/{article}.{ext}");
    (dir, file)
}

/// The composed card is RGBA; JPEG output needs the alpha dropped first.
fn save_card(card: &image::RgbaImage, path: &Path) -> Result<(), RowError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("png")
        .to_ascii_lowercase();
    let result = if ext == "jpg" || ext == "jpeg" {
        image::DynamicImage::ImageRgba8(card.clone()).to_rgb8().save(path)
    } else {
        card.save(path)
    };
    result.map_err(|e| RowError::Image(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    use crate::compose::CardComposer;
    use crate::cutout::CutoutService;
    use crate::fetch::PhotoFetcher;
    use crate::sheet::RowSource;
    use crate::storage::StorageSink;

    fn test_config(work_dir: &Path) -> Config {
        Config {
            sheet_id: "sheet".into(),
            sheet_tab: "Parts".into(),
            sheets_api_key: "key".into(),
            disk_token: "token".into(),
            category: "Avito".into(),
            cutout_url: "http://cutout.local".into(),
            cutout_api_key: None,
            database_url: None,
            author_id: Uuid::new_v4(),
            author_ver: "1.0.0".into(),
            proxy: None,
            pace: Duration::from_millis(0),
            render_price: false,
            price_column: None,
            assets_dir: PathBuf::from("assets"),
            work_dir: work_dir.to_path_buf(),
            fetch_timeout: Duration::from_secs(1),
        }
    }

    struct StubRows {
        articles: Vec<String>,
        names: Vec<String>,
        colors: Vec<String>,
        urls: Vec<String>,
    }

    #[async_trait]
    impl RowSource for StubRows {
        async fn get_range(&self, range: &str) -> Result<Vec<String>, SheetError> {
            Ok(match &range[..1] {
                "C" => self.articles.clone(),
                "A" => self.names.clone(),
                "B" => self.colors.clone(),
                "O" => self.urls.clone(),
                _ => vec![],
            })
        }
    }

    /// Writes a solid photo per URL: white ones pass the background probe,
    /// dark ones force the cutout path.
    #[derive(Default)]
    struct StubFetcher {
        calls: AtomicU32,
    }

    #[async_trait]
    impl PhotoFetcher for StubFetcher {
        async fn download(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let shade = if url.contains("white") { 255u8 } else { 0 };
            RgbImage::from_pixel(8, 8, Rgb([shade, shade, shade]))
                .save(dest)
                .map_err(|e| FetchError::Http(e.to_string()))?;
            Ok(())
        }
    }

    struct FailingCutout;

    #[async_trait]
    impl CutoutService for FailingCutout {
        async fn remove_background(&self, _image: &[u8]) -> Result<Vec<u8>, CutoutError> {
            Err(CutoutError::Http("connection refused".into()))
        }
    }

    struct StubComposer;

    impl CardComposer for StubComposer {
        fn compose(
            &self,
            _cutout: &RgbaImage,
            _text: &CardText<'_>,
        ) -> Result<RgbaImage, ComposeError> {
            Ok(RgbaImage::from_pixel(2, 2, Rgba([9, 9, 9, 255])))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        uploads: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl StorageSink for RecordingSink {
        async fn upload(
            &self,
            _local: &Path,
            remote: &str,
            _overwrite: bool,
        ) -> Result<(), StorageError> {
            self.uploads.lock().unwrap().push(remote.to_string());
            Ok(())
        }
        async fn mkdir(&self, _path: &str) -> Result<(), StorageError> {
            Ok(())
        }
        async fn remove(&self, _path: &str) -> Result<(), StorageError> {
            Ok(())
        }
        async fn publish(&self, _path: &str) -> Result<Option<String>, StorageError> {
            Ok(Some("https://disk.yandex.ru/d/card".into()))
        }
    }

    fn work_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn cutout_failure_is_isolated_to_its_row() {
        let dir = work_dir("cardgen_isolation_test");
        let config = test_config(&dir);
        let rows = StubRows {
            articles: vec!["3001".into(), "3002".into()],
            names: vec!["Brick 2x4".into(), "Plate 1x1".into()],
            colors: vec!["Red".into(), String::new()],
            urls: vec![
                "http://photos.local/dark.jpg".into(),
                "http://photos.local/white.jpg".into(),
            ],
        };
        let fetcher = StubFetcher::default();
        let sink = RecordingSink::default();
        let pipeline = Pipeline {
            config: &config,
            composer: &StubComposer,
            fetcher: &fetcher,
            rows: &rows,
            cutout: &FailingCutout,
            storage: &sink,
            store: None,
        };

        let summary = pipeline.run(3, 4).await.unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.published, 1);
        assert_eq!(summary.skipped, 0);

        // The failed first row never reached storage; the second row did.
        let uploads = sink.uploads.lock().unwrap();
        assert_eq!(uploads.as_slice(), ["Avito/3002/3002.jpg"]);
    }

    #[tokio::test]
    async fn repeat_identity_skips_without_fetch_or_upload() {
        let dir = work_dir("cardgen_dedup_test");
        let config = test_config(&dir);
        let rows = StubRows {
            articles: vec!["3001".into(), "3001".into()],
            names: vec!["Brick 2x4".into(), "Brick 2x4".into()],
            colors: vec!["Red".into(), "Red".into()],
            urls: vec![
                "http://photos.local/white.jpg".into(),
                "http://photos.local/white.jpg".into(),
            ],
        };
        let fetcher = StubFetcher::default();
        let sink = RecordingSink::default();
        let pipeline = Pipeline {
            config: &config,
            composer: &StubComposer,
            fetcher: &fetcher,
            rows: &rows,
            cutout: &FailingCutout,
            storage: &sink,
            store: None,
        };

        let summary = pipeline.run(3, 4).await.unwrap();
        assert_eq!(summary.published, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);

        // The repeat identity was gated before any I/O.
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(sink.uploads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn range_below_data_region_is_an_empty_run() {
        let dir = work_dir("cardgen_range_test");
        let config = test_config(&dir);
        let rows = StubRows {
            articles: vec![],
            names: vec![],
            colors: vec![],
            urls: vec![],
        };
        let fetcher = StubFetcher::default();
        let sink = RecordingSink::default();
        let pipeline = Pipeline {
            config: &config,
            composer: &StubComposer,
            fetcher: &fetcher,
            rows: &rows,
            cutout: &FailingCutout,
            storage: &sink,
            store: None,
        };

        let summary = pipeline.run(1, 2).await.unwrap();
        assert_eq!(summary.published, 0);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.failed, 0);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn remote_path_convention() {
        let (dir, file) = remote_paths("Avito", "3001_Red.png", "3001");
        assert_eq!(dir, "Avito/3001_Red");
        assert_eq!(file, "Avito/3001_Red/3001.png");

        let (_, file) = remote_paths("Avito", "3002.jpg", "3002");
        assert_eq!(file, "Avito/3002/3002.jpg");
    }

    #[test]
    fn temp_file_guard_removes_on_drop() {
        let dir = std::env::temp_dir();
        let path = dir.join("cardgen_guard_test.tmp");
        std::fs::write(&path, b"x").unwrap();
        {
            let _guard = TempFile::new(path.clone());
        }
        assert!(!path.exists());
    }
}
