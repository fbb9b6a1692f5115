use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::catalog::PageHandler;
use crate::error::{CatalogError, CatalogResult};
use crate::model::RawEntry;
use crate::util::env as env_util;

/// Source of image bytes. Only a 200 response counts as success.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> CatalogResult<Bytes>;
}

#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    http: Client,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .timeout(timeout)
            .build()?;
        Ok(Self { http })
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Self::new(Duration::from_secs(env_util::env_parse(
            "TOYS_IMAGE_TIMEOUT_SECS",
            10u64,
        )))
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> CatalogResult<Bytes> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| CatalogError::image(url, e))?;
        if resp.status() != StatusCode::OK {
            return Err(CatalogError::image(url, format!("http {}", resp.status())));
        }
        resp.bytes().await.map_err(|e| CatalogError::image(url, e))
    }
}

#[derive(Debug)]
pub enum DownloadOutcome {
    Downloaded(PathBuf),
    /// Target already on disk; nothing was requested.
    Skipped(PathBuf),
    Failed(CatalogError),
}

impl DownloadOutcome {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Downloaded(p) | Self::Skipped(p) => Some(p),
            Self::Failed(_) => None,
        }
    }
}

/// Per-call download counters; callers add them up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl MaterializeReport {
    pub fn record(&mut self, outcome: &DownloadOutcome) {
        match outcome {
            DownloadOutcome::Downloaded(_) => self.downloaded += 1,
            DownloadOutcome::Skipped(_) => self.skipped += 1,
            DownloadOutcome::Failed(_) => self.failed += 1,
        }
    }
}

impl AddAssign for MaterializeReport {
    fn add_assign(&mut self, rhs: Self) {
        self.downloaded += rhs.downloaded;
        self.skipped += rhs.skipped;
        self.failed += rhs.failed;
    }
}

/// Canonical form of a stored image path (forward slashes only).
pub fn normalize_local_path(path: &str) -> String {
    path.replace('\\', "/")
}

fn file_stem_component(toy_id: &str) -> String {
    toy_id
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect()
}

/// Downloads toy images into `dir` as `{toy_id}_{index}.jpg`.
#[derive(Debug, Clone)]
pub struct ImageMaterializer<F> {
    dir: PathBuf,
    fetcher: F,
}

impl<F: ImageFetcher> ImageMaterializer<F> {
    pub fn new(dir: impl Into<PathBuf>, fetcher: F) -> Self {
        Self {
            dir: dir.into(),
            fetcher,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn target_path(&self, toy_id: &str, index: usize) -> PathBuf {
        self.dir
            .join(format!("{}_{}.jpg", file_stem_component(toy_id), index))
    }

    /// Fetch one image unless its target file already exists.
    ///
    /// Bytes land in a `.part` file first and are renamed into place, so an
    /// interrupted write never masquerades as a finished download on re-runs.
    pub async fn download(&self, url: &str, toy_id: &str, index: usize) -> DownloadOutcome {
        let target = self.target_path(toy_id, index);
        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            debug!(path = %target.display(), "image already present");
            return DownloadOutcome::Skipped(target);
        }
        let bytes = match self.fetcher.fetch(url).await {
            Ok(b) => b,
            Err(err) => {
                warn!(toy_id, index, error = %err, "image download failed");
                return DownloadOutcome::Failed(err);
            }
        };
        match write_atomically(&self.dir, &target, &bytes).await {
            Ok(()) => DownloadOutcome::Downloaded(target),
            Err(err) => {
                warn!(toy_id, index, error = %err, "image write failed");
                DownloadOutcome::Failed(CatalogError::image(url, err))
            }
        }
    }

    /// Download every image of one entry and record local paths in place.
    ///
    /// Images that fail keep their remote URL with no local path; images
    /// without a URL are left untouched but still consume an index.
    pub async fn materialize_entry(&self, entry: &mut RawEntry) -> MaterializeReport {
        let mut report = MaterializeReport::default();
        let Some(toy) = entry.toy.as_mut() else {
            return report;
        };
        let Some(toy_id) = toy.id.clone().filter(|id| !id.trim().is_empty()) else {
            return report;
        };
        for (index, image) in toy.images.iter_mut().enumerate() {
            let Some(url) = image.url.clone().filter(|u| !u.is_empty()) else {
                continue;
            };
            let outcome = self.download(&url, &toy_id, index).await;
            report.record(&outcome);
            image.local_path = outcome
                .path()
                .map(|p| normalize_local_path(&p.to_string_lossy()));
        }
        report
    }

    pub async fn materialize_all(&self, entries: &mut [RawEntry]) -> MaterializeReport {
        let mut report = MaterializeReport::default();
        for entry in entries.iter_mut() {
            report += self.materialize_entry(entry).await;
        }
        info!(
            downloaded = report.downloaded,
            skipped = report.skipped,
            failed = report.failed,
            "images materialized"
        );
        report
    }
}

async fn write_atomically(dir: &Path, target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let mut partial = target.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);
    tokio::fs::write(&partial, bytes).await?;
    tokio::fs::rename(&partial, target).await
}

/// Page hook that materializes images as each listing page arrives.
pub struct MaterializingHandler<'a, F> {
    materializer: &'a ImageMaterializer<F>,
    pub report: MaterializeReport,
}

impl<'a, F> MaterializingHandler<'a, F> {
    pub fn new(materializer: &'a ImageMaterializer<F>) -> Self {
        Self {
            materializer,
            report: MaterializeReport::default(),
        }
    }
}

#[async_trait]
impl<F: ImageFetcher> PageHandler for MaterializingHandler<'_, F> {
    async fn on_page(&mut self, offset: u32, entries: &mut Vec<RawEntry>) {
        let mut page = MaterializeReport::default();
        for entry in entries.iter_mut() {
            page += self.materializer.materialize_entry(entry).await;
        }
        self.report += page;
        info!(
            offset,
            downloaded = page.downloaded,
            failed = page.failed,
            total_downloaded = self.report.downloaded,
            "page images processed"
        );
    }
}
