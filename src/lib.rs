pub mod api;
pub mod catalog;
pub mod cli;
pub mod database_ops;
pub mod error;
pub mod logging;
pub mod media;
pub mod model;
pub mod snapshot;

pub mod util {
    pub mod env;
}

// Pipeline stages shared by the `toys` subcommands: crawl to a snapshot
// (optionally downloading images page by page), materialize an existing
// snapshot, merge snapshots, and load a snapshot into the store.
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use catalog::{crawl_all, crawl_with, CatalogStats, CrawlOptions, CrawlReport, ListingSource};
use database_ops::db::Db;
use database_ops::ingest::{load_entries, LoadMode, LoadReport};
use media::{ImageFetcher, ImageMaterializer, MaterializeReport, MaterializingHandler};
use snapshot::MergeOutcome;

#[derive(Debug, Clone, Default)]
pub struct ScrapeOutcome {
    pub crawl: CrawlReport,
    /// Present when images were downloaded during the crawl.
    pub images: Option<MaterializeReport>,
    pub stats: CatalogStats,
}

/// Crawl metadata only and write the snapshot to `out`.
pub async fn scrape_snapshot<S>(source: &S, opts: &CrawlOptions, out: &Path) -> Result<ScrapeOutcome>
where
    S: ListingSource + ?Sized,
{
    let crawl = crawl_all(source, opts).await?;
    snapshot::save(out, &crawl.entries)?;
    let stats = CatalogStats::from_entries(&crawl.entries);
    Ok(ScrapeOutcome {
        crawl,
        images: None,
        stats,
    })
}

/// Crawl and download each page's images as soon as the page arrives.
pub async fn scrape_with_images<S, F>(
    source: &S,
    opts: &CrawlOptions,
    materializer: &ImageMaterializer<F>,
    out: &Path,
) -> Result<ScrapeOutcome>
where
    S: ListingSource + ?Sized,
    F: ImageFetcher,
{
    let mut handler = MaterializingHandler::new(materializer);
    let crawl = crawl_with(source, opts, &mut handler).await?;
    snapshot::save(out, &crawl.entries)?;
    info!(
        downloaded = handler.report.downloaded,
        skipped = handler.report.skipped,
        failed = handler.report.failed,
        dir = %materializer.dir().display(),
        "scrape with images finished"
    );
    let stats = CatalogStats::from_entries(&crawl.entries);
    Ok(ScrapeOutcome {
        crawl,
        images: Some(handler.report),
        stats,
    })
}

/// Download images for an existing snapshot and write the updated copy.
pub async fn download_snapshot_images<F: ImageFetcher>(
    input: &Path,
    output: &Path,
    materializer: &ImageMaterializer<F>,
) -> Result<MaterializeReport> {
    let mut entries = snapshot::load(input)?;
    let report = materializer.materialize_all(&mut entries).await;
    snapshot::save(output, &entries)?;
    Ok(report)
}

/// Overlay the local image lists of `local` onto `complete`, writing `output`.
pub fn merge_snapshot_files(complete: &Path, local: &Path, output: &Path) -> Result<MergeOutcome> {
    let complete_entries = snapshot::load(complete)?;
    let local_entries = snapshot::load(local)?;
    let merged = snapshot::merge_local_images(complete_entries, &local_entries);
    snapshot::save(output, &merged.entries)?;
    info!(
        indexed = merged.indexed,
        updated = merged.updated,
        total = merged.entries.len(),
        "snapshots merged"
    );
    Ok(merged)
}

pub async fn load_snapshot(db: &Db, path: &Path, mode: LoadMode) -> Result<LoadReport> {
    let entries = snapshot::load(path)?;
    load_entries(db, &entries, mode)
        .await
        .with_context(|| format!("loading {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use crate::catalog::ListingPage;
    use crate::database_ops::search::{search_toys, SearchCriteria};
    use crate::error::{CatalogError, CatalogResult};
    use serde_json::json;
    use std::time::Duration;

    struct OnePage;

    #[async_trait]
    impl ListingSource for OnePage {
        async fn fetch_page(&self, _page_size: u32, offset: u32) -> CatalogResult<ListingPage> {
            if offset > 0 {
                return Err(CatalogError::fetch(offset, "no more pages"));
            }
            Ok(serde_json::from_value(json!({
                "count": 2,
                "data": [
                    { "availableStock": 1, "toy": { "id": "t1", "name": "Drum", "price": 250,
                        "ageGroup": { "minAge": 6, "maxAge": 24 },
                        "images": [{ "url": "https://cdn/t1.jpg" }, { "url": "https://cdn/expired.jpg" }] } },
                    { "toy": { "id": "t2", "name": "Kite", "price": 400,
                        "ageGroup": { "minAge": 48, "maxAge": 96 } } }
                ]
            }))
            .unwrap())
        }
    }

    struct Fetcher;

    #[async_trait]
    impl ImageFetcher for Fetcher {
        async fn fetch(&self, url: &str) -> CatalogResult<Bytes> {
            if url.contains("expired") {
                return Err(CatalogError::image(url, "http 403"));
            }
            Ok(Bytes::from_static(b"jpeg"))
        }
    }

    fn opts() -> CrawlOptions {
        CrawlOptions {
            page_size: 12,
            page_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn scrape_images_then_load_and_search() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("toys_with_local_images.json");
        let materializer = ImageMaterializer::new(dir.path().join("toy_images"), Fetcher);

        let outcome = scrape_with_images(&OnePage, &opts(), &materializer, &out)
            .await
            .unwrap();
        assert!(outcome.crawl.is_complete());
        assert_eq!(outcome.stats.total, 2);
        let images = outcome.images.unwrap();
        assert_eq!((images.downloaded, images.failed), (1, 1));

        let db = Db::in_memory().await.unwrap();
        let loaded = load_snapshot(&db, &out, LoadMode::Append).await.unwrap();
        assert_eq!(loaded.imported, 2);
        assert_eq!(loaded.images, 2);

        let hits = search_toys(&db, &SearchCriteria::default().at_age_months(12))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        let drum = &hits[0];
        assert!(drum.images[0]
            .local_path
            .as_deref()
            .unwrap()
            .ends_with("toy_images/t1_0.jpg"));
        assert_eq!(drum.images[1].local_path, None);
        assert_eq!(drum.images[1].url.as_deref(), Some("https://cdn/expired.jpg"));
    }

    #[tokio::test]
    async fn metadata_scrape_then_materialize_then_merge() {
        let dir = tempfile::tempdir().unwrap();
        let complete = dir.path().join("toys_data.json");
        let local = dir.path().join("toys_local.json");
        let merged = dir.path().join("toys_merged.json");

        let outcome = scrape_snapshot(&OnePage, &opts(), &complete).await.unwrap();
        assert!(outcome.images.is_none());

        let materializer = ImageMaterializer::new(dir.path().join("imgs"), Fetcher);
        let report = download_snapshot_images(&complete, &local, &materializer)
            .await
            .unwrap();
        assert_eq!(report.downloaded, 1);

        let result = merge_snapshot_files(&complete, &local, &merged).unwrap();
        assert_eq!(result.indexed, 1);
        assert_eq!(result.updated, 1);
        let back = snapshot::load(&merged).unwrap();
        let t1 = back[0].toy.as_ref().unwrap();
        assert!(t1.images[0].local_path.is_some());
    }

    #[tokio::test]
    async fn unreadable_snapshot_fails_load() {
        let db = Db::in_memory().await.unwrap();
        let err = load_snapshot(&db, Path::new("/no/such/file.json"), LoadMode::Append)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("snapshot"));
    }
}
