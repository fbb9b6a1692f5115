use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::catalog::client::{ListingConfig, ListingSource};
use crate::error::{CatalogError, CatalogResult};
use crate::model::RawEntry;

/// Hook run on every successfully fetched page before its entries are kept.
///
/// The image materializer plugs in here so signed image URLs are downloaded
/// while they are still valid, rather than after the whole crawl.
#[async_trait]
pub trait PageHandler: Send {
    async fn on_page(&mut self, offset: u32, entries: &mut Vec<RawEntry>);
}

#[async_trait]
impl PageHandler for () {
    async fn on_page(&mut self, _offset: u32, _entries: &mut Vec<RawEntry>) {}
}

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub page_size: u32,
    /// Fixed pause before every request after the first one.
    pub page_delay: Duration,
}

impl From<&ListingConfig> for CrawlOptions {
    fn from(cfg: &ListingConfig) -> Self {
        Self {
            page_size: cfg.page_size,
            page_delay: cfg.page_delay,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    pub total_count: u32,
    /// Entries in upstream order (name ascending).
    pub entries: Vec<RawEntry>,
    pub pages_fetched: u32,
    pub failed_offsets: Vec<u32>,
}

impl CrawlReport {
    pub fn is_complete(&self) -> bool {
        self.failed_offsets.is_empty()
    }
}

/// Crawl every page without post-processing.
pub async fn crawl_all<S>(source: &S, opts: &CrawlOptions) -> CatalogResult<CrawlReport>
where
    S: ListingSource + ?Sized,
{
    crawl_with(source, opts, &mut ()).await
}

/// Crawl every page, running `handler` on each one as it arrives.
///
/// Offset 0 is fetched first to learn the total count; failing there aborts the
/// run. Any later page that fails is logged and recorded, and the crawl moves
/// on to the next offset, leaving a partial catalog.
pub async fn crawl_with<S, H>(
    source: &S,
    opts: &CrawlOptions,
    handler: &mut H,
) -> CatalogResult<CrawlReport>
where
    S: ListingSource + ?Sized,
    H: PageHandler,
{
    let page_size = opts.page_size.max(1);
    let first = source
        .fetch_page(page_size, 0)
        .await
        .map_err(|e| CatalogError::FirstPage(e.to_string()))?;

    let total = first.count;
    info!(total, page_size, "listing total discovered");

    let mut report = CrawlReport {
        total_count: total,
        ..Default::default()
    };
    let mut entries = first.data;
    handler.on_page(0, &mut entries).await;
    report.pages_fetched += 1;
    info!(
        from = 1,
        to = page_size.min(total),
        "fetched toys"
    );
    report.entries.append(&mut entries);

    let mut offset = page_size;
    while offset < total {
        if !opts.page_delay.is_zero() {
            sleep(opts.page_delay).await;
        }
        match source.fetch_page(page_size, offset).await {
            Ok(page) => {
                let mut entries = page.data;
                handler.on_page(offset, &mut entries).await;
                report.pages_fetched += 1;
                info!(
                    from = offset + 1,
                    to = offset.saturating_add(page_size).min(total),
                    "fetched toys"
                );
                report.entries.append(&mut entries);
            }
            Err(err) => {
                warn!(offset, error = %err, "page skipped");
                report.failed_offsets.push(offset);
            }
        }
        offset = offset.saturating_add(page_size);
    }

    info!(
        scraped = report.entries.len(),
        total,
        failed_pages = report.failed_offsets.len(),
        "crawl finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::client::ListingPage;
    use crate::model::RawToy;
    use std::collections::HashSet;
    use std::sync::Mutex;

    struct FakeListing {
        total: u32,
        failing: HashSet<u32>,
        calls: Mutex<Vec<u32>>,
    }

    impl FakeListing {
        fn new(total: u32, failing: &[u32]) -> Self {
            Self {
                total,
                failing: failing.iter().copied().collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn offsets(&self) -> Vec<u32> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn entry(n: u32) -> RawEntry {
        RawEntry {
            id: Some(format!("inv-{n}")),
            toy: Some(RawToy {
                id: Some(format!("toy-{n:03}")),
                name: Some(format!("Toy {n:03}")),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[async_trait]
    impl ListingSource for FakeListing {
        async fn fetch_page(&self, page_size: u32, offset: u32) -> CatalogResult<ListingPage> {
            self.calls.lock().unwrap().push(offset);
            if self.failing.contains(&offset) {
                return Err(CatalogError::fetch(offset, "http 502 Bad Gateway"));
            }
            let end = (offset + page_size).min(self.total);
            Ok(ListingPage {
                count: self.total,
                data: (offset..end).map(entry).collect(),
            })
        }
    }

    fn opts(page_size: u32) -> CrawlOptions {
        CrawlOptions {
            page_size,
            page_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn walks_every_offset_once() {
        let source = FakeListing::new(25, &[]);
        let report = crawl_all(&source, &opts(12)).await.unwrap();
        assert_eq!(source.offsets(), vec![0, 12, 24]);
        assert_eq!(report.entries.len(), 25);
        assert_eq!(report.pages_fetched, 3);
        assert!(report.is_complete());
        assert_eq!(report.entries[0].toy_id(), Some("toy-000"));
        assert_eq!(report.entries[24].toy_id(), Some("toy-024"));
    }

    #[tokio::test]
    async fn failed_middle_page_leaves_partial_result() {
        let source = FakeListing::new(25, &[12]);
        let report = crawl_all(&source, &opts(12)).await.unwrap();
        assert_eq!(source.offsets(), vec![0, 12, 24]);
        assert_eq!(report.entries.len(), 13);
        assert_eq!(report.failed_offsets, vec![12]);
    }

    #[tokio::test]
    async fn first_page_failure_is_fatal() {
        let source = FakeListing::new(25, &[0]);
        let err = crawl_all(&source, &opts(12)).await.unwrap_err();
        assert!(matches!(err, CatalogError::FirstPage(_)));
        assert_eq!(source.offsets(), vec![0]);
    }

    #[tokio::test]
    async fn empty_catalog_needs_a_single_request() {
        let source = FakeListing::new(0, &[]);
        let report = crawl_all(&source, &opts(12)).await.unwrap();
        assert_eq!(source.offsets(), vec![0]);
        assert!(report.entries.is_empty());
    }

    struct Tagger(Vec<u32>);

    #[async_trait]
    impl PageHandler for Tagger {
        async fn on_page(&mut self, offset: u32, entries: &mut Vec<RawEntry>) {
            self.0.push(offset);
            entries.retain(|e| e.toy_id() != Some("toy-013"));
        }
    }

    #[tokio::test]
    async fn handler_sees_each_page_before_it_is_kept() {
        let source = FakeListing::new(25, &[]);
        let mut tagger = Tagger(Vec::new());
        let report = crawl_with(&source, &opts(12), &mut tagger).await.unwrap();
        assert_eq!(tagger.0, vec![0, 12, 24]);
        assert_eq!(report.entries.len(), 24);
    }
}
