use thiserror::Error;

/// Failures surfaced by the ingestion pipeline.
///
/// Only `FirstPage` is fatal for a crawl; page and image failures are logged,
/// counted and skipped by the drivers that produce them.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("listing fetch failed at offset {offset}: {reason}")]
    Fetch { offset: u32, reason: String },
    #[error("first listing page unavailable, total count unknown: {0}")]
    FirstPage(String),
    #[error("image download failed for {url}: {reason}")]
    ImageDownload { url: String, reason: String },
    #[error("snapshot {path}: {reason}")]
    Snapshot { path: String, reason: String },
    #[error("store: {0}")]
    Store(#[from] sqlx::Error),
}

impl CatalogError {
    pub fn fetch(offset: u32, reason: impl ToString) -> Self {
        Self::Fetch {
            offset,
            reason: reason.to_string(),
        }
    }

    pub fn image(url: &str, reason: impl ToString) -> Self {
        Self::ImageDownload {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;
