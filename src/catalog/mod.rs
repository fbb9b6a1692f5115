// Upstream catalog: GraphQL listing client, pagination driver and snapshot stats.

pub mod client;
pub mod crawl;
pub mod stats;

pub use client::{ListingClient, ListingConfig, ListingPage, ListingSource};
pub use crawl::{crawl_all, crawl_with, CrawlOptions, CrawlReport, PageHandler};
pub use stats::CatalogStats;
