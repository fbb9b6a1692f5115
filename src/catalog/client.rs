use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::error::{CatalogError, CatalogResult};
use crate::model::RawEntry;
use crate::util::env as env_util;

const OPERATION_NAME: &str = "PincodeToysListing";

const LISTING_QUERY: &str = r#"query PincodeToysListing($where: LibraryUniqueInput, $sort: LibraryInventorySort, $filter: LibraryInventoryFilter) {
  pincodeToysListing(where: $where, sort: $sort, filter: $filter) {
    count
    data {
      id
      createdAt
      availableStock
      toy {
        id
        name
        price
        shortDescription
        slug
        images {
          url
          key
          __typename
        }
        facilitates {
          id
          image
          isArchived
          name
          __typename
        }
        ageGroup {
          id
          maxAge
          minAge
          __typename
        }
        type
        __typename
      }
      __typename
    }
    __typename
  }
}"#;

/// Upstream endpoint settings. Defaults target the public library listing.
#[derive(Debug, Clone)]
pub struct ListingConfig {
    pub api_url: String,
    pub library_id: String,
    pub pincode_id: String,
    pub page_size: u32,
    pub page_delay: Duration,
    pub timeout: Duration,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            api_url: "https://server.theelefant.com/main-server/graphql".into(),
            library_id: "c34fbe5b-4c9c-479d-b182-98be79856cf5".into(),
            pincode_id: "07fcc988-5747-44b4-a1fc-35230d96e0c4".into(),
            page_size: 12,
            page_delay: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ListingConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            api_url: env_util::env_opt("TOYS_API_URL").unwrap_or(d.api_url),
            library_id: env_util::env_opt("TOYS_LIBRARY_ID").unwrap_or(d.library_id),
            pincode_id: env_util::env_opt("TOYS_PINCODE_ID").unwrap_or(d.pincode_id),
            page_size: env_util::env_parse("TOYS_PAGE_SIZE", d.page_size).max(1),
            page_delay: Duration::from_millis(env_util::env_parse("TOYS_PAGE_DELAY_MS", 500u64)),
            timeout: Duration::from_secs(env_util::env_parse("TOYS_HTTP_TIMEOUT_SECS", 30u64)),
        }
    }
}

/// One decoded listing page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingPage {
    pub count: u32,
    #[serde(default)]
    pub data: Vec<RawEntry>,
}

/// Anything that can serve listing pages by (page_size, offset).
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch_page(&self, page_size: u32, offset: u32) -> CatalogResult<ListingPage>;
}

#[derive(Debug, Deserialize)]
struct GraphqlEnvelope {
    data: Option<ListingData>,
    errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListingData {
    pincode_toys_listing: Option<ListingPage>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: Option<String>,
}

/// GraphQL client for the `PincodeToysListing` operation.
#[derive(Debug, Clone)]
pub struct ListingClient {
    http: Client,
    cfg: ListingConfig,
}

impl ListingClient {
    pub fn new(cfg: ListingConfig) -> anyhow::Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("*/*"));
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header::HeaderValue::from_static("en-IN,en-GB;q=0.9,en-US;q=0.8,en;q=0.7"),
        );
        headers.insert(
            header::ORIGIN,
            header::HeaderValue::from_static("https://www.theelefant.ai"),
        );
        headers.insert(
            header::REFERER,
            header::HeaderValue::from_static("https://www.theelefant.ai/"),
        );
        let http = Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .default_headers(headers)
            .timeout(cfg.timeout)
            .build()?;
        Ok(Self { http, cfg })
    }

    /// Request body for one page. Every filter list stays empty: the whole
    /// pincode inventory is crawled, sorted by name ascending.
    pub fn build_query(&self, limit: u32, skip: u32) -> Value {
        json!({
            "operationName": OPERATION_NAME,
            "variables": {
                "where": { "id": self.cfg.library_id },
                "filter": {
                    "ageGroupIds": [],
                    "categoryIds": [],
                    "brandIds": [],
                    "facilitateIds": [],
                    "pincodeId": self.cfg.pincode_id,
                    "tagIds": [],
                    "limit": limit,
                    "skip": skip,
                    "toyTypes": []
                },
                "sort": { "field": "name", "order": "ASC" }
            },
            "query": LISTING_QUERY,
        })
    }
}

/// Pull the listing out of a GraphQL response body.
pub fn decode_listing(body: &str, offset: u32) -> CatalogResult<ListingPage> {
    let envelope: GraphqlEnvelope =
        serde_json::from_str(body).map_err(|e| CatalogError::fetch(offset, e))?;
    if let Some(page) = envelope.data.and_then(|d| d.pincode_toys_listing) {
        return Ok(page);
    }
    let reason = envelope
        .errors
        .unwrap_or_default()
        .into_iter()
        .filter_map(|e| e.message)
        .collect::<Vec<_>>()
        .join("; ");
    Err(CatalogError::fetch(
        offset,
        if reason.is_empty() {
            "response carried no listing data".to_string()
        } else {
            format!("graphql: {reason}")
        },
    ))
}

#[async_trait]
impl ListingSource for ListingClient {
    async fn fetch_page(&self, page_size: u32, offset: u32) -> CatalogResult<ListingPage> {
        let body = self.build_query(page_size, offset);
        let resp = self
            .http
            .post(&self.cfg.api_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CatalogError::fetch(offset, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CatalogError::fetch(offset, format!("http {status}")));
        }
        let text = resp
            .text()
            .await
            .map_err(|e| CatalogError::fetch(offset, e))?;
        debug!(offset, bytes = text.len(), "listing page received");
        decode_listing(&text, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_substitutes_pagination_variables() {
        let client = ListingClient::new(ListingConfig::default()).unwrap();
        let q = client.build_query(12, 24);
        assert_eq!(q["operationName"], "PincodeToysListing");
        assert_eq!(q["variables"]["filter"]["limit"], 12);
        assert_eq!(q["variables"]["filter"]["skip"], 24);
        assert_eq!(
            q["variables"]["filter"]["pincodeId"],
            "07fcc988-5747-44b4-a1fc-35230d96e0c4"
        );
        assert_eq!(q["variables"]["sort"]["field"], "name");
        assert!(q["query"].as_str().unwrap().contains("pincodeToysListing"));
    }

    #[test]
    fn decodes_listing_payload() {
        let body = r#"{"data":{"pincodeToysListing":{"count":25,"data":[{"id":"a","toy":{"id":"t1","name":"Ball"}}]}}}"#;
        let page = decode_listing(body, 0).unwrap();
        assert_eq!(page.count, 25);
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].toy_id(), Some("t1"));
    }

    #[test]
    fn graphql_errors_become_fetch_failures() {
        let body = r#"{"data":null,"errors":[{"message":"pincode not serviceable"}]}"#;
        match decode_listing(body, 36) {
            Err(CatalogError::Fetch { offset, reason }) => {
                assert_eq!(offset, 36);
                assert!(reason.contains("pincode not serviceable"));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(decode_listing("<html>", 0).is_err());
    }
}
