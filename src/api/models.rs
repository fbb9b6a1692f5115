// API request/response models (DTOs)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::database_ops::search::{SearchCriteria, SortOrder, ToyListing};

/// Error body returned for failed requests
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub toys: i64,
    pub timestamp: DateTime<Utc>,
}

/// Search request posted by the browser UI.
///
/// Numeric fields accept JSON numbers or numeric strings; empty strings and
/// nulls mean "no filter".
#[derive(Debug, Default, Deserialize)]
pub struct SearchRequest {
    /// Child age in years.
    #[serde(default, deserialize_with = "lenient_number")]
    pub age: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub min_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub max_price: Option<f64>,
    #[serde(default)]
    pub search_text: Option<String>,
    #[serde(default)]
    pub toy_type: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub sort_by: SortOrder,
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl SearchRequest {
    pub fn into_criteria(self) -> SearchCriteria {
        let mut criteria = SearchCriteria::default()
            .price_between(self.min_price, self.max_price)
            .with_features(self.features)
            .sorted_by(self.sort_by);
        if let Some(years) = self.age.filter(|a| *a >= 0.0) {
            criteria = criteria.at_age_years(years);
        }
        criteria.text = non_blank(self.search_text);
        criteria.toy_type = non_blank(self.toy_type);
        criteria
    }
}

fn lenient_number<'de, D>(de: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Num {
        Float(f64),
        Text(String),
    }
    match Option::<Num>::deserialize(de)? {
        Some(Num::Float(v)) => Ok(Some(v)),
        Some(Num::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Num::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("not a number: {s:?}"))),
        None => Ok(None),
    }
}

/// A search hit with its age bounds also expressed in years.
#[derive(Debug, Serialize)]
pub struct ToyView {
    #[serde(flatten)]
    pub listing: ToyListing,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_age_years: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age_years: Option<f64>,
}

impl From<ToyListing> for ToyView {
    fn from(listing: ToyListing) -> Self {
        let years = |m: Option<i64>| m.map(|m| m as f64 / 12.0);
        Self {
            min_age_years: years(listing.toy.min_age),
            max_age_years: years(listing.toy.max_age),
            listing,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub count: usize,
    pub toys: Vec<ToyView>,
}

impl From<Vec<ToyListing>> for SearchResponse {
    fn from(hits: Vec<ToyListing>) -> Self {
        Self {
            count: hits.len(),
            toys: hits.into_iter().map(ToyView::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database_ops::search::Toy;
    use serde_json::json;

    #[test]
    fn request_maps_to_criteria() {
        let req: SearchRequest = serde_json::from_value(json!({
            "age": "2.5",
            "min_price": 100,
            "max_price": "",
            "search_text": "  Puzzle ",
            "toy_type": "",
            "features": ["Outdoor"],
            "sort_by": "name_desc"
        }))
        .unwrap();
        let c = req.into_criteria();
        assert_eq!(c.age_from, Some(30));
        assert_eq!(c.age_to, Some(30));
        assert_eq!(c.min_price, Some(100.0));
        assert_eq!(c.max_price, None);
        assert_eq!(c.text.as_deref(), Some("Puzzle"));
        assert_eq!(c.toy_type, None);
        assert_eq!(c.features, vec!["Outdoor"]);
        assert_eq!(c.sort, SortOrder::NameDesc);
        assert_eq!(c.limit, None);
    }

    #[test]
    fn empty_request_is_unfiltered() {
        let req: SearchRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(req.into_criteria(), SearchCriteria::default());
    }

    #[test]
    fn garbage_numbers_are_rejected() {
        assert!(serde_json::from_value::<SearchRequest>(json!({ "age": "two" })).is_err());
        assert!(serde_json::from_value::<SearchRequest>(json!({ "sort_by": "random" })).is_err());
    }

    #[test]
    fn response_adds_years_and_count() {
        let hit = ToyListing {
            toy: Toy {
                id: "t1".into(),
                name: "Walker".into(),
                price: Some(499.0),
                short_description: None,
                slug: None,
                toy_type: Some("BIG_TOY".into()),
                min_age: Some(18),
                max_age: None,
                available_stock: 2,
                created_at: None,
            },
            features: vec![],
            images: vec![],
        };
        let body = serde_json::to_value(SearchResponse::from(vec![hit])).unwrap();
        assert_eq!(body["count"], 1);
        let toy = &body["toys"][0];
        assert_eq!(toy["id"], "t1");
        assert_eq!(toy["type"], "BIG_TOY");
        assert_eq!(toy["min_age_years"], 1.5);
        assert!(toy.get("max_age_years").is_none());
    }
}
