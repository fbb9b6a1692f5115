//! Record types shared by the fetch, materialize, merge and load stages.
//!
//! Raw* types mirror the upstream listing payload (and the snapshot files written
//! from it). Optional wrappers reflect sporadic omissions in upstream responses;
//! `__typename` and other unmodeled keys are ignored on read.

use serde::{Deserialize, Deserializer, Serialize};

/// One element of `pincodeToysListing.data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_stock: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toy: Option<RawToy>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawToy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub images: Vec<RawImage>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub facilitates: Vec<RawFacilitate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_group: Option<RawAgeGroup>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub toy_type: Option<String>,
    // Flattened copies some snapshot variants carry on the toy itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_age: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_stock: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawImage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFacilitate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub is_archived: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAgeGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_age: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<i64>,
}

impl RawEntry {
    /// Toy identifier, if the entry carries a usable toy payload.
    pub fn toy_id(&self) -> Option<&str> {
        self.toy
            .as_ref()
            .and_then(|t| t.id.as_deref())
            .filter(|id| !id.trim().is_empty())
    }

    /// Stock as reported on the listing row, falling back to the toy payload.
    pub fn stock(&self) -> i64 {
        self.available_stock
            .or_else(|| self.toy.as_ref().and_then(|t| t.available_stock))
            .unwrap_or(0)
    }

    pub fn created(&self) -> Option<&str> {
        self.created_at
            .as_deref()
            .or_else(|| self.toy.as_ref().and_then(|t| t.created_at.as_deref()))
    }
}

impl RawToy {
    /// (min_age, max_age) in months; the nested age group wins over flattened copies.
    pub fn age_bounds(&self) -> (Option<i64>, Option<i64>) {
        let group = self.age_group.as_ref();
        let min = group.and_then(|g| g.min_age).or(self.min_age);
        let max = group.and_then(|g| g.max_age).or(self.max_age);
        (min, max)
    }
}

fn null_as_empty<'de, D, T>(de: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(de)?.unwrap_or_default())
}

// Upstream sends a bool; older snapshots stored 0/1.
fn lenient_flag<'de, D>(de: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Text(String),
    }
    Ok(match Option::<Flag>::deserialize(de)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Int(n)) => n != 0,
        Some(Flag::Text(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true"),
        None => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_upstream_listing_row() {
        let row = json!({
            "id": "inv-1",
            "createdAt": "2024-03-01T10:00:00.000Z",
            "availableStock": 3,
            "toy": {
                "id": "toy-1",
                "name": "Stacking Rings",
                "price": 349,
                "shortDescription": "Classic rings",
                "slug": "stacking-rings",
                "images": [{ "url": "https://cdn/x.jpg", "key": "k1", "__typename": "Image" }],
                "facilitates": [{ "id": "f1", "name": "Motor Skills", "image": null, "isArchived": false }],
                "ageGroup": { "id": "ag", "minAge": 12, "maxAge": 36 },
                "type": "PUZZLE",
                "__typename": "Toy"
            },
            "__typename": "LibraryInventory"
        });
        let entry: RawEntry = serde_json::from_value(row).unwrap();
        let toy = entry.toy.as_ref().unwrap();
        assert_eq!(entry.toy_id(), Some("toy-1"));
        assert_eq!(entry.stock(), 3);
        assert_eq!(toy.price, Some(349.0));
        assert_eq!(toy.toy_type.as_deref(), Some("PUZZLE"));
        assert_eq!(toy.age_bounds(), (Some(12), Some(36)));
        assert_eq!(toy.images[0].key.as_deref(), Some("k1"));
        assert!(!toy.facilitates[0].is_archived);
    }

    #[test]
    fn tolerates_nulls_and_legacy_flags() {
        let entry: RawEntry = serde_json::from_value(json!({
            "toy": {
                "id": "toy-2",
                "images": null,
                "facilitates": [{ "id": "f2", "isArchived": 1 }],
                "minAge": 24,
                "maxAge": 48,
                "availableStock": 2
            }
        }))
        .unwrap();
        let toy = entry.toy.as_ref().unwrap();
        assert!(toy.images.is_empty());
        assert!(toy.facilitates[0].is_archived);
        assert_eq!(toy.age_bounds(), (Some(24), Some(48)));
        assert_eq!(entry.stock(), 2);
    }

    #[test]
    fn blank_toy_id_is_not_an_identifier() {
        let entry: RawEntry = serde_json::from_value(json!({ "toy": { "id": "  " } })).unwrap();
        assert_eq!(entry.toy_id(), None);
        assert_eq!(RawEntry::default().toy_id(), None);
    }

    #[test]
    fn local_path_keeps_snake_case_key() {
        let image = RawImage {
            url: Some("https://cdn/a.jpg".into()),
            local_path: Some("toy_images/t_0.jpg".into()),
            key: None,
        };
        let v = serde_json::to_value(&image).unwrap();
        assert_eq!(v, json!({ "url": "https://cdn/a.jpg", "local_path": "toy_images/t_0.jpg" }));
    }
}
