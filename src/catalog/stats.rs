use std::collections::BTreeMap;
use std::fmt;

use crate::model::RawEntry;

/// Summary of a crawled snapshot, printed after `scrape`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogStats {
    pub total: usize,
    /// "{min}-{max}" in months -> toys in that group.
    pub age_groups: BTreeMap<String, usize>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub price_avg: Option<f64>,
    pub available: usize,
    pub out_of_stock: usize,
}

impl CatalogStats {
    pub fn from_entries(entries: &[RawEntry]) -> Self {
        let mut stats = Self {
            total: entries.len(),
            ..Default::default()
        };
        let mut prices = Vec::new();
        for entry in entries {
            if entry.stock() > 0 {
                stats.available += 1;
            } else {
                stats.out_of_stock += 1;
            }
            let Some(toy) = entry.toy.as_ref() else {
                continue;
            };
            if toy.age_group.is_some() {
                let (min, max) = toy.age_bounds();
                let key = format!("{}-{}", fmt_age(min), fmt_age(max));
                *stats.age_groups.entry(key).or_default() += 1;
            }
            if let Some(p) = toy.price.filter(|p| *p > 0.0) {
                prices.push(p);
            }
        }
        if !prices.is_empty() {
            stats.price_min = prices.iter().copied().reduce(f64::min);
            stats.price_max = prices.iter().copied().reduce(f64::max);
            stats.price_avg = Some(prices.iter().sum::<f64>() / prices.len() as f64);
        }
        stats
    }
}

fn fmt_age(v: Option<i64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_else(|| "N/A".into())
}

impl fmt::Display for CatalogStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(50);
        writeln!(f, "{rule}")?;
        writeln!(f, "TOY COLLECTION STATISTICS")?;
        writeln!(f, "{rule}")?;
        writeln!(f, "Total Toys: {}", self.total)?;
        writeln!(f, "\nAge Groups (months):")?;
        for (group, count) in &self.age_groups {
            writeln!(f, "  {group}: {count} toys")?;
        }
        if let (Some(min), Some(max), Some(avg)) = (self.price_min, self.price_max, self.price_avg) {
            writeln!(f, "\nPrice Range:")?;
            writeln!(f, "  Minimum: {min}")?;
            writeln!(f, "  Maximum: {max}")?;
            writeln!(f, "  Average: {avg:.2}")?;
        }
        writeln!(f, "\nAvailability:")?;
        writeln!(f, "  Available: {} toys", self.available)?;
        writeln!(f, "  Out of Stock: {} toys", self.out_of_stock)?;
        write!(f, "{rule}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summarizes_prices_ages_and_stock() {
        let entries: Vec<RawEntry> = serde_json::from_value(json!([
            { "availableStock": 2, "toy": { "id": "a", "price": 100, "ageGroup": { "minAge": 12, "maxAge": 36 } } },
            { "availableStock": 0, "toy": { "id": "b", "price": 300, "ageGroup": { "minAge": 12, "maxAge": 36 } } },
            { "toy": { "id": "c", "ageGroup": { "minAge": 36, "maxAge": 72 } } }
        ]))
        .unwrap();
        let stats = CatalogStats::from_entries(&entries);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.available, 1);
        assert_eq!(stats.out_of_stock, 2);
        assert_eq!(stats.age_groups.get("12-36"), Some(&2));
        assert_eq!(stats.age_groups.get("36-72"), Some(&1));
        assert_eq!(stats.price_min, Some(100.0));
        assert_eq!(stats.price_max, Some(300.0));
        assert_eq!(stats.price_avg, Some(200.0));
        assert!(stats.to_string().contains("Available: 1 toys"));
    }

    #[test]
    fn empty_snapshot_has_no_price_range() {
        let stats = CatalogStats::from_entries(&[]);
        assert_eq!(stats.total, 0);
        assert!(stats.price_min.is_none());
    }
}
