use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite};

use crate::database_ops::db::Db;

/// Separator for the aggregated feature column; never appears in feature names.
const FEATURE_SEP: char = '\u{1f}';

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Toy {
    pub id: String,
    pub name: String,
    pub price: Option<f64>,
    pub short_description: Option<String>,
    pub slug: Option<String>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub toy_type: Option<String>,
    pub min_age: Option<i64>,
    pub max_age: Option<i64>,
    pub available_stock: i64,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ToyImage {
    pub id: i64,
    pub toy_id: String,
    pub url: Option<String>,
    pub local_path: Option<String>,
    pub key: Option<String>,
}

impl ToyImage {
    /// Local copy when one was downloaded, otherwise the remote URL.
    pub fn source(&self) -> Option<&str> {
        self.local_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .or(self.url.as_deref())
    }
}

/// A search hit: the toy row, its linked feature names and its images.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToyListing {
    #[serde(flatten)]
    pub toy: Toy,
    pub features: Vec<String>,
    pub images: Vec<ToyImage>,
}

#[derive(sqlx::FromRow)]
struct ToyRow {
    #[sqlx(flatten)]
    toy: Toy,
    features: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    PriceAsc,
    PriceDesc,
    NameAsc,
    NameDesc,
}

impl SortOrder {
    fn order_by(self) -> &'static str {
        match self {
            Self::PriceAsc => " ORDER BY t.price ASC, t.rowid ASC",
            Self::PriceDesc => " ORDER BY t.price DESC, t.rowid ASC",
            Self::NameAsc => " ORDER BY LOWER(t.name) ASC, t.rowid ASC",
            Self::NameDesc => " ORDER BY LOWER(t.name) DESC, t.rowid ASC",
        }
    }
}

/// Whole months for a (possibly fractional) age in years, floored.
pub fn years_to_months(years: f64) -> i64 {
    (years * 12.0).floor() as i64
}

/// Filter predicate; every populated field must hold (logical AND).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchCriteria {
    /// Toy must still suit a child this old (`max_age >= age_from`).
    pub age_from: Option<i64>,
    /// Toy must already suit a child this old (`min_age <= age_to`).
    pub age_to: Option<i64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub text: Option<String>,
    pub toy_type: Option<String>,
    /// Feature names that must all be linked to the toy.
    pub features: Vec<String>,
    pub sort: SortOrder,
    pub limit: Option<i64>,
}

impl SearchCriteria {
    /// Toys whose age range contains `months`.
    pub fn at_age_months(mut self, months: i64) -> Self {
        self.age_from = Some(months);
        self.age_to = Some(months);
        self
    }

    pub fn at_age_years(self, years: f64) -> Self {
        self.at_age_months(years_to_months(years))
    }

    /// Toys whose age range overlaps `[from, to]` months.
    pub fn overlapping_ages(mut self, from: i64, to: i64) -> Self {
        self.age_from = Some(from.min(to));
        self.age_to = Some(from.max(to));
        self
    }

    pub fn price_between(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_price = min;
        self.max_price = max;
        self
    }

    pub fn matching_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn of_type(mut self, toy_type: impl Into<String>) -> Self {
        self.toy_type = Some(toy_type.into());
        self
    }

    pub fn with_features<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn sorted_by(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn limited_to(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    fn push_filters(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        if let Some(age) = self.age_to {
            qb.push(" AND t.min_age <= ").push_bind(age);
        }
        if let Some(age) = self.age_from {
            qb.push(" AND t.max_age >= ").push_bind(age);
        }
        if let Some(p) = self.min_price {
            qb.push(" AND t.price >= ").push_bind(p);
        }
        if let Some(p) = self.max_price {
            qb.push(" AND t.price <= ").push_bind(p);
        }
        if let Some(needle) = self
            .text
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            // SQLite LOWER() folds ASCII only; fold the needle the same way.
            let needle = needle.to_ascii_lowercase();
            qb.push(" AND (instr(LOWER(t.name), ")
                .push_bind(needle.clone())
                .push(") > 0 OR instr(LOWER(COALESCE(t.short_description, '')), ")
                .push_bind(needle)
                .push(") > 0)");
        }
        if let Some(t) = self.toy_type.as_deref().filter(|s| !s.is_empty()) {
            qb.push(" AND t.type = ").push_bind(t.to_string());
        }
        for name in self.features.iter().filter(|n| !n.is_empty()) {
            qb.push(
                " AND EXISTS (SELECT 1 FROM toy_facilitates tf \
                 JOIN facilitates f ON f.id = tf.facilitate_id \
                 WHERE tf.toy_id = t.id AND f.name = ",
            )
            .push_bind(name.clone())
            .push(")");
        }
    }
}

/// Run a filtered search. Each hit gets its images through a second query.
pub async fn search_toys(db: &Db, criteria: &SearchCriteria) -> Result<Vec<ToyListing>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT t.id, t.name, t.price, t.short_description, t.slug, t.type,
               t.min_age, t.max_age, t.available_stock, t.created_at,
               (SELECT GROUP_CONCAT(f.name, char(31))
                  FROM toy_facilitates tf
                  JOIN facilitates f ON f.id = tf.facilitate_id
                 WHERE tf.toy_id = t.id) AS features
        FROM toys t
        WHERE 1=1"#,
    );
    criteria.push_filters(&mut qb);
    qb.push(criteria.sort.order_by());
    if let Some(limit) = criteria.limit.filter(|l| *l > 0) {
        qb.push(" LIMIT ").push_bind(limit);
    }

    let rows: Vec<ToyRow> = qb.build_query_as().fetch_all(&db.pool).await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let images = toy_images(db, &row.toy.id).await?;
        let features = row
            .features
            .map(|s| {
                s.split(FEATURE_SEP)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        out.push(ToyListing {
            toy: row.toy,
            features,
            images,
        });
    }
    Ok(out)
}

pub async fn toy_images(db: &Db, toy_id: &str) -> Result<Vec<ToyImage>> {
    Ok(sqlx::query_as::<_, ToyImage>(
        "SELECT id, toy_id, url, local_path, key FROM images WHERE toy_id = ? ORDER BY id",
    )
    .bind(toy_id)
    .fetch_all(&db.pool)
    .await?)
}

/// Non-archived feature names, alphabetical.
pub async fn available_features(db: &Db) -> Result<Vec<String>> {
    Ok(sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT name FROM facilitates WHERE is_archived = 0 AND name IS NOT NULL ORDER BY name",
    )
    .fetch_all(&db.pool)
    .await?)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PriceRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

pub async fn price_range(db: &Db) -> Result<PriceRange> {
    let (min, max): (Option<f64>, Option<f64>) =
        sqlx::query_as("SELECT MIN(price), MAX(price) FROM toys WHERE price IS NOT NULL")
            .fetch_one(&db.pool)
            .await?;
    Ok(PriceRange { min, max })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct AgeRange {
    pub min_age: i64,
    pub max_age: i64,
}

pub async fn age_ranges(db: &Db) -> Result<Vec<AgeRange>> {
    Ok(sqlx::query_as::<_, AgeRange>(
        r#"
        SELECT DISTINCT min_age, max_age
        FROM toys
        WHERE min_age IS NOT NULL AND max_age IS NOT NULL
        ORDER BY min_age, max_age
        "#,
    )
    .fetch_all(&db.pool)
    .await?)
}

pub async fn toy_types(db: &Db) -> Result<Vec<String>> {
    Ok(sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT type FROM toys WHERE type IS NOT NULL ORDER BY type",
    )
    .fetch_all(&db.pool)
    .await?)
}
