use anyhow::{Context, Result};
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

use crate::database_ops::db::{create_schema, delete_rows, drop_schema, Db};
use crate::error::CatalogResult;
use crate::media::normalize_local_path;
use crate::model::{RawEntry, RawFacilitate, RawImage};

/// How a snapshot load treats what is already in the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LoadMode {
    /// Upsert on top of existing rows.
    #[default]
    Append,
    /// Delete every row first, then load.
    Replace,
    /// Drop and recreate the schema, then load.
    Recreate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub imported: usize,
    /// Entries without a toy payload or identifier.
    pub skipped: usize,
    pub images: usize,
    pub feature_links: usize,
}

/// Rows written for a single toy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertCounts {
    pub images: usize,
    pub feature_links: usize,
}

/// Write one listing entry into the store.
///
/// Returns `None` (and writes nothing) when the entry has no toy id. The toy
/// row is a full overwrite keyed by id. The toy's image rows are replaced
/// by the entry's images, so reloading the same snapshot never grows the
/// images table. Features are insert-or-ignore (first definition wins), as
/// are toy-feature links.
pub async fn upsert_entry(
    conn: &mut SqliteConnection,
    entry: &RawEntry,
) -> CatalogResult<Option<UpsertCounts>> {
    let (Some(toy), Some(toy_id)) = (entry.toy.as_ref(), entry.toy_id()) else {
        return Ok(None);
    };

    let (mut min_age, mut max_age) = toy.age_bounds();
    if let (Some(lo), Some(hi)) = (min_age, max_age) {
        if lo > hi {
            warn!(toy_id, min_age = lo, max_age = hi, "age bounds reversed; swapping");
            (min_age, max_age) = (Some(hi), Some(lo));
        }
    }

    sqlx::query(
        r#"
        INSERT INTO toys
            (id, name, price, short_description, slug, type, min_age, max_age, available_stock, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            price = excluded.price,
            short_description = excluded.short_description,
            slug = excluded.slug,
            type = excluded.type,
            min_age = excluded.min_age,
            max_age = excluded.max_age,
            available_stock = excluded.available_stock,
            created_at = excluded.created_at
        "#,
    )
    .bind(toy_id)
    .bind(toy.name.as_deref().unwrap_or_default())
    .bind(toy.price)
    .bind(toy.short_description.as_deref())
    .bind(toy.slug.as_deref())
    .bind(toy.toy_type.as_deref())
    .bind(min_age)
    .bind(max_age)
    .bind(entry.stock())
    .bind(entry.created())
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM images WHERE toy_id = ?")
        .bind(toy_id)
        .execute(&mut *conn)
        .await?;
    let mut counts = UpsertCounts::default();
    for image in &toy.images {
        insert_image(conn, toy_id, image).await?;
        counts.images += 1;
    }

    for facilitate in &toy.facilitates {
        if link_facilitate(conn, toy_id, facilitate).await? {
            counts.feature_links += 1;
        }
    }

    Ok(Some(counts))
}

async fn insert_image(
    conn: &mut SqliteConnection,
    toy_id: &str,
    image: &RawImage,
) -> Result<(), sqlx::Error> {
    let local_path = image
        .local_path
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .map(normalize_local_path);
    sqlx::query("INSERT INTO images (toy_id, url, local_path, key) VALUES (?, ?, ?, ?)")
        .bind(toy_id)
        .bind(image.url.as_deref())
        .bind(local_path)
        .bind(image.key.as_deref())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Returns whether a facilitate with an id was seen (and linked).
async fn link_facilitate(
    conn: &mut SqliteConnection,
    toy_id: &str,
    facilitate: &RawFacilitate,
) -> Result<bool, sqlx::Error> {
    let Some(fid) = facilitate.id.as_deref().filter(|id| !id.trim().is_empty()) else {
        return Ok(false);
    };
    sqlx::query(
        "INSERT OR IGNORE INTO facilitates (id, name, image, is_archived) VALUES (?, ?, ?, ?)",
    )
    .bind(fid)
    .bind(facilitate.name.as_deref())
    .bind(facilitate.image.as_deref())
    .bind(facilitate.is_archived)
    .execute(&mut *conn)
    .await?;
    sqlx::query("INSERT OR IGNORE INTO toy_facilitates (toy_id, facilitate_id) VALUES (?, ?)")
        .bind(toy_id)
        .bind(fid)
        .execute(&mut *conn)
        .await?;
    Ok(true)
}

/// Load a batch of entries in a single transaction, committed once at the end.
/// Clearing or recreating the tables happens inside that transaction, so a
/// failed load leaves the previous catalog in place.
pub async fn load_entries(db: &Db, entries: &[RawEntry], mode: LoadMode) -> Result<LoadReport> {
    let mut tx = db.pool.begin().await.context("begin load transaction")?;
    match mode {
        LoadMode::Append => {}
        LoadMode::Replace => delete_rows(&mut tx).await.context("clearing tables")?,
        LoadMode::Recreate => {
            drop_schema(&mut tx).await.context("dropping tables")?;
            create_schema(&mut tx).await.context("creating tables")?;
        }
    }

    let mut report = LoadReport::default();
    for (idx, entry) in entries.iter().enumerate() {
        match upsert_entry(&mut tx, entry)
            .await
            .with_context(|| format!("upserting entry #{}", idx + 1))?
        {
            Some(counts) => {
                report.imported += 1;
                report.images += counts.images;
                report.feature_links += counts.feature_links;
            }
            None => {
                debug!(index = idx, "entry without toy id skipped");
                report.skipped += 1;
            }
        }
        if (idx + 1) % 100 == 0 {
            info!(processed = idx + 1, total = entries.len(), "loading toys");
        }
    }
    tx.commit().await.context("commit load transaction")?;

    info!(
        imported = report.imported,
        skipped = report.skipped,
        images = report.images,
        mode = ?mode,
        "snapshot loaded into store"
    );
    Ok(report)
}
