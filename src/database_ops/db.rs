use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Row, SqliteConnection};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

const CREATE_TOYS: &str = r#"
CREATE TABLE IF NOT EXISTS toys (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    price REAL,
    short_description TEXT,
    slug TEXT,
    type TEXT,
    min_age INTEGER,
    max_age INTEGER,
    available_stock INTEGER NOT NULL DEFAULT 0,
    created_at TEXT
)"#;

const CREATE_IMAGES: &str = r#"
CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    toy_id TEXT NOT NULL,
    url TEXT,
    local_path TEXT,
    key TEXT,
    FOREIGN KEY (toy_id) REFERENCES toys(id)
)"#;

const CREATE_FACILITATES: &str = r#"
CREATE TABLE IF NOT EXISTS facilitates (
    id TEXT PRIMARY KEY,
    name TEXT,
    image TEXT,
    is_archived INTEGER NOT NULL DEFAULT 0
)"#;

const CREATE_TOY_FACILITATES: &str = r#"
CREATE TABLE IF NOT EXISTS toy_facilitates (
    toy_id TEXT NOT NULL,
    facilitate_id TEXT NOT NULL,
    PRIMARY KEY (toy_id, facilitate_id),
    FOREIGN KEY (toy_id) REFERENCES toys(id),
    FOREIGN KEY (facilitate_id) REFERENCES facilitates(id)
)"#;

const CREATE_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_images_toy_id ON images(toy_id);
CREATE INDEX IF NOT EXISTS idx_toy_facilitates_facilitate ON toy_facilitates(facilitate_id)
"#;

/// Children before parents, so foreign keys hold at every step.
const TABLES_FK_ORDER: [&str; 4] = ["toy_facilitates", "images", "facilitates", "toys"];

/// Handle to the SQLite store. One connection per process: every statement,
/// including the ingestion transaction, runs on the same connection.
#[derive(Clone, Debug)]
pub struct Db {
    pub pool: SqlitePool,
}

impl Db {
    /// Open (creating if missing) the database file at `path` and ensure the schema.
    pub async fn connect(path: &str) -> Result<Self> {
        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30))
            .foreign_keys(true);
        let db = Self::with_options(opts)
            .await
            .with_context(|| format!("opening sqlite database {path}"))?;
        info!(path, "database connected");
        Ok(db)
    }

    /// Private in-memory store; lives as long as this handle.
    pub async fn in_memory() -> Result<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        Self::with_options(opts).await
    }

    async fn with_options(opts: SqliteConnectOptions) -> Result<Self> {
        // A pooled in-memory database disappears with its connection, so the
        // single connection is never retired.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;
        let db = Self { pool };
        db.create_tables().await?;
        Ok(db)
    }

    pub async fn create_tables(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        create_schema(&mut conn).await?;
        Ok(())
    }

    /// Drop and recreate every table. Used when the schema itself changes
    /// between runs (e.g. stores created before images carried `local_path`).
    pub async fn recreate_tables(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        drop_schema(&mut tx).await?;
        create_schema(&mut tx).await?;
        tx.commit().await?;
        info!("tables recreated");
        Ok(())
    }

    /// Delete all rows, children first.
    pub async fn clear_tables(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        delete_rows(&mut tx).await?;
        tx.commit().await?;
        info!("tables cleared");
        Ok(())
    }

    pub async fn ping(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM toys) AS toys,
                (SELECT COUNT(*) FROM images) AS images,
                (SELECT COUNT(*) FROM images WHERE local_path IS NOT NULL AND local_path != '') AS local_images,
                (SELECT COUNT(*) FROM facilitates) AS features
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(StoreStats {
            toys: row.get("toys"),
            images: row.get("images"),
            local_images: row.get("local_images"),
            features: row.get("features"),
        })
    }
}

/// Create the tables and indexes that are missing. Runs on whatever
/// connection or transaction the caller holds.
pub async fn create_schema(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    for ddl in [
        CREATE_TOYS,
        CREATE_IMAGES,
        CREATE_FACILITATES,
        CREATE_TOY_FACILITATES,
    ] {
        sqlx::query(ddl).execute(&mut *conn).await?;
    }
    sqlx::raw_sql(CREATE_INDEXES).execute(&mut *conn).await?;
    Ok(())
}

pub async fn drop_schema(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    for table in TABLES_FK_ORDER {
        sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn delete_rows(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    for table in TABLES_FK_ORDER {
        sqlx::query(&format!("DELETE FROM {table}"))
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub toys: i64,
    pub images: i64,
    pub local_images: i64,
    pub features: i64,
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        writeln!(f, "{rule}")?;
        writeln!(f, "DATABASE STATISTICS")?;
        writeln!(f, "{rule}")?;
        writeln!(f, "Total toys: {}", self.toys)?;
        writeln!(f, "Total images: {}", self.images)?;
        writeln!(f, "Local images: {}", self.local_images)?;
        writeln!(f, "Failed/missing: {}", self.images - self.local_images)?;
        writeln!(f, "Unique features: {}", self.features)?;
        write!(f, "{rule}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn table_names(db: &Db) -> Vec<String> {
        sqlx::query_scalar::<_, String>(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&db.pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn schema_has_four_tables() {
        let db = Db::in_memory().await.unwrap();
        assert_eq!(
            table_names(&db).await,
            vec!["facilitates", "images", "toy_facilitates", "toys"]
        );
        assert!(db.ping().await);
        assert_eq!(db.stats().await.unwrap(), StoreStats::default());
    }

    #[tokio::test]
    async fn create_tables_is_repeatable() {
        let db = Db::in_memory().await.unwrap();
        db.create_tables().await.unwrap();
        db.recreate_tables().await.unwrap();
        assert_eq!(table_names(&db).await.len(), 4);
    }

    #[tokio::test]
    async fn ping_fails_once_the_pool_is_closed() {
        let db = Db::in_memory().await.unwrap();
        assert!(db.ping().await);
        db.pool.close().await;
        assert!(!db.ping().await);
    }

    #[tokio::test]
    async fn file_store_persists_between_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("toys.db");
        let path = path.to_str().unwrap();
        {
            let db = Db::connect(path).await.unwrap();
            sqlx::query("INSERT INTO toys (id, name) VALUES ('t1', 'Ball')")
                .execute(&db.pool)
                .await
                .unwrap();
            db.pool.close().await;
        }
        let db = Db::connect(path).await.unwrap();
        assert_eq!(db.stats().await.unwrap().toys, 1);
    }
}
