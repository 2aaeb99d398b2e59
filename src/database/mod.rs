use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{Row, Sqlite, SqlitePool, migrate::MigrateDatabase};
use tracing::info;

use crate::models::{ProductRecord, TrendEntry};

/// SQLite-backed store for cached trend entries, keyed by search query.
pub struct TrendStore {
    pool: SqlitePool,
}

impl TrendStore {
    pub async fn new(db_url: &str) -> Result<Self> {
        // Create database file if it doesn't exist
        if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            info!("Creating database file");
            Sqlite::create_database(db_url).await?;
        }

        let pool = SqlitePool::connect(db_url).await?;

        // Run migrations
        info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("Database initialized successfully");
        Ok(Self { pool })
    }

    pub async fn get(&self, search_query: &str) -> Result<Option<TrendEntry>> {
        let row = sqlx::query(
            r"
            SELECT search_query, products, created_at, updated_at
            FROM trends
            WHERE search_query = ?
            ",
        )
        .bind(search_query)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let products: Vec<ProductRecord> =
                serde_json::from_str(&row.get::<String, _>("products"))?;

            Ok(TrendEntry {
                search_query: row.get("search_query"),
                products,
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            })
        })
        .transpose()
    }

    /// Replace the product list for `search_query` wholesale, preserving
    /// `created_at` for existing entries.
    pub async fn upsert(
        &self,
        search_query: &str,
        products: &[ProductRecord],
    ) -> Result<TrendEntry> {
        let now = Utc::now();
        let products_json = serde_json::to_string(products)?;

        sqlx::query(
            r"
            INSERT INTO trends (search_query, products, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(search_query) DO UPDATE SET
                products = excluded.products,
                updated_at = excluded.updated_at
            ",
        )
        .bind(search_query)
        .bind(&products_json)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get(search_query)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Trend entry missing after upsert: {search_query:?}"))
    }

    /// Every search query currently cached, oldest refresh first.
    pub async fn all_queries(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT search_query FROM trends ORDER BY updated_at ASC")
            .fetch_all(&self.pool)
            .await?;

        let queries = rows
            .into_iter()
            .map(|row| row.get::<String, _>("search_query"))
            .collect();

        Ok(queries)
    }
}

impl Clone for TrendStore {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

#[cfg(test)]
impl TrendStore {
    pub(crate) async fn in_memory() -> Result<Self> {
        // A single connection keeps every query on the same :memory: database
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub(crate) async fn set_updated_at(
        &self,
        search_query: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE trends SET updated_at = ? WHERE search_query = ?")
            .bind(updated_at)
            .bind(search_query)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
