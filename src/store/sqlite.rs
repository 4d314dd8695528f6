use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::error::ScraperError;
use crate::product::ProductRecord;
use crate::traits::ProductStore;

use super::COLUMNS;

const MAX_CONNECTIONS: u32 = 5;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS products (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        product_name TEXT NOT NULL,
        breadcrumb TEXT,
        variant TEXT,
        supplier_article_number TEXT NOT NULL,
        ean_gtin TEXT,
        article_number TEXT,
        description TEXT,
        supplier TEXT,
        supplier_url TEXT NOT NULL UNIQUE,
        image_url TEXT,
        manufacturer TEXT,
        additional_description TEXT,
        scraped_at TEXT NOT NULL
    )
"#;

/// SQLite 上の商品ストア（ローカル実行・テスト用）
#[derive(Debug, Clone)]
pub struct SqliteProductStore {
    pool: SqlitePool,
}

impl SqliteProductStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// `sqlite:products.db` や `sqlite::memory:` に接続
    pub async fn connect(database_url: &str) -> Result<Self, ScraperError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // インメモリDBは接続ごとに別DBになるため1本に固定する
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(MAX_CONNECTIONS)
                .connect_with(options)
                .await?
        };

        info!("Connected to SQLite product store");
        Ok(Self::new(pool))
    }

    /// テスト用インメモリストア
    pub async fn in_memory() -> Result<Self, ScraperError> {
        Self::connect("sqlite::memory:").await
    }
}

#[async_trait]
impl ProductStore for SqliteProductStore {
    async fn initialize(&self) -> Result<(), ScraperError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        debug!("products table ready");
        Ok(())
    }

    async fn already_seen(&self, supplier_url: &str) -> Result<bool, ScraperError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE supplier_url = ?")
                .bind(supplier_url)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    async fn upsert_if_absent(&self, record: &ProductRecord) -> Result<bool, ScraperError> {
        let sql = format!(
            "INSERT INTO products ({COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (supplier_url) DO NOTHING"
        );
        let result = sqlx::query(&sql)
            .bind(&record.product_name)
            .bind(&record.breadcrumb)
            .bind(&record.variant)
            .bind(&record.supplier_article_number)
            .bind(&record.ean_gtin)
            .bind(&record.article_number)
            .bind(&record.description)
            .bind(&record.supplier)
            .bind(&record.supplier_url)
            .bind(&record.image_url)
            .bind(&record.manufacturer)
            .bind(&record.additional_description)
            .bind(record.scraped_at)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn records(&self) -> Result<Vec<ProductRecord>, ScraperError> {
        let sql = format!("SELECT {COLUMNS} FROM products ORDER BY id");
        let rows = sqlx::query_as::<_, ProductRecord>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(url: &str, name: &str) -> ProductRecord {
        ProductRecord {
            product_name: name.to_string(),
            breadcrumb: None,
            variant: None,
            supplier_article_number: "SKU-1".to_string(),
            ean_gtin: None,
            article_number: None,
            description: None,
            supplier: Some("igefa".to_string()),
            supplier_url: url.to_string(),
            image_url: Some("https://cdn.example.com/1.jpg".to_string()),
            manufacturer: None,
            additional_description: None,
            scraped_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    async fn store() -> SqliteProductStore {
        let store = SqliteProductStore::in_memory().await.unwrap();
        store.initialize().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let store = store().await;
        store.initialize().await.unwrap();
        store.initialize().await.unwrap();
        assert!(store.records().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_first_write_wins() {
        let store = store().await;
        let url = "https://store.example.com/p/a/1";

        assert!(!store.already_seen(url).await.unwrap());
        assert!(store.upsert_if_absent(&record(url, "first")).await.unwrap());
        assert!(store.already_seen(url).await.unwrap());
        assert!(!store.upsert_if_absent(&record(url, "second")).await.unwrap());

        let rows = store.records().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0], record(url, "first"));
    }

    #[tokio::test]
    async fn test_concurrent_writes_store_one_row() {
        let store = store().await;
        let url = "https://store.example.com/p/race/9";
        let a = record(url, "a");
        let b = record(url, "b");

        let (ra, rb) = tokio::join!(store.upsert_if_absent(&a), store.upsert_if_absent(&b));
        let inserted = [ra.unwrap(), rb.unwrap()];

        assert_eq!(inserted.iter().filter(|i| **i).count(), 1);
        assert_eq!(store.records().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_writes_on_file_database() {
        let path = std::env::temp_dir().join(format!(
            "catalog-harvester-race-{}-{}.db",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let store = SqliteProductStore::connect(&format!("sqlite:{}", path.display()))
            .await
            .unwrap();
        store.initialize().await.unwrap();

        let url = "https://store.example.com/p/race/20";
        let handles: Vec<_> = (0..20)
            .map(|i| {
                let store = store.clone();
                let record = record(url, &format!("writer-{i}"));
                tokio::spawn(async move { store.upsert_if_absent(&record).await })
            })
            .collect();

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() {
                inserted += 1;
            }
        }

        assert_eq!(inserted, 1);
        assert_eq!(store.records().await.unwrap().len(), 1);

        store.pool.close().await;
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_records_in_insertion_order() {
        let store = store().await;
        for i in 0..3 {
            let url = format!("https://store.example.com/p/{i}");
            store.upsert_if_absent(&record(&url, "x")).await.unwrap();
        }
        let urls: Vec<String> = store
            .records()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.supplier_url)
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://store.example.com/p/0",
                "https://store.example.com/p/1",
                "https://store.example.com/p/2",
            ]
        );
    }
}
