//! PostgreSQL 上の商品ストア
//!
//! 列名は `variant` / `additional_description` / `scraped_at`。
//! 旧スキーマ（`ausfuhrung` / `add_description` / `timestamp`）の `products` テーブルが
//! 既にある場合は `CREATE TABLE IF NOT EXISTS` が何もしないため挿入に失敗する。
//! 別のデータベースを使うか、事前に列名を変更すること。

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};

use crate::error::ScraperError;
use crate::product::ProductRecord;
use crate::traits::ProductStore;

use super::COLUMNS;

const MAX_CONNECTIONS: u32 = 5;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS products (
        id SERIAL PRIMARY KEY,
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
        scraped_at TIMESTAMPTZ NOT NULL
    )
"#;

/// PostgreSQL 上の商品ストア（接続は実行中プールして再利用）
#[derive(Debug, Clone)]
pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, ScraperError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await?;
        info!("Connected to PostgreSQL product store");
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn initialize(&self) -> Result<(), ScraperError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        debug!("products table ready");
        Ok(())
    }

    async fn already_seen(&self, supplier_url: &str) -> Result<bool, ScraperError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE supplier_url = $1)")
                .bind(supplier_url)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn upsert_if_absent(&self, record: &ProductRecord) -> Result<bool, ScraperError> {
        let sql = format!(
            "INSERT INTO products ({COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
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
