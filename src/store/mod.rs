//! 商品ストア（重複排除付き永続化）

mod postgres;
mod sqlite;

use std::sync::Arc;

pub use postgres::PgProductStore;
pub use sqlite::SqliteProductStore;

use crate::error::ScraperError;
use crate::traits::ProductStore;

/// INSERT / SELECT で共通の列（ProductRecord のフィールド順）
pub(crate) const COLUMNS: &str = "product_name, breadcrumb, variant, supplier_article_number, \
     ean_gtin, article_number, description, supplier, supplier_url, image_url, manufacturer, \
     additional_description, scraped_at";

/// URLスキームに応じてストアに接続する
pub async fn connect(database_url: &str) -> Result<Arc<dyn ProductStore>, ScraperError> {
    let url = database_url.trim();
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        Ok(Arc::new(PgProductStore::connect(url).await?))
    } else if url.starts_with("sqlite:") {
        Ok(Arc::new(SqliteProductStore::connect(url).await?))
    } else {
        Err(ScraperError::Config(format!(
            "unsupported DATABASE_URL scheme: {}",
            url.split(':').next().unwrap_or_default()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::ProductRecord;

    #[test]
    fn test_columns_match_record_fields() {
        let columns: Vec<&str> = COLUMNS.split(',').map(str::trim).collect();
        assert_eq!(columns, ProductRecord::FIELD_NAMES);
    }

    #[tokio::test]
    async fn test_connect_selects_engine_by_scheme() {
        let store = connect("sqlite::memory:").await.unwrap();
        store.initialize().await.unwrap();
        assert!(!store.already_seen("https://store.example.com/p/1").await.unwrap());

        assert!(matches!(
            connect("mysql://localhost/db").await,
            Err(ScraperError::Config(_))
        ));
    }
}
