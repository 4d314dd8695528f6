//! 商品関連の型定義

use chrono::{DateTime, Utc};
use serde::Serialize;
use url::Url;

/// 項目が見つからない場合の代替値
pub const UNKNOWN: &str = "Unknown";

/// 商品ページから抽出した項目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductFields {
    /// 商品名（なければ `UNKNOWN`）
    pub name: String,
    /// 画像URL（なければ `None`、空文字とは区別する）
    pub image_url: Option<String>,
    /// サプライヤー品番（なければ `UNKNOWN`）
    pub supplier_article_number: String,
    pub breadcrumb: Option<String>,
    pub variant: Option<String>,
    pub ean_gtin: Option<String>,
    pub article_number: Option<String>,
    pub description: Option<String>,
    pub manufacturer: Option<String>,
    pub additional_description: Option<String>,
}

impl ProductFields {
    /// 主要3項目がすべて代替値か
    pub fn is_empty(&self) -> bool {
        self.name == UNKNOWN && self.image_url.is_none() && self.supplier_article_number == UNKNOWN
    }
}

/// 永続化される商品レコード（supplier_url で一意）
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ProductRecord {
    pub product_name: String,
    pub breadcrumb: Option<String>,
    pub variant: Option<String>,
    pub supplier_article_number: String,
    pub ean_gtin: Option<String>,
    pub article_number: Option<String>,
    pub description: Option<String>,
    pub supplier: Option<String>,
    pub supplier_url: String,
    pub image_url: Option<String>,
    pub manufacturer: Option<String>,
    pub additional_description: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

impl ProductRecord {
    /// CSVヘッダー（フィールド名と同順）
    pub const FIELD_NAMES: [&'static str; 13] = [
        "product_name",
        "breadcrumb",
        "variant",
        "supplier_article_number",
        "ean_gtin",
        "article_number",
        "description",
        "supplier",
        "supplier_url",
        "image_url",
        "manufacturer",
        "additional_description",
        "scraped_at",
    ];

    pub fn from_fields(
        fields: ProductFields,
        supplier_url: &Url,
        supplier: Option<String>,
        scraped_at: DateTime<Utc>,
    ) -> Self {
        Self {
            product_name: fields.name,
            breadcrumb: fields.breadcrumb,
            variant: fields.variant,
            supplier_article_number: fields.supplier_article_number,
            ean_gtin: fields.ean_gtin,
            article_number: fields.article_number,
            description: fields.description,
            supplier,
            supplier_url: supplier_url.to_string(),
            image_url: fields.image_url,
            manufacturer: fields.manufacturer,
            additional_description: fields.additional_description,
            scraped_at,
        }
    }
}

/// 商品ページ解析用セレクタ
#[derive(Debug, Clone)]
pub struct ProductSelectors {
    pub name: String,
    pub image: String,
    pub image_attr: String,
    pub sku: String,
    pub breadcrumb: Option<String>,
    pub variant: Option<String>,
    pub ean_gtin: Option<String>,
    pub article_number: Option<String>,
    pub description: Option<String>,
    pub manufacturer: Option<String>,
    pub additional_description: Option<String>,
}

impl Default for ProductSelectors {
    fn default() -> Self {
        Self {
            name: "span[data-testid='productCard_productName']".to_string(),
            image: "div.ProductCard_imageHolder__f4e96 img".to_string(),
            image_attr: "src".to_string(),
            sku: "div[data-testid='product-information-sku']".to_string(),
            breadcrumb: None,
            variant: None,
            ean_gtin: None,
            article_number: None,
            description: None,
            manufacturer: None,
            additional_description: None,
        }
    }
}
