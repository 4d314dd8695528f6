//! CSSセレクタによる商品項目の抽出

use scraper::{Html, Selector};
use tracing::debug;

use crate::error::ScraperError;
use crate::html::{first_attr, first_text, parse_optional, parse_selector};
use crate::traits::ProductExtractor;

use super::types::{ProductFields, ProductSelectors, UNKNOWN};

/// 固定位置のDOM要素から項目を取り出す抽出器
#[derive(Debug, Clone)]
pub struct SelectorExtractor {
    name: Selector,
    image: Selector,
    image_attr: String,
    sku: Selector,
    breadcrumb: Option<Selector>,
    variant: Option<Selector>,
    ean_gtin: Option<Selector>,
    article_number: Option<Selector>,
    description: Option<Selector>,
    manufacturer: Option<Selector>,
    additional_description: Option<Selector>,
}

impl SelectorExtractor {
    pub fn new(selectors: &ProductSelectors) -> Result<Self, ScraperError> {
        Ok(Self {
            name: parse_selector(&selectors.name)?,
            image: parse_selector(&selectors.image)?,
            image_attr: selectors.image_attr.clone(),
            sku: parse_selector(&selectors.sku)?,
            breadcrumb: parse_optional(selectors.breadcrumb.as_deref())?,
            variant: parse_optional(selectors.variant.as_deref())?,
            ean_gtin: parse_optional(selectors.ean_gtin.as_deref())?,
            article_number: parse_optional(selectors.article_number.as_deref())?,
            description: parse_optional(selectors.description.as_deref())?,
            manufacturer: parse_optional(selectors.manufacturer.as_deref())?,
            additional_description: parse_optional(selectors.additional_description.as_deref())?,
        })
    }
}

impl ProductExtractor for SelectorExtractor {
    fn extract(&self, html: &str) -> Option<ProductFields> {
        let document = Html::parse_document(html);
        let root = document.root_element();

        let optional = |selector: &Option<Selector>| {
            selector.as_ref().and_then(|sel| first_text(root, sel))
        };

        let fields = ProductFields {
            name: first_text(root, &self.name).unwrap_or_else(|| UNKNOWN.to_string()),
            image_url: first_attr(root, &self.image, &self.image_attr),
            supplier_article_number: first_text(root, &self.sku)
                .unwrap_or_else(|| UNKNOWN.to_string()),
            breadcrumb: optional(&self.breadcrumb),
            variant: optional(&self.variant),
            ean_gtin: optional(&self.ean_gtin),
            article_number: optional(&self.article_number),
            description: optional(&self.description),
            manufacturer: optional(&self.manufacturer),
            additional_description: optional(&self.additional_description),
        };

        debug!(
            name = %fields.name,
            image_url = ?fields.image_url,
            sku = %fields.supplier_article_number,
            "Extracted product fields"
        );

        if fields.is_empty() {
            return None;
        }
        Some(fields)
    }
}
