//! 商品ページ抽出モジュール

mod extractor;
mod types;

pub use extractor::SelectorExtractor;
pub use types::{ProductFields, ProductRecord, ProductSelectors, UNKNOWN};
