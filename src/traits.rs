use async_trait::async_trait;

use crate::error::ScraperError;
use crate::product::{ProductFields, ProductRecord};

/// URLからHTMLを取得する
///
/// 失敗は `None` として返し、エラーとして上位に伝播させない。
/// 再試行は呼び出し側（カタログ巡回）の責務。
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// ページ取得（成功時のみHTMLを返す）
    async fn fetch(&self, url: &str) -> Option<String>;

    /// 共有リソース解放
    async fn close(&self) -> Result<(), ScraperError> {
        Ok(())
    }
}

/// 商品ページのHTMLから項目を抜き出す
pub trait ProductExtractor: Send + Sync {
    /// 有効な項目が一つもなければ `None`
    fn extract(&self, html: &str) -> Option<ProductFields>;
}

/// supplier_url をキーにした冪等な商品ストア
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// テーブル作成（何度呼んでもよい）
    async fn initialize(&self) -> Result<(), ScraperError>;

    /// 同じ supplier_url のレコードが既にあるか
    async fn already_seen(&self, supplier_url: &str) -> Result<bool, ScraperError>;

    /// 未登録の場合のみ挿入する。挿入したら `true`
    ///
    /// 一意制約によりストレージ側で原子的に判定する。
    async fn upsert_if_absent(&self, record: &ProductRecord) -> Result<bool, ScraperError>;

    /// 保存済みレコードを登録順に返す
    async fn records(&self) -> Result<Vec<ProductRecord>, ScraperError>;
}
