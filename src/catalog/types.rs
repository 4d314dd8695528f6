//! カタログ巡回の型定義

use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::error::ScraperError;

/// 1回の巡回対象（不変）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTarget {
    /// 一覧ページURL
    pub url: Url,
    /// 取得したいリンク数
    pub limit: usize,
    /// 最大ポーリング回数（取得回数の上限）
    pub max_retries: u32,
}

impl CatalogTarget {
    pub fn new(url: Url, limit: usize, max_retries: u32) -> Result<Self, ScraperError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ScraperError::Config(format!(
                "catalog URL must be http(s): {}",
                url
            )));
        }
        if limit == 0 {
            return Err(ScraperError::Config("CATALOG_LIMIT must be at least 1".into()));
        }
        if max_retries == 0 {
            return Err(ScraperError::Config(
                "CATALOG_MAX_RETRIES must be at least 1".into(),
            ));
        }
        Ok(Self {
            url,
            limit,
            max_retries,
        })
    }
}

/// ポーリング間隔
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// 一定間隔
    Fixed(Duration),
    /// 指数バックオフ（上限あり）
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// `attempt` 回目（0始まり）の失敗後に待つ時間
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(interval) => interval,
            Backoff::Exponential { initial, max } => {
                let factor = 2u32.saturating_pow(attempt.min(16));
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}

/// 巡回の終了状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollOutcome {
    /// `limit` 件集まった
    Satisfied,
    /// 上限回数に達した（件数不足の可能性あり）
    Exhausted,
    /// 一覧ページの取得失敗／構造不一致
    Aborted,
}

/// カタログ巡回結果
#[derive(Debug, Clone)]
pub struct CatalogPollResult {
    pub outcome: PollOutcome,
    /// 初出順・重複なし・最大 `limit` 件
    pub links: Vec<Url>,
    /// 実際に取得した回数
    pub attempts: u32,
}

impl CatalogPollResult {
    pub(crate) fn aborted(attempts: u32) -> Self {
        Self {
            outcome: PollOutcome::Aborted,
            links: Vec::new(),
            attempts,
        }
    }
}

/// 一覧ページ解析用セレクタ
#[derive(Debug, Clone)]
pub struct CatalogSelectors {
    pub container: String,
    pub card: String,
    pub placeholder: String,
    pub link: String,
}

impl Default for CatalogSelectors {
    fn default() -> Self {
        Self {
            container: "div[data-testid='test-product-collection']".to_string(),
            card: "div[data-testid='product-card']".to_string(),
            placeholder: "div.ant-spin-spinning".to_string(),
            link: "a".to_string(),
        }
    }
}
