//! カタログ巡回 → 商品取得 → 抽出 → 保存 の一連の処理

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::catalog::{
    CatalogPollResult, CatalogPoller, CatalogTarget, ListingSelectors, PollOutcome,
};
use crate::config::{FetchMode, HarvestConfig};
use crate::error::ScraperError;
use crate::fetch::{BrowserOptions, BrowserSession, RenderWait, RenderedFetcher, StaticFetcher};
use crate::product::{ProductRecord, ProductSelectors, SelectorExtractor};
use crate::store;
use crate::traits::{PageFetcher, ProductExtractor, ProductStore};

/// 実行結果の集計
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarvestReport {
    pub poll_outcome: PollOutcome,
    pub poll_attempts: u32,
    pub links_discovered: usize,
    pub stored: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl HarvestReport {
    fn new(poll: &CatalogPollResult) -> Self {
        Self {
            poll_outcome: poll.outcome,
            poll_attempts: poll.attempts,
            links_discovered: poll.links.len(),
            stored: 0,
            skipped: 0,
            failed: 0,
        }
    }

    fn record(&mut self, outcome: LinkOutcome) {
        match outcome {
            LinkOutcome::Stored => self.stored += 1,
            LinkOutcome::Skipped => self.skipped += 1,
            LinkOutcome::Failed => self.failed += 1,
        }
    }
}

/// 商品リンク1件の処理結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkOutcome {
    Stored,
    Skipped,
    Failed,
}

pub struct Pipeline {
    poller: CatalogPoller,
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn ProductExtractor>,
    store: Arc<dyn ProductStore>,
    supplier: Option<String>,
    concurrency: usize,
}

impl Pipeline {
    pub fn new(
        poller: CatalogPoller,
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn ProductExtractor>,
        store: Arc<dyn ProductStore>,
    ) -> Self {
        Self {
            poller,
            fetcher,
            extractor,
            store,
            supplier: None,
            concurrency: 1,
        }
    }

    pub fn with_supplier(mut self, supplier: Option<String>) -> Self {
        self.supplier = supplier;
        self
    }

    /// 同時に処理する商品ページ数（1で逐次処理）
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn ProductStore> {
        &self.store
    }

    /// 1回分の収集を実行する
    ///
    /// ストア初期化の失敗のみエラーを返す。個々の商品の失敗は集計に含める。
    pub async fn run(&self, target: &CatalogTarget) -> Result<HarvestReport, ScraperError> {
        self.store.initialize().await?;

        let poll = self.poller.poll(target).await;
        let mut report = HarvestReport::new(&poll);

        if poll.links.is_empty() {
            warn!(outcome = ?poll.outcome, "No product links discovered");
        }

        // クロージャ経由で借用を渡すと run() の Future が Send にならない
        let pending: Vec<_> = poll.links.iter().map(|link| self.process(link)).collect();
        let outcomes: Vec<LinkOutcome> = stream::iter(pending)
            .buffered(self.concurrency)
            .collect()
            .await;

        for outcome in outcomes {
            report.record(outcome);
        }

        info!(
            outcome = ?report.poll_outcome,
            discovered = report.links_discovered,
            stored = report.stored,
            skipped = report.skipped,
            failed = report.failed,
            "Harvest finished"
        );
        Ok(report)
    }

    async fn process(&self, link: &Url) -> LinkOutcome {
        let url = link.as_str();

        match self.store.already_seen(url).await {
            Ok(true) => {
                debug!(url, "Already stored, skipping");
                return LinkOutcome::Skipped;
            }
            Ok(false) => {}
            Err(e) => {
                error!(url, transient = e.is_transient(), "Store lookup failed: {}", e);
                return LinkOutcome::Failed;
            }
        }

        let Some(html) = self.fetcher.fetch(url).await else {
            warn!(url, "Product page could not be loaded");
            return LinkOutcome::Failed;
        };

        let Some(fields) = self.extractor.extract(&html) else {
            warn!(url, "No product data found");
            return LinkOutcome::Failed;
        };

        let record = ProductRecord::from_fields(fields, link, self.supplier.clone(), Utc::now());

        match self.store.upsert_if_absent(&record).await {
            Ok(true) => {
                info!(url, name = %record.product_name, "Stored product");
                LinkOutcome::Stored
            }
            Ok(false) => {
                debug!(url, "Stored concurrently by another writer");
                LinkOutcome::Skipped
            }
            Err(e) => {
                error!(url, transient = e.is_transient(), "Failed to store product: {}", e);
                LinkOutcome::Failed
            }
        }
    }

    /// 取得器の共有リソースを解放する
    pub async fn close(&self) -> Result<(), ScraperError> {
        self.poller.close().await?;
        self.fetcher.close().await
    }
}

/// 設定から取得器・抽出器・ストアを組み立てる
pub async fn build_pipeline(config: &HarvestConfig) -> Result<Pipeline, ScraperError> {
    config.validate()?;

    // ブラウザ起動前にセレクタを解析する
    let listing = ListingSelectors::parse(&config.catalog_selectors)?;
    let extractor = Arc::new(SelectorExtractor::new(&config.product_selectors)?);
    let store = store::connect(&config.database_url).await?;

    let (catalog_fetcher, product_fetcher): (Arc<dyn PageFetcher>, Arc<dyn PageFetcher>) =
        match config.fetch_mode {
            FetchMode::Static => {
                let fetcher: Arc<dyn PageFetcher> = Arc::new(StaticFetcher::new(
                    config.request_timeout,
                    config.accept_invalid_certs,
                )?);
                (fetcher.clone(), fetcher)
            }
            FetchMode::Rendered => {
                let options = BrowserOptions {
                    headless: config.headless,
                    debug: config.debug,
                    chrome_path: config.chrome_path.clone(),
                    accept_invalid_certs: config.accept_invalid_certs,
                    ..Default::default()
                };
                let session = BrowserSession::launch(&options).await?;

                let catalog_wait = RenderWait::new(&config.catalog_selectors.card)
                    .with_loading(&config.catalog_selectors.placeholder);
                let product_wait = product_wait(&config.product_selectors);

                let catalog: Arc<dyn PageFetcher> = Arc::new(RenderedFetcher::new(
                    session.clone(),
                    catalog_wait,
                    config.render_timeout,
                ));
                let product: Arc<dyn PageFetcher> =
                    Arc::new(RenderedFetcher::new(session, product_wait, config.render_timeout));
                (catalog, product)
            }
        };

    let poller = CatalogPoller::with_selectors(catalog_fetcher, listing).with_backoff(config.backoff);

    Ok(Pipeline::new(poller, product_fetcher, extractor, store)
        .with_supplier(config.supplier.clone())
        .with_concurrency(config.concurrency))
}

/// 商品ページはいずれかの項目が描画されたら取得する（画像のみの商品も残す）
fn product_wait(selectors: &ProductSelectors) -> RenderWait {
    RenderWait::new(format!(
        "{}, {}, {}",
        selectors.name, selectors.sku, selectors.image
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts() {
        let poll = CatalogPollResult {
            outcome: PollOutcome::Exhausted,
            links: vec![Url::parse("https://store.example.com/p/1").unwrap()],
            attempts: 3,
        };
        let mut report = HarvestReport::new(&poll);
        report.record(LinkOutcome::Stored);
        report.record(LinkOutcome::Skipped);
        report.record(LinkOutcome::Failed);
        report.record(LinkOutcome::Failed);

        assert_eq!(report.links_discovered, 1);
        assert_eq!(report.poll_attempts, 3);
        assert_eq!((report.stored, report.skipped, report.failed), (1, 1, 2));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["poll_outcome"], "exhausted");
    }

    #[tokio::test]
    async fn test_build_pipeline_rejects_invalid_config() {
        let config = HarvestConfig::new("https://store.example.com/c/x", "sqlite::memory:")
            .with_limit(0);
        assert!(matches!(
            build_pipeline(&config).await,
            Err(ScraperError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_selector_rejected_before_browser_launch() {
        let mut selectors = crate::catalog::CatalogSelectors::default();
        selectors.card = "div[".to_string();
        let mut config = HarvestConfig::new("https://store.example.com/c/x", "sqlite::memory:")
            .with_fetch_mode(FetchMode::Rendered)
            .with_selectors(selectors, ProductSelectors::default());
        config.chrome_path = Some("/nonexistent/chrome".into());

        // 起動が先ならブラウザ初期化エラーになる
        assert!(matches!(
            build_pipeline(&config).await,
            Err(ScraperError::Selector(_))
        ));
    }

    #[test]
    fn test_product_wait_accepts_image_only_pages() {
        let selectors = ProductSelectors::default();
        let script = product_wait(&selectors).script().unwrap();

        assert!(script.contains(&selectors.name));
        assert!(script.contains(&selectors.sku));
        assert!(script.contains(&selectors.image));
    }

    #[tokio::test]
    async fn test_run_future_is_send() {
        fn assert_send<T: Send>(_: &T) {}

        let config = HarvestConfig::new("https://store.example.com/c/x", "sqlite::memory:");
        let pipeline = build_pipeline(&config).await.unwrap();
        let target = config.catalog_target().unwrap();

        let fut = pipeline.run(&target);
        assert_send(&fut);
        drop(fut);
        pipeline.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_build_static_pipeline() {
        let config = HarvestConfig::new("https://store.example.com/c/x", "sqlite::memory:");
        let pipeline = build_pipeline(&config).await.unwrap();
        pipeline.store().initialize().await.unwrap();
        pipeline.close().await.unwrap();
    }
}
