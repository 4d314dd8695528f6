//! カタログ一覧のポーリング
//!
//! 非同期レンダリングされる一覧ページを繰り返し取得し、
//! 読み込み中のカードを除外しながら商品リンクを集める。
//! `Polling → {Satisfied, Exhausted, Aborted}` の状態遷移で、
//! 取得回数は `max_retries` を超えない。

use std::collections::HashSet;
use std::sync::Arc;

use scraper::{Html, Selector};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::ScraperError;
use crate::html::parse_selector;
use crate::traits::PageFetcher;

use super::types::{Backoff, CatalogPollResult, CatalogSelectors, CatalogTarget, PollOutcome};

/// 1回の巡回の間だけ存在する状態
#[derive(Debug, Default)]
struct PollState {
    attempt: u32,
    links: Vec<Url>,
    seen: HashSet<Url>,
}

impl PollState {
    /// 初出のリンクのみ追加する
    fn push(&mut self, link: Url) -> bool {
        if self.seen.insert(link.clone()) {
            self.links.push(link);
            true
        } else {
            false
        }
    }

    fn finish(mut self, outcome: PollOutcome, limit: usize) -> CatalogPollResult {
        self.links.truncate(limit);
        CatalogPollResult {
            outcome,
            links: self.links,
            attempts: self.attempt + 1,
        }
    }
}

/// 一覧ページ1回分の解析結果
#[derive(Debug)]
enum ListingScan {
    MissingContainer,
    Cards {
        links: Vec<Url>,
        cards: usize,
        placeholders: usize,
    },
}

/// 解析済みの一覧セレクタ
#[derive(Debug, Clone)]
pub struct ListingSelectors {
    container: Selector,
    card: Selector,
    placeholder: Selector,
    link: Selector,
}

impl ListingSelectors {
    pub fn parse(selectors: &CatalogSelectors) -> Result<Self, ScraperError> {
        Ok(Self {
            container: parse_selector(&selectors.container)?,
            card: parse_selector(&selectors.card)?,
            placeholder: parse_selector(&selectors.placeholder)?,
            link: parse_selector(&selectors.link)?,
        })
    }
}

pub struct CatalogPoller {
    fetcher: Arc<dyn PageFetcher>,
    selectors: ListingSelectors,
    backoff: Backoff,
}

impl CatalogPoller {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        selectors: &CatalogSelectors,
    ) -> Result<Self, ScraperError> {
        Ok(Self::with_selectors(fetcher, ListingSelectors::parse(selectors)?))
    }

    /// 解析済みセレクタから組み立てる
    pub fn with_selectors(fetcher: Arc<dyn PageFetcher>, selectors: ListingSelectors) -> Self {
        Self {
            fetcher,
            selectors,
            backoff: Backoff::Fixed(std::time::Duration::from_secs(2)),
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// カタログを巡回して商品リンクを集める
    ///
    /// エラーは返さない。取得失敗や構造不一致は `Aborted`（リンクなし）になる。
    pub async fn poll(&self, target: &CatalogTarget) -> CatalogPollResult {
        let mut state = PollState::default();

        info!(
            url = %target.url,
            limit = target.limit,
            max_retries = target.max_retries,
            "Polling catalog"
        );

        if target.max_retries == 0 {
            return CatalogPollResult {
                outcome: PollOutcome::Exhausted,
                links: Vec::new(),
                attempts: 0,
            };
        }

        loop {
            let Some(html) = self.fetcher.fetch(target.url.as_str()).await else {
                warn!(
                    url = %target.url,
                    attempt = state.attempt + 1,
                    "Catalog page could not be loaded, aborting traversal"
                );
                return CatalogPollResult::aborted(state.attempt + 1);
            };

            match self.scan_listing(&html, &target.url) {
                ListingScan::MissingContainer => {
                    warn!(
                        url = %target.url,
                        attempt = state.attempt + 1,
                        "Product container not found, aborting traversal"
                    );
                    return CatalogPollResult::aborted(state.attempt + 1);
                }
                ListingScan::Cards {
                    links,
                    cards,
                    placeholders,
                } => {
                    let mut added = 0;
                    for link in links {
                        if state.push(link) {
                            added += 1;
                        }
                    }
                    debug!(
                        attempt = state.attempt + 1,
                        cards,
                        placeholders,
                        added,
                        total = state.links.len(),
                        "Scanned catalog page"
                    );
                }
            }

            if state.links.len() >= target.limit {
                info!(
                    links = target.limit,
                    attempts = state.attempt + 1,
                    "Catalog poll satisfied"
                );
                return state.finish(PollOutcome::Satisfied, target.limit);
            }

            if state.attempt + 1 >= target.max_retries {
                warn!(
                    links = state.links.len(),
                    limit = target.limit,
                    attempts = state.attempt + 1,
                    "Catalog poll exhausted before reaching limit"
                );
                return state.finish(PollOutcome::Exhausted, target.limit);
            }

            let delay = self.backoff.delay(state.attempt);
            info!(
                links = state.links.len(),
                limit = target.limit,
                "Products still loading, retrying in {:?}",
                delay
            );
            state.attempt += 1;
            sleep(delay).await;
        }
    }

    pub async fn close(&self) -> Result<(), ScraperError> {
        self.fetcher.close().await
    }

    /// 一覧HTMLからリンクを抽出（読み込み中カードは除外）
    fn scan_listing(&self, html: &str, base: &Url) -> ListingScan {
        let document = Html::parse_document(html);

        let Some(container) = document.select(&self.selectors.container).next() else {
            return ListingScan::MissingContainer;
        };

        let mut links = Vec::new();
        let mut cards = 0;
        let mut placeholders = 0;

        for card in container.select(&self.selectors.card) {
            cards += 1;

            if card.select(&self.selectors.placeholder).next().is_some() {
                placeholders += 1;
                continue;
            }

            let Some(anchor) = card.select(&self.selectors.link).next() else {
                debug!("Product card without link, skipping");
                continue;
            };

            let href = match anchor.value().attr("href").map(str::trim) {
                Some(href) if !href.is_empty() => href,
                _ => {
                    warn!("Product link without usable href, skipping");
                    continue;
                }
            };

            match base.join(href) {
                Ok(url) => links.push(url),
                Err(e) => warn!(href, "Failed to resolve product link: {}", e),
            }
        }

        ListingScan::Cards {
            links,
            cards,
            placeholders,
        }
    }
}
