//! カタログ巡回モジュール
//!
//! 一覧ページから商品リンクを集める

mod poller;
mod types;

pub use poller::{CatalogPoller, ListingSelectors};
pub use types::{Backoff, CatalogPollResult, CatalogSelectors, CatalogTarget, PollOutcome};
