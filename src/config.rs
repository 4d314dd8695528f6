use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::catalog::{Backoff, CatalogSelectors, CatalogTarget};
use crate::error::ScraperError;
use crate::product::ProductSelectors;

const DEFAULT_LIMIT: usize = 10;
const DEFAULT_MAX_RETRIES: u32 = 10;
const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
const DEFAULT_EXPONENTIAL_CAP: Duration = Duration::from_secs(30);

/// ページ取得方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// 1回のHTTP GET
    #[default]
    Static,
    /// ヘッドレスブラウザでレンダリング
    Rendered,
}

impl FromStr for FetchMode {
    type Err = ScraperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" | "http" => Ok(FetchMode::Static),
            "rendered" | "browser" => Ok(FetchMode::Rendered),
            other => Err(ScraperError::Config(format!(
                "FETCH_MODE は static か rendered を指定してください: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub catalog_url: String,
    pub limit: usize,
    pub max_retries: u32,
    pub database_url: String,
    pub fetch_mode: FetchMode,
    pub backoff: Backoff,
    pub concurrency: usize,
    pub supplier: Option<String>,
    pub export_path: Option<PathBuf>,
    pub headless: bool,
    pub debug: bool,
    pub accept_invalid_certs: bool,
    pub chrome_path: Option<PathBuf>,
    pub request_timeout: Duration,
    pub render_timeout: Duration,
    pub catalog_selectors: CatalogSelectors,
    pub product_selectors: ProductSelectors,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            catalog_url: String::new(),
            limit: DEFAULT_LIMIT,
            max_retries: DEFAULT_MAX_RETRIES,
            database_url: String::new(),
            fetch_mode: FetchMode::Static,
            backoff: Backoff::Fixed(Duration::from_millis(DEFAULT_POLL_INTERVAL_MS)),
            concurrency: 1,
            supplier: None,
            export_path: None,
            headless: true,
            debug: false,
            accept_invalid_certs: false,
            chrome_path: None,
            request_timeout: Duration::from_secs(30),
            render_timeout: Duration::from_secs(30),
            catalog_selectors: CatalogSelectors::default(),
            product_selectors: ProductSelectors::default(),
        }
    }
}

impl HarvestConfig {
    pub fn new(catalog_url: impl Into<String>, database_url: impl Into<String>) -> Self {
        Self {
            catalog_url: catalog_url.into(),
            database_url: database_url.into(),
            ..Default::default()
        }
    }

    /// 環境変数（と存在すれば .env）から設定を読み込んで検証する
    pub fn from_env() -> Result<Self, ScraperError> {
        // 開発用の .env があれば読み込む
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意のキー検索関数から設定を組み立てる
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ScraperError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let catalog_url = get("CATALOG_URL")
            .ok_or_else(|| ScraperError::Config("CATALOG_URL must be set".into()))?;
        let database_url = get("DATABASE_URL")
            .ok_or_else(|| ScraperError::Config("DATABASE_URL must be set".into()))?;

        let mut config = Self::new(catalog_url, database_url);

        if let Some(v) = get("CATALOG_LIMIT") {
            config.limit = parse_number("CATALOG_LIMIT", &v)?;
        }
        if let Some(v) = get("CATALOG_MAX_RETRIES") {
            config.max_retries = parse_number("CATALOG_MAX_RETRIES", &v)?;
        }
        if let Some(v) = get("FETCH_MODE") {
            config.fetch_mode = v.parse()?;
        }

        let interval = match get("POLL_INTERVAL_MS") {
            Some(v) => Duration::from_millis(parse_number("POLL_INTERVAL_MS", &v)?),
            None => Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        };
        let backoff = get("POLL_BACKOFF").map(|v| v.trim().to_ascii_lowercase());
        config.backoff = match backoff.as_deref() {
            None | Some("fixed") => Backoff::Fixed(interval),
            Some("exponential") => Backoff::Exponential {
                initial: interval,
                max: DEFAULT_EXPONENTIAL_CAP.max(interval),
            },
            Some(other) => {
                return Err(ScraperError::Config(format!(
                    "POLL_BACKOFF は fixed か exponential を指定してください: {}",
                    other
                )))
            }
        };

        if let Some(v) = get("CONCURRENCY") {
            config.concurrency = parse_number("CONCURRENCY", &v)?;
        }
        config.supplier = get("SUPPLIER_NAME");
        config.export_path = get("EXPORT_CSV").map(PathBuf::from);
        if let Some(v) = get("HEADLESS") {
            config.headless = parse_flag("HEADLESS", &v)?;
        }
        if let Some(v) = get("DEBUG") {
            config.debug = parse_flag("DEBUG", &v)?;
        }
        if let Some(v) = get("ACCEPT_INVALID_CERTS") {
            config.accept_invalid_certs = parse_flag("ACCEPT_INVALID_CERTS", &v)?;
        }
        config.chrome_path = get("CHROME_PATH")
            .or_else(|| get("CHROMIUM_PATH"))
            .map(PathBuf::from);
        if let Some(v) = get("REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(parse_number("REQUEST_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = get("RENDER_TIMEOUT_SECS") {
            config.render_timeout = Duration::from_secs(parse_number("RENDER_TIMEOUT_SECS", &v)?);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_fetch_mode(mut self, mode: FetchMode) -> Self {
        self.fetch_mode = mode;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_supplier(mut self, supplier: impl Into<String>) -> Self {
        self.supplier = Some(supplier.into());
        self
    }

    pub fn with_export_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.export_path = Some(path.into());
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn with_selectors(mut self, catalog: CatalogSelectors, product: ProductSelectors) -> Self {
        self.catalog_selectors = catalog;
        self.product_selectors = product;
        self
    }

    /// ネットワーク・ストレージに触れる前に必須項目を検証する
    pub fn validate(&self) -> Result<(), ScraperError> {
        self.catalog_target()?;

        if self.concurrency == 0 {
            return Err(ScraperError::Config("CONCURRENCY must be at least 1".into()));
        }

        let db = self.database_url.trim();
        let supported = ["postgres://", "postgresql://", "sqlite:"];
        if !supported.iter().any(|scheme| db.starts_with(scheme)) {
            return Err(ScraperError::Config(format!(
                "DATABASE_URL のスキームに未対応です: {}",
                db.split(':').next().unwrap_or_default()
            )));
        }

        Ok(())
    }

    /// 設定からカタログ巡回対象を作る
    pub fn catalog_target(&self) -> Result<CatalogTarget, ScraperError> {
        let url = Url::parse(self.catalog_url.trim())
            .map_err(|e| ScraperError::Config(format!("CATALOG_URL が不正です: {}", e)))?;
        CatalogTarget::new(url, self.limit, self.max_retries)
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ScraperError> {
    value
        .trim()
        .parse()
        .map_err(|_| ScraperError::Config(format!("{} must be a valid number: {}", key, value)))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ScraperError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ScraperError::Config(format!(
            "{} must be a boolean: {}",
            key, value
        ))),
    }
}
