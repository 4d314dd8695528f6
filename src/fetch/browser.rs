//! ヘッドレスブラウザによるレンダリング取得

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::ScraperError;
use crate::traits::PageFetcher;

/// DOM判定のインターバル（ミリ秒）
const READY_CHECK_INTERVAL_MS: u64 = 250;

/// ブラウザ起動設定
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    pub debug: bool,
    pub chrome_path: Option<PathBuf>,
    pub accept_invalid_certs: bool,
    pub request_timeout: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            debug: false,
            chrome_path: None,
            accept_invalid_certs: false,
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// 実行中に共有するブラウザ（起動は1回、タブは取得ごと）
pub struct BrowserSession {
    browser: Mutex<Option<Browser>>,
    handler: JoinHandle<()>,
    debug: bool,
}

impl BrowserSession {
    pub async fn launch(options: &BrowserOptions) -> Result<Arc<Self>, ScraperError> {
        info!("Launching browser...");

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(options.request_timeout)
            .window_size(1280, 800)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");

        if let Some(path) = &options.chrome_path {
            builder = builder.chrome_executable(path);
        }
        if !options.headless {
            builder = builder.with_head();
        }
        if options.accept_invalid_certs {
            warn!("TLS certificate validation is disabled for rendered fetches");
            builder = builder.arg("--ignore-certificate-errors");
        }
        if options.debug {
            builder = builder.arg("--enable-logging=stderr").arg("--v=1");
        }

        let config = builder
            .build()
            .map_err(|e| ScraperError::BrowserInit(format!("ブラウザ設定エラー: {}", e)))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        // ブラウザイベントハンドラをバックグラウンドで実行
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {}", e);
                }
            }
        });

        info!("Browser launched");
        Ok(Arc::new(Self {
            browser: Mutex::new(Some(browser)),
            handler,
            debug: options.debug,
        }))
    }

    async fn new_page(&self) -> Result<Page, ScraperError> {
        let guard = self.browser.lock().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| ScraperError::BrowserInit("ブラウザが終了しています".into()))?;
        browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))
    }

    /// ブラウザを終了する（2回目以降は何もしない）
    pub async fn close(&self) -> Result<(), ScraperError> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };

        info!("Closing browser...");
        browser
            .close()
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;
        if let Err(e) = browser.wait().await {
            debug!("Browser process wait failed: {}", e);
        }
        self.handler.abort();
        info!("Browser closed");
        Ok(())
    }
}

/// 取得完了とみなすDOM条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderWait {
    /// 少なくとも1つ存在すべき要素
    pub ready: String,
    /// 消えているべき読み込み中要素
    pub loading: Option<String>,
}

impl RenderWait {
    pub fn new(ready: impl Into<String>) -> Self {
        Self {
            ready: ready.into(),
            loading: None,
        }
    }

    pub fn with_loading(mut self, loading: impl Into<String>) -> Self {
        self.loading = Some(loading.into());
        self
    }

    /// ページ内で評価する判定式
    pub(crate) fn script(&self) -> Result<String, ScraperError> {
        let quote = |s: &str| {
            serde_json::to_string(s).map_err(|e| ScraperError::JavaScript(e.to_string()))
        };
        let ready = quote(&self.ready)?;
        let script = match &self.loading {
            Some(loading) => format!(
                "(() => document.querySelector({}) !== null && document.querySelector({}) === null)()",
                ready,
                quote(loading)?
            ),
            None => format!("(() => document.querySelector({}) !== null)()", ready),
        };
        Ok(script)
    }
}

/// レンダリング後のHTMLを返す取得器
pub struct RenderedFetcher {
    session: Arc<BrowserSession>,
    wait: RenderWait,
    timeout: Duration,
}

impl RenderedFetcher {
    pub fn new(session: Arc<BrowserSession>, wait: RenderWait, timeout: Duration) -> Self {
        Self {
            session,
            wait,
            timeout,
        }
    }

    async fn render(&self, url: &str) -> Result<String, ScraperError> {
        let page = self.session.new_page().await?;
        let result = self.load(&page, url).await;

        if let Err(e) = page.close().await {
            debug!("Failed to close page: {}", e);
        }
        result
    }

    async fn load(&self, page: &Page, url: &str) -> Result<String, ScraperError> {
        page.goto(url)
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;

        self.wait_until_ready(page).await?;

        page.content()
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))
    }

    /// 対象要素が現れ、読み込み中要素が消えるまで待機
    async fn wait_until_ready(&self, page: &Page) -> Result<(), ScraperError> {
        let script = self.wait.script()?;
        let start = Instant::now();

        while start.elapsed() < self.timeout {
            match page.evaluate(script.as_str()).await {
                Ok(val) => {
                    if val.into_value::<bool>().unwrap_or(false) {
                        debug!("Page ready after {:?}", start.elapsed());
                        return Ok(());
                    }
                }
                Err(e) => debug!("Ready check error: {}", e),
            }
            sleep(Duration::from_millis(READY_CHECK_INTERVAL_MS)).await;
        }

        if self.session.debug {
            self.log_screenshot(page).await;
        }

        Err(ScraperError::Timeout(format!(
            "{} が{:?}以内に表示されませんでした",
            self.wait.ready, self.timeout
        )))
    }

    /// デバッグスクリーンショット
    async fn log_screenshot(&self, page: &Page) {
        if let Ok(screenshot) = page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
        {
            use base64::Engine;
            let encoded = base64::engine::general_purpose::STANDARD.encode(&screenshot);
            debug!("Timeout screenshot: data:image/png;base64,{}", encoded);
        }
    }
}

#[async_trait]
impl PageFetcher for RenderedFetcher {
    async fn fetch(&self, url: &str) -> Option<String> {
        match self.render(url).await {
            Ok(html) => {
                debug!(url, bytes = html.len(), "Rendered page");
                Some(html)
            }
            Err(e) => {
                warn!(url, "Rendered fetch failed: {}", e);
                None
            }
        }
    }

    async fn close(&self) -> Result<(), ScraperError> {
        self.session.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_script_with_loading() {
        let wait = RenderWait::new("div[data-testid='product-card']").with_loading("div.ant-spin-spinning");
        assert_eq!(
            wait.script().unwrap(),
            "(() => document.querySelector(\"div[data-testid='product-card']\") !== null \
             && document.querySelector(\"div.ant-spin-spinning\") === null)()"
        );
    }

    #[test]
    fn test_wait_script_escapes_quotes() {
        let wait = RenderWait::new(r#"span[data-testid="name"]"#);
        assert_eq!(
            wait.script().unwrap(),
            r#"(() => document.querySelector("span[data-testid=\"name\"]") !== null)()"#
        );
    }

    #[tokio::test]
    #[ignore] // 実ブラウザが必要: cargo test rendered_fetch_live -- --ignored --nocapture
    async fn test_rendered_fetch_live() {
        let session = BrowserSession::launch(&BrowserOptions::default())
            .await
            .expect("Failed to launch browser");
        let fetcher = RenderedFetcher::new(session, RenderWait::new("h1"), Duration::from_secs(20));

        let html = fetcher.fetch("https://example.com/").await;
        assert!(html.is_some_and(|h| h.contains("Example Domain")));

        let missing = RenderedFetcher::new(
            fetcher.session.clone(),
            RenderWait::new("div.never-there"),
            Duration::from_secs(2),
        );
        assert!(missing.fetch("https://example.com/").await.is_none());

        fetcher.close().await.unwrap();
        fetcher.close().await.unwrap();
    }
}
