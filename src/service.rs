use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::Service;
use tracing::info;
use url::Url;

use crate::catalog::CatalogTarget;
use crate::error::ScraperError;
use crate::pipeline::{HarvestReport, Pipeline};

/// 収集リクエスト
#[derive(Debug, Clone)]
pub struct HarvestRequest {
    pub catalog_url: String,
    pub limit: usize,
    pub max_retries: u32,
}

impl HarvestRequest {
    pub fn new(catalog_url: impl Into<String>) -> Self {
        Self {
            catalog_url: catalog_url.into(),
            limit: 10,
            max_retries: 10,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

impl TryFrom<HarvestRequest> for CatalogTarget {
    type Error = ScraperError;

    fn try_from(req: HarvestRequest) -> Result<Self, Self::Error> {
        let url = Url::parse(&req.catalog_url)
            .map_err(|e| ScraperError::Config(format!("catalog URL が不正です: {}", e)))?;
        CatalogTarget::new(url, req.limit, req.max_retries)
    }
}

/// tower::Serviceを実装した収集サービス
#[derive(Clone)]
pub struct HarvestService {
    pipeline: Arc<Pipeline>,
}

impl HarvestService {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

impl Service<HarvestRequest> for HarvestService {
    type Response = HarvestReport;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: HarvestRequest) -> Self::Future {
        info!("収集リクエスト受信: catalog_url={}", req.catalog_url);
        let pipeline = self.pipeline.clone();

        Box::pin(async move {
            let target = CatalogTarget::try_from(req)?;
            let report = pipeline.run(&target).await?;

            info!(
                "収集完了: stored={}, skipped={}, failed={}",
                report.stored, report.skipped, report.failed
            );

            Ok(report)
        })
    }
}
