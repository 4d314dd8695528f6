use std::process::ExitCode;

use catalog_harvester::{build_pipeline, export, HarvestConfig, ProductStore};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // ログ設定（RUST_LOG で上書き可）
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,catalog_harvester=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // 設定エラーはネットワーク・DBに触れる前に終了
    let config = match HarvestConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(2);
        }
    };

    match run(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &HarvestConfig) -> Result<(), catalog_harvester::ScraperError> {
    let target = config.catalog_target()?;
    let pipeline = build_pipeline(config).await?;

    let result = pipeline.run(&target).await;
    if let Err(e) = pipeline.close().await {
        error!("Failed to release fetcher resources: {}", e);
    }
    let report = result?;

    if let Some(path) = &config.export_path {
        let records = pipeline.store().records().await?;
        export::write_csv(path, &records)?;
    }

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to serialize report: {}", e),
    }
    info!(
        "Discovered {} links: {} stored, {} skipped, {} failed",
        report.links_discovered, report.stored, report.skipped, report.failed
    );
    Ok(())
}
