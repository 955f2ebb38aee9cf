//! Ingestion runtime: configuration, the four scheduled jobs, and the
//! on-demand broker-summary lookup.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bursa_adapters::{ScrapedFeedClient, StructuredFeedClient};
use bursa_storage::{DocumentStore, Gateway, MemoryStore, PgDocumentStore};
use tracing::{info, warn};

pub mod broker_summary;
pub mod config;
pub mod jobs;
pub mod scheduler;

pub use broker_summary::BrokerSummaryService;
pub use config::{AppConfig, ScheduleConfig, StoreBackend, StoreConfig};
pub use jobs::{
    CancelSignal, Cancelled, IngestionJobs, JobKind, JobRequest, JobRunSummary,
};
pub use scheduler::{
    resolve_timezone, FiringOutcome, IngestionScheduler, RunningScheduler, ScheduledJob,
};

pub const CRATE_NAME: &str = "bursa-sync";

pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>> {
    if !config.is_persistent() {
        warn!(
            "using in-memory document store; nothing is kept after this process exits, \
             set store.backend to postgres to persist results"
        );
    }
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::Postgres => {
            let url = config.database_url.trim();
            if url.is_empty() {
                bail!("store.database_url is required for the postgres backend");
            }
            let store = PgDocumentStore::connect(url, config.max_connections)
                .await
                .context("connecting to postgres document store")?;
            info!(max_connections = config.max_connections, "using postgres document store");
            Ok(Arc::new(store))
        }
    }
}

pub async fn build_jobs(config: &AppConfig) -> Result<IngestionJobs> {
    let store = open_store(&config.store).await?;
    let feed = StructuredFeedClient::new(config.structured_feed_config())
        .context("building structured feed client")?;
    Ok(IngestionJobs::new(Arc::new(feed), Gateway::new(store)))
}

pub fn build_broker_summary_service(config: &AppConfig) -> Result<BrokerSummaryService> {
    let source = ScrapedFeedClient::new(config.scraped_feed_config())
        .context("building scraped feed client")?;
    Ok(BrokerSummaryService::new(Arc::new(source)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn postgres_backend_requires_url() {
        let config = StoreConfig {
            backend: StoreBackend::Postgres,
            database_url: String::new(),
            ..Default::default()
        };
        let err = open_store(&config).await.err().unwrap();
        assert!(err.to_string().contains("database_url"));
    }

    #[tokio::test]
    async fn default_config_wires_memory_pipeline() {
        let jobs = build_jobs(&AppConfig::default()).await.unwrap();
        assert!(jobs.gateway().brokers().find(None).await.unwrap().is_empty());
        assert!(build_broker_summary_service(&AppConfig::default()).is_ok());
    }
}
