//! Source adapters for bursa: the structured JSON feed, the scraped
//! broker-summary page, and the normalizers that turn both into
//! `bursa-core` entities.

use async_trait::async_trait;
use bursa_core::FiscalPeriod;
use chrono::NaiveDate;
use uuid::Uuid;

pub mod normalize;
pub mod scraped;
pub mod structured;
pub mod wire;

pub use normalize::Normalizer;
pub use scraped::{
    parse_broker_summary, parse_number, BrokerSummaryPage, BrokerSummaryQuery, ScrapedFeedClient,
    ScrapedFeedConfig, ScrapedFeedError,
};
pub use structured::{
    StructuredFeedClient, StructuredFeedConfig, StructuredFeedError, StructuredFeedPaths,
};

use wire::{
    BrokerListResponse, CompanyProfileResponse, DailySummaryListResponse, DisclosureListResponse,
    SecurityListResponse,
};

pub const CRATE_NAME: &str = "bursa-adapters";

#[async_trait]
pub trait StructuredFeed: Send + Sync {
    /// Base that source-relative asset paths (logos, attachments) hang off.
    fn asset_base_url(&self) -> &str;

    async fn security_list(&self, run_id: Uuid) -> Result<SecurityListResponse, StructuredFeedError>;

    async fn company_profile(
        &self,
        run_id: Uuid,
        code: &str,
    ) -> Result<CompanyProfileResponse, StructuredFeedError>;

    async fn daily_summaries(
        &self,
        run_id: Uuid,
        date: NaiveDate,
    ) -> Result<DailySummaryListResponse, StructuredFeedError>;

    async fn broker_list(&self, run_id: Uuid) -> Result<BrokerListResponse, StructuredFeedError>;

    async fn financial_disclosures(
        &self,
        run_id: Uuid,
        period: FiscalPeriod,
        year: i32,
    ) -> Result<DisclosureListResponse, StructuredFeedError>;
}

#[async_trait]
pub trait BrokerSummarySource: Send + Sync {
    async fn broker_summary(
        &self,
        run_id: Uuid,
        query: &BrokerSummaryQuery,
    ) -> Result<BrokerSummaryPage, ScrapedFeedError>;
}
