//! Client for the JSON source: five GET resources behind path templates.

use async_trait::async_trait;
use bursa_core::FiscalPeriod;
use bursa_storage::{FetchError, HttpClientConfig, HttpFetcher};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::wire::{
    BrokerListResponse, CompanyProfileResponse, DailySummaryListResponse, DisclosureListResponse,
    SecurityListResponse,
};
use crate::StructuredFeed;

pub const SOURCE_ID: &str = "structured-feed";

#[derive(Debug, Error)]
pub enum StructuredFeedError {
    #[error(transparent)]
    Transport(#[from] FetchError),
    #[error("unexpected status code {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },
    #[error("failed to decode {resource} response: {source}")]
    Decode {
        resource: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Path templates relative to the base URL. Tokens: `{CODE}`, `{DATE}`
/// (`YYYYMMDD`), `{PERIOD}` and `{YEAR}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredFeedPaths {
    pub security_list: String,
    pub company_profile: String,
    pub daily_summary_list: String,
    pub broker_list: String,
    pub financial_disclosure_list: String,
}

impl Default for StructuredFeedPaths {
    fn default() -> Self {
        Self {
            security_list: "/primary/ListedCompany/GetCompanyProfiles?start=0&length=9999"
                .to_string(),
            company_profile:
                "/primary/ListedCompany/GetCompanyProfilesDetail?KodeEmiten={CODE}&language=id-id"
                    .to_string(),
            daily_summary_list:
                "/primary/TradingSummary/GetStockSummary?length=9999&start=0&date={DATE}"
                    .to_string(),
            broker_list: "/primary/ExchangeMember/GetBrokerSearch?option=0&license=&start=0&length=9999"
                .to_string(),
            financial_disclosure_list: "/primary/ListedCompany/GetFinancialReport?indexFrom=0&pageSize=1000&year={YEAR}&reportType=rdf&EmitenType=s&periode={PERIOD}&kodeEmiten=&SortColumn=KodeEmiten&SortOrder=asc"
                .to_string(),
        }
    }
}

/// Period tag the source expects in requests and returns in responses.
pub fn source_period_tag(period: FiscalPeriod) -> &'static str {
    match period {
        FiscalPeriod::Q1 => "TW1",
        FiscalPeriod::Q2 => "TW2",
        FiscalPeriod::Q3 => "TW3",
        FiscalPeriod::Audit => "Audit",
    }
}

#[derive(Debug, Clone)]
pub struct StructuredFeedConfig {
    pub http: HttpClientConfig,
    pub paths: StructuredFeedPaths,
}

#[derive(Debug)]
pub struct StructuredFeedClient {
    http: HttpFetcher,
    paths: StructuredFeedPaths,
}

impl StructuredFeedClient {
    pub fn new(config: StructuredFeedConfig) -> Result<Self, StructuredFeedError> {
        Ok(Self {
            http: HttpFetcher::new(config.http)?,
            paths: config.paths,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        run_id: Uuid,
        resource: &'static str,
        path: &str,
    ) -> Result<T, StructuredFeedError> {
        let resp = self.http.get(run_id, SOURCE_ID, path).await?;
        if !resp.is_ok() {
            return Err(StructuredFeedError::UnexpectedStatus {
                status: resp.status.as_u16(),
                url: resp.final_url,
            });
        }
        serde_json::from_slice(&resp.body)
            .map_err(|source| StructuredFeedError::Decode { resource, source })
    }
}

#[async_trait]
impl StructuredFeed for StructuredFeedClient {
    fn asset_base_url(&self) -> &str {
        self.http.base_url()
    }

    async fn security_list(&self, run_id: Uuid) -> Result<SecurityListResponse, StructuredFeedError> {
        self.get_json(run_id, "security list", &self.paths.security_list)
            .await
    }

    async fn company_profile(
        &self,
        run_id: Uuid,
        code: &str,
    ) -> Result<CompanyProfileResponse, StructuredFeedError> {
        let path = self.paths.company_profile.replace("{CODE}", code);
        self.get_json(run_id, "company profile", &path).await
    }

    async fn daily_summaries(
        &self,
        run_id: Uuid,
        date: NaiveDate,
    ) -> Result<DailySummaryListResponse, StructuredFeedError> {
        let path = self
            .paths
            .daily_summary_list
            .replace("{DATE}", &date.format("%Y%m%d").to_string());
        self.get_json(run_id, "daily summary list", &path).await
    }

    async fn broker_list(&self, run_id: Uuid) -> Result<BrokerListResponse, StructuredFeedError> {
        self.get_json(run_id, "broker list", &self.paths.broker_list)
            .await
    }

    async fn financial_disclosures(
        &self,
        run_id: Uuid,
        period: FiscalPeriod,
        year: i32,
    ) -> Result<DisclosureListResponse, StructuredFeedError> {
        let path = self
            .paths
            .financial_disclosure_list
            .replace("{PERIOD}", source_period_tag(period))
            .replace("{YEAR}", &year.to_string());
        self.get_json(run_id, "financial disclosure list", &path)
            .await
    }
}
