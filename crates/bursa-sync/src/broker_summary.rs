//! On-demand broker-summary lookups against the scraped source.

use std::sync::Arc;

use bursa_adapters::{normalize, BrokerSummaryQuery, BrokerSummarySource, ScrapedFeedError};
use bursa_core::BrokerTransactionSummary;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

/// Nothing here is persisted.
#[derive(Clone)]
pub struct BrokerSummaryService {
    source: Arc<dyn BrokerSummarySource>,
}

impl BrokerSummaryService {
    pub fn new(source: Arc<dyn BrokerSummarySource>) -> Self {
        Self { source }
    }

    pub async fn find(
        &self,
        query: &BrokerSummaryQuery,
    ) -> Result<BrokerTransactionSummary, ScrapedFeedError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("broker_summary", code = %query.security_code, %run_id);
        async {
            let page = self.source.broker_summary(run_id, query).await?;
            debug!(
                buyers = page.buyers.len(),
                sellers = page.sellers.len(),
                "broker summary parsed"
            );
            Ok(normalize::broker_summary(query, page))
        }
        .instrument(span)
        .await
    }

    /// Like [`find`](Self::find) but an empty page is `None` rather than an error.
    pub async fn find_optional(
        &self,
        query: &BrokerSummaryQuery,
    ) -> Result<Option<BrokerTransactionSummary>, ScrapedFeedError> {
        match self.find(query).await {
            Ok(summary) => Ok(Some(summary)),
            Err(ScrapedFeedError::NoData) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bursa_adapters::{parse_broker_summary, BrokerSummaryPage};
    use bursa_core::{BoardFilter, InvestorType};
    use chrono::NaiveDate;

    struct FixtureSource(&'static str);

    #[async_trait]
    impl BrokerSummarySource for FixtureSource {
        async fn broker_summary(
            &self,
            _run_id: Uuid,
            _query: &BrokerSummaryQuery,
        ) -> Result<BrokerSummaryPage, ScrapedFeedError> {
            let html = std::fs::read_to_string(
                std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
                    .join("../../fixtures/scraped-feed")
                    .join(self.0),
            )
            .unwrap();
            parse_broker_summary(&html)
        }
    }

    fn query() -> BrokerSummaryQuery {
        BrokerSummaryQuery {
            security_code: " bbca ".to_string(),
            start: NaiveDate::from_ymd_opt(2025, 5, 2).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 5, 2).unwrap(),
            investor_type: InvestorType::All,
            board: BoardFilter::Regular,
        }
    }

    #[tokio::test]
    async fn summary_carries_query_parameters() {
        let service = BrokerSummaryService::new(Arc::new(FixtureSource("broker_summary.html")));
        let summary = service.find(&query()).await.unwrap();
        assert_eq!(summary.security_code, "BBCA");
        assert_eq!(summary.board, BoardFilter::Regular);
        assert_eq!(summary.buyers.len(), 3);
        assert_eq!(summary.aggregate.total_value, "45.7 B");
    }

    #[tokio::test]
    async fn empty_page_is_none() {
        let service =
            BrokerSummaryService::new(Arc::new(FixtureSource("broker_summary_empty.html")));
        assert!(service.find_optional(&query()).await.unwrap().is_none());
        assert!(matches!(
            service.find(&query()).await,
            Err(ScrapedFeedError::NoData)
        ));
    }
}
