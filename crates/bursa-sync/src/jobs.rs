//! The four ingestion jobs: fetch, normalize, persist.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use bursa_adapters::{normalize, Normalizer, StructuredFeed};
use bursa_core::{ReportWindow, UnknownVariant};
use bursa_storage::{BulkWriteSummary, Gateway};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    Securities,
    DailySummaries,
    Brokers,
    Disclosures,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [
        JobKind::Securities,
        JobKind::DailySummaries,
        JobKind::Brokers,
        JobKind::Disclosures,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            JobKind::Securities => "securities",
            JobKind::DailySummaries => "daily-summaries",
            JobKind::Brokers => "brokers",
            JobKind::Disclosures => "disclosures",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for JobKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s.trim())
            .ok_or_else(|| UnknownVariant {
                kind: "job",
                value: s.to_string(),
            })
    }
}

/// One job invocation with its run-time parameters resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobRequest {
    Securities,
    DailySummaries { date: NaiveDate },
    Brokers,
    Disclosures { window: ReportWindow },
}

impl JobRequest {
    /// Parameters for a firing at local time `now`: today's date for daily
    /// summaries and the window being published for disclosures.
    pub fn at<Z: TimeZone>(kind: JobKind, now: &DateTime<Z>) -> Self {
        match kind {
            JobKind::Securities => JobRequest::Securities,
            JobKind::DailySummaries => JobRequest::DailySummaries {
                date: now.date_naive(),
            },
            JobKind::Brokers => JobRequest::Brokers,
            JobKind::Disclosures => JobRequest::Disclosures {
                window: ReportWindow::containing(now),
            },
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            JobRequest::Securities => JobKind::Securities,
            JobRequest::DailySummaries { .. } => JobKind::DailySummaries,
            JobRequest::Brokers => JobKind::Brokers,
            JobRequest::Disclosures { .. } => JobKind::Disclosures,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobRunSummary {
    pub run_id: Uuid,
    pub job: JobKind,
    pub fetched: usize,
    pub attempted: usize,
    pub inserted: usize,
    pub replaced: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("job cancelled before {stage}")]
pub struct Cancelled {
    pub stage: &'static str,
}

/// Observed between stages; a running fetch or parse is never interrupted.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx: Some(rx) }
    }

    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    pub fn check(&self, stage: &'static str) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled { stage })
        } else {
            Ok(())
        }
    }
}

pub struct IngestionJobs {
    feed: Arc<dyn StructuredFeed>,
    gateway: Gateway,
    normalizer: Normalizer,
}

impl IngestionJobs {
    pub fn new(feed: Arc<dyn StructuredFeed>, gateway: Gateway) -> Self {
        let normalizer = Normalizer::new(feed.asset_base_url());
        Self {
            feed,
            gateway,
            normalizer,
        }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub async fn execute(
        &self,
        request: JobRequest,
        cancel: &CancelSignal,
    ) -> Result<JobRunSummary> {
        let run_id = Uuid::new_v4();
        let job = request.kind();
        let started_at = Utc::now();
        let span = info_span!("job", job = job.name(), %run_id);

        let (fetched, written) = async {
            match request {
                JobRequest::Securities => self.refresh_securities(run_id, cancel).await,
                JobRequest::DailySummaries { date } => {
                    self.refresh_daily_summaries(run_id, date, cancel).await
                }
                JobRequest::Brokers => self.refresh_brokers(run_id, cancel).await,
                JobRequest::Disclosures { window } => {
                    self.refresh_disclosures(run_id, window, cancel).await
                }
            }
        }
        .instrument(span.clone())
        .await?;

        let summary = JobRunSummary {
            run_id,
            job,
            fetched,
            attempted: written.attempted,
            inserted: written.inserted,
            replaced: written.replaced,
            started_at,
            finished_at: Utc::now(),
        };
        span.in_scope(|| {
            info!(
                fetched,
                inserted = summary.inserted,
                replaced = summary.replaced,
                "job finished"
            )
        });
        Ok(summary)
    }

    /// The profile of every listed security is fetched one by one; any
    /// failure aborts the run before anything is written.
    async fn refresh_securities(
        &self,
        run_id: Uuid,
        cancel: &CancelSignal,
    ) -> Result<(usize, BulkWriteSummary)> {
        let list = self
            .feed
            .security_list(run_id)
            .await
            .context("fetching security list")?;

        let mut securities = Vec::with_capacity(list.data.len());
        for listing in &list.data {
            cancel.check("company profile fetch")?;
            let bundle = self
                .feed
                .company_profile(run_id, &listing.code)
                .await
                .with_context(|| format!("fetching company profile for {}", listing.code))?;
            securities.push(self.normalizer.security(listing, &bundle));
        }

        cancel.check("persist")?;
        let written = self
            .gateway
            .securities()
            .bulk_upsert(&securities)
            .await
            .context("persisting securities")?;
        Ok((list.data.len(), written))
    }

    async fn refresh_daily_summaries(
        &self,
        run_id: Uuid,
        date: NaiveDate,
        cancel: &CancelSignal,
    ) -> Result<(usize, BulkWriteSummary)> {
        let response = self
            .feed
            .daily_summaries(run_id, date)
            .await
            .with_context(|| format!("fetching daily summaries for {date}"))?;

        cancel.check("normalize")?;
        let summaries = normalize::daily_summaries(&response);

        cancel.check("persist")?;
        let written = self
            .gateway
            .daily_summaries()
            .bulk_upsert(&summaries)
            .await
            .context("persisting daily summaries")?;
        Ok((summaries.len(), written))
    }

    async fn refresh_brokers(
        &self,
        run_id: Uuid,
        cancel: &CancelSignal,
    ) -> Result<(usize, BulkWriteSummary)> {
        let response = self
            .feed
            .broker_list(run_id)
            .await
            .context("fetching broker list")?;

        cancel.check("normalize")?;
        let brokers = normalize::brokers(&response);

        cancel.check("persist")?;
        let written = self
            .gateway
            .brokers()
            .bulk_upsert(&brokers)
            .await
            .context("persisting brokers")?;
        Ok((brokers.len(), written))
    }

    async fn refresh_disclosures(
        &self,
        run_id: Uuid,
        window: ReportWindow,
        cancel: &CancelSignal,
    ) -> Result<(usize, BulkWriteSummary)> {
        let response = self
            .feed
            .financial_disclosures(run_id, window.period, window.year)
            .await
            .with_context(|| {
                format!(
                    "fetching financial disclosures for {} {}",
                    window.period, window.year
                )
            })?;

        cancel.check("normalize")?;
        let disclosures = self
            .normalizer
            .financial_disclosures(&response, window.period);

        cancel.check("persist")?;
        let written = self
            .gateway
            .financial_disclosures()
            .bulk_upsert(&disclosures)
            .await
            .context("persisting financial disclosures")?;
        Ok((disclosures.len(), written))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bursa_adapters::{StructuredFeedClient, StructuredFeedConfig, StructuredFeedPaths};
    use bursa_core::FiscalPeriod;
    use bursa_storage::{HttpClientConfig, MemoryStore};
    use httpmock::{Method::GET, MockServer};
    use std::path::Path;

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(
            Path::new(env!("CARGO_MANIFEST_DIR"))
                .join("../../fixtures/structured-feed")
                .join(name),
        )
        .unwrap()
    }

    fn jobs(server: &MockServer) -> IngestionJobs {
        let feed = StructuredFeedClient::new(StructuredFeedConfig {
            http: HttpClientConfig {
                base_url: server.base_url(),
                ..Default::default()
            },
            paths: StructuredFeedPaths {
                security_list: "/securities".to_string(),
                company_profile: "/profile?code={CODE}".to_string(),
                daily_summary_list: "/summaries?date={DATE}".to_string(),
                broker_list: "/brokers".to_string(),
                financial_disclosure_list: "/reports?period={PERIOD}&year={YEAR}".to_string(),
            },
        })
        .unwrap();
        IngestionJobs::new(Arc::new(feed), Gateway::new(Arc::new(MemoryStore::new())))
    }

    fn mock_security_feed(server: &MockServer) {
        server.mock(|when, then| {
            when.method(GET).path("/securities");
            then.status(200).body(fixture("security_list.json"));
        });
        server.mock(|when, then| {
            when.method(GET).path("/profile").query_param("code", "ABCD");
            then.status(200).body(fixture("company_profile_abcd.json"));
        });
    }

    #[tokio::test]
    async fn security_refresh_persists_abcd_with_nested_collections() {
        let server = MockServer::start();
        mock_security_feed(&server);
        let jobs = jobs(&server);

        let summary = jobs
            .execute(JobRequest::Securities, &CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(summary.fetched, 1);
        assert_eq!(summary.inserted, 1);

        let all = jobs.gateway().securities().all().await.unwrap();
        assert_eq!(all.len(), 1);
        let abcd = &all[0];
        assert_eq!(abcd.code, "ABCD");
        assert_eq!(abcd.profiles.len(), 1);
        assert_eq!(abcd.directors.len(), 1);
        assert_eq!(abcd.directors[0].name, "Budi Santoso");
        assert_eq!(abcd.dividends.len(), 1);
        assert_eq!(abcd.dividends[0].cash_per_share, 12.5);
        assert_eq!(
            abcd.profiles[0].logo_url,
            format!(
                "{}/Portals/0/StaticData/ListedCompanies/LogoEmiten/ABCD.jpg",
                server.base_url()
            )
        );

        let again = jobs
            .execute(JobRequest::Securities, &CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(again.inserted, 0);
        assert_eq!(again.replaced, 1);
        assert_eq!(jobs.gateway().securities().all().await.unwrap(), all);
    }

    #[tokio::test]
    async fn profile_failure_aborts_without_writing() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/securities");
            then.status(200).body(fixture("security_list.json"));
        });
        server.mock(|when, then| {
            when.method(GET).path("/profile");
            then.status(500);
        });
        let jobs = jobs(&server);

        let err = jobs
            .execute(JobRequest::Securities, &CancelSignal::never())
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("company profile for ABCD"));
        assert!(jobs.gateway().securities().all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn daily_summaries_use_requested_date_and_are_idempotent() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/summaries").query_param("date", "20250502");
            then.status(200).body(fixture("daily_summaries.json"));
        });
        let jobs = jobs(&server);
        let date = NaiveDate::from_ymd_opt(2025, 5, 2).unwrap();

        for _ in 0..2 {
            jobs.execute(
                JobRequest::DailySummaries { date },
                &CancelSignal::never(),
            )
            .await
            .unwrap();
        }
        mock.assert_hits(2);

        let rows = jobs
            .gateway()
            .daily_summaries()
            .find(None, Some(date), Some(date))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn disclosures_request_source_period_and_store_revision() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/reports")
                .query_param("period", "TW1")
                .query_param("year", "2025");
            then.status(200).body(fixture("financial_disclosures.json"));
        });
        let jobs = jobs(&server);
        let window = ReportWindow {
            period: FiscalPeriod::Q1,
            year: 2025,
        };

        let summary = jobs
            .execute(JobRequest::Disclosures { window }, &CancelSignal::never())
            .await
            .unwrap();
        mock.assert();
        assert_eq!(summary.fetched, 1);

        let stored = jobs
            .gateway()
            .financial_disclosures()
            .find_one("ABCD", FiscalPeriod::Q1, "2025")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.attachments.len(), 2);
        assert!(stored.attachments[0].file_path.starts_with(&server.base_url()));
    }

    #[tokio::test]
    async fn brokers_refresh_writes_directory() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/brokers");
            then.status(200).body(fixture("broker_list.json"));
        });
        let jobs = jobs(&server);

        let summary = jobs
            .execute(JobRequest::Brokers, &CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(summary.attempted, 2);
        let yp = jobs.gateway().brokers().find(Some("YP")).await.unwrap();
        assert_eq!(yp.len(), 1);
    }

    #[tokio::test]
    async fn cancellation_is_observed_before_persisting() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/brokers");
            then.status(200).body(fixture("broker_list.json"));
        });
        let jobs = jobs(&server);
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let err = jobs
            .execute(JobRequest::Brokers, &CancelSignal::new(rx))
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<Cancelled>().is_some());
        assert!(jobs.gateway().brokers().find(None).await.unwrap().is_empty());
    }

    #[test]
    fn firing_parameters_follow_local_calendar() {
        let tz: chrono_tz::Tz = "Asia/Jakarta".parse().unwrap();
        // 2025-03-31 18:00 UTC is already April 1st in Jakarta.
        let now = Utc
            .with_ymd_and_hms(2025, 3, 31, 18, 0, 0)
            .unwrap()
            .with_timezone(&tz);

        assert_eq!(
            JobRequest::at(JobKind::DailySummaries, &now),
            JobRequest::DailySummaries {
                date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()
            }
        );
        assert_eq!(
            JobRequest::at(JobKind::Disclosures, &now),
            JobRequest::Disclosures {
                window: ReportWindow {
                    period: FiscalPeriod::Q1,
                    year: 2025
                }
            }
        );
    }

    #[test]
    fn job_kind_parses_cli_names() {
        assert_eq!("daily-summaries".parse::<JobKind>().unwrap(), JobKind::DailySummaries);
        assert!("stocks".parse::<JobKind>().is_err());
        assert_eq!(JobKind::Disclosures.to_string(), "disclosures");
    }
}
