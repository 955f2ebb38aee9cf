//! Cron-driven execution of the ingestion jobs.
//!
//! Each job kind runs at most once at a time; a firing that lands while the
//! previous run of the same kind is still busy is skipped. Different kinds
//! may overlap freely. Failures are logged and never stop the scheduler.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::time::timeout;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ScheduleConfig;
use crate::jobs::{CancelSignal, Cancelled, IngestionJobs, JobKind, JobRequest, JobRunSummary};

/// Upper bound on concurrently executing job runs.
pub const IN_FLIGHT_PERMITS: u32 = 64;

pub fn resolve_timezone(name: &str) -> Tz {
    match name.trim().parse::<Tz>() {
        Ok(tz) => tz,
        Err(err) => {
            warn!(timezone = name, error = %err, "unknown timezone; falling back to UTC");
            Tz::UTC
        }
    }
}

#[derive(Debug)]
pub enum FiringOutcome {
    Completed(JobRunSummary),
    Failed,
    Skipped,
    ShuttingDown,
}

struct JobRunner {
    jobs: Arc<IngestionJobs>,
    tz: Tz,
    in_flight: Semaphore,
    running: HashMap<JobKind, Mutex<()>>,
    cancel: CancelSignal,
}

impl JobRunner {
    fn new(jobs: Arc<IngestionJobs>, tz: Tz, cancel: CancelSignal) -> Self {
        Self {
            jobs,
            tz,
            in_flight: Semaphore::new(IN_FLIGHT_PERMITS as usize),
            running: JobKind::ALL
                .into_iter()
                .map(|kind| (kind, Mutex::new(())))
                .collect(),
            cancel,
        }
    }

    async fn fire(&self, kind: JobKind, now: DateTime<Utc>) -> FiringOutcome {
        if self.cancel.is_cancelled() {
            debug!(job = %kind, "firing ignored during shutdown");
            return FiringOutcome::ShuttingDown;
        }
        let Some(lock) = self.running.get(&kind) else {
            return FiringOutcome::Skipped;
        };
        let Ok(_guard) = lock.try_lock() else {
            warn!(job = %kind, "previous run still in progress; skipping firing");
            return FiringOutcome::Skipped;
        };
        let Ok(_permit) = self.in_flight.acquire().await else {
            return FiringOutcome::ShuttingDown;
        };

        let request = JobRequest::at(kind, &now.with_timezone(&self.tz));
        match self.jobs.execute(request, &self.cancel).await {
            Ok(summary) => FiringOutcome::Completed(summary),
            Err(err) if err.downcast_ref::<Cancelled>().is_some() => {
                info!(job = %kind, reason = %err, "job stopped for shutdown");
                FiringOutcome::ShuttingDown
            }
            Err(err) => {
                error!(job = %kind, error = %format!("{err:#}"), "job failed");
                FiringOutcome::Failed
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJob {
    pub kind: JobKind,
    pub expression: String,
    pub job_id: Uuid,
}

pub struct IngestionScheduler {
    jobs: Arc<IngestionJobs>,
    schedule: ScheduleConfig,
    tz: Tz,
}

impl IngestionScheduler {
    pub fn new(jobs: Arc<IngestionJobs>, schedule: ScheduleConfig, tz: Tz) -> Self {
        Self { jobs, schedule, tz }
    }

    /// Register every job with a non-blank expression and start ticking.
    /// An invalid expression fails the whole start.
    pub async fn start(self) -> Result<RunningScheduler> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let runner = Arc::new(JobRunner::new(
            self.jobs,
            self.tz,
            CancelSignal::new(shutdown_rx),
        ));

        let mut sched = JobScheduler::new().await.context("creating scheduler")?;
        let mut scheduled = Vec::new();
        for kind in JobKind::ALL {
            let expression = self.schedule.expression(kind);
            if expression.is_empty() {
                warn!(job = %kind, "no cron expression configured; job disabled");
                continue;
            }

            let job_runner = Arc::clone(&runner);
            let job = Job::new_async_tz(expression, self.tz, move |_uuid, _l| {
                let runner = Arc::clone(&job_runner);
                Box::pin(async move {
                    runner.fire(kind, Utc::now()).await;
                })
            })
            .with_context(|| format!("creating {kind} job for cron {expression}"))?;
            let job_id = sched
                .add(job)
                .await
                .with_context(|| format!("adding {kind} job"))?;

            info!(job = %kind, cron = expression, timezone = %self.tz, "job scheduled");
            scheduled.push(ScheduledJob {
                kind,
                expression: expression.to_string(),
                job_id,
            });
        }

        if let Err(err) = sched.start().await {
            // Leave nothing half-started behind.
            let _ = sched.shutdown().await;
            return Err(err).context("starting scheduler");
        }

        Ok(RunningScheduler {
            sched,
            scheduled,
            runner,
            shutdown_tx,
        })
    }
}

pub struct RunningScheduler {
    sched: JobScheduler,
    scheduled: Vec<ScheduledJob>,
    runner: Arc<JobRunner>,
    shutdown_tx: watch::Sender<bool>,
}

impl RunningScheduler {
    pub fn scheduled(&self) -> &[ScheduledJob] {
        &self.scheduled
    }

    /// Run `kind` immediately, under the same overlap rules as a cron firing.
    pub async fn trigger(&self, kind: JobKind) -> FiringOutcome {
        self.runner.fire(kind, Utc::now()).await
    }

    /// Stop firing, signal running jobs and wait up to `grace` for them to
    /// finish. Returns whether every run finished in time.
    pub async fn shutdown(mut self, grace: Duration) -> Result<bool> {
        self.shutdown_tx.send_replace(true);
        self.sched
            .shutdown()
            .await
            .context("stopping scheduler")?;

        let drained = timeout(grace, self.runner.in_flight.acquire_many(IN_FLIGHT_PERMITS))
            .await
            .is_ok_and(|permits| permits.is_ok());
        if drained {
            info!("scheduler stopped");
        } else {
            warn!(grace_secs = grace.as_secs(), "jobs still running after grace period");
        }
        Ok(drained)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bursa_adapters::{StructuredFeedClient, StructuredFeedConfig, StructuredFeedPaths};
    use bursa_storage::{Gateway, HttpClientConfig, MemoryStore};
    use httpmock::{Method::GET, MockServer};

    fn jobs(base_url: String) -> Arc<IngestionJobs> {
        let feed = StructuredFeedClient::new(StructuredFeedConfig {
            http: HttpClientConfig {
                base_url,
                ..Default::default()
            },
            paths: StructuredFeedPaths {
                broker_list: "/brokers".to_string(),
                ..Default::default()
            },
        })
        .unwrap();
        Arc::new(IngestionJobs::new(
            Arc::new(feed),
            Gateway::new(Arc::new(MemoryStore::new())),
        ))
    }

    fn idle_schedule() -> ScheduleConfig {
        // Far-off firings so tests only run what they trigger.
        ScheduleConfig {
            securities: "0 0 0 1 1 *".to_string(),
            daily_summaries: "".to_string(),
            brokers: "0 0 0 1 1 *".to_string(),
            disclosures: "  ".to_string(),
        }
    }

    #[test]
    fn unknown_timezone_falls_back_to_utc() {
        assert_eq!(resolve_timezone("Asia/Jakarta"), chrono_tz::Asia::Jakarta);
        assert_eq!(resolve_timezone("Mars/Olympus"), Tz::UTC);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn blank_expressions_disable_jobs() {
        let running = IngestionScheduler::new(
            jobs("http://127.0.0.1:1".to_string()),
            idle_schedule(),
            Tz::UTC,
        )
        .start()
        .await
        .unwrap();

        let kinds: Vec<_> = running.scheduled().iter().map(|j| j.kind).collect();
        assert_eq!(kinds, vec![JobKind::Securities, JobKind::Brokers]);
        assert!(running.shutdown(Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_expression_fails_start() {
        let mut schedule = idle_schedule();
        schedule.brokers = "every monday".to_string();
        let result = IngestionScheduler::new(
            jobs("http://127.0.0.1:1".to_string()),
            schedule,
            Tz::UTC,
        )
        .start()
        .await;
        assert!(result.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_run_is_contained() {
        let running = IngestionScheduler::new(
            jobs("http://127.0.0.1:1".to_string()),
            idle_schedule(),
            Tz::UTC,
        )
        .start()
        .await
        .unwrap();

        assert!(matches!(
            running.trigger(JobKind::Brokers).await,
            FiringOutcome::Failed
        ));
        // The next firing still runs.
        assert!(matches!(
            running.trigger(JobKind::Brokers).await,
            FiringOutcome::Failed
        ));
        assert!(running.shutdown(Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn overlapping_firing_of_same_kind_is_skipped() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/brokers");
            then.status(200)
                .body(r#"{"data":[]}"#)
                .delay(Duration::from_millis(500));
        });
        let runner = Arc::new(JobRunner::new(
            jobs(server.base_url()),
            Tz::UTC,
            CancelSignal::never(),
        ));

        let first = {
            let runner = Arc::clone(&runner);
            tokio::spawn(async move { runner.fire(JobKind::Brokers, Utc::now()).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(matches!(
            runner.fire(JobKind::Brokers, Utc::now()).await,
            FiringOutcome::Skipped
        ));
        assert!(matches!(
            first.await.unwrap(),
            FiringOutcome::Completed(_)
        ));
    }

    #[tokio::test]
    async fn firings_after_shutdown_are_ignored() {
        let (tx, rx) = watch::channel(false);
        let runner = JobRunner::new(
            jobs("http://127.0.0.1:1".to_string()),
            Tz::UTC,
            CancelSignal::new(rx),
        );
        tx.send_replace(true);
        assert!(matches!(
            runner.fire(JobKind::Securities, Utc::now()).await,
            FiringOutcome::ShuttingDown
        ));
    }
}
