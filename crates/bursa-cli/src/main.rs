use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bursa_adapters::BrokerSummaryQuery;
use bursa_core::{BoardFilter, FiscalPeriod, InvestorType, ReportWindow};
use bursa_storage::Gateway;
use bursa_sync::{
    build_broker_summary_service, build_jobs, open_store, resolve_timezone, AppConfig,
    CancelSignal, IngestionScheduler, JobKind, JobRequest,
};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "bursa")]
#[command(about = "Market-data ingestion for listed securities")]
struct Cli {
    /// Configuration file; defaults to $BURSA_CONFIG, then config/bursa.yaml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the cron scheduler until interrupted.
    Schedule,
    /// Run one job now.
    Run {
        job: JobKind,
        /// Trading date for daily-summaries (YYYY-MM-DD or YYYYMMDD).
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
        /// Report period for disclosures: Q1, Q2, Q3 or Audit.
        #[arg(long)]
        period: Option<FiscalPeriod>,
        #[arg(long)]
        year: Option<i32>,
    },
    /// Fetch a broker summary from the scraped source.
    BrokerSummary {
        #[arg(long)]
        code: String,
        #[arg(long, value_parser = parse_date)]
        start: NaiveDate,
        #[arg(long, value_parser = parse_date)]
        end: NaiveDate,
        #[arg(long, default_value = "all")]
        investor: InvestorType,
        #[arg(long, default_value = "all")]
        board: BoardFilter,
    },
    /// Read persisted documents.
    Show {
        #[command(subcommand)]
        what: ShowCommand,
    },
}

#[derive(Debug, Subcommand)]
enum ShowCommand {
    Security {
        code: String,
    },
    Securities {
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: u64,
        #[arg(long, default_value_t = 0)]
        offset: u64,
    },
    DailySummaries {
        #[arg(long)]
        code: Option<String>,
        #[arg(long, value_parser = parse_date)]
        start: Option<NaiveDate>,
        #[arg(long, value_parser = parse_date)]
        end: Option<NaiveDate>,
    },
    Brokers {
        #[arg(long)]
        code: Option<String>,
    },
    Disclosure {
        code: String,
        period: FiscalPeriod,
        year: String,
    },
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y%m%d"))
        .map_err(|_| format!("expected YYYY-MM-DD or YYYYMMDD, got {raw:?}"))
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("encoding output")?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Schedule) {
        Commands::Schedule => schedule(&config).await?,
        Commands::Run {
            job,
            date,
            period,
            year,
        } => {
            let tz = resolve_timezone(&config.application.timezone);
            let now = Utc::now().with_timezone(&tz);
            let request = match JobRequest::at(job, &now) {
                JobRequest::DailySummaries { date: today } if period.is_none() && year.is_none() => {
                    JobRequest::DailySummaries {
                        date: date.unwrap_or(today),
                    }
                }
                JobRequest::Disclosures { window } if date.is_none() => JobRequest::Disclosures {
                    window: ReportWindow {
                        period: period.unwrap_or(window.period),
                        year: year.unwrap_or(window.year),
                    },
                },
                request if date.is_none() && period.is_none() && year.is_none() => request,
                _ => bail!("--date, --period and --year do not apply to the {job} job"),
            };

            let jobs = build_jobs(&config).await?;
            let summary = jobs.execute(request, &CancelSignal::never()).await?;
            print_json(&summary)?;
        }
        Commands::BrokerSummary {
            code,
            start,
            end,
            investor,
            board,
        } => {
            let query = BrokerSummaryQuery {
                security_code: code,
                start,
                end,
                investor_type: investor,
                board,
            };
            let service = build_broker_summary_service(&config)?;
            match service.find_optional(&query).await? {
                Some(summary) => print_json(&summary)?,
                None => eprintln!("no data for {} in the requested range", query.security_code),
            }
        }
        Commands::Show { what } => {
            let gateway = Gateway::new(open_store(&config.store).await?);
            show(&gateway, what).await?;
        }
    }

    Ok(())
}

async fn schedule(config: &AppConfig) -> Result<()> {
    let tz = resolve_timezone(&config.application.timezone);
    let jobs = Arc::new(build_jobs(config).await?);
    let running = IngestionScheduler::new(jobs, config.schedule.clone(), tz)
        .start()
        .await?;
    info!(
        app = %config.application.name,
        jobs = running.scheduled().len(),
        "scheduler running; press ctrl-c to stop"
    );

    if let Err(err) = signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
    }
    info!("shutdown requested");
    if !running.shutdown(config.shutdown_grace()).await? {
        bail!("jobs did not finish within the shutdown grace period");
    }
    Ok(())
}

async fn show(gateway: &Gateway, what: ShowCommand) -> Result<()> {
    match what {
        ShowCommand::Security { code } => {
            print_json(&gateway.securities().find_one(&code).await?)?;
        }
        ShowCommand::Securities {
            search: Some(query),
            ..
        } => {
            print_json(&gateway.securities().search(&query).await?)?;
        }
        ShowCommand::Securities {
            search: None,
            limit,
            offset,
        } => {
            let (items, total) = gateway.securities().find_page(limit, offset).await?;
            print_json(&json!({ "total": total, "items": items }))?;
        }
        ShowCommand::DailySummaries { code, start, end } => {
            let rows = gateway
                .daily_summaries()
                .find(code.as_deref(), start, end)
                .await?;
            print_json(&rows)?;
        }
        ShowCommand::Brokers { code } => {
            print_json(&gateway.brokers().find(code.as_deref()).await?)?;
        }
        ShowCommand::Disclosure { code, period, year } => {
            let latest = gateway
                .financial_disclosures()
                .find_one(&code, period, &year)
                .await?;
            print_json(&latest)?;
        }
    }
    Ok(())
}
