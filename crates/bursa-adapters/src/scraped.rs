//! Broker-summary scraper for the HTML-rendered source.
//!
//! The page holds one `table.table-summary`: each body row carries a buyer
//! (cells 0-3) and a seller (cells 5-8) side by side, and the footer holds
//! four labelled aggregate lines such as `T. Val : 12.5 B`.

use async_trait::async_trait;
use bursa_core::{AggregateBlock, BoardFilter, BrokerTransactionRow, InvestorType};
use bursa_storage::{FetchError, HttpClientConfig, HttpFetcher};
use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::BrokerSummarySource;

pub const SOURCE_ID: &str = "scraped-feed";

pub const DEFAULT_BROKER_SUMMARY_PATH: &str = "/module/saham/include/data-brokersummary.php?code={CODE}&start={START_DATE}&end={END_DATE}&fd={INVESTOR_TYPE}&board={BOARD}";

const ROW_SELECTOR: &str = "table.table-summary tbody tr";
const CELL_SELECTOR: &str = "td";
const FOOTER_SELECTOR: &str = "table.table-summary tfoot tr th div span";

const MIN_CELLS: usize = 9;
const SOURCE_DATE_FORMAT: &str = "%m/%d/%Y";

#[derive(Debug, Error)]
pub enum ScrapedFeedError {
    #[error(transparent)]
    Transport(#[from] FetchError),
    #[error("unexpected status code {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },
    #[error("invalid selector {selector:?}: {reason}")]
    Selector { selector: &'static str, reason: String },
    #[error("empty broker summary data")]
    NoData,
    #[error("start date {start} is after end date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerSummaryQuery {
    pub security_code: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub investor_type: InvestorType,
    pub board: BoardFilter,
}

impl BrokerSummaryQuery {
    pub fn validate(&self) -> Result<(), ScrapedFeedError> {
        if self.start > self.end {
            return Err(ScrapedFeedError::InvalidDateRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    /// Security code as the source expects it: trimmed and upper-case.
    pub fn normalized_code(&self) -> String {
        self.security_code.trim().to_ascii_uppercase()
    }

    /// Substitute every query token in `template`.
    pub fn render_path(&self, template: &str) -> String {
        template
            .replace("{CODE}", &self.normalized_code())
            .replace(
                "{START_DATE}",
                &self.start.format(SOURCE_DATE_FORMAT).to_string(),
            )
            .replace("{END_DATE}", &self.end.format(SOURCE_DATE_FORMAT).to_string())
            .replace("{INVESTOR_TYPE}", self.investor_type.code())
            .replace("{BOARD}", self.board.code())
    }
}

/// Parsed page: buyer and seller lists stay index-aligned with the table rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrokerSummaryPage {
    pub buyers: Vec<BrokerTransactionRow>,
    pub sellers: Vec<BrokerTransactionRow>,
    pub aggregate: AggregateBlock,
}

/// Lossy numeric parse: drop thousands separators, keep the first token,
/// and read anything unparsable as zero.
pub fn parse_number(raw: &str) -> f64 {
    let cleaned = raw.trim().replace(',', "");
    cleaned
        .split_whitespace()
        .next()
        .and_then(|token| token.parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Text after the first `:` of a footer line, trimmed.
fn label_value(line: &str) -> String {
    line.split_once(':')
        .map(|(_, value)| value.trim().to_string())
        .unwrap_or_default()
}

fn selector(raw: &'static str) -> Result<Selector, ScrapedFeedError> {
    Selector::parse(raw).map_err(|e| ScrapedFeedError::Selector {
        selector: raw,
        reason: e.to_string(),
    })
}

fn cell_text(cell: &ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

fn side(cells: &[ElementRef<'_>], offset: usize) -> BrokerTransactionRow {
    BrokerTransactionRow {
        broker_code: cell_text(&cells[offset]),
        lot: parse_number(&cell_text(&cells[offset + 1])),
        value: cell_text(&cells[offset + 2]),
        average_price: parse_number(&cell_text(&cells[offset + 3])),
    }
}

pub fn parse_broker_summary(html: &str) -> Result<BrokerSummaryPage, ScrapedFeedError> {
    let document = Html::parse_document(html);
    let row_sel = selector(ROW_SELECTOR)?;
    let cell_sel = selector(CELL_SELECTOR)?;
    let footer_sel = selector(FOOTER_SELECTOR)?;

    let mut page = BrokerSummaryPage::default();
    let mut has_valid_row = false;

    for row in document.select(&row_sel) {
        let cells: Vec<ElementRef<'_>> = row.select(&cell_sel).collect();
        if cells.len() < MIN_CELLS {
            continue;
        }
        let buyer = side(&cells, 0);
        let seller = side(&cells, 5);
        // Only rows blank on both sides are padding; half-filled rows are kept.
        if buyer.broker_code.is_empty() && seller.broker_code.is_empty() {
            continue;
        }
        has_valid_row = true;
        page.buyers.push(buyer);
        page.sellers.push(seller);
    }

    for span in document.select(&footer_sel) {
        let line = cell_text(&span);
        if line.starts_with("T. Val") {
            page.aggregate.total_value = label_value(&line);
        } else if line.starts_with("F. NVal") {
            page.aggregate.foreign_net_value = label_value(&line);
        } else if line.starts_with("T.Lot") {
            page.aggregate.total_lot = parse_number(&label_value(&line));
        } else if line.starts_with("Avg") {
            page.aggregate.average = parse_number(&label_value(&line));
        }
    }

    // Total value must read exactly "0"; a missing or "-" footer is not zero.
    let aggregate_is_zero = page.aggregate.total_value == "0"
        && page.aggregate.total_lot == 0.0
        && page.aggregate.average == 0.0;
    if !has_valid_row && aggregate_is_zero {
        return Err(ScrapedFeedError::NoData);
    }

    debug!(
        buyers = page.buyers.len(),
        sellers = page.sellers.len(),
        "parsed broker summary"
    );
    Ok(page)
}

#[derive(Debug, Clone)]
pub struct ScrapedFeedConfig {
    pub http: HttpClientConfig,
    pub broker_summary_path: String,
}

#[derive(Debug)]
pub struct ScrapedFeedClient {
    http: HttpFetcher,
    broker_summary_path: String,
}

impl ScrapedFeedClient {
    pub fn new(config: ScrapedFeedConfig) -> Result<Self, ScrapedFeedError> {
        Ok(Self {
            http: HttpFetcher::new(config.http)?,
            broker_summary_path: config.broker_summary_path,
        })
    }
}

#[async_trait]
impl BrokerSummarySource for ScrapedFeedClient {
    async fn broker_summary(
        &self,
        run_id: Uuid,
        query: &BrokerSummaryQuery,
    ) -> Result<BrokerSummaryPage, ScrapedFeedError> {
        query.validate()?;
        let path = query.render_path(&self.broker_summary_path);
        let resp = self.http.get(run_id, SOURCE_ID, &path).await?;
        if !resp.is_ok() {
            return Err(ScrapedFeedError::UnexpectedStatus {
                status: resp.status.as_u16(),
                url: resp.final_url,
            });
        }
        parse_broker_summary(&resp.text())
    }
}
