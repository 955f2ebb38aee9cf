//! Canonical domain model for the bursa ingestion pipeline.
//!
//! Every type here carries English field names only; source vocabulary stays
//! inside `bursa-adapters`.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

pub const CRATE_NAME: &str = "bursa-core";

/// Listed security with its company profile bundle.
///
/// Nested collections are always replaced together with the parent document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Security {
    pub code: String,
    pub name: String,
    pub shares: f64,
    pub listing_date: NaiveDateTime,
    pub board: String,
    #[serde(default)]
    pub profiles: Vec<CompanyProfile>,
    #[serde(default)]
    pub secretaries: Vec<CorporateSecretary>,
    #[serde(default)]
    pub directors: Vec<Director>,
    #[serde(default)]
    pub commissioners: Vec<Commissioner>,
    #[serde(default)]
    pub audit_committee: Vec<AuditCommitteeMember>,
    #[serde(default)]
    pub shareholders: Vec<Shareholder>,
    #[serde(default)]
    pub subsidiaries: Vec<Subsidiary>,
    #[serde(default)]
    pub dividends: Vec<Dividend>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CompanyProfile {
    pub address: String,
    pub share_registrar: String,
    pub industry: String,
    pub sub_industry: String,
    pub email: String,
    pub fax: String,
    pub main_business: String,
    pub security_code: String,
    pub security_name: String,
    pub tax_id: String,
    pub sector: String,
    pub sub_sector: String,
    pub listing_date: String,
    pub phone: String,
    pub website: String,
    pub status: i64,
    /// Absolute URL of the company logo.
    pub logo_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CorporateSecretary {
    pub name: String,
    pub phone: String,
    pub website: String,
    pub email: String,
    pub fax: String,
    pub mobile: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Director {
    pub name: String,
    pub position: String,
    pub is_affiliated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Commissioner {
    pub name: String,
    pub position: String,
    pub is_independent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AuditCommitteeMember {
    pub name: String,
    pub position: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Shareholder {
    pub name: String,
    pub category: String,
    pub shares: f64,
    pub percentage: f64,
    pub is_controller: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Subsidiary {
    pub name: String,
    pub business_field: String,
    pub location: String,
    pub total_assets: f64,
    pub currency: String,
    pub units: String,
    pub percentage: f64,
    pub operation_status: String,
    pub commercial_year: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dividend {
    pub name: String,
    pub kind: String,
    pub fiscal_year: String,
    pub total_bonus_shares: f64,
    pub cash_per_share: f64,
    pub cash_per_share_currency: String,
    pub cash_total: f64,
    pub cash_total_currency: String,
    pub cum_date: NaiveDateTime,
    pub ex_date: NaiveDateTime,
    pub record_date: NaiveDateTime,
    pub payment_date: NaiveDateTime,
    pub ratio_numerator: i64,
    pub ratio_denominator: i64,
}

/// One trading day of one security. Keyed by `(security_code, date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub source_record_id: i64,
    pub date: NaiveDateTime,
    pub security_code: String,
    pub security_name: String,
    pub remarks: String,
    pub previous: f64,
    pub open_price: f64,
    pub first_trade: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub change: f64,
    pub volume: f64,
    pub value: f64,
    pub frequency: f64,
    pub index_individual: f64,
    pub offer: f64,
    pub offer_volume: f64,
    pub bid: f64,
    pub bid_volume: f64,
    pub listed_shares: f64,
    pub tradable_shares: f64,
    pub weight_for_index: f64,
    pub foreign_sell: f64,
    pub foreign_buy: f64,
    pub delisting_date: String,
    pub non_regular_volume: f64,
    pub non_regular_value: f64,
    pub non_regular_frequency: f64,
    #[serde(default)]
    pub percent: PassthroughValue,
    #[serde(default)]
    pub percentage: PassthroughValue,
}

/// A source field whose JSON type is not stable across rows.
///
/// Numbers and strings survive a round trip unchanged; `null` or a missing
/// field becomes `Absent`. Any other JSON shape is kept as its JSON text.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PassthroughValue {
    Number(f64),
    Text(String),
    #[default]
    Absent,
}

impl PassthroughValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, PassthroughValue::Absent)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PassthroughValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PassthroughValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<JsonValue> for PassthroughValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => PassthroughValue::Absent,
            JsonValue::Number(n) => n
                .as_f64()
                .map(PassthroughValue::Number)
                .unwrap_or_else(|| PassthroughValue::Text(n.to_string())),
            JsonValue::String(s) => PassthroughValue::Text(s),
            other => PassthroughValue::Text(other.to_string()),
        }
    }
}

impl Serialize for PassthroughValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PassthroughValue::Number(n) => serializer.serialize_f64(*n),
            PassthroughValue::Text(s) => serializer.serialize_str(s),
            PassthroughValue::Absent => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for PassthroughValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        Ok(PassthroughValue::from(value))
    }
}

/// Exchange member broker. Keyed by its two-letter `code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Broker {
    pub code: String,
    pub name: String,
    pub license: String,
}

/// Reporting window used when requesting financial disclosures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FiscalPeriod {
    Q1,
    Q2,
    Q3,
    Audit,
}

impl FiscalPeriod {
    pub const ALL: [FiscalPeriod; 4] = [
        FiscalPeriod::Q1,
        FiscalPeriod::Q2,
        FiscalPeriod::Q3,
        FiscalPeriod::Audit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FiscalPeriod::Q1 => "Q1",
            FiscalPeriod::Q2 => "Q2",
            FiscalPeriod::Q3 => "Q3",
            FiscalPeriod::Audit => "Audit",
        }
    }
}

impl fmt::Display for FiscalPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} {:?}", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

impl FromStr for FiscalPeriod {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Q1" | "q1" => Ok(FiscalPeriod::Q1),
            "Q2" | "q2" => Ok(FiscalPeriod::Q2),
            "Q3" | "q3" => Ok(FiscalPeriod::Q3),
            other if other.eq_ignore_ascii_case("audit") => Ok(FiscalPeriod::Audit),
            other => Err(UnknownVariant {
                kind: "fiscal period",
                value: other.to_string(),
            }),
        }
    }
}

/// A fiscal period together with the fiscal year it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportWindow {
    pub period: FiscalPeriod,
    pub year: i32,
}

impl ReportWindow {
    /// Disclosure window that is being published during the month of `date`.
    ///
    /// April-June publishes Q1, July-September Q2, October-December Q3, and
    /// January-March publishes the audited report of the previous year.
    pub fn containing<D: Datelike>(date: &D) -> Self {
        let year = date.year();
        match date.month() {
            4..=6 => ReportWindow {
                period: FiscalPeriod::Q1,
                year,
            },
            7..=9 => ReportWindow {
                period: FiscalPeriod::Q2,
                year,
            },
            10..=12 => ReportWindow {
                period: FiscalPeriod::Q3,
                year,
            },
            _ => ReportWindow {
                period: FiscalPeriod::Audit,
                year: year - 1,
            },
        }
    }
}

/// Investor-origin filter of the broker summary page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum InvestorType {
    #[default]
    All,
    Foreign,
    Domestic,
}

impl InvestorType {
    pub fn code(&self) -> &'static str {
        match self {
            InvestorType::All => "ALL",
            InvestorType::Foreign => "F",
            InvestorType::Domestic => "D",
        }
    }
}

impl FromStr for InvestorType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALL" => Ok(InvestorType::All),
            "F" | "FOREIGN" => Ok(InvestorType::Foreign),
            "D" | "DOMESTIC" => Ok(InvestorType::Domestic),
            _ => Err(UnknownVariant {
                kind: "investor type",
                value: s.to_string(),
            }),
        }
    }
}

/// Market board (transaction type) filter of the broker summary page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BoardFilter {
    #[default]
    All,
    Regular,
    Cash,
    Negotiated,
}

impl BoardFilter {
    pub fn code(&self) -> &'static str {
        match self {
            BoardFilter::All => "ALL",
            BoardFilter::Regular => "RG",
            BoardFilter::Cash => "TN",
            BoardFilter::Negotiated => "NG",
        }
    }
}

impl FromStr for BoardFilter {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALL" => Ok(BoardFilter::All),
            "RG" | "REGULAR" => Ok(BoardFilter::Regular),
            "TN" | "CASH" => Ok(BoardFilter::Cash),
            "NG" | "NEGOTIATED" => Ok(BoardFilter::Negotiated),
            _ => Err(UnknownVariant {
                kind: "board",
                value: s.to_string(),
            }),
        }
    }
}

/// Ranked buyer/seller activity for one security over a date range.
///
/// Computed per request from the scraped source and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerTransactionSummary {
    pub security_code: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub investor_type: InvestorType,
    pub board: BoardFilter,
    pub buyers: Vec<BrokerTransactionRow>,
    pub sellers: Vec<BrokerTransactionRow>,
    pub aggregate: AggregateBlock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BrokerTransactionRow {
    /// Empty when the source left this side of the row blank.
    pub broker_code: String,
    pub lot: f64,
    /// Value as displayed by the source, e.g. `"12.5 B"`.
    pub value: String,
    pub average_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AggregateBlock {
    pub total_value: String,
    pub foreign_net_value: String,
    pub total_lot: f64,
    pub average: f64,
}

/// Financial statement filing of one security for one period revision.
///
/// Keyed by `(security_code, report_period, report_year, file_modified)`, so
/// every modified timestamp is kept as its own revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialDisclosure {
    pub security_code: String,
    pub security_name: String,
    pub report_period: FiscalPeriod,
    pub report_year: String,
    pub file_modified: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub security_code: String,
    pub security_name: String,
    pub file_id: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub file_modified: String,
    /// Absolute download URL.
    pub file_path: String,
    pub report_period: FiscalPeriod,
    pub report_type: String,
    pub report_year: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn window(y: i32, m: u32, d: u32) -> ReportWindow {
        ReportWindow::containing(&NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn fiscal_window_rolls_audit_back_one_year() {
        for month in 1..=3 {
            assert_eq!(
                window(2025, month, 15),
                ReportWindow {
                    period: FiscalPeriod::Audit,
                    year: 2024
                }
            );
        }
    }

    #[test]
    fn fiscal_window_quarters_keep_current_year() {
        let cases = [
            (4, FiscalPeriod::Q1),
            (5, FiscalPeriod::Q1),
            (6, FiscalPeriod::Q1),
            (7, FiscalPeriod::Q2),
            (8, FiscalPeriod::Q2),
            (9, FiscalPeriod::Q2),
            (10, FiscalPeriod::Q3),
            (11, FiscalPeriod::Q3),
            (12, FiscalPeriod::Q3),
        ];
        for (month, period) in cases {
            assert_eq!(window(2025, month, 1), ReportWindow { period, year: 2025 });
        }
    }

    #[test]
    fn fiscal_window_month_boundaries() {
        assert_eq!(
            window(2025, 3, 31),
            ReportWindow {
                period: FiscalPeriod::Audit,
                year: 2024
            }
        );
        assert_eq!(
            window(2025, 4, 1),
            ReportWindow {
                period: FiscalPeriod::Q1,
                year: 2025
            }
        );
        assert_eq!(
            window(2025, 12, 31),
            ReportWindow {
                period: FiscalPeriod::Q3,
                year: 2025
            }
        );
        assert_eq!(
            window(2026, 1, 1),
            ReportWindow {
                period: FiscalPeriod::Audit,
                year: 2025
            }
        );
    }

    #[test]
    fn fiscal_period_parses_canonical_tags() {
        assert_eq!("Q2".parse::<FiscalPeriod>().unwrap(), FiscalPeriod::Q2);
        assert_eq!("audit".parse::<FiscalPeriod>().unwrap(), FiscalPeriod::Audit);
        assert!("TW1".parse::<FiscalPeriod>().is_err());
        assert_eq!(FiscalPeriod::Audit.to_string(), "Audit");
    }

    #[test]
    fn passthrough_value_keeps_json_type() {
        let number: PassthroughValue = serde_json::from_value(json!(1.25)).unwrap();
        let text: PassthroughValue = serde_json::from_value(json!("-")).unwrap();
        let absent: PassthroughValue = serde_json::from_value(json!(null)).unwrap();
        let other: PassthroughValue = serde_json::from_value(json!(true)).unwrap();

        assert_eq!(number, PassthroughValue::Number(1.25));
        assert_eq!(text, PassthroughValue::Text("-".to_string()));
        assert!(absent.is_absent());
        assert_eq!(other.as_text(), Some("true"));

        assert_eq!(serde_json::to_value(&number).unwrap(), json!(1.25));
        assert_eq!(serde_json::to_value(&text).unwrap(), json!("-"));
        assert_eq!(serde_json::to_value(&absent).unwrap(), json!(null));
    }

    #[test]
    fn missing_passthrough_field_defaults_to_absent() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(default)]
            value: PassthroughValue,
        }
        let holder: Holder = serde_json::from_str("{}").unwrap();
        assert!(holder.value.is_absent());
    }

    #[test]
    fn scraped_filters_use_source_codes() {
        assert_eq!("f".parse::<InvestorType>().unwrap(), InvestorType::Foreign);
        assert_eq!(InvestorType::Domestic.code(), "D");
        assert_eq!("ng".parse::<BoardFilter>().unwrap(), BoardFilter::Negotiated);
        assert_eq!(BoardFilter::Cash.code(), "TN");
        assert!("XX".parse::<BoardFilter>().is_err());
    }
}
