//! Pure mappings from source payloads to canonical entities.

use bursa_core::{
    AuditCommitteeMember, Attachment, Broker, BrokerTransactionSummary, Commissioner,
    CompanyProfile, CorporateSecretary, DailySummary, Director, Dividend, FinancialDisclosure,
    FiscalPeriod, PassthroughValue, Security, Shareholder, Subsidiary,
};
use chrono::NaiveDateTime;

use crate::scraped::{BrokerSummaryPage, BrokerSummaryQuery};
use crate::wire::{
    AttachmentRow, BrokerListResponse, CompanyProfileResponse, DailySummaryListResponse,
    DailySummaryRow, DisclosureListResponse, DisclosureRow, DividenRow, ProfileRow,
    SecurityListRow,
};

const SOURCE_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parse `YYYY-MM-DDTHH:MM:SS`; anything else becomes the epoch.
pub fn parse_source_datetime(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw.trim(), SOURCE_DATETIME_FORMAT).unwrap_or_default()
}

pub fn asset_url(base_url: &str, path: &str) -> String {
    format!("{base_url}{path}")
}

/// Canonical period for a source tag; `None` for tags the source has not
/// been seen to use.
pub fn canonical_period(tag: &str) -> Option<FiscalPeriod> {
    match tag.trim() {
        "TW1" => Some(FiscalPeriod::Q1),
        "TW2" => Some(FiscalPeriod::Q2),
        "TW3" => Some(FiscalPeriod::Q3),
        other if other.eq_ignore_ascii_case("audit") => Some(FiscalPeriod::Audit),
        other => other.parse().ok(),
    }
}

/// Holds the base URL that source-relative asset paths are resolved against.
#[derive(Debug, Clone)]
pub struct Normalizer {
    asset_base_url: String,
}

impl Normalizer {
    pub fn new(asset_base_url: impl Into<String>) -> Self {
        Self {
            asset_base_url: asset_base_url.into(),
        }
    }

    pub fn security(&self, listing: &SecurityListRow, bundle: &CompanyProfileResponse) -> Security {
        Security {
            code: listing.code.clone(),
            name: listing.name.clone(),
            shares: listing.shares,
            listing_date: parse_source_datetime(&listing.listing_date),
            board: listing.listing_board.clone(),
            profiles: bundle.profiles.iter().map(|p| self.profile(p)).collect(),
            secretaries: bundle
                .sekretaris
                .iter()
                .map(|s| CorporateSecretary {
                    name: s.nama.clone(),
                    phone: s.telepon.clone(),
                    website: s.website.clone(),
                    email: s.email.clone(),
                    fax: s.fax.clone(),
                    mobile: s.hp.clone(),
                })
                .collect(),
            directors: bundle
                .direktur
                .iter()
                .map(|d| Director {
                    name: d.nama.clone(),
                    position: d.jabatan.clone(),
                    is_affiliated: d.afiliasi,
                })
                .collect(),
            commissioners: bundle
                .komisaris
                .iter()
                .map(|c| Commissioner {
                    name: c.nama.clone(),
                    position: c.jabatan.clone(),
                    is_independent: c.independen,
                })
                .collect(),
            audit_committee: bundle
                .komite_audit
                .iter()
                .map(|a| AuditCommitteeMember {
                    name: a.nama.clone(),
                    position: a.jabatan.clone(),
                })
                .collect(),
            shareholders: bundle
                .pemegang_saham
                .iter()
                .map(|s| Shareholder {
                    name: s.nama.clone(),
                    category: s.kategori.clone(),
                    shares: s.jumlah,
                    percentage: s.persentase,
                    is_controller: s.pengendali,
                })
                .collect(),
            subsidiaries: bundle
                .anak_perusahaan
                .iter()
                .map(|s| Subsidiary {
                    name: s.nama.clone(),
                    business_field: s.bidang_usaha.clone(),
                    location: s.lokasi.clone(),
                    total_assets: s.jumlah_aset,
                    currency: s.mata_uang.clone(),
                    units: s.satuan.clone(),
                    percentage: s.persentase,
                    operation_status: s.status_operasi.clone(),
                    commercial_year: s.tahun_komersil.clone(),
                })
                .collect(),
            dividends: bundle.dividen.iter().map(dividend).collect(),
        }
    }

    fn profile(&self, p: &ProfileRow) -> CompanyProfile {
        CompanyProfile {
            address: p.alamat.clone(),
            share_registrar: p.bae.clone(),
            industry: p.industri.clone(),
            sub_industry: p.sub_industri.clone(),
            email: p.email.clone(),
            fax: p.fax.clone(),
            main_business: p.kegiatan_usaha_utama.clone(),
            security_code: p.kode_emiten.clone(),
            security_name: p.nama_emiten.clone(),
            tax_id: p.npwp.clone(),
            sector: p.sektor.clone(),
            sub_sector: p.sub_sektor.clone(),
            listing_date: p.tanggal_pencatatan.clone(),
            phone: p.telepon.clone(),
            website: p.website.clone(),
            status: p.status,
            logo_url: asset_url(&self.asset_base_url, &p.logo),
        }
    }

    /// `requested` stands in for any period tag the source returns that
    /// has no canonical counterpart.
    pub fn financial_disclosures(
        &self,
        response: &DisclosureListResponse,
        requested: FiscalPeriod,
    ) -> Vec<FinancialDisclosure> {
        response
            .results
            .iter()
            .map(|row| self.disclosure(row, requested))
            .collect()
    }

    fn disclosure(&self, row: &DisclosureRow, requested: FiscalPeriod) -> FinancialDisclosure {
        FinancialDisclosure {
            security_code: row.kode_emiten.clone(),
            security_name: row.nama_emiten.clone(),
            report_period: canonical_period(&row.report_period).unwrap_or(requested),
            report_year: row.report_year.clone(),
            file_modified: row.file_modified.clone(),
            attachments: row
                .attachments
                .iter()
                .map(|a| self.attachment(a, requested))
                .collect(),
        }
    }

    fn attachment(&self, a: &AttachmentRow, requested: FiscalPeriod) -> Attachment {
        Attachment {
            security_code: a.emiten_code.clone(),
            security_name: a.nama_emiten.clone(),
            file_id: a.file_id.clone(),
            file_name: a.file_name.clone(),
            file_type: a.file_type.clone(),
            file_size: a.file_size,
            file_modified: a.file_modified.clone(),
            file_path: asset_url(&self.asset_base_url, &a.file_path),
            report_period: canonical_period(&a.report_period).unwrap_or(requested),
            report_type: a.report_type.clone(),
            report_year: a.report_year.clone(),
        }
    }
}

fn dividend(d: &DividenRow) -> Dividend {
    Dividend {
        name: d.nama.clone(),
        kind: d.jenis.clone(),
        fiscal_year: d.tahun_buku.clone(),
        total_bonus_shares: d.total_saham_bonus,
        cash_per_share: d.cash_dividen_per_saham,
        cash_per_share_currency: d.cash_dividen_per_saham_mu.clone(),
        cash_total: d.cash_dividen_total,
        cash_total_currency: d.cash_dividen_total_mu.clone(),
        cum_date: parse_source_datetime(&d.tanggal_cum),
        ex_date: parse_source_datetime(&d.tanggal_ex_reguler_dan_negosiasi),
        record_date: parse_source_datetime(&d.tanggal_dps),
        payment_date: parse_source_datetime(&d.tanggal_pembayaran),
        ratio_numerator: d.rasio1,
        ratio_denominator: d.rasio2,
    }
}

pub fn daily_summaries(response: &DailySummaryListResponse) -> Vec<DailySummary> {
    response.data.iter().map(daily_summary).collect()
}

fn daily_summary(row: &DailySummaryRow) -> DailySummary {
    DailySummary {
        source_record_id: row.id_stock_summary,
        date: parse_source_datetime(&row.date),
        security_code: row.stock_code.clone(),
        security_name: row.stock_name.clone(),
        remarks: row.remarks.clone(),
        previous: row.previous,
        open_price: row.open_price,
        first_trade: row.first_trade,
        high: row.high,
        low: row.low,
        close: row.close,
        change: row.change,
        volume: row.volume,
        value: row.value,
        frequency: row.frequency,
        index_individual: row.index_individual,
        offer: row.offer,
        offer_volume: row.offer_volume,
        bid: row.bid,
        bid_volume: row.bid_volume,
        listed_shares: row.listed_shares,
        tradable_shares: row.tradeble_shares,
        weight_for_index: row.weight_for_index,
        foreign_sell: row.foreign_sell,
        foreign_buy: row.foreign_buy,
        delisting_date: row.delisting_date.clone(),
        non_regular_volume: row.non_regular_volume,
        non_regular_value: row.non_regular_value,
        non_regular_frequency: row.non_regular_frequency,
        percent: PassthroughValue::from(row.persen.clone()),
        percentage: PassthroughValue::from(row.percentage.clone()),
    }
}

pub fn brokers(response: &BrokerListResponse) -> Vec<Broker> {
    response
        .data
        .iter()
        .map(|b| Broker {
            code: b.code.clone(),
            name: b.name.clone(),
            license: b.license.clone(),
        })
        .collect()
}

pub fn broker_summary(
    query: &BrokerSummaryQuery,
    page: BrokerSummaryPage,
) -> BrokerTransactionSummary {
    BrokerTransactionSummary {
        security_code: query.normalized_code(),
        start_date: query.start,
        end_date: query.end,
        investor_type: query.investor_type,
        board: query.board,
        buyers: page.buyers,
        sellers: page.sellers,
        aggregate: page.aggregate,
    }
}
