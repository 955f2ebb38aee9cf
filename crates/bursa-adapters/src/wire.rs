//! Response shapes of the structured feed, field-for-field.
//!
//! These types keep the source's own (partly Indonesian) field names and
//! never leave this crate; `normalize` is the only consumer.

use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;

/// Treat an explicit `null` like a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct ListEnvelope<T> {
    pub draw: i64,
    #[serde(rename = "recordsTotal")]
    pub records_total: i64,
    #[serde(rename = "recordsFiltered")]
    pub records_filtered: i64,
    #[serde(deserialize_with = "nullable")]
    pub data: Vec<T>,
}

pub type SecurityListResponse = ListEnvelope<SecurityListRow>;
pub type DailySummaryListResponse = ListEnvelope<DailySummaryRow>;
pub type BrokerListResponse = ListEnvelope<BrokerListRow>;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecurityListRow {
    #[serde(rename = "Code", deserialize_with = "nullable")]
    pub code: String,
    #[serde(rename = "Name", deserialize_with = "nullable")]
    pub name: String,
    #[serde(rename = "Shares", deserialize_with = "nullable")]
    pub shares: f64,
    #[serde(rename = "ListingDate", deserialize_with = "nullable")]
    pub listing_date: String,
    #[serde(rename = "ListingBoard", deserialize_with = "nullable")]
    pub listing_board: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BrokerListRow {
    #[serde(rename = "Code", deserialize_with = "nullable")]
    pub code: String,
    #[serde(rename = "Name", deserialize_with = "nullable")]
    pub name: String,
    #[serde(rename = "License", deserialize_with = "nullable")]
    pub license: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct CompanyProfileResponse {
    pub result_count: i64,
    #[serde(deserialize_with = "nullable")]
    pub profiles: Vec<ProfileRow>,
    #[serde(deserialize_with = "nullable")]
    pub sekretaris: Vec<SekretarisRow>,
    #[serde(deserialize_with = "nullable")]
    pub direktur: Vec<DirekturRow>,
    #[serde(deserialize_with = "nullable")]
    pub komisaris: Vec<KomisarisRow>,
    #[serde(deserialize_with = "nullable")]
    pub komite_audit: Vec<KomiteAuditRow>,
    #[serde(deserialize_with = "nullable")]
    pub pemegang_saham: Vec<PemegangSahamRow>,
    #[serde(deserialize_with = "nullable")]
    pub anak_perusahaan: Vec<AnakPerusahaanRow>,
    #[serde(deserialize_with = "nullable")]
    pub dividen: Vec<DividenRow>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ProfileRow {
    #[serde(deserialize_with = "nullable")]
    pub alamat: String,
    #[serde(rename = "BAE", deserialize_with = "nullable")]
    pub bae: String,
    #[serde(deserialize_with = "nullable")]
    pub industri: String,
    #[serde(deserialize_with = "nullable")]
    pub sub_industri: String,
    #[serde(deserialize_with = "nullable")]
    pub email: String,
    #[serde(deserialize_with = "nullable")]
    pub fax: String,
    #[serde(deserialize_with = "nullable")]
    pub kegiatan_usaha_utama: String,
    #[serde(deserialize_with = "nullable")]
    pub kode_emiten: String,
    #[serde(deserialize_with = "nullable")]
    pub nama_emiten: String,
    #[serde(rename = "NPWP", deserialize_with = "nullable")]
    pub npwp: String,
    #[serde(deserialize_with = "nullable")]
    pub sektor: String,
    #[serde(deserialize_with = "nullable")]
    pub sub_sektor: String,
    #[serde(deserialize_with = "nullable")]
    pub tanggal_pencatatan: String,
    #[serde(deserialize_with = "nullable")]
    pub telepon: String,
    #[serde(deserialize_with = "nullable")]
    pub website: String,
    #[serde(deserialize_with = "nullable")]
    pub status: i64,
    #[serde(deserialize_with = "nullable")]
    pub logo: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct SekretarisRow {
    #[serde(deserialize_with = "nullable")]
    pub nama: String,
    #[serde(deserialize_with = "nullable")]
    pub telepon: String,
    #[serde(deserialize_with = "nullable")]
    pub website: String,
    #[serde(deserialize_with = "nullable")]
    pub email: String,
    #[serde(deserialize_with = "nullable")]
    pub fax: String,
    #[serde(rename = "HP", deserialize_with = "nullable")]
    pub hp: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct DirekturRow {
    #[serde(deserialize_with = "nullable")]
    pub nama: String,
    #[serde(deserialize_with = "nullable")]
    pub jabatan: String,
    #[serde(deserialize_with = "nullable")]
    pub afiliasi: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct KomisarisRow {
    #[serde(deserialize_with = "nullable")]
    pub nama: String,
    #[serde(deserialize_with = "nullable")]
    pub jabatan: String,
    #[serde(deserialize_with = "nullable")]
    pub independen: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct KomiteAuditRow {
    #[serde(deserialize_with = "nullable")]
    pub nama: String,
    #[serde(deserialize_with = "nullable")]
    pub jabatan: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct PemegangSahamRow {
    #[serde(deserialize_with = "nullable")]
    pub jumlah: f64,
    #[serde(deserialize_with = "nullable")]
    pub kategori: String,
    #[serde(deserialize_with = "nullable")]
    pub nama: String,
    #[serde(deserialize_with = "nullable")]
    pub pengendali: bool,
    #[serde(deserialize_with = "nullable")]
    pub persentase: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct AnakPerusahaanRow {
    #[serde(deserialize_with = "nullable")]
    pub bidang_usaha: String,
    #[serde(deserialize_with = "nullable")]
    pub jumlah_aset: f64,
    #[serde(deserialize_with = "nullable")]
    pub lokasi: String,
    #[serde(deserialize_with = "nullable")]
    pub mata_uang: String,
    #[serde(deserialize_with = "nullable")]
    pub nama: String,
    #[serde(deserialize_with = "nullable")]
    pub persentase: f64,
    #[serde(deserialize_with = "nullable")]
    pub satuan: String,
    #[serde(deserialize_with = "nullable")]
    pub status_operasi: String,
    #[serde(deserialize_with = "nullable")]
    pub tahun_komersil: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DividenRow {
    #[serde(rename = "Nama", deserialize_with = "nullable")]
    pub nama: String,
    #[serde(rename = "Jenis", deserialize_with = "nullable")]
    pub jenis: String,
    #[serde(rename = "TahunBuku", deserialize_with = "nullable")]
    pub tahun_buku: String,
    #[serde(rename = "TotalSahamBonus", deserialize_with = "nullable")]
    pub total_saham_bonus: f64,
    #[serde(rename = "CashDividenPerSahamMU", deserialize_with = "nullable")]
    pub cash_dividen_per_saham_mu: String,
    #[serde(rename = "CashDividenPerSaham", deserialize_with = "nullable")]
    pub cash_dividen_per_saham: f64,
    #[serde(rename = "TanggalCum", deserialize_with = "nullable")]
    pub tanggal_cum: String,
    #[serde(rename = "TanggalExRegulerDanNegosiasi", deserialize_with = "nullable")]
    pub tanggal_ex_reguler_dan_negosiasi: String,
    #[serde(rename = "TanggalDPS", deserialize_with = "nullable")]
    pub tanggal_dps: String,
    #[serde(rename = "TanggalPembayaran", deserialize_with = "nullable")]
    pub tanggal_pembayaran: String,
    #[serde(rename = "Rasio1", deserialize_with = "nullable")]
    pub rasio1: i64,
    #[serde(rename = "Rasio2", deserialize_with = "nullable")]
    pub rasio2: i64,
    #[serde(rename = "CashDividenTotalMU", deserialize_with = "nullable")]
    pub cash_dividen_total_mu: String,
    #[serde(rename = "CashDividenTotal", deserialize_with = "nullable")]
    pub cash_dividen_total: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct DailySummaryRow {
    #[serde(rename = "IDStockSummary", deserialize_with = "nullable")]
    pub id_stock_summary: i64,
    #[serde(deserialize_with = "nullable")]
    pub date: String,
    #[serde(deserialize_with = "nullable")]
    pub stock_code: String,
    #[serde(deserialize_with = "nullable")]
    pub stock_name: String,
    #[serde(deserialize_with = "nullable")]
    pub remarks: String,
    #[serde(deserialize_with = "nullable")]
    pub previous: f64,
    #[serde(deserialize_with = "nullable")]
    pub open_price: f64,
    #[serde(deserialize_with = "nullable")]
    pub first_trade: f64,
    #[serde(deserialize_with = "nullable")]
    pub high: f64,
    #[serde(deserialize_with = "nullable")]
    pub low: f64,
    #[serde(deserialize_with = "nullable")]
    pub close: f64,
    #[serde(deserialize_with = "nullable")]
    pub change: f64,
    #[serde(deserialize_with = "nullable")]
    pub volume: f64,
    #[serde(deserialize_with = "nullable")]
    pub value: f64,
    #[serde(deserialize_with = "nullable")]
    pub frequency: f64,
    #[serde(deserialize_with = "nullable")]
    pub index_individual: f64,
    #[serde(deserialize_with = "nullable")]
    pub offer: f64,
    #[serde(deserialize_with = "nullable")]
    pub offer_volume: f64,
    #[serde(deserialize_with = "nullable")]
    pub bid: f64,
    #[serde(deserialize_with = "nullable")]
    pub bid_volume: f64,
    #[serde(deserialize_with = "nullable")]
    pub listed_shares: f64,
    #[serde(deserialize_with = "nullable")]
    pub tradeble_shares: f64,
    #[serde(deserialize_with = "nullable")]
    pub weight_for_index: f64,
    #[serde(deserialize_with = "nullable")]
    pub foreign_sell: f64,
    #[serde(deserialize_with = "nullable")]
    pub foreign_buy: f64,
    #[serde(deserialize_with = "nullable")]
    pub delisting_date: String,
    #[serde(deserialize_with = "nullable")]
    pub non_regular_volume: f64,
    #[serde(deserialize_with = "nullable")]
    pub non_regular_value: f64,
    #[serde(deserialize_with = "nullable")]
    pub non_regular_frequency: f64,
    /// Number or text depending on the row.
    #[serde(rename = "persen")]
    pub persen: JsonValue,
    #[serde(rename = "percentage")]
    pub percentage: JsonValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct DisclosureListResponse {
    pub result_count: i64,
    #[serde(deserialize_with = "nullable")]
    pub results: Vec<DisclosureRow>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DisclosureRow {
    #[serde(rename = "KodeEmiten", deserialize_with = "nullable")]
    pub kode_emiten: String,
    #[serde(rename = "File_Modified", deserialize_with = "nullable")]
    pub file_modified: String,
    #[serde(rename = "Report_Period", deserialize_with = "nullable")]
    pub report_period: String,
    #[serde(rename = "Report_Year", deserialize_with = "nullable")]
    pub report_year: String,
    #[serde(rename = "NamaEmiten", deserialize_with = "nullable")]
    pub nama_emiten: String,
    #[serde(rename = "Attachments", deserialize_with = "nullable")]
    pub attachments: Vec<AttachmentRow>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AttachmentRow {
    #[serde(rename = "Emiten_Code", deserialize_with = "nullable")]
    pub emiten_code: String,
    #[serde(rename = "File_ID", deserialize_with = "nullable")]
    pub file_id: String,
    #[serde(rename = "File_Modified", deserialize_with = "nullable")]
    pub file_modified: String,
    #[serde(rename = "File_Name", deserialize_with = "nullable")]
    pub file_name: String,
    #[serde(rename = "File_Path", deserialize_with = "nullable")]
    pub file_path: String,
    #[serde(rename = "File_Size", deserialize_with = "nullable")]
    pub file_size: i64,
    #[serde(rename = "File_Type", deserialize_with = "nullable")]
    pub file_type: String,
    #[serde(rename = "Report_Period", deserialize_with = "nullable")]
    pub report_period: String,
    #[serde(rename = "Report_Type", deserialize_with = "nullable")]
    pub report_type: String,
    #[serde(rename = "Report_Year", deserialize_with = "nullable")]
    pub report_year: String,
    #[serde(rename = "NamaEmiten", deserialize_with = "nullable")]
    pub nama_emiten: String,
}
