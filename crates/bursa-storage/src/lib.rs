//! Infrastructure for bursa: outbound HTTP, document stores, and the
//! persistence gateway the ingestion jobs write through.

pub mod document;
pub mod gateway;
pub mod http;
pub mod memory;
pub mod postgres;

pub use document::{
    upsert_unordered, BulkWriteSummary, Condition, DocumentCollection, DocumentStore, Filter,
    FindOptions, SortDirection, SortKey, StoreError, UpsertModel, UpsertOutcome,
};
pub use gateway::{
    BrokerRepository, DailySummaryRepository, Document, FinancialDisclosureRepository, Gateway,
    Repository, SecurityRepository,
};
pub use http::{FetchError, FetchedResponse, HttpClientConfig, HttpFetcher};
pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;

pub const CRATE_NAME: &str = "bursa-storage";
