//! Persistence gateway: typed repositories over the document store.
//!
//! Every write is an upsert by the entity's natural key with full-document
//! replace, so repeating a batch leaves the store unchanged.

use std::marker::PhantomData;
use std::sync::Arc;

use bursa_core::{Broker, DailySummary, FinancialDisclosure, FiscalPeriod, Security};
use chrono::{NaiveDate, NaiveTime};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::document::{
    BulkWriteSummary, Condition, DocumentCollection, DocumentStore, Filter, FindOptions,
    SortDirection, StoreError, UpsertModel,
};

/// An entity persisted in its own collection under a natural key.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: &'static str;

    /// Field name and value of every natural-key component, in key order.
    fn natural_key(&self) -> Vec<(&'static str, JsonValue)>;
}

impl Document for Security {
    const COLLECTION: &'static str = "securities";

    fn natural_key(&self) -> Vec<(&'static str, JsonValue)> {
        vec![("code", JsonValue::from(self.code.as_str()))]
    }
}

impl Document for DailySummary {
    const COLLECTION: &'static str = "daily_summaries";

    fn natural_key(&self) -> Vec<(&'static str, JsonValue)> {
        vec![
            ("security_code", JsonValue::from(self.security_code.as_str())),
            ("date", datetime_value(self.date)),
        ]
    }
}

impl Document for Broker {
    const COLLECTION: &'static str = "brokers";

    fn natural_key(&self) -> Vec<(&'static str, JsonValue)> {
        vec![("code", JsonValue::from(self.code.as_str()))]
    }
}

impl Document for FinancialDisclosure {
    const COLLECTION: &'static str = "financial_disclosures";

    fn natural_key(&self) -> Vec<(&'static str, JsonValue)> {
        vec![
            ("security_code", JsonValue::from(self.security_code.as_str())),
            ("report_period", JsonValue::from(self.report_period.as_str())),
            ("report_year", JsonValue::from(self.report_year.as_str())),
            ("file_modified", JsonValue::from(self.file_modified.as_str())),
        ]
    }
}

fn datetime_value(value: chrono::NaiveDateTime) -> JsonValue {
    serde_json::to_value(value).unwrap_or(JsonValue::Null)
}

pub struct Repository<T> {
    collection: Arc<dyn DocumentCollection>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            collection: Arc::clone(&self.collection),
            _entity: PhantomData,
        }
    }
}

impl<T: Document> Repository<T> {
    pub fn new(store: &dyn DocumentStore) -> Self {
        Self {
            collection: store.collection(T::COLLECTION),
            _entity: PhantomData,
        }
    }

    pub fn collection_name(&self) -> &str {
        self.collection.name()
    }

    /// Upsert every entity by natural key as one unordered batch.
    /// An empty slice is a no-op.
    pub async fn bulk_upsert(&self, entities: &[T]) -> Result<BulkWriteSummary, StoreError> {
        if entities.is_empty() {
            return Ok(BulkWriteSummary::default());
        }

        let mut models = Vec::with_capacity(entities.len());
        for entity in entities {
            let document =
                serde_json::to_value(entity).map_err(|source| StoreError::Serialize {
                    collection: T::COLLECTION.to_string(),
                    source,
                })?;
            let key_fields = entity
                .natural_key()
                .into_iter()
                .map(|(field, value)| (field.to_string(), value))
                .collect();
            models.push(UpsertModel::new(key_fields, document));
        }

        let summary = self.collection.bulk_upsert(models).await?;
        debug!(
            collection = T::COLLECTION,
            attempted = summary.attempted,
            inserted = summary.inserted,
            replaced = summary.replaced,
            "bulk upsert complete"
        );
        Ok(summary)
    }

    pub async fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<T>, StoreError> {
        self.collection
            .find(filter, options)
            .await?
            .into_iter()
            .map(decode::<T>)
            .collect()
    }

    /// `Ok(None)` when nothing matches.
    pub async fn find_one(
        &self,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Option<T>, StoreError> {
        self.collection
            .find_one(filter, options)
            .await?
            .map(decode::<T>)
            .transpose()
    }

    pub async fn count(&self, filter: &Filter) -> Result<u64, StoreError> {
        self.collection.count(filter).await
    }
}

fn decode<T: Document>(value: JsonValue) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|source| StoreError::Deserialize {
        collection: T::COLLECTION.to_string(),
        source,
    })
}

#[derive(Clone)]
pub struct SecurityRepository {
    inner: Repository<Security>,
}

impl SecurityRepository {
    pub async fn bulk_upsert(&self, items: &[Security]) -> Result<BulkWriteSummary, StoreError> {
        self.inner.bulk_upsert(items).await
    }

    pub async fn all(&self) -> Result<Vec<Security>, StoreError> {
        self.inner
            .find(&Filter::new(), &by_code())
            .await
    }

    pub async fn find_one(&self, code: &str) -> Result<Option<Security>, StoreError> {
        self.inner
            .find_one(&Filter::new().eq("code", code), &FindOptions::default())
            .await
    }

    /// One page sorted by code, plus the total number of securities.
    pub async fn find_page(
        &self,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<Security>, u64), StoreError> {
        let filter = Filter::new();
        let items = self
            .inner
            .find(&filter, &by_code().page(offset, limit))
            .await?;
        let total = self.inner.count(&filter).await?;
        Ok((items, total))
    }

    /// Case-insensitive substring match on code or name.
    pub async fn search(&self, query: &str) -> Result<Vec<Security>, StoreError> {
        let needle = query.trim();
        let filter = Filter::new().any_of(vec![
            Condition::ContainsIgnoreCase {
                field: "code".to_string(),
                needle: needle.to_string(),
            },
            Condition::ContainsIgnoreCase {
                field: "name".to_string(),
                needle: needle.to_string(),
            },
        ]);
        self.inner.find(&filter, &by_code()).await
    }
}

fn by_code() -> FindOptions {
    FindOptions::sorted_by("code", SortDirection::Ascending)
}

#[derive(Clone)]
pub struct DailySummaryRepository {
    inner: Repository<DailySummary>,
}

impl DailySummaryRepository {
    pub async fn bulk_upsert(
        &self,
        items: &[DailySummary],
    ) -> Result<BulkWriteSummary, StoreError> {
        self.inner.bulk_upsert(items).await
    }

    /// Inclusive on both calendar dates; `None` leaves that side open.
    pub async fn find(
        &self,
        code: Option<&str>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<DailySummary>, StoreError> {
        let mut filter = Filter::new();
        if let Some(code) = code {
            filter = filter.eq("security_code", code);
        }
        let lower = start.map(|d| datetime_value(d.and_time(NaiveTime::MIN)));
        let upper = end.and_then(|d| d.and_hms_opt(23, 59, 59)).map(datetime_value);
        filter = filter.range("date", lower, upper);

        let options = FindOptions::sorted_by("date", SortDirection::Ascending)
            .then_by("security_code", SortDirection::Ascending);
        self.inner.find(&filter, &options).await
    }
}

#[derive(Clone)]
pub struct BrokerRepository {
    inner: Repository<Broker>,
}

impl BrokerRepository {
    pub async fn bulk_upsert(&self, items: &[Broker]) -> Result<BulkWriteSummary, StoreError> {
        self.inner.bulk_upsert(items).await
    }

    pub async fn find(&self, code: Option<&str>) -> Result<Vec<Broker>, StoreError> {
        let filter = match code {
            Some(code) => Filter::new().eq("code", code),
            None => Filter::new(),
        };
        self.inner.find(&filter, &by_code()).await
    }
}

#[derive(Clone)]
pub struct FinancialDisclosureRepository {
    inner: Repository<FinancialDisclosure>,
}

impl FinancialDisclosureRepository {
    pub async fn bulk_upsert(
        &self,
        items: &[FinancialDisclosure],
    ) -> Result<BulkWriteSummary, StoreError> {
        self.inner.bulk_upsert(items).await
    }

    /// Latest revision (greatest `file_modified`) for the window.
    pub async fn find_one(
        &self,
        code: &str,
        period: FiscalPeriod,
        year: &str,
    ) -> Result<Option<FinancialDisclosure>, StoreError> {
        self.inner
            .find_one(&window_filter(code, period, year), &newest_first())
            .await
    }

    pub async fn revisions(
        &self,
        code: &str,
        period: FiscalPeriod,
        year: &str,
    ) -> Result<Vec<FinancialDisclosure>, StoreError> {
        self.inner
            .find(&window_filter(code, period, year), &newest_first())
            .await
    }
}

fn window_filter(code: &str, period: FiscalPeriod, year: &str) -> Filter {
    Filter::new()
        .eq("security_code", code)
        .eq("report_period", period.as_str())
        .eq("report_year", year)
}

fn newest_first() -> FindOptions {
    FindOptions::sorted_by("file_modified", SortDirection::Descending)
}

/// Entry point to every repository; cheap to clone and safe to share
/// between concurrently running jobs.
#[derive(Clone)]
pub struct Gateway {
    store: Arc<dyn DocumentStore>,
}

impl Gateway {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn securities(&self) -> SecurityRepository {
        SecurityRepository {
            inner: Repository::new(self.store.as_ref()),
        }
    }

    pub fn daily_summaries(&self) -> DailySummaryRepository {
        DailySummaryRepository {
            inner: Repository::new(self.store.as_ref()),
        }
    }

    pub fn brokers(&self) -> BrokerRepository {
        BrokerRepository {
            inner: Repository::new(self.store.as_ref()),
        }
    }

    pub fn financial_disclosures(&self) -> FinancialDisclosureRepository {
        FinancialDisclosureRepository {
            inner: Repository::new(self.store.as_ref()),
        }
    }
}
