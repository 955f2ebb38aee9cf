//! Document-collection abstraction shared by every persistence backend.

use std::cmp::Ordering;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("serializing document for {collection}: {source}")]
    Serialize {
        collection: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("decoding document from {collection}: {source}")]
    Deserialize {
        collection: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("bulk upsert into {collection} failed for {failed} of {attempted} documents: {first}")]
    BulkWrite {
        collection: String,
        failed: usize,
        attempted: usize,
        first: String,
    },
    #[error("invalid field name {0:?}")]
    InvalidField(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq {
        field: String,
        value: JsonValue,
    },
    /// Inclusive bounds; a missing bound is open.
    Range {
        field: String,
        gte: Option<JsonValue>,
        lte: Option<JsonValue>,
    },
    ContainsIgnoreCase {
        field: String,
        needle: String,
    },
    AnyOf(Vec<Condition>),
}

impl Condition {
    fn fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Condition::Eq { field, .. }
            | Condition::Range { field, .. }
            | Condition::ContainsIgnoreCase { field, .. } => out.push(field),
            Condition::AnyOf(inner) => inner.iter().for_each(|c| c.fields(out)),
        }
    }

    pub fn matches(&self, doc: &JsonValue) -> bool {
        match self {
            Condition::Eq { field, value } => doc.get(field) == Some(value),
            Condition::Range { field, gte, lte } => {
                let Some(actual) = doc.get(field) else {
                    return false;
                };
                let lower_ok = gte.as_ref().map_or(true, |bound| {
                    matches!(
                        compare_json(actual, bound),
                        Some(Ordering::Greater | Ordering::Equal)
                    )
                });
                let upper_ok = lte.as_ref().map_or(true, |bound| {
                    matches!(
                        compare_json(actual, bound),
                        Some(Ordering::Less | Ordering::Equal)
                    )
                });
                lower_ok && upper_ok
            }
            Condition::ContainsIgnoreCase { field, needle } => doc
                .get(field)
                .and_then(JsonValue::as_str)
                .map(|s| s.to_lowercase().contains(&needle.to_lowercase()))
                .unwrap_or(false),
            Condition::AnyOf(inner) => inner.iter().any(|c| c.matches(doc)),
        }
    }
}

/// Conjunction of conditions over top-level document fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<JsonValue>) -> Self {
        self.conditions.push(Condition::Eq {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn range(mut self, field: &str, gte: Option<JsonValue>, lte: Option<JsonValue>) -> Self {
        if gte.is_none() && lte.is_none() {
            return self;
        }
        self.conditions.push(Condition::Range {
            field: field.to_string(),
            gte,
            lte,
        });
        self
    }

    pub fn any_of(mut self, conditions: Vec<Condition>) -> Self {
        self.conditions.push(Condition::AnyOf(conditions));
        self
    }

    pub fn matches(&self, doc: &JsonValue) -> bool {
        self.conditions.iter().all(|c| c.matches(doc))
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        let mut fields = Vec::new();
        self.conditions.iter().for_each(|c| c.fields(&mut fields));
        fields.into_iter().try_for_each(check_field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub sort: Vec<SortKey>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl FindOptions {
    pub fn sorted_by(field: &str, direction: SortDirection) -> Self {
        Self::default().then_by(field, direction)
    }

    pub fn then_by(mut self, field: &str, direction: SortDirection) -> Self {
        self.sort.push(SortKey {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn page(mut self, skip: u64, limit: u64) -> Self {
        self.skip = Some(skip);
        self.limit = Some(limit);
        self
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        self.sort.iter().try_for_each(|k| check_field(&k.field))
    }
}

/// One upsert-by-key instruction. `key` is derived from the natural key
/// fields so two models with equal key fields always collide.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertModel {
    pub key: String,
    pub key_fields: Vec<(String, JsonValue)>,
    pub document: JsonValue,
}

impl UpsertModel {
    pub fn new(key_fields: Vec<(String, JsonValue)>, document: JsonValue) -> Self {
        let values: Vec<&JsonValue> = key_fields.iter().map(|(_, v)| v).collect();
        let key = serde_json::to_string(&values).unwrap_or_default();
        Self {
            key,
            key_fields,
            document,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkWriteSummary {
    pub attempted: usize,
    pub inserted: usize,
    pub replaced: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
}

/// Write every model through `write` without stopping at a failure. Failed
/// writes are counted and reported as one `BulkWrite` error after the batch;
/// writes that succeeded stay in place.
pub async fn upsert_unordered<F, Fut, E>(
    collection: &str,
    models: Vec<UpsertModel>,
    mut write: F,
) -> Result<BulkWriteSummary, StoreError>
where
    F: FnMut(UpsertModel) -> Fut,
    Fut: Future<Output = Result<UpsertOutcome, E>>,
    E: Display,
{
    let mut summary = BulkWriteSummary {
        attempted: models.len(),
        ..Default::default()
    };
    let mut failed = 0usize;
    let mut first_error: Option<String> = None;

    for model in models {
        let key = model.key.clone();
        match write(model).await {
            Ok(UpsertOutcome::Inserted) => summary.inserted += 1,
            Ok(UpsertOutcome::Replaced) => summary.replaced += 1,
            Err(err) => {
                warn!(collection, key = %key, error = %err, "upsert failed");
                failed += 1;
                first_error.get_or_insert_with(|| err.to_string());
            }
        }
    }

    if failed > 0 {
        return Err(StoreError::BulkWrite {
            collection: collection.to_string(),
            failed,
            attempted: summary.attempted,
            first: first_error.unwrap_or_default(),
        });
    }
    Ok(summary)
}

#[async_trait]
pub trait DocumentCollection: Send + Sync {
    fn name(&self) -> &str;

    /// Insert-or-replace every model as one unordered batch. Every model is
    /// attempted even if an earlier one fails.
    async fn bulk_upsert(&self, models: Vec<UpsertModel>) -> Result<BulkWriteSummary, StoreError>;

    async fn find(&self, filter: &Filter, options: &FindOptions)
        -> Result<Vec<JsonValue>, StoreError>;

    async fn find_one(
        &self,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Option<JsonValue>, StoreError> {
        let mut options = options.clone();
        options.limit = Some(1);
        Ok(self.find(filter, &options).await?.into_iter().next())
    }

    async fn count(&self, filter: &Filter) -> Result<u64, StoreError>;
}

pub trait DocumentStore: Send + Sync {
    fn collection(&self, name: &str) -> Arc<dyn DocumentCollection>;
}

pub fn check_field(field: &str) -> Result<(), StoreError> {
    let valid = !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidField(field.to_string()))
    }
}

/// Total order for like-typed JSON scalars; `None` when types differ.
pub fn compare_json(a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (JsonValue::String(x), JsonValue::String(y)) => Some(x.cmp(y)),
        (JsonValue::Bool(x), JsonValue::Bool(y)) => Some(x.cmp(y)),
        (JsonValue::Null, JsonValue::Null) => Some(Ordering::Equal),
        _ => None,
    }
}
