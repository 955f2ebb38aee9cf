//! Process-local document store.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;

use crate::document::{
    compare_json, upsert_unordered, BulkWriteSummary, DocumentCollection, DocumentStore, Filter,
    FindOptions, SortDirection, StoreError, UpsertModel, UpsertOutcome,
};

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    collections: Arc<Mutex<HashMap<String, Arc<MemoryCollection>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryStore {
    fn collection(&self, name: &str) -> Arc<dyn DocumentCollection> {
        let mut map = self
            .collections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCollection::new(name)))
            .clone()
    }
}

#[derive(Debug)]
pub struct MemoryCollection {
    name: String,
    docs: RwLock<BTreeMap<String, JsonValue>>,
}

impl MemoryCollection {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            docs: RwLock::new(BTreeMap::new()),
        }
    }
}

fn sort_documents(docs: &mut [JsonValue], options: &FindOptions) {
    if options.sort.is_empty() {
        return;
    }
    docs.sort_by(|a, b| {
        for key in &options.sort {
            let ord = match (a.get(&key.field), b.get(&key.field)) {
                (Some(x), Some(y)) => compare_json(x, y).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Greater,
                (None, Some(_)) => Ordering::Less,
                (None, None) => Ordering::Equal,
            };
            let ord = match key.direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

#[async_trait]
impl DocumentCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn bulk_upsert(&self, models: Vec<UpsertModel>) -> Result<BulkWriteSummary, StoreError> {
        let mut docs = self.docs.write().await;
        upsert_unordered(&self.name, models, |model| {
            let outcome = match docs.insert(model.key, model.document) {
                Some(_) => UpsertOutcome::Replaced,
                None => UpsertOutcome::Inserted,
            };
            std::future::ready(Ok::<_, Infallible>(outcome))
        })
        .await
    }

    async fn find(
        &self,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<JsonValue>, StoreError> {
        filter.validate()?;
        options.validate()?;
        let docs = self.docs.read().await;
        let mut matched: Vec<JsonValue> = docs
            .values()
            .filter(|doc| filter.matches(doc))
            .cloned()
            .collect();
        drop(docs);

        sort_documents(&mut matched, options);
        let skip = options.skip.unwrap_or(0) as usize;
        let limit = options.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(matched.into_iter().skip(skip).take(limit).collect())
    }

    async fn count(&self, filter: &Filter) -> Result<u64, StoreError> {
        filter.validate()?;
        let docs = self.docs.read().await;
        Ok(docs.values().filter(|doc| filter.matches(doc)).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model(code: &str, name: &str) -> UpsertModel {
        UpsertModel::new(
            vec![("code".to_string(), json!(code))],
            json!({"code": code, "name": name}),
        )
    }

    #[tokio::test]
    async fn upsert_replaces_by_key_and_is_idempotent() {
        let store = MemoryStore::new();
        let coll = store.collection("brokers");

        let first = coll
            .bulk_upsert(vec![model("AA", "Alpha"), model("BB", "Beta")])
            .await
            .unwrap();
        assert_eq!(first.inserted, 2);

        let second = coll
            .bulk_upsert(vec![model("AA", "Alpha"), model("BB", "Beta")])
            .await
            .unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.replaced, 2);
        assert_eq!(coll.count(&Filter::new()).await.unwrap(), 2);

        coll.bulk_upsert(vec![model("AA", "Alpha Renamed")])
            .await
            .unwrap();
        let found = coll
            .find_one(&Filter::new().eq("code", "AA"), &FindOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found["name"], "Alpha Renamed");
    }

    #[tokio::test]
    async fn same_name_returns_shared_collection() {
        let store = MemoryStore::new();
        store
            .collection("c")
            .bulk_upsert(vec![model("AA", "A")])
            .await
            .unwrap();
        assert_eq!(store.collection("c").count(&Filter::new()).await.unwrap(), 1);
        assert_eq!(store.collection("d").count(&Filter::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn find_sorts_and_pages() {
        let coll = MemoryCollection::new("securities");
        coll.bulk_upsert(vec![model("CC", "c"), model("AA", "a"), model("BB", "b")])
            .await
            .unwrap();

        let opts = FindOptions::sorted_by("code", SortDirection::Descending).page(1, 1);
        let page = coll.find(&Filter::new(), &opts).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0]["code"], "BB");
    }

    #[tokio::test]
    async fn find_one_absent_is_none() {
        let coll = MemoryCollection::new("securities");
        let found = coll
            .find_one(&Filter::new().eq("code", "ZZ"), &FindOptions::default())
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn invalid_sort_field_is_rejected() {
        let coll = MemoryCollection::new("securities");
        let err = coll
            .find(&Filter::new(), &FindOptions::sorted_by("a b", SortDirection::Ascending))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidField(_)));
    }
}
