//! Postgres-backed document store: one JSONB row per document.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder, Row};
use tracing::info;

use crate::document::{
    upsert_unordered, BulkWriteSummary, Condition, DocumentCollection, DocumentStore, Filter,
    FindOptions, SortDirection, StoreError, UpsertModel, UpsertOutcome,
};

pub const DOCUMENTS_TABLE: &str = "bursa_documents";

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS bursa_documents (
    collection TEXT NOT NULL,
    doc_key TEXT NOT NULL,
    body JSONB NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (collection, doc_key)
)";

const UPSERT_SQL: &str = "INSERT INTO bursa_documents (collection, doc_key, body, updated_at)
VALUES ($1, $2, $3, now())
ON CONFLICT (collection, doc_key)
DO UPDATE SET body = EXCLUDED.body, updated_at = EXCLUDED.updated_at
RETURNING (xmax = 0) AS inserted";

#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.ensure_table().await?;
        info!(table = DOCUMENTS_TABLE, "document store ready");
        Ok(store)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_table(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TABLE_SQL).execute(&self.pool).await?;
        Ok(())
    }
}

impl DocumentStore for PgDocumentStore {
    fn collection(&self, name: &str) -> Arc<dyn DocumentCollection> {
        Arc::new(PgCollection {
            pool: self.pool.clone(),
            name: name.to_string(),
        })
    }
}

#[derive(Debug)]
struct PgCollection {
    pool: PgPool,
    name: String,
}

fn json_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

fn push_condition(builder: &mut QueryBuilder<'static, Postgres>, condition: &Condition) {
    match condition {
        Condition::Eq { field, value } => {
            builder.push("body ->> ");
            builder.push_bind(field.clone());
            builder.push(" = ");
            builder.push_bind(json_text(value));
        }
        Condition::Range { field, gte, lte } => {
            builder.push("(TRUE");
            if let Some(bound) = gte {
                builder.push(" AND body ->> ");
                builder.push_bind(field.clone());
                builder.push(" >= ");
                builder.push_bind(json_text(bound));
            }
            if let Some(bound) = lte {
                builder.push(" AND body ->> ");
                builder.push_bind(field.clone());
                builder.push(" <= ");
                builder.push_bind(json_text(bound));
            }
            builder.push(")");
        }
        Condition::ContainsIgnoreCase { field, needle } => {
            builder.push("body ->> ");
            builder.push_bind(field.clone());
            builder.push(" ILIKE ");
            builder.push_bind(escape_like(needle));
        }
        Condition::AnyOf(inner) => {
            if inner.is_empty() {
                builder.push("FALSE");
                return;
            }
            builder.push("(");
            for (i, c) in inner.iter().enumerate() {
                if i > 0 {
                    builder.push(" OR ");
                }
                push_condition(builder, c);
            }
            builder.push(")");
        }
    }
}

fn push_where(builder: &mut QueryBuilder<'static, Postgres>, collection: &str, filter: &Filter) {
    builder.push(" WHERE collection = ");
    builder.push_bind(collection.to_string());
    for condition in &filter.conditions {
        builder.push(" AND ");
        push_condition(builder, condition);
    }
}

fn select_query(
    collection: &str,
    filter: &Filter,
    options: &FindOptions,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT body FROM bursa_documents");
    push_where(&mut builder, collection, filter);

    if !options.sort.is_empty() {
        builder.push(" ORDER BY ");
        for (i, key) in options.sort.iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            builder.push("body ->> ");
            builder.push_bind(key.field.clone());
            builder.push(match key.direction {
                SortDirection::Ascending => " ASC",
                SortDirection::Descending => " DESC",
            });
        }
    }
    if let Some(limit) = options.limit {
        builder.push(" LIMIT ");
        builder.push_bind(limit as i64);
    }
    if let Some(skip) = options.skip {
        builder.push(" OFFSET ");
        builder.push_bind(skip as i64);
    }
    builder
}

fn count_query(collection: &str, filter: &Filter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM bursa_documents");
    push_where(&mut builder, collection, filter);
    builder
}

#[async_trait]
impl DocumentCollection for PgCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn bulk_upsert(&self, models: Vec<UpsertModel>) -> Result<BulkWriteSummary, StoreError> {
        let pool = &self.pool;
        let name = &self.name;
        upsert_unordered(name, models, |model| async move {
            let row = sqlx::query(UPSERT_SQL)
                .bind(name)
                .bind(&model.key)
                .bind(Json(&model.document))
                .fetch_one(pool)
                .await?;
            let inserted = row.try_get::<bool, _>("inserted").unwrap_or(false);
            Ok::<_, sqlx::Error>(if inserted {
                UpsertOutcome::Inserted
            } else {
                UpsertOutcome::Replaced
            })
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
        let mut builder = select_query(&self.name, filter, options);
        let rows: Vec<(Json<JsonValue>,)> = builder.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(Json(body),)| body).collect())
    }

    async fn count(&self, filter: &Filter) -> Result<u64, StoreError> {
        filter.validate()?;
        let mut builder = count_query(&self.name, filter);
        let count: i64 = builder.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn select_compiles_filters_to_bound_json_lookups() {
        let filter = Filter::new()
            .eq("security_code", "BBCA")
            .range("date", Some(json!("2024-05-01T00:00:00")), None);
        let options = FindOptions::sorted_by("date", SortDirection::Ascending).page(10, 5);
        let builder = select_query("daily_summaries", &filter, &options);
        assert_eq!(
            builder.sql(),
            "SELECT body FROM bursa_documents WHERE collection = $1 \
             AND body ->> $2 = $3 \
             AND (TRUE AND body ->> $4 >= $5) \
             ORDER BY body ->> $6 ASC LIMIT $7 OFFSET $8"
        );
    }

    #[test]
    fn any_of_compiles_to_parenthesised_or() {
        let filter = Filter::new().any_of(vec![
            Condition::ContainsIgnoreCase {
                field: "code".into(),
                needle: "bb".into(),
            },
            Condition::ContainsIgnoreCase {
                field: "name".into(),
                needle: "bb".into(),
            },
        ]);
        let builder = count_query("securities", &filter);
        assert_eq!(
            builder.sql(),
            "SELECT COUNT(*) FROM bursa_documents WHERE collection = $1 \
             AND (body ->> $2 ILIKE $3 OR body ->> $4 ILIKE $5)"
        );
    }

    #[test]
    fn empty_any_of_matches_nothing() {
        let builder = count_query("securities", &Filter::new().any_of(Vec::new()));
        assert!(builder.sql().ends_with("AND FALSE"));
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(escape_like("50%_a"), "%50\\%\\_a%");
    }

    #[test]
    fn json_text_matches_postgres_text_extraction_for_strings() {
        assert_eq!(json_text(&json!("AA")), "AA");
        assert_eq!(json_text(&json!(12)), "12");
    }
}
