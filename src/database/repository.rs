use serde_json::{Map, Value};
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::database::collections::CollectionSpec;
use crate::database::manager::DatabaseError;
use crate::database::populate::Populate;
use crate::database::query_builder::{describe, QueryBuilder};
use crate::filter::{Filter, FilterError, Pagination, QueryPage, QueryPlan};

/// Collection-agnostic reads and writes. Records travel as JSON objects
/// keyed by API field name.
#[derive(Clone)]
pub struct Repository {
    pool: PgPool,
}

impl Repository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Execute a query plan: one page of records, the filter's total count,
    /// and next/prev links.
    pub async fn find_page(
        &self,
        collection: &'static CollectionSpec,
        plan: &QueryPlan,
        populate: Option<&Populate>,
    ) -> Result<QueryPage, DatabaseError> {
        let (projection, expand) = match populate {
            Some(populate) => populate.narrow(&plan.projection),
            None => (plan.projection.clone(), false),
        };
        let plan = QueryPlan { projection, ..plan.clone() };
        let populate = populate.filter(|_| expand);

        let builder = QueryBuilder::new(Filter::from_plan(collection, &plan)?);
        if crate::config::CONFIG.query.debug_logging {
            debug!("{}: {}", collection.name, describe(&builder.filter().to_sql()?));
        }

        let total = builder.count(&self.pool).await?;
        let mut items = builder.select_all(&self.pool).await?;
        if let Some(populate) = populate {
            populate.apply(&self.pool, &mut items).await?;
        }

        Ok(QueryPage {
            items,
            total,
            pagination: Pagination::new(plan.page, plan.limit, total),
        })
    }

    /// Every record matching the plan's filter, in plan order, ignoring paging
    pub async fn find_all(
        &self,
        collection: &'static CollectionSpec,
        plan: &QueryPlan,
        populate: Option<&Populate>,
    ) -> Result<Vec<Value>, DatabaseError> {
        let mut filter = Filter::new(collection);
        filter
            .select(&plan.projection)?
            .where_clause(plan.filter.clone())?
            .order(plan.sort.clone())?;
        let mut items = QueryBuilder::new(filter).select_all(&self.pool).await?;
        if let Some(populate) = populate {
            populate.apply(&self.pool, &mut items).await?;
        }
        Ok(items)
    }

    pub async fn find_by_id(
        &self,
        collection: &'static CollectionSpec,
        id: Uuid,
        populate: Option<&Populate>,
    ) -> Result<Option<Value>, DatabaseError> {
        let Some(record) = self.find_by_field(collection, "id", Value::String(id.to_string())).await? else {
            return Ok(None);
        };
        let mut items = vec![record];
        if let Some(populate) = populate {
            populate.apply(&self.pool, &mut items).await?;
        }
        Ok(items.pop())
    }

    /// Like [`find_by_id`](Self::find_by_id) but a missing record is an error
    pub async fn find_by_id_404(
        &self,
        collection: &'static CollectionSpec,
        id: Uuid,
        populate: Option<&Populate>,
    ) -> Result<Value, DatabaseError> {
        self.find_by_id(collection, id, populate)
            .await?
            .ok_or_else(|| not_found(collection, id))
    }

    pub async fn find_by_field(
        &self,
        collection: &'static CollectionSpec,
        field: &str,
        value: Value,
    ) -> Result<Option<Value>, DatabaseError> {
        let mut conditions = Map::new();
        conditions.insert(field.to_string(), value);
        let mut filter = Filter::new(collection);
        filter.where_clause(conditions)?.limit(1, None);
        QueryBuilder::new(filter).select_optional(&self.pool).await
    }

    /// Insert a record and return it as stored, defaults included
    pub async fn insert(
        &self,
        collection: &'static CollectionSpec,
        data: &Map<String, Value>,
    ) -> Result<Value, DatabaseError> {
        let payload = column_payload(collection, data)?;
        let columns = payload.keys().map(|c| format!("\"{}\"", c)).collect::<Vec<_>>().join(", ");

        let row = if payload.is_empty() {
            let query = format!("INSERT INTO \"{}\" DEFAULT VALUES RETURNING \"id\"", collection.table);
            sqlx::query(&query).fetch_one(&self.pool).await?
        } else {
            let query = format!(
                "INSERT INTO \"{table}\" ({columns}) SELECT {columns} FROM jsonb_populate_record(NULL::\"{table}\", $1::jsonb) RETURNING \"id\"",
                table = collection.table,
                columns = columns
            );
            sqlx::query(&query)
                .bind(Value::Object(payload))
                .fetch_one(&self.pool)
                .await?
        };
        let id: Uuid = row.try_get("id")?;
        debug!("Inserted {} {}", collection.singular, id);

        self.find_by_id_404(collection, id, None).await
    }

    /// Apply a partial update and return the record as stored
    pub async fn update(
        &self,
        collection: &'static CollectionSpec,
        id: Uuid,
        data: &Map<String, Value>,
    ) -> Result<Value, DatabaseError> {
        let payload = column_payload(collection, data)?;
        let mut assignments: Vec<String> = payload
            .keys()
            .map(|c| format!("\"{col}\" = r.\"{col}\"", col = c))
            .collect();
        if collection.has_column("updated_at") {
            assignments.push("\"updated_at\" = now()".to_string());
        }
        if assignments.is_empty() {
            return self.find_by_id_404(collection, id, None).await;
        }

        let query = format!(
            "UPDATE \"{table}\" SET {sets} FROM jsonb_populate_record(NULL::\"{table}\", $1::jsonb) AS r WHERE \"{table}\".\"id\" = $2 RETURNING \"{table}\".\"id\"",
            table = collection.table,
            sets = assignments.join(", ")
        );

        let updated = sqlx::query(&query)
            .bind(Value::Object(payload))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        if updated.is_none() {
            return Err(not_found(collection, id));
        }
        debug!("Updated {} {}", collection.singular, id);

        self.find_by_id_404(collection, id, None).await
    }

    /// Returns whether a record was removed
    pub async fn delete(&self, collection: &'static CollectionSpec, id: Uuid) -> Result<bool, DatabaseError> {
        let query = format!("DELETE FROM \"{}\" WHERE \"id\" = $1", collection.table);
        let result = sqlx::query(&query).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_all(&self, collection: &'static CollectionSpec) -> Result<u64, DatabaseError> {
        let query = format!("DELETE FROM \"{}\"", collection.table);
        let result = sqlx::query(&query).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

pub fn not_found(collection: &CollectionSpec, id: Uuid) -> DatabaseError {
    DatabaseError::NotFound(format!("{} not found with id of {}", collection.singular, id))
}

/// Re-key an API-named record by column name
fn column_payload(
    collection: &CollectionSpec,
    data: &Map<String, Value>,
) -> Result<Map<String, Value>, FilterError> {
    data.iter()
        .map(|(name, value)| {
            collection
                .field(name)
                .map(|f| (f.column.to_string(), value.clone()))
                .ok_or_else(|| FilterError::UnknownField {
                    collection: collection.name.to_string(),
                    field: name.clone(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::collections::{BOOTCAMPS, COURSES};
    use serde_json::json;

    #[test]
    fn payload_uses_column_names() {
        let data = json!({ "jobAssistance": true, "name": "Devworks", "user": "5d7a514b-5d2c-12c8-5b2d-1b8a00000001" });
        let payload = column_payload(&BOOTCAMPS, data.as_object().unwrap()).unwrap();
        assert_eq!(payload["job_assistance"], json!(true));
        assert_eq!(payload["name"], json!("Devworks"));
        assert!(payload.contains_key("user_id"));
    }

    #[test]
    fn payload_rejects_unknown_fields() {
        let data = json!({ "price": 1 });
        assert!(column_payload(&COURSES, data.as_object().unwrap()).is_err());
    }

    #[test]
    fn not_found_names_the_record() {
        let id = Uuid::nil();
        let msg = not_found(&COURSES, id).to_string();
        assert!(msg.contains("Course not found with id of"));
    }
}
